//! Test harness for grader runs against a fake simulator.
//!
//! # Example
//!
//! ```ignore
//! #[test]
//! fn grades_a_tree() {
//!     let harness = TestHarness::new("grades_a_tree");
//!     harness.create_trace("trace1", b"R 0x0\n");
//!     harness.create_expected("lru-64-16-2-trace1", "OUTPUT HITS 64\n");
//!     let script = harness.create_simulator_script(FAKE_SIMULATOR);
//!     // ...
//! }
//! ```

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use grader::simulator::{Simulator, SubprocessSimulator};
use tempfile::TempDir;

static EXEC_LOCK: Mutex<()> = Mutex::new(());

/// Serialize tests that write an executable and then run it.
///
/// A fork from another test thread can inherit the write descriptor and make
/// the exec fail with "text file busy".
pub fn exec_lock() -> MutexGuard<'static, ()> {
    EXEC_LOCK
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Temp project tree laid out the way the grader expects.
pub struct TestHarness {
    name: String,
    temp_dir: TempDir,
}

impl TestHarness {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::create_dir_all(temp_dir.path().join("inputs")).expect("create inputs");
        std::fs::create_dir_all(temp_dir.path().join("expected")).expect("create expected");
        Self { name, temp_dir }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root of the project tree.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn temp_path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.temp_dir.path().join(path)
    }

    /// Create a file in the tree, creating parent directories as needed.
    pub fn create_file(&self, name: impl AsRef<Path>, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.temp_path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&path, content).expect("Failed to create test file");
        path
    }

    pub fn create_trace(&self, name: &str, content: &[u8]) -> PathBuf {
        self.create_file(Path::new("inputs").join(name), content)
    }

    pub fn create_expected(&self, name: &str, content: &str) -> PathBuf {
        self.create_file(Path::new("expected").join(name), content)
    }

    /// Write `body` as `<root>/cachesim`, executable.
    #[cfg(unix)]
    pub fn create_simulator_script(&self, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = self.create_file("cachesim", format!("#!/bin/sh\n{body}"));
        let mut perms = std::fs::metadata(&path).expect("stat script").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).expect("chmod script");
        path
    }

    /// JSON result files written under `<root>/test_results`.
    pub fn result_files(&self) -> Vec<PathBuf> {
        let dir = self.temp_path("test_results");
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        files
    }
}

/// Runs a simulator script through `/bin/sh`, so the script never needs to be
/// executable.
pub struct ShellSimulator {
    shell: SubprocessSimulator,
    script: PathBuf,
}

impl ShellSimulator {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            shell: SubprocessSimulator::new("/bin/sh"),
            script: script.into(),
        }
    }
}

impl Simulator for ShellSimulator {
    fn invoke(&self, args: &[String], trace: &[u8]) -> grader::Result<Vec<String>> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(self.script.display().to_string());
        full.extend_from_slice(args);
        self.shell.invoke(&full, trace)
    }
}

/// Canned simulator: echoes parameters for LRU, a constant hit ratio for RAND.
pub const FAKE_SIMULATOR: &str = r#"
cat > /dev/null
case "$1" in
  LRU)
    echo "OUTPUT HITS $2"
    echo "cache ready"
    echo "OUTPUT MISSES $4"
    ;;
  LRU_PREFER_CLEAN)
    echo "OUTPUT HITS 1"
    ;;
  RAND)
    echo "OUTPUT HIT RATIO 0.99430"
    ;;
esac
"#;

/// Populate a tree that [`FAKE_SIMULATOR`] scores 23 out of 25 on.
///
/// `lru-32-16-4-trace1` fails on line 1; everything else passes.
pub fn populate_reference_tree(harness: &TestHarness) {
    harness.create_trace("trace1", b"R 0x0\nW 0x40\n");
    harness.create_expected("lru-64-16-2-trace1", "OUTPUT HITS 64\nOUTPUT MISSES 2\n");
    harness.create_expected("lru-32-16-4-trace1", "OUTPUT HITS 32\nOUTPUT MISSES 2\n");
    harness.create_expected("lru_prefer_clean-8-8-1-trace1", "OUTPUT HITS 1   \n");
}
