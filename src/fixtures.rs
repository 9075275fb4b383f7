//! Fixture discovery.
//!
//! Traces live in the inputs directory; expected outputs live in the
//! expected directory and encode their simulator parameters in the file
//! name:
//!
//! ```text
//! <policy>-<cache_size>-<cache_line_size>-<associativity>-<trace_name>
//! ```
//!
//! The file name is the only source of test parameters, so a name that does
//! not parse is a fatal error rather than a skipped fixture.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use regex::Regex;

use crate::error::{Error, Result};

/// Replacement policy encoded in an expected-output file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Policy {
    Lru,
    Rand,
    LruPreferClean,
}

impl Policy {
    /// All recognized policies.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Lru, Self::Rand, Self::LruPreferClean]
    }

    /// Token as it appears in fixture file names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Rand => "rand",
            Self::LruPreferClean => "lru_prefer_clean",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|policy| policy.as_str() == s)
            .ok_or_else(|| format!("unknown policy `{s}`"))
    }
}

/// One numeric parameter: the digits as written in the file name plus
/// their value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub token: String,
    pub value: u32,
}

impl Parameter {
    fn parse(path: &Path, token: &str, label: &str) -> Result<Self> {
        let value = token.parse::<u32>().map_err(|err| {
            let message = format!("{label} `{token}` is not a u32: {err}");
            Error::fixture(path, message)
        })?;
        Ok(Self {
            token: token.to_string(),
            value,
        })
    }
}

/// Validated parameters parsed from one expected-output file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixtureDescriptor {
    pub policy: Policy,
    /// Policy token exactly as written in the file name.
    pub policy_token: String,
    pub cache_size: Parameter,
    pub cache_line_size: Parameter,
    pub associativity: Parameter,
    pub trace_name: String,
}

impl FixtureDescriptor {
    /// Parse `file_name` against the grammar for `trace_name`.
    ///
    /// `path` is only used to label errors.
    pub fn parse(path: &Path, file_name: &str, trace_name: &str) -> Result<Self> {
        let pattern = format!(
            r"^([a-z_]+)-(\d+)-(\d+)-(\d+)-{}$",
            regex::escape(trace_name)
        );
        let re = Regex::new(&pattern)
            .map_err(|err| Error::fixture(path, format!("invalid fixture pattern: {err}")))?;
        let caps = re.captures(file_name).ok_or_else(|| {
            Error::fixture(
                path,
                format!(
                    "name does not match \
                     <policy>-<cache_size>-<cache_line_size>-<associativity>-{trace_name}"
                ),
            )
        })?;

        let policy = caps[1]
            .parse::<Policy>()
            .map_err(|message| Error::fixture(path, message))?;

        Ok(Self {
            policy,
            policy_token: caps[1].to_string(),
            cache_size: Parameter::parse(path, &caps[2], "cache size")?,
            cache_line_size: Parameter::parse(path, &caps[3], "cache line size")?,
            associativity: Parameter::parse(path, &caps[4], "associativity")?,
            trace_name: trace_name.to_string(),
        })
    }

    /// Simulator arguments: the file-name tokens, upper-cased.
    pub fn simulator_args(&self) -> Vec<String> {
        [
            &self.policy_token,
            &self.cache_size.token,
            &self.cache_line_size.token,
            &self.associativity.token,
        ]
        .into_iter()
        .map(|token| token.to_uppercase())
        .collect()
    }

    /// Space-separated parameter summary used in progress output.
    pub fn parameter_label(&self) -> String {
        let mut parts = self.simulator_args();
        parts.push(self.trace_name.to_uppercase());
        parts.join(" ")
    }
}

/// One expected-output file matched to its trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedFixture {
    pub path: PathBuf,
    pub file_name: String,
    pub descriptor: FixtureDescriptor,
}

/// A trace together with every expected output that targets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFixtures {
    pub trace_path: PathBuf,
    pub trace_name: String,
    pub expected: Vec<ExpectedFixture>,
}

/// Discover traces in `inputs_dir` and match expected files in `expected_dir`.
///
/// Both listings are sorted by file name so rubric sub-numbers are stable.
pub fn discover(inputs_dir: &Path, expected_dir: &Path) -> Result<Vec<TraceFixtures>> {
    let traces = sorted_files(inputs_dir)?;
    let expected_files = sorted_files(expected_dir)?;

    let mut out = Vec::with_capacity(traces.len());
    for (trace_name, trace_path) in traces {
        let suffix = format!("-{trace_name}");
        let mut expected = Vec::new();
        for (file_name, path) in &expected_files {
            if !file_name.ends_with(&suffix) {
                continue;
            }
            let descriptor = FixtureDescriptor::parse(path, file_name, &trace_name)?;
            expected.push(ExpectedFixture {
                path: path.clone(),
                file_name: file_name.clone(),
                descriptor,
            });
        }
        tracing::debug!(trace = %trace_name, matched = expected.len(), "matched fixtures");
        out.push(TraceFixtures {
            trace_path,
            trace_name,
            expected,
        });
    }
    Ok(out)
}

/// Read an expected-output file into lines with trailing whitespace removed.
pub fn read_expected_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(|line| line.trim_end().to_string())
        .collect())
}

fn sorted_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|err| Error::config(format!("cannot read directory {}: {err}", dir.display())))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        // Follows symlinks; a dangling link is an error rather than a skip.
        let metadata = std::fs::metadata(&path)
            .map_err(|err| Error::fixture(&path, format!("cannot stat fixture: {err}")))?;
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        files.push((name, path));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}
