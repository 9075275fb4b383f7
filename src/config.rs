//! Configuration loading and resolution.
//!
//! Layers, later wins: built-in defaults, the JSON settings file, `GRADER_*`
//! environment variables, then command-line overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::validator::StatisticalCriteria;

pub const SETTINGS_FILE_NAME: &str = "grader.json";
pub const DEFAULT_TRIALS: usize = 500;
pub const FAST_DIVISOR: usize = 10;

/// Settings file contents. Every field is optional; unset fields fall back
/// to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(alias = "inputsDir")]
    pub inputs_dir: Option<PathBuf>,
    #[serde(alias = "expectedDir")]
    pub expected_dir: Option<PathBuf>,
    #[serde(alias = "resultsDir")]
    pub results_dir: Option<PathBuf>,
    pub simulator: Option<PathBuf>,
    pub trials: Option<usize>,
    pub jobs: Option<usize>,
    pub randomized: Option<RandomizedSettings>,
}

/// `randomized` section of the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomizedSettings {
    pub trace: Option<String>,
    pub args: Option<Vec<String>>,
    #[serde(alias = "referenceMean")]
    pub reference_mean: Option<f64>,
    pub epsilon: Option<f64>,
    pub alpha: Option<f64>,
}

impl Settings {
    /// Load settings from a specific path. A missing or blank file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read settings file {}: {e}",
                path.display()
            ))
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_json::from_str(&content).map_err(|e| {
            Error::config(format!(
                "Failed to parse settings file {}: {e}",
                path.display()
            ))
        })
    }

    /// Merge two settings, with `other` taking precedence.
    pub fn merge(base: Self, other: Self) -> Self {
        Self {
            inputs_dir: other.inputs_dir.or(base.inputs_dir),
            expected_dir: other.expected_dir.or(base.expected_dir),
            results_dir: other.results_dir.or(base.results_dir),
            simulator: other.simulator.or(base.simulator),
            trials: other.trials.or(base.trials),
            jobs: other.jobs.or(base.jobs),
            randomized: merge_randomized(base.randomized, other.randomized),
        }
    }

    /// Settings drawn from `GRADER_*` variables. Unparseable numbers are ignored.
    pub fn from_env<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            simulator: get_env("GRADER_SIMULATOR").map(PathBuf::from),
            trials: parse_env_number(&get_env, "GRADER_TRIALS"),
            jobs: parse_env_number(&get_env, "GRADER_JOBS"),
            ..Self::default()
        }
    }
}

fn merge_randomized(
    base: Option<RandomizedSettings>,
    other: Option<RandomizedSettings>,
) -> Option<RandomizedSettings> {
    match (base, other) {
        (Some(base), Some(other)) => Some(RandomizedSettings {
            trace: other.trace.or(base.trace),
            args: other.args.or(base.args),
            reference_mean: other.reference_mean.or(base.reference_mean),
            epsilon: other.epsilon.or(base.epsilon),
            alpha: other.alpha.or(base.alpha),
        }),
        (None, Some(other)) => Some(other),
        (Some(base), None) => Some(base),
        (None, None) => None,
    }
}

fn parse_env_number<F>(get_env: &F, var: &str) -> Option<usize>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = get_env(var)?;
    match raw.trim().parse::<usize>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var, value = %raw, "ignoring non-numeric environment override");
            None
        }
    }
}

fn env_lookup(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

/// Command-line overrides; the outermost layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root: Option<PathBuf>,
    pub simulator: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub jobs: Option<usize>,
    /// Number of times `--fast` was given.
    pub fast: u8,
}

/// Fixed configuration of the randomized-policy suite.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomizedSuite {
    /// File name of the trace under the inputs directory.
    pub trace: String,
    pub args: Vec<String>,
    pub criteria: StatisticalCriteria,
}

impl Default for RandomizedSuite {
    fn default() -> Self {
        Self {
            trace: "trace1".to_string(),
            args: ["RAND", "65536", "1024", "64"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            criteria: StatisticalCriteria::default(),
        }
    }
}

/// Fully resolved configuration for one grading run.
#[derive(Debug, Clone, PartialEq)]
pub struct GraderConfig {
    pub root: PathBuf,
    pub inputs_dir: PathBuf,
    pub expected_dir: PathBuf,
    pub results_dir: PathBuf,
    pub simulator: PathBuf,
    /// Trial count after `--fast` reductions.
    pub trials: usize,
    pub jobs: usize,
    pub fast: u8,
    pub randomized: RandomizedSuite,
}

impl GraderConfig {
    /// Defaults rooted at `root`.
    pub fn with_root(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            inputs_dir: root.join("inputs"),
            expected_dir: root.join("expected"),
            results_dir: root.join("test_results"),
            simulator: root.join("cachesim"),
            trials: DEFAULT_TRIALS,
            jobs: 1,
            fast: 0,
            randomized: RandomizedSuite::default(),
        }
    }

    /// Resolve configuration from the process environment and `overrides`.
    pub fn load(overrides: Overrides) -> Result<Self> {
        let cwd = std::env::current_dir()?;
        Self::load_with(overrides, &cwd, env_lookup)
    }

    /// Resolve configuration against an explicit working directory and
    /// environment lookup.
    pub fn load_with<F>(overrides: Overrides, cwd: &Path, get_env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let root = overrides
            .root
            .as_deref()
            .map_or_else(|| cwd.to_path_buf(), |root| resolve(cwd, root));

        let settings_path = get_env("GRADER_CONFIG_PATH").map_or_else(
            || root.join(SETTINGS_FILE_NAME),
            |p| resolve(cwd, Path::new(&p)),
        );
        let file = Settings::load_from_path(&settings_path)?;
        let settings = Settings::merge(file, Settings::from_env(&get_env));

        let mut config = Self::with_root(&root);
        config.apply(settings, overrides);
        config.validate()?;
        tracing::debug!(
            root = %config.root.display(),
            simulator = %config.simulator.display(),
            trials = config.trials,
            jobs = config.jobs,
            "resolved configuration"
        );
        Ok(config)
    }

    fn apply(&mut self, settings: Settings, overrides: Overrides) {
        let root = self.root.clone();
        let at_root = |p: PathBuf| resolve(&root, &p);

        if let Some(dir) = settings.inputs_dir {
            self.inputs_dir = at_root(dir);
        }
        if let Some(dir) = settings.expected_dir {
            self.expected_dir = at_root(dir);
        }
        if let Some(dir) = overrides.results_dir.or(settings.results_dir) {
            self.results_dir = at_root(dir);
        }
        if let Some(program) = overrides.simulator.or(settings.simulator) {
            self.simulator = at_root(program);
        }
        if let Some(trials) = settings.trials {
            self.trials = trials;
        }
        if let Some(jobs) = overrides.jobs.or(settings.jobs) {
            self.jobs = jobs;
        }
        if let Some(randomized) = settings.randomized {
            let suite = &mut self.randomized;
            if let Some(trace) = randomized.trace {
                suite.trace = trace;
            }
            if let Some(args) = randomized.args {
                suite.args = args;
            }
            if let Some(mean) = randomized.reference_mean {
                suite.criteria.reference_mean = mean;
            }
            if let Some(epsilon) = randomized.epsilon {
                suite.criteria.epsilon = epsilon;
            }
            if let Some(alpha) = randomized.alpha {
                suite.criteria.alpha = alpha;
            }
        }

        self.fast = overrides.fast;
        for _ in 0..overrides.fast {
            self.trials /= FAST_DIVISOR;
        }
    }

    /// Reject values that would make the run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            let hint = if self.fast > 0 {
                format!(" (--fast given {} times)", self.fast)
            } else {
                String::new()
            };
            return Err(Error::config(format!("trials must be at least 1{hint}")));
        }
        if self.jobs == 0 {
            return Err(Error::config("jobs must be at least 1"));
        }
        let criteria = &self.randomized.criteria;
        if criteria.epsilon.is_nan() || criteria.epsilon <= 0.0 {
            return Err(Error::config(format!(
                "epsilon must be positive, got {}",
                criteria.epsilon
            )));
        }
        if !(0.0..=1.0).contains(&criteria.alpha) {
            return Err(Error::config(format!(
                "alpha must be within [0, 1], got {}",
                criteria.alpha
            )));
        }
        if self.randomized.args.is_empty() {
            return Err(Error::config("randomized suite needs simulator arguments"));
        }
        Ok(())
    }

    /// Path of the randomized-suite trace.
    pub fn randomized_trace_path(&self) -> PathBuf {
        self.inputs_dir.join(&self.randomized.trace)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
