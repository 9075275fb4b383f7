//! Error types for the grader.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using our error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal grader errors.
///
/// Anything that reaches this type aborts the run. Per-fixture failures
/// (wrong output, missing samples) are recorded as scored test records
/// instead and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// An expected-output fixture whose name or contents cannot be used
    #[error("Fixture error: {}: {message}", path.display())]
    Fixture { path: PathBuf, message: String },

    /// The simulator under test could not be run or spoke an unreadable protocol
    #[error("Simulator error: {0}")]
    Simulator(String),

    /// Statistical computation errors
    #[error("Statistics error: {0}")]
    Statistics(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] Box<std::io::Error>),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] Box<serde_json::Error>),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a fixture error tied to a file.
    pub fn fixture(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Fixture {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a simulator error.
    pub fn simulator(message: impl Into<String>) -> Self {
        Self::Simulator(message.into())
    }

    /// Create a statistics error.
    pub fn statistics(message: impl Into<String>) -> Self {
        Self::Statistics(message.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(Box::new(value))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(Box::new(value))
    }
}
