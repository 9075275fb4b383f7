//! Error hints: mapping from fatal grader errors to remediation suggestions.
//!
//! Each error variant maps to a 1-line summary and 0-2 actionable hints.
//! Hints must be stable for testability and never suggest destructive
//! actions (the fixture directories are ground truth).

use crate::error::Error;
use std::fmt::Write as _;

/// A remediation hint for an error.
#[derive(Debug, Clone)]
pub struct ErrorHint {
    /// Brief 1-line summary of the error category.
    pub summary: &'static str,
    /// Actionable hints for the user (0-2 items).
    pub hints: &'static [&'static str],
}

/// Get remediation hints for an error variant.
pub fn hints_for_error(error: &Error) -> ErrorHint {
    match error {
        Error::Config(msg) => config_hints(msg),
        Error::Fixture { message, .. } => fixture_hints(message),
        Error::Simulator(msg) => simulator_hints(msg),
        Error::Statistics(_) => ErrorHint {
            summary: "Statistical check could not be computed",
            hints: &["Re-run without --fast to collect the full trial set"],
        },
        Error::Io(err) => io_hints(err),
        Error::Json(err) => json_hints(err),
    }
}

fn config_hints(msg: &str) -> ErrorHint {
    if msg.contains("grader.json") || msg.contains("settings file") {
        return ErrorHint {
            summary: "Invalid grader settings file",
            hints: &[
                "Check that grader.json is valid JSON",
                "Unset GRADER_CONFIG_PATH to fall back to built-in defaults",
            ],
        };
    }
    if msg.contains("trace") {
        return ErrorHint {
            summary: "Randomized-policy trace missing",
            hints: &["The RAND suite replays a fixed trace from the inputs directory"],
        };
    }
    ErrorHint {
        summary: "Configuration error",
        hints: &["Run with --help to see path and trial overrides"],
    }
}

fn fixture_hints(msg: &str) -> ErrorHint {
    if msg.contains("unknown policy") {
        return ErrorHint {
            summary: "Unknown replacement policy in fixture name",
            hints: &["Policy prefix must be one of lru, rand, lru_prefer_clean"],
        };
    }
    ErrorHint {
        summary: "Expected-output file name does not match the fixture grammar",
        hints: &[
            "Expected files are named <policy>-<cache_size>-<line_size>-<associativity>-<trace>",
            "Remove stray files from the expected directory",
        ],
    }
}

fn simulator_hints(msg: &str) -> ErrorHint {
    if msg.contains("spawn") {
        return ErrorHint {
            summary: "Simulator binary could not be started",
            hints: &[
                "Build the simulator first (e.g. `make`)",
                "Point --simulator or GRADER_SIMULATOR at the executable",
            ],
        };
    }
    if msg.contains("UTF-8") {
        return ErrorHint {
            summary: "Simulator wrote non-text output",
            hints: &["Make sure only text is printed to stdout"],
        };
    }
    ErrorHint {
        summary: "Simulator invocation failed",
        hints: &[],
    }
}

fn io_hints(err: &std::io::Error) -> ErrorHint {
    match err.kind() {
        std::io::ErrorKind::NotFound => ErrorHint {
            summary: "File or directory not found",
            hints: &["Run the grader from the project root or pass --root"],
        },
        std::io::ErrorKind::PermissionDenied => ErrorHint {
            summary: "Permission denied",
            hints: &["Check file/directory permissions"],
        },
        _ => ErrorHint {
            summary: "I/O error",
            hints: &["Check file system and permissions"],
        },
    }
}

fn json_hints(err: &serde_json::Error) -> ErrorHint {
    if err.is_syntax() {
        return ErrorHint {
            summary: "Invalid JSON syntax",
            hints: &["Check for missing commas, brackets, or quotes"],
        };
    }
    ErrorHint {
        summary: "JSON error",
        hints: &[],
    }
}

/// Render an error with its summary and hints for stderr.
pub fn format_error_with_hints(error: &Error) -> String {
    let hint = hints_for_error(error);
    let mut output = String::new();

    let _ = writeln!(&mut output, "Error: {error}");

    if !error.to_string().contains(hint.summary) {
        output.push('\n');
        output.push_str(hint.summary);
        output.push('\n');
    }

    if !hint.hints.is_empty() {
        output.push_str("\nSuggestions:\n");
        for &h in hint.hints {
            let _ = writeln!(&mut output, "  - {h}");
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_policy_gets_policy_hint() {
        let error = Error::fixture("expected/mru-1-2-3-t", "unknown policy `mru`");
        let hint = hints_for_error(&error);
        assert!(hint.summary.contains("policy"));
        assert_eq!(hint.hints.len(), 1);
    }

    #[test]
    fn spawn_failure_suggests_building_simulator() {
        let error = Error::simulator("failed to spawn ./cachesim: No such file or directory");
        let rendered = format_error_with_hints(&error);
        assert!(rendered.starts_with("Error: Simulator error:"));
        assert!(rendered.contains("Suggestions:"));
        assert!(rendered.contains("GRADER_SIMULATOR"));
    }

    #[test]
    fn summary_is_not_repeated_when_already_in_message() {
        let error = Error::config("Configuration error");
        let rendered = format_error_with_hints(&error);
        assert_eq!(rendered.matches("Configuration error").count(), 2);
    }
}
