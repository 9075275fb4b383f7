//! Simulator invocation.
//!
//! The cache simulator under test is an opaque subprocess: arguments go on
//! the command line, the trace goes in on stdin, and results come back as
//! stdout lines prefixed with [`OUTPUT_MARKER`]. Everything else the
//! simulator prints on stdout (debug chatter, prompts) is discarded here so
//! that comparisons only ever see marker lines, in emission order. Its
//! stderr passes straight through to ours.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use crate::error::{Error, Result};

/// Prefix the simulator uses for structured result lines.
pub const OUTPUT_MARKER: &str = "OUTPUT";

/// Something that can run the simulator once.
///
/// Implementations must be callable from several trial workers at once.
pub trait Simulator: Send + Sync {
    /// Run the simulator with `args`, feeding `trace` on stdin, and return
    /// the marker lines it printed.
    fn invoke(&self, args: &[String], trace: &[u8]) -> Result<Vec<String>>;
}

/// Runs a simulator executable as a child process.
#[derive(Debug, Clone)]
pub struct SubprocessSimulator {
    program: PathBuf,
    cwd: Option<PathBuf>,
}

impl SubprocessSimulator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            cwd: None,
        }
    }

    /// Run the child from `cwd` instead of the grader's working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

impl Simulator for SubprocessSimulator {
    fn invoke(&self, args: &[String], trace: &[u8]) -> Result<Vec<String>> {
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let program = self.program.display();
        let mut child = command
            .spawn()
            .map_err(|err| Error::simulator(format!("failed to spawn {program}: {err}")))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::simulator("simulator stdin is not piped"))?;

        // Feed stdin from a helper thread so a simulator that writes a lot
        // before draining its input cannot deadlock against us.
        let (output, written) = thread::scope(|scope| {
            let writer = scope.spawn(move || {
                let result = stdin.write_all(trace);
                drop(stdin);
                result
            });
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("stdin writer panicked")));
            (output, written)
        });
        let output = output
            .map_err(|err| Error::simulator(format!("failed to wait for simulator: {err}")))?;
        if let Err(err) = written {
            // A simulator that exits without reading all of stdin closes the
            // pipe under us; that is its business, not a harness failure.
            if err.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(Error::simulator(format!(
                    "failed to write trace to simulator: {err}"
                )));
            }
        }

        tracing::debug!(
            program = %program,
            args = ?args,
            status = %output.status,
            stdout_bytes = output.stdout.len(),
            "simulator finished"
        );

        let stdout = String::from_utf8(output.stdout)
            .map_err(|err| Error::simulator(format!("simulator stdout is not UTF-8: {err}")))?;
        Ok(filter_output_lines(&stdout))
    }
}

/// Keep only the lines that start with [`OUTPUT_MARKER`], preserving order.
///
/// Lines are split on `\n` only; a trailing `\r` stays part of the line.
pub fn filter_output_lines(stdout: &str) -> Vec<String> {
    stdout
        .split('\n')
        .filter(|line| line.starts_with(OUTPUT_MARKER))
        .map(str::to_string)
        .collect()
}
