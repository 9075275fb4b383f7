//! CLI argument parsing using Clap.

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::config::Overrides;

/// Grade a cache simulator against golden outputs and randomized-policy statistics
#[derive(Parser, Debug)]
#[command(name = "cachesim-grader")]
#[command(about, long_about = None, disable_version_flag = true)]
#[command(after_help = "Examples:
  cachesim-grader                      Full run from the current directory
  cachesim-grader --fast               50 randomized trials (not authoritative)
  cachesim-grader --root hw3 --jobs 4  Grade hw3/ with four trial workers
")]
pub struct Cli {
    /// Print version information
    #[arg(long)]
    pub version: bool,

    /// Divide the randomized trial count by 10 (repeatable)
    #[arg(long, action = ArgAction::Count)]
    pub fast: u8,

    /// Directory holding inputs/, expected/ and the simulator
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Simulator executable (relative to the root)
    #[arg(long, value_name = "PATH")]
    pub simulator: Option<PathBuf>,

    /// Where to write the timestamped results file
    #[arg(long, value_name = "DIR")]
    pub results_dir: Option<PathBuf>,

    /// Worker threads for randomized trials
    #[arg(long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Debug logging on stderr when RUST_LOG is unset
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    /// Configuration overrides carried by the flags.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            root: self.root.clone(),
            simulator: self.simulator.clone(),
            results_dir: self.results_dir.clone(),
            jobs: self.jobs,
            fast: self.fast,
        }
    }
}
