//! cachesim-grader - grade a cache simulator from the command line

#![forbid(unsafe_code)]

use std::io;

use anyhow::Result;
use clap::Parser;
use grader::cli::Cli;
use grader::config::GraderConfig;
use grader::harness;
use grader::simulator::SubprocessSimulator;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(err) = main_impl() {
        print_error_with_hints(&err);
        std::process::exit(1);
    }
}

fn main_impl() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        print_version();
        return Ok(());
    }

    init_tracing(cli.verbose);

    let config = GraderConfig::load(cli.overrides())?;
    let simulator = SubprocessSimulator::new(&config.simulator).with_cwd(&config.root);
    let report = harness::run(&config, &simulator)?;

    let total = report.total();
    tracing::debug!(
        score = total.score,
        max_score = total.max_score,
        "grading finished"
    );
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose && std::env::var_os("RUST_LOG").is_none() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn print_error_with_hints(err: &anyhow::Error) {
    for cause in err.chain() {
        if let Some(grader_error) = cause.downcast_ref::<grader::Error>() {
            let message = grader::error_hints::format_error_with_hints(grader_error);
            eprint!("{message}");
            return;
        }
    }

    eprintln!("{err}");
}

fn print_version() {
    println!(
        "cachesim-grader {} ({} {}, rustc {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        option_env!("VERGEN_BUILD_DATE").unwrap_or(""),
        option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown"),
    );
}
