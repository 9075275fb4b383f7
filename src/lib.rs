//! Grader - black-box verification harness for a cache simulator
//!
//! The simulator under test is an external program. This library drives it
//! two ways:
//! - Exact differential testing of the deterministic replacement policies
//!   (`lru`, `lru_prefer_clean`) against golden expected-output files whose
//!   names carry the simulator parameters.
//! - Statistical validation of the `RAND` policy: repeated trials, a mean
//!   check against a reference hit ratio, and a Shapiro–Wilk normality test.
//!
//! [`harness::run`] ties the pieces together and returns a [`harness::RunReport`].

#![forbid(unsafe_code)]
#![cfg_attr(
    test,
    allow(
        clippy::float_cmp,
        clippy::cast_precision_loss,
        clippy::uninlined_format_args
    )
)]
#![allow(
    clippy::must_use_candidate,
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod error_hints;
pub mod fixtures;
pub mod harness;
pub mod report;
pub mod simulator;
pub mod stats;
pub mod trials;
pub mod validator;

pub use error::{Error, Result};
