//! Common test infrastructure for the grader integration tests.
//!
//! - `TestHarness`: temp project tree with inputs/, expected/ and a fake simulator
//! - `ShellSimulator`: runs a fake simulator script through `/bin/sh`

pub mod harness;

#[allow(unused_imports)]
pub use harness::{
    FAKE_SIMULATOR, ShellSimulator, TestHarness, exec_lock, populate_reference_tree,
};
