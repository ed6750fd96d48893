//! Test runners for pullci.
//!
//! Provides runner implementations for executing a repository's tests:
//! - Local shell (every command launched at once in the staging directory)

pub mod shell;

pub use pullci_core::runner::{TestOutcome, TestPlan, TestResult, TestRunner};
pub use shell::LocalShellRunner;
