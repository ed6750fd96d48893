//! Core domain types and traits for the pullci pull-request tester.
//!
//! This crate contains:
//! - Repository descriptors and the installed-repository registry
//! - The processing ledger record types
//! - Test runner trait and result types
//! - Source-control and notifier collaborator traits
//! - Notification events and test summaries

pub mod error;
pub mod ledger;
pub mod notify;
pub mod repository;
pub mod runner;
pub mod source;
pub mod summary;

pub use error::{Error, Result};
pub use ledger::{ArchiveLedger, PullRequestRecord};
pub use repository::{RepoKey, Repository, RepositoryRegistry};
