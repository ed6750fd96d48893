//! Scheduler error types.

use pullci_archive::ArchiveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The ledger or server database could not be written. Ends the cycle.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// A failure confined to one pull request or repository.
    #[error(transparent)]
    Processing(#[from] pullci_core::Error),
}

impl SchedulerError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SchedulerError::Archive(_))
    }
}

pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
