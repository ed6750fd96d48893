//! Error types for pullci.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("staging failed at {}: {source}", path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn test {index} (`{command}`): {source}")]
    Spawn {
        index: usize,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("test runner failed: {0}")]
    Runner(String),

    #[error("source control error: {0}")]
    SourceControl(String),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn staging(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Staging {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
