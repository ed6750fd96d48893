//! Persistence for pullci.
//!
//! Two JSON documents are kept on disk:
//! - the archive ledger of processed pull requests ([`ArchiveStore`])
//! - the server database of installed repositories and cron status
//!   ([`ServerDbStore`])
//!
//! Both are rewritten whole through an atomic replace, so a failed write
//! leaves the previous file intact. There is no file locking; a single
//! cron invocation is assumed to run at a time.

mod atomic;
pub mod error;
pub mod server_db;
pub mod store;

pub use error::{ArchiveError, ArchiveResult};
pub use server_db::{CronStatus, ServerDb, ServerDbStore};
pub use store::ArchiveStore;
