//! Whole-file JSON persistence with atomic replacement.
//!
//! The new content goes to a temporary sibling, is fsynced, then renamed
//! over the target; the directory is fsynced so the rename survives a crash.

use crate::{ArchiveError, ArchiveResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Load a JSON document, falling back to `T::default()` when the file is
/// missing. A file that is not valid JSON is moved aside first, so the next
/// save cannot overwrite it. Any other read failure is an error: starting
/// empty would let that save drop the history the file holds.
pub(crate) fn load_or_default<T>(path: &Path, what: &'static str) -> ArchiveResult<T>
where
    T: DeserializeOwned + Default,
{
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), what, "No file yet; starting empty");
            return Ok(T::default());
        }
        Err(source) => {
            return Err(ArchiveError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => Ok(value),
        Err(e) => {
            let backup = corrupt_backup_path(path);
            warn!(
                path = %path.display(),
                backup = %backup.display(),
                what,
                error = %e,
                "Unable to deserialize file; starting empty"
            );
            std::fs::rename(path, &backup).map_err(|source| ArchiveError::MoveAside {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(T::default())
        }
    }
}

/// Serialize `value` and atomically replace `path` with it.
pub(crate) fn save<T: Serialize>(path: &Path, value: &T, what: &'static str) -> ArchiveResult<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|source| ArchiveError::Serialize { what, source })?;
    write_atomic(path, &bytes).map_err(|source| ArchiveError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    fsync_dir(&dir)
}

fn fsync_dir(dir: &Path) -> std::io::Result<()> {
    OpenOptions::new().read(true).open(dir)?.sync_all()
}

fn corrupt_backup_path(path: &Path) -> PathBuf {
    let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S");
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupt-{}", stamp));
    path.with_file_name(name)
}
