//! Path normalization for configured locations.

use std::path::{Path, PathBuf};

/// Expand a leading `~` and make the path absolute against the current
/// directory. The path does not need to exist.
pub fn resolve(raw: &str) -> std::io::Result<PathBuf> {
    let expanded = expand_home(raw);
    std::path::absolute(expanded)
}

fn expand_home(raw: &str) -> PathBuf {
    let home = dirs::home_dir();
    match (raw.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(raw),
    }
}

/// Join a configured target like `./tests/data` onto a staging directory.
pub fn under(base: &Path, relative: &Path) -> PathBuf {
    let trimmed = relative.strip_prefix(".").unwrap_or(relative);
    base.join(trimmed)
}
