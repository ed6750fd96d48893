//! Preparation of the local staging directory.

use pullci_config::paths;
use pullci_core::repository::{StaticCopy, StaticKind};
use pullci_core::{Error, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Make `staging` ready for a checkout.
///
/// A directory left behind by an interrupted attempt at a different
/// location is removed first. Static files are then copied in.
pub fn prepare(staging: &Path, prior_stage: Option<&Path>, statics: &[StaticCopy]) -> Result<()> {
    if let Some(prior) = prior_stage {
        if prior != staging && prior.is_dir() {
            info!(path = %prior.display(), "Removing stale staging directory");
            fs::remove_dir_all(prior).map_err(|e| Error::staging(prior, e))?;
        }
    }

    fs::create_dir_all(staging).map_err(|e| Error::staging(staging, e))?;
    copy_statics(staging, statics)
}

/// Copy static files and folders into `staging`, skipping up-to-date files.
pub fn copy_statics(staging: &Path, statics: &[StaticCopy]) -> Result<()> {
    for entry in statics {
        let target = paths::under(staging, &entry.target);
        let copied = match entry.kind {
            StaticKind::File => copy_if_newer(&entry.source, &target).map(usize::from),
            StaticKind::Folder => copy_tree(&entry.source, &target),
        }
        .map_err(|e| Error::staging(&entry.source, e))?;

        debug!(
            source = %entry.source.display(),
            target = %target.display(),
            copied,
            "Copied static entry"
        );
    }
    Ok(())
}

fn copy_tree(source: &Path, target: &Path) -> io::Result<usize> {
    fs::create_dir_all(target)?;
    let mut copied = 0;
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let dest: PathBuf = target.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_tree(&entry.path(), &dest)?;
        } else if copy_if_newer(&entry.path(), &dest)? {
            copied += 1;
        }
    }
    Ok(copied)
}

/// Returns true when the file was copied.
fn copy_if_newer(source: &Path, target: &Path) -> io::Result<bool> {
    let source_modified = fs::metadata(source)?.modified()?;
    if let Ok(meta) = fs::metadata(target) {
        if meta.modified()? >= source_modified {
            return Ok(false);
        }
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, target)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    fn set_mtime(path: &Path, time: SystemTime) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_stale_stage_is_removed() {
        let root = tempdir().unwrap();
        let old = root.path().join("A");
        let new = root.path().join("B");
        fs::create_dir_all(old.join("src")).unwrap();
        fs::write(old.join("src/leftover"), "x").unwrap();

        prepare(&new, Some(&old), &[]).unwrap();

        assert!(!old.exists());
        assert!(new.is_dir());
    }

    #[test]
    fn test_same_stage_is_reused() {
        let root = tempdir().unwrap();
        let stage = root.path().join("stage");
        fs::create_dir_all(&stage).unwrap();
        fs::write(stage.join("keep"), "x").unwrap();

        prepare(&stage, Some(&stage), &[]).unwrap();

        assert!(stage.join("keep").exists());
    }

    #[test]
    fn test_static_file_copied_only_when_newer() {
        let root = tempdir().unwrap();
        let source = root.path().join("big.dat");
        let stage = root.path().join("stage");
        fs::write(&source, "v1").unwrap();

        let statics = vec![StaticCopy {
            kind: StaticKind::File,
            source: source.clone(),
            target: PathBuf::from("./tests/big.dat"),
        }];

        prepare(&stage, None, &statics).unwrap();
        let target = stage.join("tests/big.dat");
        assert_eq!(fs::read_to_string(&target).unwrap(), "v1");

        // Target newer than source: left alone.
        fs::write(&target, "local").unwrap();
        set_mtime(&source, SystemTime::now() - Duration::from_secs(3600));
        copy_statics(&stage, &statics).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "local");

        // Source newer than target: replaced.
        fs::write(&source, "v2").unwrap();
        set_mtime(&target, SystemTime::now() - Duration::from_secs(3600));
        copy_statics(&stage, &statics).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "v2");
    }

    #[test]
    fn test_static_folder_copied_recursively() {
        let root = tempdir().unwrap();
        let source = root.path().join("inputs");
        fs::create_dir_all(source.join("nested")).unwrap();
        fs::write(source.join("a.txt"), "a").unwrap();
        fs::write(source.join("nested/b.txt"), "b").unwrap();
        let stage = root.path().join("stage");

        let statics = vec![StaticCopy {
            kind: StaticKind::Folder,
            source,
            target: PathBuf::from("./tests/inputs"),
        }];
        prepare(&stage, None, &statics).unwrap();

        assert_eq!(fs::read_to_string(stage.join("tests/inputs/a.txt")).unwrap(), "a");
        assert_eq!(
            fs::read_to_string(stage.join("tests/inputs/nested/b.txt")).unwrap(),
            "b"
        );
    }

    #[test]
    fn test_missing_static_source_is_a_staging_error() {
        let root = tempdir().unwrap();
        let statics = vec![StaticCopy {
            kind: StaticKind::File,
            source: root.path().join("absent"),
            target: PathBuf::from("./absent"),
        }];

        let err = prepare(&root.path().join("stage"), None, &statics).unwrap_err();
        assert!(matches!(err, Error::Staging { .. }));
    }
}
