//! Cross-process exclusion for file-backed stores.
//!
//! A store at `data.db` is guarded by an advisory lock on the sidecar file
//! `data.db.lock`. The log file itself cannot carry the lock because a
//! shrink replaces it with a new inode.

use crate::error::{EngineError, EngineResult};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Holds the exclusive lock of one store for as long as it lives.
#[derive(Debug)]
pub(crate) struct StoreLock {
    _file: File,
}

impl StoreLock {
    /// Acquires the lock for the store at `store_path` without blocking.
    pub(crate) fn acquire(store_path: &Path) -> EngineResult<Self> {
        let path = lock_path(store_path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(EngineError::DatabaseLocked {
                path: store_path.display().to_string(),
            });
        }

        Ok(Self { _file: file })
    }
}

fn lock_path(store_path: &Path) -> PathBuf {
    let mut name = store_path
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".lock");
    store_path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sidecar_name() {
        assert_eq!(
            lock_path(Path::new("/tmp/data.db")),
            PathBuf::from("/tmp/data.db.lock")
        );
    }

    #[test]
    fn second_acquire_fails_until_released() {
        let dir = tempdir().unwrap();
        let store = dir.path().join("data.db");

        let first = StoreLock::acquire(&store).unwrap();
        assert!(lock_path(&store).exists());
        assert!(matches!(
            StoreLock::acquire(&store),
            Err(EngineError::DatabaseLocked { .. })
        ));

        drop(first);
        assert!(StoreLock::acquire(&store).is_ok());
    }
}
