// src/store/lock.rs
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;

use crate::error::StoreError;

/// Advisory single-writer guard for a sent store.
///
/// Acquired by creating the lock file exclusively; released when dropped.
/// Schedulers are still expected to serialize runs, this only catches overlaps.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// `stale_after` of zero disables takeover of old lock files.
    pub fn acquire(path: &Path, stale_after: Duration) -> Result<Self, StoreError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| StoreError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        match Self::create(path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                if !is_stale(path, stale_after) {
                    return Err(StoreError::Locked {
                        path: path.to_path_buf(),
                    });
                }
                tracing::warn!(target: "store", path = %path.display(), "taking over stale run lock");
                let _ = fs::remove_file(path);
                Self::create(path).map_err(|e| match e.kind() {
                    ErrorKind::AlreadyExists => StoreError::Locked {
                        path: path.to_path_buf(),
                    },
                    _ => StoreError::Io {
                        path: path.to_path_buf(),
                        source: e,
                    },
                })
            }
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn create(path: &Path) -> std::io::Result<Self> {
        Self::create_with(path, |f| {
            writeln!(f, "pid={} started={}", std::process::id(), Utc::now().to_rfc3339())
        })
    }

    /// The file only counts as a lock once `stamp` succeeds; otherwise it is removed.
    fn create_with<F>(path: &Path, stamp: F) -> std::io::Result<Self>
    where
        F: FnOnce(&mut fs::File) -> std::io::Result<()>,
    {
        let mut f = OpenOptions::new().write(true).create_new(true).open(path)?;
        if let Err(e) = stamp(&mut f) {
            drop(f);
            let _ = fs::remove_file(path);
            return Err(e);
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(target: "store", path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}

fn is_stale(path: &Path, stale_after: Duration) -> bool {
    if stale_after.is_zero() {
        return false;
    }
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())
        .is_some_and(|age| age > stale_after)
}
