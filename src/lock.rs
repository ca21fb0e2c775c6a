//! Advisory lock file for a store.
//!
//! The lock is only honoured by vaultkeep itself: it is a marker file created
//! with `create_new`, so a second process fails instead of interleaving its
//! read-modify-write cycle with ours.

use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, VaultError};

/// Holds the lock file; removes it when dropped.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    /// Creates the lock file, failing with [`VaultError::Locked`] if it
    /// already exists.
    pub fn acquire(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                tracing::debug!(path = %path.display(), "lock acquired");
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(VaultError::Locked(path)),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "lock released"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "failed to remove lock file"),
        }
    }
}

/// Deletes a stale lock file left behind by a crashed process.
pub fn remove_stale_lock(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Err(VaultError::NoLock(path.to_path_buf())),
        Err(e) => Err(e.into()),
    }
}
