//! Exclusive ownership of a destination medium.
//!
//! Two runs must never write the same device. Each run takes an advisory
//! `fs2` lock on `<cache>/locks/<device>.lock` before the pipeline starts and
//! holds it until the run is reported.

use crate::error::{ProvisionError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};

/// Directory under the cache root holding lock files.
pub const LOCK_DIR: &str = "locks";

/// A held lock on one medium; released on drop.
#[derive(Debug)]
pub struct MediumLock {
    file: File,
    path: Utf8PathBuf,
}

impl MediumLock {
    /// Take the lock for `device` without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::MediumLocked`] when another run holds the
    /// lock, or [`ProvisionError::Io`] when the lock file cannot be created.
    pub fn acquire(cache_dir: &Utf8Path, device: &Utf8Path) -> Result<Self> {
        let dir = cache_dir.join(LOCK_DIR);
        fs::create_dir_all(&dir)?;
        let path = dir.join(lock_file_name(device));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(ProvisionError::MediumLocked {
                device: device.to_string(),
                lock_path: path,
            });
        }
        log::debug!("locked {device} via {path}");
        Ok(Self { file, path })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl Drop for MediumLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            log::warn!("failed to release {}: {err}", self.path);
        }
    }
}

/// Lock file name for a device path: `/dev/sdb` becomes `dev_sdb.lock`.
#[must_use]
pub fn lock_file_name(device: &Utf8Path) -> String {
    let stem: String = device
        .as_str()
        .trim_start_matches('/')
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{stem}.lock")
}
