//! Block-level image writing.
//!
//! Writes always start at offset zero of the target and are followed by a
//! full sync. Failures are classified so the orchestrator can decide whether
//! offering a different medium makes sense.

use crate::medium::{MediumHandle, human_size};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};

/// Size of each write to the device.
pub const BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Default distance between progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 64 * 1024 * 1024;

/// Bytes written so far out of the image total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WriteProgress {
    /// Bytes written and flushed to the device.
    pub written: u64,
    /// Total image size in bytes.
    pub total: u64,
}

impl WriteProgress {
    /// Completion in whole percent.
    #[must_use]
    pub fn percent(&self) -> u64 {
        self.written
            .saturating_mul(100)
            .checked_div(self.total)
            .unwrap_or(100)
    }
}

/// Classified write failure.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The device node does not exist (medium removed).
    #[error("target {path} not found; was the medium removed?")]
    TargetNotFound {
        /// The device path.
        path: Utf8PathBuf,
    },

    /// The process may not open the device for writing.
    #[error("permission denied writing {path}; re-run with sufficient privileges")]
    PermissionDenied {
        /// The device path.
        path: Utf8PathBuf,
    },

    /// Any other I/O failure.
    #[error("I/O error writing {path}: {source}")]
    Io {
        /// The device path.
        path: Utf8PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

impl WriteError {
    /// Whether trying a different medium could help.
    #[must_use]
    pub const fn is_retargetable(&self) -> bool {
        !matches!(self, Self::PermissionDenied { .. })
    }

    fn classify(path: &Utf8Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => Self::TargetNotFound {
                path: path.to_owned(),
            },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_owned(),
            },
            _ => Self::Io {
                path: path.to_owned(),
                source,
            },
        }
    }
}

/// Writes an image onto a medium.
pub trait BlockWriter {
    /// Copy `image` onto `medium` from offset zero.
    ///
    /// `on_progress` is called at bounded byte intervals and once on
    /// completion.
    ///
    /// # Errors
    ///
    /// Returns a classified [`WriteError`].
    fn write(
        &self,
        image: &Utf8Path,
        medium: &MediumHandle,
        on_progress: &mut dyn FnMut(WriteProgress),
    ) -> Result<(), WriteError>;
}

/// Streams an image to a raw block device.
#[derive(Debug, Clone, Copy)]
pub struct RawDeviceWriter {
    progress_interval: u64,
}

impl Default for RawDeviceWriter {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl RawDeviceWriter {
    /// Create a writer reporting progress every `progress_interval` bytes.
    #[must_use]
    pub const fn with_progress_interval(progress_interval: u64) -> Self {
        Self { progress_interval }
    }
}

impl BlockWriter for RawDeviceWriter {
    fn write(
        &self,
        image: &Utf8Path,
        medium: &MediumHandle,
        on_progress: &mut dyn FnMut(WriteProgress),
    ) -> Result<(), WriteError> {
        let target = medium.path.as_path();
        let mut source = File::open(image).map_err(|source| WriteError::Io {
            path: image.to_owned(),
            source,
        })?;
        let total = source
            .metadata()
            .map_err(|source| WriteError::Io {
                path: image.to_owned(),
                source,
            })?
            .len();
        if medium.size_bytes > 0 && total > medium.size_bytes {
            return Err(WriteError::Io {
                path: target.to_owned(),
                source: io::Error::other(format!(
                    "image ({}) does not fit on the medium ({})",
                    human_size(total),
                    human_size(medium.size_bytes)
                )),
            });
        }

        // Never create or truncate: the target must already be a device node.
        let mut device = OpenOptions::new()
            .write(true)
            .open(target)
            .map_err(|e| WriteError::classify(target, e))?;
        log::info!("writing {image} ({}) to {target}", human_size(total));

        let mut buffer = vec![0_u8; BLOCK_SIZE];
        let mut written = 0_u64;
        let mut next_report = self.progress_interval.max(1);
        loop {
            let read = match source.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(WriteError::Io {
                        path: image.to_owned(),
                        source,
                    });
                }
            };
            device
                .write_all(buffer.get(..read).unwrap_or_default())
                .map_err(|e| WriteError::classify(target, e))?;
            written += read as u64;
            if written >= next_report && written < total {
                on_progress(WriteProgress { written, total });
                next_report = written + self.progress_interval.max(1);
            }
        }
        device
            .flush()
            .and_then(|()| device.sync_all())
            .map_err(|e| WriteError::classify(target, e))?;
        on_progress(WriteProgress { written, total });
        log::info!("wrote {written} bytes to {target}");
        Ok(())
    }
}
