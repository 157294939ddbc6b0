//! Location of the configuration surface on a written medium.
//!
//! The configuration surface is the mounted boot partition that the overlay
//! writes into and the verification engine reads back.

use crate::medium::MediumHandle;
use camino::{Utf8Path, Utf8PathBuf};

/// Errors locating the configuration surface.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// The expected mount point is missing or not a directory.
    #[error("boot partition for {device} is not mounted at {mount}; mount it and pass --boot-mount")]
    NotMounted {
        /// The medium being configured.
        device: Utf8PathBuf,
        /// Where the partition was expected.
        mount: Utf8PathBuf,
    },
}

/// Resolves the mounted configuration surface for a medium.
#[cfg_attr(test, mockall::automock)]
pub trait SurfaceLocator {
    /// Return the root directory of the configuration surface.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] when the surface is not available.
    fn locate(&self, medium: &MediumHandle) -> Result<Utf8PathBuf, SurfaceError>;
}

/// A surface mounted at a fixed, operator-supplied path.
#[derive(Debug, Clone)]
pub struct FixedSurface {
    root: Utf8PathBuf,
}

impl FixedSurface {
    /// Use `root` as the configuration surface for every medium.
    #[must_use]
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The configured root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

impl SurfaceLocator for FixedSurface {
    fn locate(&self, medium: &MediumHandle) -> Result<Utf8PathBuf, SurfaceError> {
        if self.root.is_dir() {
            log::debug!("configuration surface for {} is {}", medium.path, self.root);
            Ok(self.root.clone())
        } else {
            Err(SurfaceError::NotMounted {
                device: medium.path.clone(),
                mount: self.root.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn medium() -> MediumHandle {
        MediumHandle {
            path: Utf8PathBuf::from("/dev/sdb"),
            size_bytes: 1,
            model: String::new(),
            removable: true,
            transport: None,
        }
    }

    #[test]
    fn existing_directory_is_the_surface() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("UTF-8 path");

        let located = FixedSurface::new(root.clone())
            .locate(&medium())
            .expect("mounted");
        assert_eq!(located, root);
    }

    #[test]
    fn missing_mount_names_device_and_path() {
        let err = FixedSurface::new("/nonexistent/boot")
            .locate(&medium())
            .expect_err("not mounted");
        let msg = err.to_string();
        assert!(msg.contains("/dev/sdb"));
        assert!(msg.contains("/nonexistent/boot"));
    }
}
