//! Error types for the provisioning pipeline and CLI.
//!
//! [`FailureKind`] is the closed set of terminal pipeline outcomes; each kind
//! carries a remediation hint for the operator. [`ProvisionError`] covers the
//! CLI-level failures that happen before or around a pipeline run, such as a
//! bad profile, a locked medium, or an unreadable configuration file.

use crate::medium::EnumerationError;
use bootforge::{ConfigError, ProfileError};
use camino::Utf8PathBuf;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;
use thiserror::Error;

/// Why a pipeline run ended in the `Failed` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The device profile failed validation before the run started.
    InvalidProfile,
    /// The artifact could not be acquired within the retry budget.
    AcquisitionFailed,
    /// The artifact failed its integrity check or could not be extracted.
    IntegrityFailed,
    /// The operator did not confirm the destructive write.
    UserAborted,
    /// The image could not be written to the medium.
    WriteFailed,
    /// The configuration surface could not be written.
    ConfigWriteFailed,
}

impl FailureKind {
    /// Operator-facing advice for recovering from this failure.
    #[must_use]
    pub const fn remediation(self) -> &'static str {
        match self {
            Self::InvalidProfile => {
                "fix the reported profile field and run again; `bootforge profiles` lists built-in profiles"
            }
            Self::AcquisitionFailed => {
                "check network connectivity and the image URL, then start a new run; partial downloads are resumed"
            }
            Self::IntegrityFailed => {
                "delete the cached artifact and download it again; do not reuse a corrupt image"
            }
            Self::UserAborted => "nothing was written; start a new run when the correct medium is inserted",
            Self::WriteFailed => {
                "re-seat the medium, check that you have write access to the device (try sudo), and start a new run"
            }
            Self::ConfigWriteFailed => {
                "the medium holds the base image but its configuration is incomplete; re-run provisioning from the start"
            }
        }
    }

    /// Stable identifier used in reports and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidProfile => "InvalidProfile",
            Self::AcquisitionFailed => "AcquisitionFailed",
            Self::IntegrityFailed => "IntegrityFailed",
            Self::UserAborted => "UserAborted",
            Self::WriteFailed => "WriteFailed",
            Self::ConfigWriteFailed => "ConfigWriteFailed",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A terminal pipeline failure with its classification and cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Failure classification.
    pub kind: FailureKind,
    /// What went wrong, in operator terms.
    pub detail: String,
}

impl Failure {
    /// Create a failure of the given kind.
    #[must_use]
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Remediation hint for the failure kind.
    #[must_use]
    pub const fn hint(&self) -> &'static str {
        self.kind.remediation()
    }
}

impl Serialize for Failure {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Failure", 3)?;
        state.serialize_field("kind", self.kind.as_str())?;
        state.serialize_field("detail", &self.detail)?;
        state.serialize_field("hint", self.hint())?;
        state.end()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// Errors raised by the CLI around a pipeline run.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// The device profile could not be loaded or is invalid.
    #[error(transparent)]
    Profile(#[from] ProfileError),

    /// The configuration file could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Removable media could not be listed.
    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    /// The requested medium is not among the enumerated devices.
    #[error("medium {device} not found; run `bootforge media` to list removable devices")]
    MediumNotFound {
        /// The requested device path.
        device: String,
    },

    /// Another run holds the lock for this medium.
    #[error("medium {device} is in use by another bootforge run (lock file {lock_path})")]
    MediumLocked {
        /// The contested device path.
        device: String,
        /// Path of the lock file.
        lock_path: Utf8PathBuf,
    },

    /// No cache directory could be determined.
    #[error("could not determine a cache directory; pass --cache-dir")]
    MissingCacheDir,

    /// The rendered configuration could not be written.
    #[error(transparent)]
    Overlay(#[from] crate::overlay::OverlayError),

    /// A path is not valid UTF-8.
    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path {
        /// Lossy rendering of the path.
        path: String,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`ProvisionError`].
pub type Result<T> = std::result::Result<T, ProvisionError>;
