//! Fail-closed integrity checks for fetched artifacts.
//!
//! Checks run cheapest first: existence, size bounds, content sniffing, and
//! finally the declared checksum. The first failing check decides the
//! reason; anything not positively recognised as an image is rejected.

use super::format::{ArtifactFormat, looks_like_text, read_header};
use super::reference::ArtifactRef;
use super::sha256_digest::Sha256Digest;
use camino::Utf8Path;
use serde::Serialize;
use std::fmt;

/// Why an artifact was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
pub enum IntegrityReason {
    /// No file at the expected path.
    Missing,
    /// The file is zero bytes long.
    Empty,
    /// The file is smaller than the declared minimum.
    TooSmall {
        /// Declared minimum in bytes.
        min: u64,
    },
    /// The file is larger than the declared maximum.
    TooLarge {
        /// Declared maximum in bytes.
        max: u64,
    },
    /// The content is text (typically an HTML error page) or unrecognised.
    NotAnImage,
    /// The detected container differs from the declared one.
    FormatMismatch {
        /// Declared format.
        expected: ArtifactFormat,
        /// Detected format.
        found: ArtifactFormat,
    },
    /// The SHA-256 of the file differs from the declared digest.
    ChecksumMismatch {
        /// Declared digest.
        expected: Sha256Digest,
        /// Computed digest.
        actual: Sha256Digest,
    },
    /// The file exists but could not be read.
    Unreadable {
        /// Underlying I/O failure.
        detail: String,
    },
}

impl fmt::Display for IntegrityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("artifact file is missing"),
            Self::Empty => f.write_str("artifact file is empty"),
            Self::TooSmall { min } => write!(f, "artifact is smaller than the minimum of {min} bytes"),
            Self::TooLarge { max } => write!(f, "artifact is larger than the maximum of {max} bytes"),
            Self::NotAnImage => {
                f.write_str("artifact is not a disk image (received text or an unknown format)")
            }
            Self::FormatMismatch { expected, found } => {
                write!(f, "artifact format is {found}, expected {expected}")
            }
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "checksum mismatch: expected {expected}, computed {actual}")
            }
            Self::Unreadable { detail } => write!(f, "artifact could not be read: {detail}"),
        }
    }
}

/// Outcome of an integrity check.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Whether every check passed.
    pub ok: bool,
    /// Size of the file in bytes (zero when missing).
    pub measured_size: u64,
    /// Detected container format.
    pub format: Option<ArtifactFormat>,
    /// First failing check, when `ok` is false.
    pub reason: Option<IntegrityReason>,
}

impl IntegrityReport {
    fn pass(measured_size: u64, format: ArtifactFormat) -> Self {
        Self {
            ok: true,
            measured_size,
            format: Some(format),
            reason: None,
        }
    }

    fn fail(measured_size: u64, format: Option<ArtifactFormat>, reason: IntegrityReason) -> Self {
        Self {
            ok: false,
            measured_size,
            format,
            reason: Some(reason),
        }
    }
}

/// Validate the file at `local_path` against the expectations in `artifact`.
///
/// # Examples
///
/// ```
/// use bootforge::config::IntegrityConfig;
/// use bootforge_provisioner::artifact::integrity::{IntegrityReason, check};
/// use bootforge_provisioner::artifact::{ArtifactRef, ArtifactSource};
///
/// let artifact = ArtifactRef::new(ArtifactSource::parse("absent.img"), &IntegrityConfig::default());
/// let report = check(&artifact, camino::Utf8Path::new("/nonexistent/absent.img"));
/// assert!(!report.ok);
/// assert_eq!(report.reason, Some(IntegrityReason::Missing));
/// ```
#[must_use]
pub fn check(artifact: &ArtifactRef, local_path: &Utf8Path) -> IntegrityReport {
    let metadata = match std::fs::metadata(local_path) {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return IntegrityReport::fail(0, None, IntegrityReason::Missing),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return IntegrityReport::fail(0, None, IntegrityReason::Missing);
        }
        Err(e) => {
            return IntegrityReport::fail(
                0,
                None,
                IntegrityReason::Unreadable {
                    detail: e.to_string(),
                },
            );
        }
    };
    let size = metadata.len();
    if let Some(reason) = size_violation(artifact, size) {
        return IntegrityReport::fail(size, None, reason);
    }

    let header = match std::fs::File::open(local_path).and_then(|mut file| read_header(&mut file)) {
        Ok(header) => header,
        Err(e) => {
            return IntegrityReport::fail(
                size,
                None,
                IntegrityReason::Unreadable {
                    detail: e.to_string(),
                },
            );
        }
    };
    let Some(format) = ArtifactFormat::sniff(&header) else {
        if looks_like_text(&header) {
            log::warn!("{local_path} looks like a text document, not a disk image");
        }
        return IntegrityReport::fail(size, None, IntegrityReason::NotAnImage);
    };
    if let Some(expected) = artifact.expected_format() {
        if expected != format {
            return IntegrityReport::fail(
                size,
                Some(format),
                IntegrityReason::FormatMismatch {
                    expected,
                    found: format,
                },
            );
        }
    }
    if let Some(expected) = artifact.expected_sha256() {
        match Sha256Digest::of_file(local_path) {
            Ok(actual) if &actual == expected => {}
            Ok(actual) => {
                return IntegrityReport::fail(
                    size,
                    Some(format),
                    IntegrityReason::ChecksumMismatch {
                        expected: expected.clone(),
                        actual,
                    },
                );
            }
            Err(e) => {
                return IntegrityReport::fail(
                    size,
                    Some(format),
                    IntegrityReason::Unreadable {
                        detail: e.to_string(),
                    },
                );
            }
        }
    }
    log::debug!("{local_path}: {size} bytes, format {format}");
    IntegrityReport::pass(size, format)
}

const fn size_violation(artifact: &ArtifactRef, size: u64) -> Option<IntegrityReason> {
    if size == 0 {
        Some(IntegrityReason::Empty)
    } else if size < artifact.min_size {
        Some(IntegrityReason::TooSmall {
            min: artifact.min_size,
        })
    } else if size > artifact.max_size {
        Some(IntegrityReason::TooLarge {
            max: artifact.max_size,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::reference::{ArtifactSource, Signature};
    use bootforge::config::IntegrityConfig;
    use camino::Utf8PathBuf;
    use rstest::{fixture, rstest};

    struct Scratch {
        _dir: tempfile::TempDir,
        root: Utf8PathBuf,
    }

    impl Scratch {
        fn file(&self, name: &str, content: &[u8]) -> Utf8PathBuf {
            let path = self.root.join(name);
            std::fs::write(&path, content).expect("write scratch file");
            path
        }
    }

    #[fixture]
    fn scratch() -> Scratch {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("UTF-8 path");
        Scratch { _dir: dir, root }
    }

    fn artifact(min_size: u64) -> ArtifactRef {
        ArtifactRef::new(ArtifactSource::parse("os.img"), &IntegrityConfig::default())
            .with_min_size(min_size)
    }

    fn raw_image(len: usize) -> Vec<u8> {
        let mut image = vec![0_u8; len];
        image[510] = 0x55;
        image[511] = 0xAA;
        image
    }

    #[rstest]
    fn tiny_artifact_is_too_small(scratch: Scratch) {
        let path = scratch.file("os.img", &raw_image(1024));
        let report = check(&artifact(50_000_000), &path);

        assert!(!report.ok);
        assert_eq!(report.measured_size, 1024);
        assert_eq!(
            report.reason,
            Some(IntegrityReason::TooSmall { min: 50_000_000 })
        );
    }

    #[rstest]
    fn empty_file_is_reported_as_empty(scratch: Scratch) {
        let path = scratch.file("os.img", b"");
        let report = check(&artifact(1), &path);
        assert_eq!(report.reason, Some(IntegrityReason::Empty));
    }

    #[rstest]
    fn oversized_file_is_rejected(scratch: Scratch) {
        let path = scratch.file("os.img", &raw_image(2048));
        let mut reference = artifact(1);
        reference.max_size = 1024;
        let report = check(&reference, &path);
        assert_eq!(report.reason, Some(IntegrityReason::TooLarge { max: 1024 }));
    }

    #[rstest]
    fn html_error_page_is_not_an_image(scratch: Scratch) {
        let page = "<!DOCTYPE html><html><body>Not Found</body></html>".repeat(20);
        let path = scratch.file("os.img.xz", page.as_bytes());
        let report = check(&artifact(16), &path);
        assert_eq!(report.reason, Some(IntegrityReason::NotAnImage));
    }

    #[rstest]
    fn declared_format_must_match(scratch: Scratch) {
        let path = scratch.file("os.img", &raw_image(1024));
        let reference = artifact(16).with_signature(Signature {
            format: Some(ArtifactFormat::Xz),
            sha256: None,
        });
        let report = check(&reference, &path);
        assert_eq!(
            report.reason,
            Some(IntegrityReason::FormatMismatch {
                expected: ArtifactFormat::Xz,
                found: ArtifactFormat::RawImage,
            })
        );
    }

    #[rstest]
    fn declared_checksum_must_match(scratch: Scratch) {
        let path = scratch.file("os.img", &raw_image(1024));
        let reference = artifact(16).with_signature(Signature {
            format: None,
            sha256: Some(Sha256Digest::of_bytes(b"something else")),
        });
        let report = check(&reference, &path);
        assert!(matches!(
            report.reason,
            Some(IntegrityReason::ChecksumMismatch { .. })
        ));
    }

    #[rstest]
    fn matching_artifact_passes(scratch: Scratch) {
        let image = raw_image(4096);
        let path = scratch.file("os.img", &image);
        let reference = artifact(1024).with_signature(Signature {
            format: Some(ArtifactFormat::RawImage),
            sha256: Some(Sha256Digest::of_bytes(&image)),
        });
        let report = check(&reference, &path);

        assert!(report.ok, "unexpected failure: {:?}", report.reason);
        assert_eq!(report.measured_size, 4096);
        assert_eq!(report.format, Some(ArtifactFormat::RawImage));
    }

    #[rstest]
    fn missing_file_is_reported(scratch: Scratch) {
        let report = check(&artifact(1), &scratch.root.join("absent.img"));
        assert_eq!(report.reason, Some(IntegrityReason::Missing));
    }
}
