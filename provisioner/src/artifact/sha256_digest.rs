//! SHA-256 digest newtype for artifact checksums.
//!
//! Accepts the 64-character hexadecimal form published next to OS images.
//! Upper-case input is normalised to lower case so digests copied from
//! vendor pages compare equal to computed ones.

use camino::Utf8Path;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Expected length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

const HASH_BUFFER_BYTES: usize = 1024 * 1024;

/// A declared digest was not a well-formed SHA-256 hex string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid SHA-256 digest: {reason}")]
pub struct DigestError {
    /// Description of the validation failure.
    pub reason: String,
}

/// A validated, lower-case, hex-encoded SHA-256 digest.
///
/// # Examples
///
/// ```
/// use bootforge_provisioner::artifact::Sha256Digest;
///
/// let digest: Sha256Digest = "AB".repeat(32).parse().unwrap();
/// assert_eq!(digest.as_str(), "ab".repeat(32));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hash the contents of a file.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while reading the file.
    pub fn of_file(path: &Utf8Path) -> std::io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0_u8; HASH_BUFFER_BYTES];
        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(buffer.get(..read).unwrap_or_default());
        }
        Ok(Self::from_bytes(&hasher.finalize()))
    }

    /// Hash an in-memory buffer.
    #[must_use]
    pub fn of_bytes(data: &[u8]) -> Self {
        Self::from_bytes(&Sha256::digest(data))
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        let hex: String = bytes.iter().map(|byte| format!("{byte:02x}")).collect();
        debug_assert_eq!(hex.len(), DIGEST_HEX_LEN);
        Self(hex)
    }
}

impl FromStr for Sha256Digest {
    type Err = DigestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.len() != DIGEST_HEX_LEN {
            return Err(DigestError {
                reason: format!(
                    "expected {DIGEST_HEX_LEN} hex characters, got {}",
                    value.len()
                ),
            });
        }
        if let Some(bad) = value.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(DigestError {
                reason: format!("non-hex character '{bad}'"),
            });
        }
        Ok(Self(value.to_ascii_lowercase()))
    }
}

impl AsRef<str> for Sha256Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
