//! Base image artifacts: where they come from, how they are fetched, and how
//! they are checked before anything touches a medium.
//!
//! # Sub-modules
//!
//! - [`reference`] - Artifact locator and expectations (`ArtifactRef`).
//! - [`format`] - Container format detection by magic number.
//! - [`sha256_digest`] - SHA-256 digest newtype (`Sha256Digest`).
//! - [`download`] - Downloader trait and resumable HTTP implementation.
//! - [`extraction`] - Decompression of the single disk image.
//! - [`integrity`] - Fail-closed integrity checks.

pub mod download;
pub mod extraction;
pub mod format;
pub mod integrity;
pub mod reference;
pub mod sha256_digest;

pub use format::ArtifactFormat;
pub use reference::{ArtifactRef, ArtifactSource, Signature};
pub use sha256_digest::Sha256Digest;
