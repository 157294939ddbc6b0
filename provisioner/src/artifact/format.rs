//! Container format detection by magic number.

use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Bytes read from the start of a file for format sniffing.
pub const SNIFF_LEN: usize = 512;

const XZ_MAGIC: &[u8] = &[0xFD, b'7', b'z', b'X', b'Z', 0x00];
const GZIP_MAGIC: &[u8] = &[0x1F, 0x8B];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xB5, 0x2F, 0xFD];
const ZIP_MAGIC: &[u8] = &[b'P', b'K', 0x03, 0x04];
const MBR_SIGNATURE_OFFSET: usize = 510;
const MBR_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// Container format of a base image artifact.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactFormat {
    /// xz-compressed image (`.img.xz`).
    Xz,
    /// gzip-compressed image (`.img.gz`).
    Gzip,
    /// Zstandard-compressed image (`.img.zst`).
    Zstd,
    /// Zip archive holding one `.img` entry.
    Zip,
    /// Uncompressed disk image with an MBR boot signature.
    RawImage,
}

impl ArtifactFormat {
    /// Identify a format from the first bytes of a file.
    ///
    /// Returns `None` when no known signature matches.
    ///
    /// # Examples
    ///
    /// ```
    /// use bootforge_provisioner::artifact::ArtifactFormat;
    ///
    /// assert_eq!(ArtifactFormat::sniff(&[0x1F, 0x8B, 0x08]), Some(ArtifactFormat::Gzip));
    /// assert_eq!(ArtifactFormat::sniff(b"<!DOCTYPE html>"), None);
    /// ```
    #[must_use]
    pub fn sniff(header: &[u8]) -> Option<Self> {
        let compressed = [
            (XZ_MAGIC, Self::Xz),
            (GZIP_MAGIC, Self::Gzip),
            (ZSTD_MAGIC, Self::Zstd),
            (ZIP_MAGIC, Self::Zip),
        ];
        if let Some((_, format)) = compressed
            .iter()
            .find(|(magic, _)| header.starts_with(magic))
        {
            return Some(*format);
        }
        let signature = header.get(MBR_SIGNATURE_OFFSET..MBR_SIGNATURE_OFFSET + 2)?;
        (signature == MBR_SIGNATURE).then_some(Self::RawImage)
    }

    /// File-name extension conventionally used for the format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Xz => "xz",
            Self::Gzip => "gz",
            Self::Zstd => "zst",
            Self::Zip => "zip",
            Self::RawImage => "img",
        }
    }

    /// Stable name used on the command line and in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Xz => "xz",
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
            Self::Zip => "zip",
            Self::RawImage => "raw",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unrecognised format name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown image format \"{value}\"; expected one of: xz, gzip, zstd, zip, raw")]
pub struct UnknownFormat {
    /// The rejected name.
    pub value: String,
}

impl FromStr for ArtifactFormat {
    type Err = UnknownFormat;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "xz" => Ok(Self::Xz),
            "gz" | "gzip" => Ok(Self::Gzip),
            "zst" | "zstd" => Ok(Self::Zstd),
            "zip" => Ok(Self::Zip),
            "raw" | "img" => Ok(Self::RawImage),
            _ => Err(UnknownFormat {
                value: value.to_owned(),
            }),
        }
    }
}

/// Whether a header looks like a text document rather than binary data.
///
/// Catches the common failure where a mirror returns an HTML error page
/// with a 200 status.
#[must_use]
pub fn looks_like_text(header: &[u8]) -> bool {
    let trimmed = header
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .and_then(|start| header.get(start..))
        .unwrap_or_default();
    let lowered: Vec<u8> = trimmed
        .iter()
        .take(16)
        .map(u8::to_ascii_lowercase)
        .collect();
    if [b"<!doctype".as_slice(), b"<html", b"<?xml", b"<head", b"{"]
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return true;
    }
    !header.is_empty()
        && header
            .iter()
            .all(|b| b.is_ascii_graphic() || b.is_ascii_whitespace())
}

/// Read up to [`SNIFF_LEN`] bytes from the start of `reader`.
///
/// # Errors
///
/// Returns any I/O error other than an early end of file.
pub fn read_header(reader: &mut impl Read) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(SNIFF_LEN);
    reader
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)?;
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn mbr_header() -> Vec<u8> {
        let mut header = vec![0_u8; SNIFF_LEN];
        header[510] = 0x55;
        header[511] = 0xAA;
        header
    }

    #[rstest]
    #[case::xz(&[0xFD, b'7', b'z', b'X', b'Z', 0x00, 0x00], ArtifactFormat::Xz)]
    #[case::gzip(&[0x1F, 0x8B, 0x08, 0x00], ArtifactFormat::Gzip)]
    #[case::zstd(&[0x28, 0xB5, 0x2F, 0xFD, 0x04], ArtifactFormat::Zstd)]
    #[case::zip(b"PK\x03\x04rest", ArtifactFormat::Zip)]
    fn sniffs_compressed_containers(#[case] header: &[u8], #[case] expected: ArtifactFormat) {
        assert_eq!(ArtifactFormat::sniff(header), Some(expected));
    }

    #[test]
    fn sniffs_raw_image_by_boot_signature() {
        assert_eq!(
            ArtifactFormat::sniff(&mbr_header()),
            Some(ArtifactFormat::RawImage)
        );
    }

    #[test]
    fn short_unknown_header_is_unrecognised() {
        assert_eq!(ArtifactFormat::sniff(&[0_u8; 100]), None);
    }

    #[rstest]
    #[case::html(b"\n  <!DOCTYPE html><html>", true)]
    #[case::plain_text(b"404 Not Found\n", true)]
    #[case::binary(&[0x00, 0xFF, 0x10, 0x80], false)]
    #[case::empty(b"", false)]
    #[case::whitespace_only(b"  \n\t", true)]
    fn detects_text_documents(#[case] header: &[u8], #[case] expected: bool) {
        assert_eq!(looks_like_text(header), expected);
    }

    #[rstest]
    #[case::short("gz", ArtifactFormat::Gzip)]
    #[case::upper("ZSTD", ArtifactFormat::Zstd)]
    #[case::raw("raw", ArtifactFormat::RawImage)]
    fn parses_format_names(#[case] name: &str, #[case] expected: ArtifactFormat) {
        assert_eq!(name.parse::<ArtifactFormat>().expect("known format"), expected);
    }

    #[test]
    fn rejects_unknown_format_name() {
        let err = "rar".parse::<ArtifactFormat>().expect_err("unknown format");
        assert!(err.to_string().contains("rar"));
    }
}
