//! Decompression of base image artifacts.
//!
//! Every supported container holds exactly one disk image. Raw images are
//! passed through untouched; compressed ones are decoded into the work
//! directory through a temporary file that is only renamed into place once
//! the stream has been fully decoded.

use super::format::{ArtifactFormat, read_header};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

const COPY_BUFFER_BYTES: usize = 4 * 1024 * 1024;
const IMAGE_EXTENSION: &str = ".img";

/// Trait for extracting the disk image from an artifact, enabling test mocking.
///
/// # Examples
///
/// ```
/// use bootforge_provisioner::artifact::extraction::ImageExtractor;
///
/// let extractor = ImageExtractor;
/// // Use extractor.extract(artifact_path, work_dir) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Extractor {
    /// Produce the uncompressed image for `artifact_path` and return its path.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::UnsupportedFormat`] for unknown containers,
    /// [`ExtractionError::CorruptArchive`] when the container cannot be
    /// decoded, and [`ExtractionError::Io`] for filesystem failures.
    fn extract(
        &self,
        artifact_path: &Utf8Path,
        work_dir: &Utf8Path,
    ) -> Result<Utf8PathBuf, ExtractionError>;
}

/// Errors arising from image extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// The artifact is not in a supported container format.
    #[error("unsupported image format: {path}")]
    UnsupportedFormat {
        /// The artifact path.
        path: Utf8PathBuf,
    },

    /// The container could not be decoded.
    #[error("corrupt archive {path}: {reason}")]
    CorruptArchive {
        /// The artifact path.
        path: Utf8PathBuf,
        /// Description of the decoding failure.
        reason: String,
    },

    /// I/O error during extraction.
    #[error("extraction I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Default extractor handling xz, gzip, zstd, zip, and raw images.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageExtractor;

impl Extractor for ImageExtractor {
    fn extract(
        &self,
        artifact_path: &Utf8Path,
        work_dir: &Utf8Path,
    ) -> Result<Utf8PathBuf, ExtractionError> {
        let mut file = File::open(artifact_path)?;
        let header = read_header(&mut file)?;
        file.seek(SeekFrom::Start(0))?;
        let format = ArtifactFormat::sniff(&header).ok_or_else(|| {
            ExtractionError::UnsupportedFormat {
                path: artifact_path.to_owned(),
            }
        })?;
        let dest = work_dir.join(image_file_name(artifact_path));
        let written = match format {
            ArtifactFormat::RawImage => {
                log::debug!("{artifact_path} is already a raw image");
                return Ok(artifact_path.to_owned());
            }
            ArtifactFormat::Xz => {
                prepare(work_dir, format, artifact_path, &dest)?;
                decode_to(artifact_path, xz2::read::XzDecoder::new(file), &dest)?
            }
            ArtifactFormat::Gzip => {
                prepare(work_dir, format, artifact_path, &dest)?;
                decode_to(artifact_path, flate2::read::MultiGzDecoder::new(file), &dest)?
            }
            ArtifactFormat::Zstd => {
                prepare(work_dir, format, artifact_path, &dest)?;
                let decoder = zstd::Decoder::new(file).map_err(|e| corrupt(artifact_path, &e))?;
                decode_to(artifact_path, decoder, &dest)?
            }
            ArtifactFormat::Zip => {
                prepare(work_dir, format, artifact_path, &dest)?;
                extract_zip(artifact_path, file, &dest)?
            }
        };
        log::info!("extracted {written} bytes to {dest}");
        Ok(dest)
    }
}

fn prepare(
    work_dir: &Utf8Path,
    format: ArtifactFormat,
    artifact_path: &Utf8Path,
    dest: &Utf8Path,
) -> io::Result<()> {
    log::info!("extracting {format} artifact {artifact_path} to {dest}");
    std::fs::create_dir_all(work_dir)
}

/// Name of the extracted image: the artifact name without its compression
/// suffix, always ending in `.img`.
#[must_use]
pub fn image_file_name(artifact_path: &Utf8Path) -> String {
    let name = artifact_path.file_name().unwrap_or("artifact");
    let stem = [".xz", ".gz", ".zst", ".zip"]
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .unwrap_or(name);
    if stem.ends_with(IMAGE_EXTENSION) {
        stem.to_owned()
    } else {
        format!("{stem}{IMAGE_EXTENSION}")
    }
}

fn extract_zip(path: &Utf8Path, file: File, dest: &Utf8Path) -> Result<u64, ExtractionError> {
    let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(path, &e))?;
    let mut images = Vec::new();
    for index in 0..archive.len() {
        let entry = archive.by_index_raw(index).map_err(|e| corrupt(path, &e))?;
        if !entry.is_dir() && entry.name().to_ascii_lowercase().ends_with(IMAGE_EXTENSION) {
            images.push(index);
        }
    }
    let [index] = images.as_slice() else {
        return Err(ExtractionError::CorruptArchive {
            path: path.to_owned(),
            reason: format!(
                "expected exactly one {IMAGE_EXTENSION} entry, found {}",
                images.len()
            ),
        });
    };
    let entry = archive.by_index(*index).map_err(|e| corrupt(path, &e))?;
    decode_to(path, entry, dest)
}

/// Stream `reader` into `dest` via a temporary file in the same directory.
///
/// Read failures are decoding failures; write failures are I/O failures.
fn decode_to(path: &Utf8Path, mut reader: impl Read, dest: &Utf8Path) -> Result<u64, ExtractionError> {
    let parent = dest.parent().unwrap_or_else(|| Utf8Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    let mut buffer = vec![0_u8; COPY_BUFFER_BYTES];
    let mut total = 0_u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(corrupt(path, &e)),
        };
        temp.write_all(buffer.get(..read).unwrap_or_default())?;
        total += read as u64;
    }
    if total == 0 {
        return Err(ExtractionError::CorruptArchive {
            path: path.to_owned(),
            reason: "archive decoded to an empty image".to_owned(),
        });
    }
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| ExtractionError::Io(e.error))?;
    Ok(total)
}

fn corrupt(path: &Utf8Path, err: &dyn std::fmt::Display) -> ExtractionError {
    ExtractionError::CorruptArchive {
        path: path.to_owned(),
        reason: err.to_string(),
    }
}
