//! Artifact acquisition.
//!
//! Provides a trait-based abstraction for fetching base images into the
//! cache directory, enabling dependency injection for testing. The HTTP
//! implementation keeps partial downloads in `<file>.part` and resumes them
//! with a `Range` request when the server supports it.

use super::reference::{ArtifactRef, ArtifactSource};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::sync::OnceLock;
use std::time::Duration;

/// Timeout for establishing a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for the server to start answering.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

const COPY_BUFFER_BYTES: usize = 1024 * 1024;
const PARTIAL_SUFFIX: &str = "part";

/// Trait for acquiring an artifact into a local file.
///
/// # Examples
///
/// ```
/// use bootforge_provisioner::artifact::download::HttpDownloader;
///
/// let downloader = HttpDownloader;
/// // Use downloader.fetch(&artifact, cache_dir) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Downloader {
    /// Make `artifact` available locally and return its path.
    ///
    /// Remote artifacts are stored under `cache_dir`; local artifacts are
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::NotFound`] when the source does not exist and
    /// the other variants for transport or filesystem failures.
    fn fetch(&self, artifact: &ArtifactRef, cache_dir: &Utf8Path)
    -> Result<Utf8PathBuf, DownloadError>;

    /// Drop any cached copy of `artifact` so the next fetch re-acquires it.
    ///
    /// Local artifacts are never removed.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than the entry already being absent.
    fn discard(&self, artifact: &ArtifactRef, cache_dir: &Utf8Path) -> io::Result<()>;
}

/// Errors arising from artifact acquisition.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// The transfer failed at the network level.
    #[error("download failed for {url}: {reason}")]
    Network {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested artifact does not exist (HTTP 404).
    #[error("artifact not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The server stopped responding.
    #[error("download timed out for {url}")]
    Timeout {
        /// The URL that was requested.
        url: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] io::Error),
}

impl DownloadError {
    /// Whether another attempt could plausibly succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !matches!(self, Self::NotFound { .. })
    }
}

/// HTTP-based downloader using `ureq`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpDownloader;

impl Downloader for HttpDownloader {
    fn fetch(
        &self,
        artifact: &ArtifactRef,
        cache_dir: &Utf8Path,
    ) -> Result<Utf8PathBuf, DownloadError> {
        let url = match &artifact.source {
            ArtifactSource::Local(path) => return Ok(path.clone()),
            ArtifactSource::Url(url) => url,
        };
        let dest = artifact.cache_path(cache_dir);
        if let Some(entry_dir) = dest.parent() {
            std::fs::create_dir_all(entry_dir)?;
        }
        if dest.is_file() {
            log::info!("using cached artifact {dest}");
            return Ok(dest);
        }
        let partial = partial_path(&dest);
        download_resumable(url, &partial)?;
        std::fs::rename(&partial, &dest)?;
        log::info!("downloaded {url} to {dest}");
        Ok(dest)
    }

    fn discard(&self, artifact: &ArtifactRef, cache_dir: &Utf8Path) -> io::Result<()> {
        if matches!(artifact.source, ArtifactSource::Local(_)) {
            return Ok(());
        }
        let dest = artifact.cache_path(cache_dir);
        for path in [partial_path(&dest), dest] {
            match std::fs::remove_file(&path) {
                Ok(()) => log::info!("discarded cached artifact {path}"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Path of the in-progress download for `dest`.
#[must_use]
pub fn partial_path(dest: &Utf8Path) -> Utf8PathBuf {
    let mut name = dest.file_name().unwrap_or("artifact").to_owned();
    name.push('.');
    name.push_str(PARTIAL_SUFFIX);
    dest.with_file_name(name)
}

/// How to treat an existing partial file given the server's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResumeMode {
    Append,
    Restart,
}

/// Decide whether the body continues the partial file.
///
/// Only `206 Partial Content` to a ranged request continues it; any other
/// success status means the server sent the whole file.
const fn resume_mode(requested_from: u64, status: u16) -> ResumeMode {
    if requested_from > 0 && status == 206 {
        ResumeMode::Append
    } else {
        ResumeMode::Restart
    }
}

fn download_resumable(url: &str, partial: &Utf8Path) -> Result<(), DownloadError> {
    let existing = std::fs::metadata(partial).map(|m| m.len()).unwrap_or(0);
    let response = match request(url, existing) {
        Err(ureq::Error::StatusCode(416)) if existing > 0 => {
            log::warn!("server rejected resume of {partial}; restarting from zero");
            std::fs::remove_file(partial)?;
            request(url, 0).map_err(|e| map_ureq_error(url, &e))?
        }
        other => other.map_err(|e| map_ureq_error(url, &e))?,
    };

    let mode = resume_mode(existing, response.status().as_u16());
    let mut file = match mode {
        ResumeMode::Append => {
            log::info!("resuming {url} from byte {existing}");
            OpenOptions::new().append(true).open(partial)?
        }
        ResumeMode::Restart => File::create(partial)?,
    };
    let mut body = response.into_body();
    copy_body(url, &mut body.as_reader(), &mut file)?;
    file.sync_all()?;
    Ok(())
}

fn request(url: &str, from: u64) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    let builder = http_agent().get(url);
    if from > 0 {
        builder.header("Range", &format!("bytes={from}-")).call()
    } else {
        builder.call()
    }
}

/// Stream the body into `file`, separating network faults from disk faults.
fn copy_body(url: &str, reader: &mut impl Read, file: &mut File) -> Result<u64, DownloadError> {
    let mut buffer = vec![0_u8; COPY_BUFFER_BYTES];
    let mut total = 0_u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(map_read_error(url, &e)),
        };
        file.write_all(buffer.get(..read).unwrap_or_default())?;
        total += read as u64;
    }
    Ok(total)
}

/// Shared `ureq` agent with timeout configuration.
fn http_agent() -> &'static ureq::Agent {
    static AGENT: OnceLock<ureq::Agent> = OnceLock::new();
    AGENT.get_or_init(|| {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .timeout_recv_response(Some(RESPONSE_TIMEOUT))
            .build();
        ureq::Agent::new_with_config(config)
    })
}

/// Map a ureq error to a [`DownloadError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> DownloadError {
    match err {
        ureq::Error::StatusCode(404 | 410) => DownloadError::NotFound {
            url: url.to_owned(),
        },
        ureq::Error::Timeout(_) => DownloadError::Timeout {
            url: url.to_owned(),
        },
        other => DownloadError::Network {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

fn map_read_error(url: &str, err: &io::Error) -> DownloadError {
    if err.kind() == io::ErrorKind::TimedOut {
        DownloadError::Timeout {
            url: url.to_owned(),
        }
    } else {
        DownloadError::Network {
            url: url.to_owned(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::reference::ArtifactRef;
    use bootforge::config::IntegrityConfig;
    use rstest::rstest;

    #[rstest]
    #[case::fresh_download(0, 200, ResumeMode::Restart)]
    #[case::resumed(4096, 206, ResumeMode::Append)]
    #[case::range_ignored(4096, 200, ResumeMode::Restart)]
    fn decides_resume_mode(#[case] from: u64, #[case] status: u16, #[case] expected: ResumeMode) {
        assert_eq!(resume_mode(from, status), expected);
    }

    #[test]
    fn partial_path_appends_suffix() {
        let dest = Utf8Path::new("/cache/os.img.xz");
        assert_eq!(partial_path(dest), Utf8PathBuf::from("/cache/os.img.xz.part"));
    }

    #[rstest]
    #[case::not_found(404)]
    #[case::gone(410)]
    fn missing_status_maps_to_not_found(#[case] status: u16) {
        let mapped = map_ureq_error("https://example.test/os.img", &ureq::Error::StatusCode(status));
        assert!(matches!(mapped, DownloadError::NotFound { .. }));
        assert!(!mapped.is_transient());
    }

    #[test]
    fn server_error_is_transient() {
        let mapped = map_ureq_error("https://example.test/os.img", &ureq::Error::StatusCode(503));
        assert!(matches!(mapped, DownloadError::Network { .. }));
        assert!(mapped.is_transient());
    }

    #[test]
    fn read_timeout_maps_to_timeout() {
        let err = io::Error::new(io::ErrorKind::TimedOut, "stalled");
        assert!(matches!(
            map_read_error("https://example.test/os.img", &err),
            DownloadError::Timeout { .. }
        ));
    }

    #[test]
    fn local_sources_are_returned_unchanged() {
        let artifact = ArtifactRef::new(
            ArtifactSource::Local(Utf8PathBuf::from("/srv/os.img")),
            &IntegrityConfig::default(),
        );
        let path = HttpDownloader
            .fetch(&artifact, Utf8Path::new("/nonexistent/cache"))
            .expect("local source");
        assert_eq!(path, Utf8PathBuf::from("/srv/os.img"));
    }

    fn remote(url: &str) -> ArtifactRef {
        ArtifactRef::new(ArtifactSource::Url(url.to_owned()), &IntegrityConfig::default())
    }

    fn seed(cache: &Utf8Path, artifact: &ArtifactRef, content: &[u8]) -> Utf8PathBuf {
        let entry = artifact.cache_path(cache);
        let parent = entry.parent().expect("cache entry has a parent");
        std::fs::create_dir_all(parent).expect("create cache entry");
        std::fs::write(&entry, content).expect("seed cache");
        entry
    }

    #[test]
    fn cached_artifact_is_reused_without_network() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cache = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("UTF-8 path");
        let artifact = remote("http://127.0.0.1:9/os.img.xz");
        let entry = seed(&cache, &artifact, b"cached");

        let path = HttpDownloader.fetch(&artifact, &cache).expect("cache hit");
        assert_eq!(path, entry);
    }

    #[test]
    fn same_named_artifact_from_another_url_is_not_a_cache_hit() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cache = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("UTF-8 path");
        seed(&cache, &remote("http://127.0.0.1:9/2024-07/os.img.xz"), b"july");
        std::fs::write(cache.join("os.img.xz"), b"flat").expect("seed flat entry");

        // Port 9 refuses connections, so only a cache hit could succeed.
        let result = HttpDownloader.fetch(&remote("http://127.0.0.1:9/2024-11/os.img.xz"), &cache);
        assert!(result.is_err(), "served a foreign cache entry: {result:?}");
    }

    #[test]
    fn discard_removes_cached_and_partial_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cache = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("UTF-8 path");
        let artifact = remote("http://127.0.0.1:9/os.img.xz");
        let entry = seed(&cache, &artifact, b"corrupt");
        std::fs::write(partial_path(&entry), b"half").expect("seed partial");

        HttpDownloader.discard(&artifact, &cache).expect("discard");
        assert!(!entry.exists());
        assert!(!partial_path(&entry).exists());
        HttpDownloader.discard(&artifact, &cache).expect("discarding twice is fine");
    }

    #[test]
    fn discard_never_touches_local_sources() {
        let dir = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("UTF-8 path");
        let image = root.join("os.img");
        std::fs::write(&image, b"local").expect("write image");
        let artifact = ArtifactRef::new(ArtifactSource::Local(image.clone()), &IntegrityConfig::default());

        HttpDownloader.discard(&artifact, &root).expect("discard");
        assert!(image.is_file());
    }

    #[test]
    fn copy_body_counts_bytes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("out");
        let mut file = File::create(&path).expect("create");
        let mut reader: &[u8] = b"0123456789";

        let copied = copy_body("mem://", &mut reader, &mut file).expect("copy");
        assert_eq!(copied, 10);
        assert_eq!(std::fs::read(&path).expect("read back"), b"0123456789");
    }
}
