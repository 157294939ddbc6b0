//! Artifact locator and integrity expectations.

use super::format::ArtifactFormat;
use super::sha256_digest::Sha256Digest;
use bootforge::config::IntegrityConfig;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fmt;

/// Where a base image comes from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactSource {
    /// Fetched over HTTP(S) into the cache directory.
    Url(String),
    /// Already present on the local filesystem.
    Local(Utf8PathBuf),
}

impl ArtifactSource {
    /// Interpret a command-line argument as a URL or a local path.
    ///
    /// # Examples
    ///
    /// ```
    /// use bootforge_provisioner::artifact::ArtifactSource;
    ///
    /// assert!(matches!(
    ///     ArtifactSource::parse("https://example.test/os.img.xz"),
    ///     ArtifactSource::Url(_)
    /// ));
    /// assert!(matches!(ArtifactSource::parse("./os.img"), ArtifactSource::Local(_)));
    /// ```
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.starts_with("https://") || value.starts_with("http://") {
            Self::Url(value.to_owned())
        } else {
            Self::Local(Utf8PathBuf::from(value))
        }
    }
}

impl fmt::Display for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Local(path) => write!(f, "{path}"),
        }
    }
}

/// Declared properties the artifact must match.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Signature {
    /// Expected container format.
    pub format: Option<ArtifactFormat>,
    /// Expected SHA-256 of the artifact as fetched.
    pub sha256: Option<Sha256Digest>,
}

/// A base image to acquire, with the bounds it must satisfy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ArtifactRef {
    /// Source locator.
    pub source: ArtifactSource,
    /// Smallest plausible size in bytes.
    pub min_size: u64,
    /// Generous upper bound in bytes.
    pub max_size: u64,
    /// Optional format and checksum expectations.
    pub signature: Option<Signature>,
}

const FALLBACK_FILE_NAME: &str = "artifact.img";

impl ArtifactRef {
    /// Create a reference bounded by the configured integrity limits.
    #[must_use]
    pub fn new(source: ArtifactSource, limits: &IntegrityConfig) -> Self {
        Self {
            source,
            min_size: limits.default_min_artifact_bytes,
            max_size: limits.max_artifact_bytes,
            signature: None,
        }
    }

    /// Override the minimum size.
    #[must_use]
    pub const fn with_min_size(mut self, min_size: u64) -> Self {
        self.min_size = min_size;
        self
    }

    /// Attach format and checksum expectations.
    #[must_use]
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Declared format, if any.
    #[must_use]
    pub fn expected_format(&self) -> Option<ArtifactFormat> {
        self.signature.as_ref().and_then(|sig| sig.format)
    }

    /// Declared checksum, if any.
    #[must_use]
    pub fn expected_sha256(&self) -> Option<&Sha256Digest> {
        self.signature.as_ref().and_then(|sig| sig.sha256.as_ref())
    }

    /// File name the artifact is stored under in the cache.
    ///
    /// Uses the last URL path segment (query and fragment removed) or the
    /// local file name. Anything unusable falls back to `artifact.img`.
    #[must_use]
    pub fn file_name(&self) -> String {
        let candidate = match &self.source {
            ArtifactSource::Url(url) => url
                .split(['?', '#'])
                .next()
                .and_then(|path| path.rsplit('/').next())
                .map(str::to_owned),
            ArtifactSource::Local(path) => path.file_name().map(str::to_owned),
        };
        candidate
            .filter(|name| is_safe_file_name(name))
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_owned())
    }

    /// Where a remote artifact is cached under `cache_dir`.
    ///
    /// Each source gets a directory named after the SHA-256 of its full
    /// locator, so two images with the same file name never share an entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use bootforge::config::IntegrityConfig;
    /// use bootforge_provisioner::artifact::{ArtifactRef, ArtifactSource};
    /// use camino::Utf8Path;
    ///
    /// let limits = IntegrityConfig::default();
    /// let july = ArtifactRef::new(ArtifactSource::parse("https://example.org/2024-07/os.img.xz"), &limits);
    /// let november = ArtifactRef::new(ArtifactSource::parse("https://example.org/2024-11/os.img.xz"), &limits);
    ///
    /// let cache = Utf8Path::new("/var/cache/bootforge");
    /// assert_ne!(july.cache_path(cache), november.cache_path(cache));
    /// assert_eq!(july.cache_path(cache).file_name(), Some("os.img.xz"));
    /// ```
    #[must_use]
    pub fn cache_path(&self, cache_dir: &Utf8Path) -> Utf8PathBuf {
        let key = Sha256Digest::of_bytes(self.source.to_string().as_bytes());
        cache_dir.join(key.as_str()).join(self.file_name())
    }
}

fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn limits() -> IntegrityConfig {
        IntegrityConfig::default()
    }

    #[rstest]
    #[case::plain(
        "https://downloads.example.test/images/2024-11-19-os-lite.img.xz",
        "2024-11-19-os-lite.img.xz"
    )]
    #[case::query("https://example.test/os.img.gz?token=abc#frag", "os.img.gz")]
    #[case::trailing_slash("https://example.test/latest/", "artifact.img")]
    #[case::encoded("https://example.test/my%20image.img", "artifact.img")]
    fn derives_cache_file_name_from_url(#[case] url: &str, #[case] expected: &str) {
        let artifact = ArtifactRef::new(ArtifactSource::Url(url.to_owned()), &limits());
        assert_eq!(artifact.file_name(), expected);
    }

    #[test]
    fn same_file_name_from_different_urls_gets_distinct_entries() {
        let cache = Utf8Path::new("/cache");
        let july = ArtifactRef::new(
            ArtifactSource::Url("https://example.test/2024-07/raspios.img.xz".to_owned()),
            &limits(),
        );
        let november = ArtifactRef::new(
            ArtifactSource::Url("https://example.test/2024-11/raspios.img.xz".to_owned()),
            &limits(),
        );

        let first = july.cache_path(cache);
        let second = november.cache_path(cache);
        assert_ne!(first, second);
        assert_eq!(first.file_name(), Some("raspios.img.xz"));
        assert_eq!(second.file_name(), Some("raspios.img.xz"));
        assert_eq!(first, july.cache_path(cache));
    }

    #[test]
    fn local_source_uses_file_name() {
        let artifact = ArtifactRef::new(
            ArtifactSource::Local(Utf8PathBuf::from("/srv/images/os.img.zst")),
            &limits(),
        );
        assert_eq!(artifact.file_name(), "os.img.zst");
    }

    #[test]
    fn new_reference_uses_configured_bounds() {
        let artifact = ArtifactRef::new(ArtifactSource::parse("os.img"), &limits());
        assert_eq!(artifact.min_size, 50_000_000);
        assert_eq!(artifact.max_size, 32 * 1024 * 1024 * 1024);
        assert!(artifact.expected_format().is_none());
        assert!(artifact.expected_sha256().is_none());
    }

    #[test]
    fn signature_exposes_expectations() {
        let digest = Sha256Digest::of_bytes(b"image");
        let artifact = ArtifactRef::new(ArtifactSource::parse("os.img.xz"), &limits())
            .with_min_size(10)
            .with_signature(Signature {
                format: Some(ArtifactFormat::Xz),
                sha256: Some(digest.clone()),
            });
        assert_eq!(artifact.min_size, 10);
        assert_eq!(artifact.expected_format(), Some(ArtifactFormat::Xz));
        assert_eq!(artifact.expected_sha256(), Some(&digest));
    }
}
