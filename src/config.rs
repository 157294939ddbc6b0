//! Workspace-wide configuration loaded from `config.toml`.
//!
//! `BootforgeConfig` captures the tunables of the provisioning pipeline: how
//! hard to retry acquisition, how large an artifact may plausibly be, and
//! where downloads are cached. Every field falls back to a sensible default so
//! an absent or partial file is valid.

use crate::error::ConfigError;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::time::Duration;

/// Configuration for the provisioning workspace.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BootforgeConfig {
    /// Retry and confirmation limits for the pipeline.
    pub pipeline: PipelineConfig,
    /// Integrity bounds for downloaded artifacts.
    pub integrity: IntegrityConfig,
    /// Directory used to cache downloaded artifacts. Falls back to the
    /// platform cache directory when absent.
    pub cache_dir: Option<Utf8PathBuf>,
}

impl BootforgeConfig {
    /// Parse configuration from TOML source.
    ///
    /// `origin` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::OutOfRange`] for values the pipeline cannot honour.
    ///
    /// # Examples
    ///
    /// ```
    /// use bootforge::config::BootforgeConfig;
    /// use camino::Utf8Path;
    ///
    /// let config = BootforgeConfig::from_toml_str(
    ///     "[pipeline]\nacquisition_attempts = 5\n",
    ///     Utf8Path::new("inline"),
    /// )
    /// .unwrap();
    /// assert_eq!(config.pipeline.acquisition_attempts, 5);
    /// assert_eq!(config.pipeline.max_reconfirmations, 3);
    /// ```
    pub fn from_toml_str(source: &str, origin: &Utf8Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse {
            path: origin.to_owned(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `path`, or return defaults when the file does
    /// not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] when the file exists but cannot be read,
    /// otherwise the errors of [`Self::from_toml_str`].
    pub fn load_or_default(path: &Utf8Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("no configuration at {path}; using defaults");
            return Ok(Self::default());
        }
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        log::debug!("loaded configuration from {path}");
        Self::from_toml_str(&source, path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.acquisition_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                setting: "pipeline.acquisition_attempts",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.pipeline.max_reconfirmations == 0 {
            return Err(ConfigError::OutOfRange {
                setting: "pipeline.max_reconfirmations",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.pipeline.initial_backoff_ms > self.pipeline.max_backoff_ms {
            return Err(ConfigError::OutOfRange {
                setting: "pipeline.initial_backoff_ms",
                reason: "must not exceed pipeline.max_backoff_ms".to_owned(),
            });
        }
        if self.integrity.max_artifact_bytes == 0 {
            return Err(ConfigError::OutOfRange {
                setting: "integrity.max_artifact_bytes",
                reason: "must be non-zero".to_owned(),
            });
        }
        Ok(())
    }
}

/// Retry and confirmation limits for the pipeline.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Total acquisition attempts before the run fails.
    pub acquisition_attempts: u32,
    /// Delay before the first acquisition retry, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound for the doubling retry delay, in milliseconds.
    pub max_backoff_ms: u64,
    /// How many times the operator may be asked to re-confirm a medium whose
    /// identity keeps changing.
    pub max_reconfirmations: u32,
}

impl PipelineConfig {
    /// Delay before the first acquisition retry.
    #[must_use]
    pub const fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// Upper bound for the retry delay.
    #[must_use]
    pub const fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            acquisition_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 16_000,
            max_reconfirmations: 3,
        }
    }
}

/// Integrity bounds for downloaded artifacts.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IntegrityConfig {
    /// Largest artifact accepted, in bytes.
    pub max_artifact_bytes: u64,
    /// Smallest artifact accepted when the artifact reference does not declare
    /// its own minimum, in bytes.
    pub default_min_artifact_bytes: u64,
}

impl IntegrityConfig {
    const fn default_max_artifact_bytes() -> u64 {
        32 * 1024 * 1024 * 1024
    }

    const fn default_min_artifact_bytes() -> u64 {
        50_000_000
    }
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            max_artifact_bytes: Self::default_max_artifact_bytes(),
            default_min_artifact_bytes: Self::default_min_artifact_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn defaults_match_the_documented_baseline() {
        let config = BootforgeConfig::default();

        assert_eq!(config.pipeline.acquisition_attempts, 3);
        assert_eq!(config.pipeline.max_reconfirmations, 3);
        assert_eq!(config.pipeline.initial_backoff(), Duration::from_secs(1));
        assert_eq!(config.integrity.default_min_artifact_bytes, 50_000_000);
        assert!(config.cache_dir.is_none());
    }

    #[rstest]
    fn deserialises_overrides_from_toml() {
        let source = concat!(
            "cache_dir = \"/var/cache/bootforge\"\n",
            "[pipeline]\n",
            "acquisition_attempts = 5\n",
            "max_backoff_ms = 2000\n",
            "[integrity]\n",
            "max_artifact_bytes = 1024\n",
        );

        let config = BootforgeConfig::from_toml_str(source, Utf8Path::new("test.toml"))
            .expect("expected configuration to parse successfully");

        assert_eq!(config.pipeline.acquisition_attempts, 5);
        assert_eq!(config.pipeline.max_backoff(), Duration::from_secs(2));
        assert_eq!(config.pipeline.initial_backoff_ms, 1_000);
        assert_eq!(config.integrity.max_artifact_bytes, 1024);
        assert_eq!(
            config.cache_dir.as_deref(),
            Some(Utf8Path::new("/var/cache/bootforge"))
        );
    }

    #[rstest]
    #[case::zero_attempts("[pipeline]\nacquisition_attempts = 0\n", "acquisition_attempts")]
    #[case::zero_reconfirmations("[pipeline]\nmax_reconfirmations = 0\n", "max_reconfirmations")]
    #[case::inverted_backoff(
        "[pipeline]\ninitial_backoff_ms = 9000\nmax_backoff_ms = 10\n",
        "initial_backoff_ms"
    )]
    fn rejects_out_of_range_settings(#[case] source: &str, #[case] setting: &str) {
        let err = BootforgeConfig::from_toml_str(source, Utf8Path::new("test.toml"))
            .expect_err("expected validation failure");
        assert!(err.to_string().contains(setting), "unexpected error: {err}");
    }

    #[rstest]
    fn rejects_unknown_keys() {
        let err = BootforgeConfig::from_toml_str("retries = 4\n", Utf8Path::new("test.toml"))
            .expect_err("unknown key should fail");
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[rstest]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join("absent.toml")).expect("UTF-8 path");

        let config = BootforgeConfig::load_or_default(&path).expect("defaults");
        assert_eq!(config, BootforgeConfig::default());
    }

    #[rstest]
    fn loads_file_from_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(dir.path().join("config.toml")).expect("UTF-8 path");
        std::fs::write(&path, "[pipeline]\nacquisition_attempts = 7\n").expect("write config");

        let config = BootforgeConfig::load_or_default(&path).expect("config loads");
        assert_eq!(config.pipeline.acquisition_attempts, 7);
    }
}
