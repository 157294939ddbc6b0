//! Platform directory resolution.
//!
//! Abstracts the lookup of the cache and configuration directories so the CLI
//! can be tested without touching the real home directory.

use camino::Utf8PathBuf;
use directories_next::ProjectDirs;

/// Source of per-user directories.
pub trait BaseDirs {
    /// Directory for cached artifacts and lock files.
    fn cache_dir(&self) -> Option<Utf8PathBuf>;

    /// Directory holding `config.toml`.
    fn config_dir(&self) -> Option<Utf8PathBuf>;
}

/// Resolves directories through the platform conventions
/// (`$XDG_CACHE_HOME/bootforge` on Linux).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl SystemBaseDirs {
    fn project() -> Option<ProjectDirs> {
        ProjectDirs::from("org", "bootforge", "bootforge")
    }
}

impl BaseDirs for SystemBaseDirs {
    fn cache_dir(&self) -> Option<Utf8PathBuf> {
        Self::project().and_then(|dirs| Utf8PathBuf::try_from(dirs.cache_dir().to_path_buf()).ok())
    }

    fn config_dir(&self) -> Option<Utf8PathBuf> {
        Self::project()
            .and_then(|dirs| Utf8PathBuf::try_from(dirs.config_dir().to_path_buf()).ok())
    }
}

/// Directories pinned to fixed locations.
#[derive(Debug, Clone, Default)]
pub struct FixedBaseDirs {
    /// Cache directory to report.
    pub cache: Option<Utf8PathBuf>,
    /// Configuration directory to report.
    pub config: Option<Utf8PathBuf>,
}

impl BaseDirs for FixedBaseDirs {
    fn cache_dir(&self) -> Option<Utf8PathBuf> {
        self.cache.clone()
    }

    fn config_dir(&self) -> Option<Utf8PathBuf> {
        self.config.clone()
    }
}
