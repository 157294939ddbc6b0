//! Removable media discovery.
//!
//! A [`MediumHandle`] names a whole-disk block device together with the
//! properties the operator confirms before it is erased. Its identity is the
//! pair of reported size and model; the safety guard re-enumerates media and
//! compares identities immediately before writing.

use crate::command::{CommandExecutor, SystemCommandExecutor};
use crate::guard::{GuardedResource, ResourceProbe};
use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A candidate destination medium.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MediumHandle {
    /// Block device path, e.g. `/dev/sdb`.
    pub path: Utf8PathBuf,
    /// Reported capacity in bytes.
    pub size_bytes: u64,
    /// Reported model string (may be empty).
    pub model: String,
    /// Whether the kernel flags the device as removable.
    pub removable: bool,
    /// Transport, e.g. `usb` or `mmc`.
    pub transport: Option<String>,
}

/// The properties that must not change between confirmation and write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediumIdentity {
    /// Reported capacity in bytes.
    pub size_bytes: u64,
    /// Reported model string.
    pub model: String,
}

impl fmt::Display for MediumIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \"{}\"", human_size(self.size_bytes), self.model)
    }
}

impl MediumHandle {
    /// Identity used to detect a swapped medium.
    #[must_use]
    pub fn identity(&self) -> MediumIdentity {
        MediumIdentity {
            size_bytes: self.size_bytes,
            model: self.model.clone(),
        }
    }
}

impl GuardedResource for MediumHandle {
    type Identity = MediumIdentity;

    fn identity(&self) -> Self::Identity {
        Self::identity(self)
    }

    fn summary(&self) -> String {
        let model = if self.model.is_empty() {
            "unknown model"
        } else {
            self.model.as_str()
        };
        let transport = self.transport.as_deref().unwrap_or("unknown transport");
        format!(
            "{} ({}, {model}, {transport}{})",
            self.path,
            human_size(self.size_bytes),
            if self.removable { ", removable" } else { "" }
        )
    }
}

/// Format a byte count with binary units.
///
/// # Examples
///
/// ```
/// use bootforge_provisioner::medium::human_size;
///
/// assert_eq!(human_size(512), "512 B");
/// assert_eq!(human_size(31_914_983_424), "29.7 GiB");
/// ```
#[must_use]
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    let value = u128::from(bytes);
    let mut scale = None;
    let mut divisor: u128 = 1024;
    for unit in UNITS {
        if value < divisor {
            break;
        }
        scale = Some((unit, divisor));
        divisor = divisor.saturating_mul(1024);
    }
    let Some((unit, divisor)) = scale else {
        return format!("{bytes} B");
    };
    let tenths = value
        .saturating_mul(10)
        .saturating_add(divisor >> 1)
        .checked_div(divisor)
        .unwrap_or_default();
    let whole = tenths.checked_div(10).unwrap_or_default();
    let fraction = tenths.checked_rem(10).unwrap_or_default();
    format!("{whole}.{fraction} {unit}")
}

/// Errors arising from media enumeration.
#[derive(Debug, thiserror::Error)]
pub enum EnumerationError {
    /// The enumeration command could not be run.
    #[error("could not run {command}: {source}; is util-linux installed?")]
    Spawn {
        /// The command that failed.
        command: &'static str,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The enumeration command exited unsuccessfully.
    #[error("{command} failed: {stderr}")]
    Failed {
        /// The command that failed.
        command: &'static str,
        /// Captured standard error.
        stderr: String,
    },

    /// The command output could not be parsed.
    #[error("could not parse {command} output: {reason}")]
    Parse {
        /// The command whose output was malformed.
        command: &'static str,
        /// Parser error.
        reason: String,
    },
}

/// Lists candidate destination media.
#[cfg_attr(test, mockall::automock)]
pub trait MediumEnumerator {
    /// Return every removable medium currently attached.
    ///
    /// # Errors
    ///
    /// Returns an [`EnumerationError`] when the platform cannot be queried.
    fn list(&self) -> Result<Vec<MediumHandle>, EnumerationError>;
}

/// Look up a medium by device path.
///
/// # Errors
///
/// Propagates enumeration failures.
pub fn find_medium(
    enumerator: &dyn MediumEnumerator,
    path: &Utf8Path,
) -> Result<Option<MediumHandle>, EnumerationError> {
    Ok(enumerator
        .list()?
        .into_iter()
        .find(|medium| medium.path == path))
}

/// Re-resolves media through an enumerator for the safety guard.
pub struct EnumeratorProbe<'a> {
    enumerator: &'a dyn MediumEnumerator,
}

impl<'a> EnumeratorProbe<'a> {
    /// Wrap an enumerator.
    #[must_use]
    pub fn new(enumerator: &'a dyn MediumEnumerator) -> Self {
        Self { enumerator }
    }
}

impl ResourceProbe<MediumHandle> for EnumeratorProbe<'_> {
    type Error = EnumerationError;

    fn probe(&self, resource: &MediumHandle) -> Result<Option<MediumHandle>, Self::Error> {
        find_medium(self.enumerator, &resource.path)
    }
}

const LSBLK: &str = "lsblk";
const LSBLK_ARGS: &[&str] = &[
    "--json",
    "--bytes",
    "--nodeps",
    "--output",
    "NAME,PATH,SIZE,MODEL,RM,TRAN,TYPE",
];

/// Enumerates removable disks with `lsblk`.
#[derive(Debug, Clone, Default)]
pub struct LsblkEnumerator<E = SystemCommandExecutor> {
    executor: E,
}

impl<E: CommandExecutor> LsblkEnumerator<E> {
    /// Create an enumerator that runs `lsblk` through `executor`.
    #[must_use]
    pub const fn new(executor: E) -> Self {
        Self { executor }
    }
}

impl LsblkEnumerator {
    /// Create an enumerator that runs the host's `lsblk`.
    #[must_use]
    pub const fn system() -> Self {
        Self::new(SystemCommandExecutor)
    }
}

impl<E: CommandExecutor> MediumEnumerator for LsblkEnumerator<E> {
    fn list(&self) -> Result<Vec<MediumHandle>, EnumerationError> {
        let output = self
            .executor
            .run(LSBLK, LSBLK_ARGS)
            .map_err(|source| EnumerationError::Spawn {
                command: LSBLK,
                source,
            })?;
        if !output.status.success() {
            return Err(EnumerationError::Failed {
                command: LSBLK,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        let media = parse_lsblk(&String::from_utf8_lossy(&output.stdout))?;
        log::debug!("lsblk reported {} removable medium(s)", media.len());
        Ok(media)
    }
}

#[derive(Deserialize)]
struct LsblkOutput {
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Deserialize)]
struct LsblkDevice {
    name: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default, deserialize_with = "lenient_u64")]
    size: u64,
    #[serde(default)]
    model: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    rm: bool,
    #[serde(default)]
    tran: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

/// Older `lsblk` releases print numbers and flags as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Number(u64),
    Flag(bool),
    Text(String),
    Null,
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::Number(n)) => Ok(n),
        Some(Lenient::Text(text)) => text.trim().parse().map_err(serde::de::Error::custom),
        Some(Lenient::Flag(_) | Lenient::Null) | None => Ok(0),
    }
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Option::<Lenient>::deserialize(deserializer)? {
        Some(Lenient::Flag(flag)) => Ok(flag),
        Some(Lenient::Number(n)) => Ok(n != 0),
        Some(Lenient::Text(text)) => Ok(text.trim() == "1" || text.trim() == "true"),
        Some(Lenient::Null) | None => Ok(false),
    }
}

/// Parse `lsblk --json` output, keeping only removable, USB, or MMC disks.
///
/// # Errors
///
/// Returns [`EnumerationError::Parse`] for malformed JSON.
pub fn parse_lsblk(json: &str) -> Result<Vec<MediumHandle>, EnumerationError> {
    let parsed: LsblkOutput = serde_json::from_str(json).map_err(|e| EnumerationError::Parse {
        command: LSBLK,
        reason: e.to_string(),
    })?;
    Ok(parsed
        .blockdevices
        .into_iter()
        .filter(|device| device.kind.as_deref().is_none_or(|kind| kind == "disk"))
        .filter(|device| {
            device.rm || matches!(device.tran.as_deref(), Some("usb" | "mmc" | "sdio"))
        })
        .filter(|device| device.size > 0)
        .map(|device| MediumHandle {
            path: Utf8PathBuf::from(
                device
                    .path
                    .unwrap_or_else(|| format!("/dev/{}", device.name)),
            ),
            size_bytes: device.size,
            model: device.model.map(|m| m.trim().to_owned()).unwrap_or_default(),
            removable: device.rm,
            transport: device.tran,
        })
        .collect())
}
