//! Device-specific configuration overlay.
//!
//! [`build`] turns a validated [`DeviceProfile`] into a [`ConfigBundle`]: the
//! ordered list of files that make the written image boot with the right
//! peripherals. Building is pure and deterministic; [`write`] is the only
//! part that touches the filesystem.
//!
//! Bundle order is fixed:
//!
//! 1. `config.txt`
//! 2. the network fragment, in exactly one schema
//! 3. `bootforge/system.toml` and the `ssh` marker
//! 4. `bootforge/modules.conf`
//! 5. `bootforge/firstboot.sh`
//! 6. `bootforge/SETUP.txt` and `bootforge/PINOUT.txt`

pub mod boot;
mod docs;
pub mod modules;
pub mod network;
pub mod script;
pub mod system;
mod write;

use bootforge::DeviceProfile;
use bootforge::profile::NetworkSchema;
use camino::Utf8PathBuf;
use serde::Serialize;

pub use write::{OverlayError, write, write_file};

/// Firmware configuration file.
pub const CONFIG_TXT: &str = "config.txt";
/// Legacy Wi-Fi credentials picked up from the boot partition.
pub const WPA_SUPPLICANT_CONF: &str = "wpa_supplicant.conf";
/// NetworkManager keyfile installed by the first-boot script.
pub const NM_CONNECTION: &str = "bootforge/wifi.nmconnection";
/// Operating-system settings.
pub const SYSTEM_TOML: &str = "bootforge/system.toml";
/// SSH-enable marker.
pub const SSH_MARKER: &str = "ssh";
/// Kernel modules to load, in dependency order.
pub const MODULES_CONF: &str = "bootforge/modules.conf";
/// Idempotent first-boot provisioning script.
pub const FIRSTBOOT_SH: &str = "bootforge/firstboot.sh";
/// Operator-facing setup notes.
pub const SETUP_TXT: &str = "bootforge/SETUP.txt";
/// Pin assignment table.
pub const PINOUT_TXT: &str = "bootforge/PINOUT.txt";
/// Verification report written after provisioning.
pub const VERIFICATION_TXT: &str = "bootforge/verification.txt";

/// Path of the network fragment for `schema`.
#[must_use]
pub const fn network_fragment_path(schema: NetworkSchema) -> &'static str {
    match schema {
        NetworkSchema::WpaSupplicant => WPA_SUPPLICANT_CONF,
        NetworkSchema::NetworkManager => NM_CONNECTION,
    }
}

/// One generated file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfigFile {
    /// Path relative to the configuration surface root.
    pub path: Utf8PathBuf,
    /// UTF-8, newline-terminated content.
    pub content: String,
    /// Whether the file should be executable.
    pub executable: bool,
}

impl ConfigFile {
    fn text(path: &str, content: String) -> Self {
        Self {
            path: Utf8PathBuf::from(path),
            content,
            executable: false,
        }
    }
}

/// The full set of files generated for one profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConfigBundle {
    files: Vec<ConfigFile>,
    schema: Option<NetworkSchema>,
}

impl ConfigBundle {
    /// Files in write order.
    #[must_use]
    pub fn files(&self) -> &[ConfigFile] {
        &self.files
    }

    /// Network schema the credentials were rendered in, if any.
    #[must_use]
    pub const fn schema(&self) -> Option<NetworkSchema> {
        self.schema
    }

    /// Look up a file by its relative path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&ConfigFile> {
        self.files.iter().find(|file| file.path == path)
    }
}

/// Render the configuration bundle for `profile`.
///
/// The profile must already have passed [`DeviceProfile::validate`]; every
/// string that reaches a rendered file is restricted there.
///
/// # Examples
///
/// ```
/// use bootforge_provisioner::overlay;
///
/// let profile = bootforge::catalogue::find("pi-zero2w-headless").unwrap();
/// let bundle = overlay::build(&profile);
/// assert_eq!(bundle.files()[0].path, "config.txt");
/// assert_eq!(bundle, overlay::build(&profile));
/// ```
#[must_use]
pub fn build(profile: &DeviceProfile) -> ConfigBundle {
    let module_list = modules::resolve(profile);
    let mut files = vec![ConfigFile::text(CONFIG_TXT, boot::render(profile))];

    let schema = profile.network.as_ref().map(|network| {
        files.push(ConfigFile::text(
            network_fragment_path(network.schema),
            network::render(&profile.hostname, network),
        ));
        network.schema
    });

    files.push(ConfigFile::text(SYSTEM_TOML, system::render(profile)));
    if profile.system.ssh {
        files.push(ConfigFile::text(
            SSH_MARKER,
            "# Presence of this file enables the SSH server on first boot.\n".to_owned(),
        ));
    }
    files.push(ConfigFile::text(MODULES_CONF, modules::render(profile, &module_list)));
    files.push(ConfigFile {
        path: Utf8PathBuf::from(FIRSTBOOT_SH),
        content: script::render(profile),
        executable: true,
    });
    files.push(ConfigFile::text(SETUP_TXT, docs::setup(profile)));
    files.push(ConfigFile::text(PINOUT_TXT, docs::pinout(profile)));

    ConfigBundle { files, schema }
}
