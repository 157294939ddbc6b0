//! Operating-system settings consumed by the first-boot script.

use bootforge::DeviceProfile;
use serde::{Deserialize, Serialize};

/// Contents of `bootforge/system.toml`.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SystemSettings {
    /// Hostname set on first boot.
    pub hostname: String,
    /// Default locale.
    pub locale: String,
    /// IANA timezone.
    pub timezone: String,
    /// Console keyboard layout.
    pub keyboard_layout: String,
    /// Whether the SSH server is enabled.
    pub ssh: bool,
    /// Default account seed.
    pub account: AccountSeed,
    /// Package manifest.
    pub packages: Packages,
}

/// Default account created on first boot.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AccountSeed {
    /// Login name.
    pub username: String,
    /// Initial password.
    pub password: String,
}

/// Packages installed on first boot, in order.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Packages {
    /// Debian package names.
    pub install: Vec<String>,
}

impl SystemSettings {
    /// Settings derived from `profile`.
    #[must_use]
    pub fn from_profile(profile: &DeviceProfile) -> Self {
        let system = &profile.system;
        Self {
            hostname: profile.hostname.clone(),
            locale: system.locale.clone(),
            timezone: system.timezone.clone(),
            keyboard_layout: system.keyboard_layout.clone(),
            ssh: system.ssh,
            account: AccountSeed {
                username: system.account.username.clone(),
                password: system.account.password.clone(),
            },
            packages: Packages {
                install: system.packages.clone(),
            },
        }
    }

    /// Parse a rendered `system.toml`.
    ///
    /// # Errors
    ///
    /// Returns the TOML error when the content is malformed.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

pub(super) fn render(profile: &DeviceProfile) -> String {
    let settings = SystemSettings::from_profile(profile);
    // Every field is a plain string, bool, or string list.
    let body = toml::to_string(&settings).unwrap_or_default();
    format!(
        "# Operating-system settings for {}, applied by firstboot.sh.\n{body}",
        profile.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootforge::catalogue;

    #[test]
    fn rendered_settings_parse_back() {
        let profile = catalogue::find("pi4-ili9486-35").expect("profile");
        let rendered = render(&profile);
        let parsed = SystemSettings::parse(&rendered).expect("valid TOML");
        assert_eq!(parsed, SystemSettings::from_profile(&profile));
        assert!(rendered.ends_with('\n'));
    }

    #[test]
    fn package_order_is_preserved() {
        let profile = catalogue::find("pi4-ili9486-35").expect("profile");
        let parsed = SystemSettings::parse(&render(&profile)).expect("valid TOML");
        assert_eq!(
            parsed.packages.install,
            ["xserver-xorg-input-evdev", "xinput-calibrator", "evtest"]
        );
    }

    #[test]
    fn settings_hold_no_network_credentials() {
        let profile = catalogue::find("pi-zero2w-headless").expect("profile");
        let rendered = render(&profile);
        assert!(!rendered.contains("hunter2-hunter2"));
        assert!(!rendered.contains("ssid"));
    }
}
