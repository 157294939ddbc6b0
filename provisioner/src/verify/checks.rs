//! Individual verification checks, in report order.

use super::{Finding, VerificationResult};
use crate::overlay::{
    self, CONFIG_TXT, FIRSTBOOT_SH, MODULES_CONF, NM_CONNECTION, PINOUT_TXT, SETUP_TXT,
    SSH_MARKER, SYSTEM_TOML, WPA_SUPPLICANT_CONF, boot, modules, network, script,
    system::SystemSettings,
};
use bootforge::DeviceProfile;
use bootforge::profile::{KeyManagement, NetworkSchema};
use camino::{Utf8Path, Utf8PathBuf};
use std::io::ErrorKind;

const PSK_MIN: usize = 8;
const PSK_MAX: usize = 63;

/// Read access to the mounted configuration surface.
pub(super) struct Surface {
    root: Utf8PathBuf,
}

impl Surface {
    pub(super) fn new(root: &Utf8Path) -> Self {
        Self {
            root: root.to_owned(),
        }
    }

    fn exists(&self, relative: &str) -> bool {
        self.root.join(relative).is_file()
    }

    /// Read a required file, recording an error finding when it is absent.
    fn require(&self, relative: &str, result: &mut VerificationResult) -> Option<String> {
        match std::fs::read_to_string(self.root.join(relative)) {
            Ok(content) => {
                result.record(Finding::pass(relative, "present"));
                Some(content)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                result.record(Finding::error(relative, "missing"));
                None
            }
            Err(err) => {
                result.record(Finding::error(relative, format!("unreadable: {err}")));
                None
            }
        }
    }
}

fn has_line(content: &str, expected: &str) -> bool {
    content.lines().any(|line| line.trim() == expected)
}

pub(super) fn boot_config(surface: &Surface, profile: &DeviceProfile, result: &mut VerificationResult) {
    let Some(content) = surface.require(CONFIG_TXT, result) else {
        return;
    };
    for directive in boot::expected_directives(profile) {
        let check = format!("{CONFIG_TXT}: {directive}");
        if has_line(&content, &directive) {
            result.record(Finding::pass(check, "set"));
        } else {
            result.record(Finding::warning(check, "directive missing"));
        }
    }
}

pub(super) fn network(surface: &Surface, profile: &DeviceProfile, result: &mut VerificationResult) {
    let Some(expected) = &profile.network else {
        for stale in [WPA_SUPPLICANT_CONF, NM_CONNECTION] {
            if surface.exists(stale) {
                result.record(Finding::warning(
                    "network: stale fragment",
                    format!("{stale} present but the profile configures no network"),
                ));
            }
        }
        return;
    };

    let fragment = overlay::network_fragment_path(expected.schema);
    let other = match expected.schema {
        NetworkSchema::WpaSupplicant => NM_CONNECTION,
        NetworkSchema::NetworkManager => WPA_SUPPLICANT_CONF,
    };
    let Some(content) = surface.require(fragment, result) else {
        return;
    };

    if has_line(&content, &network::ssid_line(expected.schema, &expected.ssid)) {
        result.record(Finding::pass("network: ssid", format!("joins \"{}\"", expected.ssid)));
    } else {
        result.record(Finding::warning(
            "network: ssid",
            format!("SSID \"{}\" not configured", expected.ssid),
        ));
    }

    match expected.schema {
        NetworkSchema::WpaSupplicant => {
            if has_line(&content, &format!("country={}", expected.country)) {
                result.record(Finding::pass("network: country", expected.country.clone()));
            } else {
                result.record(Finding::warning(
                    "network: country",
                    format!("regulatory domain {} not set", expected.country),
                ));
            }
        }
        NetworkSchema::NetworkManager => {
            let script = std::fs::read_to_string(surface.root.join(FIRSTBOOT_SH)).unwrap_or_default();
            if script.contains(&format!("iw reg set {}", expected.country)) {
                result.record(Finding::pass("network: country", expected.country.clone()));
            } else {
                result.record(Finding::warning(
                    "network: country",
                    format!("regulatory domain {} not applied on first boot", expected.country),
                ));
            }
        }
    }

    if expected.key_mgmt != KeyManagement::Open {
        match network::find_psk(expected.schema, &content) {
            None => result.record(Finding::warning("network: psk", "no pre-shared key configured")),
            Some(psk) if !(PSK_MIN..=PSK_MAX).contains(&psk.chars().count()) => {
                result.record(Finding::warning(
                    "network: psk",
                    format!(
                        "pre-shared key is {} characters; WPA requires {PSK_MIN} to {PSK_MAX}",
                        psk.chars().count()
                    ),
                ));
            }
            Some(_) => result.record(Finding::pass("network: psk", "length ok")),
        }
    }

    if surface.exists(other) {
        result.record(Finding::warning(
            "network: stale fragment",
            format!("{other} present alongside {fragment}; only one schema is used"),
        ));
    }
}

pub(super) fn system_settings(
    surface: &Surface,
    profile: &DeviceProfile,
    result: &mut VerificationResult,
) {
    let Some(content) = surface.require(SYSTEM_TOML, result) else {
        return;
    };
    let found = match SystemSettings::parse(&content) {
        Ok(found) => found,
        Err(err) => {
            result.record(Finding::error("system: settings", format!("unparseable: {err}")));
            return;
        }
    };
    let expected = SystemSettings::from_profile(profile);
    let comparisons = [
        ("system: hostname", found.hostname == expected.hostname),
        ("system: account", found.account == expected.account),
        ("system: locale", found.locale == expected.locale),
        ("system: timezone", found.timezone == expected.timezone),
        ("system: keyboard", found.keyboard_layout == expected.keyboard_layout),
        ("system: packages", found.packages == expected.packages),
    ];
    for (check, matches) in comparisons {
        if matches {
            result.record(Finding::pass(check, "matches profile"));
        } else {
            result.record(Finding::warning(check, "differs from profile"));
        }
    }
}

pub(super) fn ssh_marker(surface: &Surface, profile: &DeviceProfile, result: &mut VerificationResult) {
    let present = surface.exists(SSH_MARKER);
    let finding = match (profile.system.ssh, present) {
        (true, true) => Finding::pass("ssh", "enabled"),
        (false, false) => Finding::pass("ssh", "disabled"),
        (true, false) => Finding::error("ssh", format!("{SSH_MARKER} marker missing")),
        (false, true) => Finding::warning(
            "ssh",
            format!("{SSH_MARKER} marker present but the profile disables SSH"),
        ),
    };
    result.record(finding);
}

pub(super) fn kernel_modules(
    surface: &Surface,
    profile: &DeviceProfile,
    result: &mut VerificationResult,
) {
    let Some(content) = surface.require(MODULES_CONF, result) else {
        return;
    };
    let expected = modules::resolve(profile);
    let found = modules::parse(&content);
    if found == expected {
        result.record(Finding::pass("modules: order", expected.join(", ")));
    } else if expected.iter().all(|module| found.contains(module)) {
        result.record(Finding::warning("modules: order", "modules listed out of dependency order"));
    } else {
        let missing: Vec<&str> = expected
            .iter()
            .filter(|module| !found.contains(module))
            .map(String::as_str)
            .collect();
        result.record(Finding::warning(
            "modules: order",
            format!("missing {}", missing.join(", ")),
        ));
    }
}

pub(super) fn firstboot_script(
    surface: &Surface,
    profile: &DeviceProfile,
    result: &mut VerificationResult,
) {
    let Some(content) = surface.require(FIRSTBOOT_SH, result) else {
        return;
    };
    if content.starts_with("#!/bin/sh\n") && has_line(&content, "set -eu") {
        result.record(Finding::pass("firstboot: strict mode", "POSIX sh with set -eu"));
    } else {
        result.record(Finding::warning(
            "firstboot: strict mode",
            "script should start with #!/bin/sh and enable set -eu",
        ));
    }

    let Some(touch) = &profile.touch else {
        return;
    };
    for setting in script::touch_settings(touch) {
        let check = format!("firstboot: touch {setting}");
        if has_line(&content, &setting) {
            result.record(Finding::pass(check, "set"));
        } else {
            result.record(Finding::warning(check, "touch setting missing"));
        }
    }
}

pub(super) fn documents(surface: &Surface, result: &mut VerificationResult) {
    for document in [SETUP_TXT, PINOUT_TXT] {
        surface.require(document, result);
    }
}
