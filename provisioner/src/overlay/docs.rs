//! Operator-facing documents written next to the configuration.

use bootforge::DeviceProfile;
use bootforge::profile::{KeyManagement, NetworkSchema};

pub(super) fn setup(profile: &DeviceProfile) -> String {
    let system = &profile.system;
    let mut out = String::new();
    out.push_str(&format!("bootforge setup notes: {}\n", profile.name));
    out.push_str(&format!("Board: {}\n\n", profile.board));

    out.push_str("Login\n-----\n");
    out.push_str(&format!("Hostname: {}\n", profile.hostname));
    out.push_str(&format!("Username: {}\n", system.account.username));
    out.push_str(&format!("Password: {}\n", system.account.password));
    out.push_str("Change the password after the first login.\n");
    if system.ssh {
        out.push_str(&format!(
            "SSH is enabled: ssh {}@{}.local\n",
            system.account.username, profile.hostname
        ));
    } else {
        out.push_str("SSH is disabled; use a keyboard and the attached display.\n");
    }

    out.push_str("\nNetwork\n-------\n");
    match &profile.network {
        Some(network) => {
            out.push_str(&format!("SSID: {}\n", network.ssid));
            let security = match network.key_mgmt {
                KeyManagement::WpaPsk => "WPA2 personal",
                KeyManagement::Sae => "WPA3 personal",
                KeyManagement::Open => "open",
            };
            out.push_str(&format!("Security: {security}\n"));
            out.push_str(&format!("Country: {}\n", network.country));
            let location = match network.schema {
                NetworkSchema::WpaSupplicant => "wpa_supplicant.conf on the boot partition",
                NetworkSchema::NetworkManager => {
                    "a NetworkManager connection installed on first boot"
                }
            };
            out.push_str(&format!("Credentials are stored in {location}.\n"));
        }
        None => out.push_str("No wireless network configured.\n"),
    }

    out.push_str("\nTroubleshooting\n---------------\n");
    out.push_str("- First boot runs bootforge/firstboot.sh; allow a few minutes and one reboot.\n");
    if profile.display.is_some() {
        out.push_str("- A white or blank panel usually means the SPI wiring or dc/reset pins differ from PINOUT.txt.\n");
    }
    if profile.touch.is_some() {
        out.push_str("- If touch is mirrored or rotated, adjust swap/invert flags in the profile and re-provision.\n");
    }
    if profile.network.is_some() {
        out.push_str("- No network: check the country code and that the SSID is in range.\n");
    }
    out.push_str("- bootforge/verification.txt lists what was checked after writing.\n");
    out
}

pub(super) fn pinout(profile: &DeviceProfile) -> String {
    let mut out = String::new();
    out.push_str(&format!("Pin assignments for {} (BCM numbering)\n\n", profile.name));
    match profile.pin_map() {
        Ok(pins) if pins.is_empty() => out.push_str("No GPIO pins are claimed.\n"),
        Ok(pins) => {
            out.push_str("GPIO  Function\n");
            for (pin, owner) in pins {
                out.push_str(&format!("{pin:>4}  {owner}\n"));
            }
        }
        Err(err) => {
            out.push_str(&format!("Pin map unavailable: {err}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootforge::catalogue;

    #[test]
    fn setup_lists_credentials_and_network() {
        let profile = catalogue::find("pi-zero2w-headless").expect("profile");
        let text = setup(&profile);
        assert!(text.contains("Username: admin"));
        assert!(text.contains("ssh admin@zero.local"));
        assert!(text.contains("SSID: home"));
        assert!(!text.contains("hunter2-hunter2"));
    }

    #[test]
    fn pinout_lists_display_pins_in_order() {
        let profile = catalogue::find("pi4-ili9486-35").expect("profile");
        let text = pinout(&profile);
        let dc = text.find("  24  display dc").expect("dc pin listed");
        let reset = text.find("  25  display reset").expect("reset pin listed");
        assert!(dc < reset);
        assert!(text.contains("  26  gpio shutdown-button"));
    }
}
