//! Wireless credential fragments.
//!
//! Credentials are rendered in exactly one schema per bundle and never appear
//! in any other generated file.

use bootforge::profile::{KeyManagement, NetworkProfile, NetworkSchema};
use sha2::{Digest, Sha256};

/// NetworkManager connection name.
pub const CONNECTION_ID: &str = "bootforge-wifi";

pub(super) fn render(hostname: &str, network: &NetworkProfile) -> String {
    match network.schema {
        NetworkSchema::WpaSupplicant => wpa_supplicant(hostname, network),
        NetworkSchema::NetworkManager => network_manager(hostname, network),
    }
}

/// The line carrying the SSID in a fragment of `schema`.
#[must_use]
pub fn ssid_line(schema: NetworkSchema, ssid: &str) -> String {
    match schema {
        NetworkSchema::WpaSupplicant => format!("ssid=\"{ssid}\""),
        NetworkSchema::NetworkManager => format!("ssid={ssid}"),
    }
}

/// Extract the pre-shared key from a fragment of `schema`.
#[must_use]
pub fn find_psk(schema: NetworkSchema, content: &str) -> Option<String> {
    content.lines().map(str::trim).find_map(|line| match schema {
        NetworkSchema::WpaSupplicant => line
            .strip_prefix("psk=\"")
            .and_then(|rest| rest.strip_suffix('"'))
            .map(str::to_owned),
        NetworkSchema::NetworkManager => line.strip_prefix("psk=").map(str::to_owned),
    })
}

fn wpa_supplicant(hostname: &str, network: &NetworkProfile) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Generated by bootforge for {hostname}.\n"));
    out.push_str("ctrl_interface=DIR=/var/run/wpa_supplicant GROUP=netdev\n");
    out.push_str("update_config=1\n");
    out.push_str(&format!("country={}\n", network.country));
    out.push_str("\nnetwork={\n");
    out.push_str(&format!("    {}\n", ssid_line(NetworkSchema::WpaSupplicant, &network.ssid)));
    match network.key_mgmt {
        KeyManagement::WpaPsk => {
            out.push_str(&format!("    psk=\"{}\"\n", network.psk));
            out.push_str("    key_mgmt=WPA-PSK\n");
        }
        KeyManagement::Sae => {
            out.push_str(&format!("    psk=\"{}\"\n", network.psk));
            out.push_str("    key_mgmt=SAE\n    ieee80211w=2\n");
        }
        KeyManagement::Open => out.push_str("    key_mgmt=NONE\n"),
    }
    if network.hidden {
        out.push_str("    scan_ssid=1\n");
    }
    if !network.wifi {
        out.push_str("    disabled=1\n");
    }
    out.push_str("}\n");
    out
}

fn network_manager(hostname: &str, network: &NetworkProfile) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Generated by bootforge for {hostname}.\n"));
    out.push_str("[connection]\n");
    out.push_str(&format!("id={CONNECTION_ID}\n"));
    out.push_str(&format!("uuid={}\n", connection_uuid(hostname, &network.ssid)));
    out.push_str("type=wifi\ninterface-name=wlan0\n");
    out.push_str(&format!("autoconnect={}\n", network.wifi));
    out.push_str("\n[wifi]\nmode=infrastructure\n");
    out.push_str(&format!("{}\n", ssid_line(NetworkSchema::NetworkManager, &network.ssid)));
    if network.hidden {
        out.push_str("hidden=true\n");
    }
    match network.key_mgmt {
        KeyManagement::WpaPsk => {
            out.push_str(&format!("\n[wifi-security]\nkey-mgmt=wpa-psk\npsk={}\n", network.psk));
        }
        KeyManagement::Sae => {
            out.push_str(&format!("\n[wifi-security]\nkey-mgmt=sae\npsk={}\n", network.psk));
        }
        KeyManagement::Open => {}
    }
    out.push_str("\n[ipv4]\nmethod=auto\n\n[ipv6]\naddr-gen-mode=default\nmethod=auto\n");
    out
}

/// Byte lengths of the dash-separated UUID groups.
const UUID_GROUPS: [usize; 5] = [4, 2, 2, 2, 6];

/// Stable UUID for the connection so rebuilds are byte-identical.
fn connection_uuid(hostname: &str, ssid: &str) -> String {
    let digest = Sha256::digest(format!("{CONNECTION_ID}:{hostname}:{ssid}").as_bytes());
    let mut bytes = [0_u8; 16];
    for (slot, byte) in bytes.iter_mut().zip(digest.iter()) {
        *slot = *byte;
    }
    bytes[6] = (bytes[6] & 0x0F) | 0x50;
    bytes[8] = (bytes[8] & 0x3F) | 0x80;

    let mut remaining = bytes.as_slice();
    let mut groups = Vec::with_capacity(UUID_GROUPS.len());
    for len in UUID_GROUPS {
        let (group, rest) = remaining.split_at(len);
        groups.push(group.iter().map(|b| format!("{b:02x}")).collect::<String>());
        remaining = rest;
    }
    groups.join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn network(schema: NetworkSchema, key_mgmt: KeyManagement) -> NetworkProfile {
        NetworkProfile {
            schema,
            country: "GB".to_owned(),
            ssid: "NetA".to_owned(),
            psk: "Secret1".to_owned(),
            key_mgmt,
            hidden: false,
            wifi: true,
            ethernet: true,
        }
    }

    #[test]
    fn wpa_fragment_carries_country_and_credentials() {
        let text = render("pi", &network(NetworkSchema::WpaSupplicant, KeyManagement::WpaPsk));
        assert!(text.contains("country=GB\n"));
        assert!(text.contains("    ssid=\"NetA\"\n"));
        assert!(text.contains("    psk=\"Secret1\"\n"));
        assert!(text.contains("key_mgmt=WPA-PSK"));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn open_network_has_no_psk() {
        let text = render("pi", &network(NetworkSchema::WpaSupplicant, KeyManagement::Open));
        assert!(text.contains("key_mgmt=NONE"));
        assert!(!text.contains("psk="));
    }

    #[test]
    fn network_manager_keyfile_uses_sae() {
        let mut profile = network(NetworkSchema::NetworkManager, KeyManagement::Sae);
        profile.hidden = true;
        let text = render("pi", &profile);
        assert!(text.contains("[wifi]\nmode=infrastructure\nssid=NetA\nhidden=true\n"));
        assert!(text.contains("key-mgmt=sae\npsk=Secret1\n"));
    }

    #[rstest]
    #[case::wpa(NetworkSchema::WpaSupplicant)]
    #[case::nm(NetworkSchema::NetworkManager)]
    fn psk_can_be_read_back(#[case] schema: NetworkSchema) {
        let text = render("pi", &network(schema, KeyManagement::WpaPsk));
        assert_eq!(find_psk(schema, &text).as_deref(), Some("Secret1"));
        assert!(text.contains(&ssid_line(schema, "NetA")));
    }

    #[test]
    fn connection_uuid_is_stable_and_well_formed() {
        let first = connection_uuid("pi", "NetA");
        assert_eq!(first, connection_uuid("pi", "NetA"));
        assert_ne!(first, connection_uuid("pi", "NetB"));
        assert_eq!(first.len(), 36);
        assert_eq!(first.as_bytes()[14], b'5');
        let lengths: Vec<usize> = first.split('-').map(str::len).collect();
        assert_eq!(lengths, [8, 4, 4, 4, 12]);
        assert!(matches!(first.as_bytes()[19], b'8' | b'9' | b'a' | b'b'));
    }
}
