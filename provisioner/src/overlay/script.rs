//! Idempotent first-boot script.
//!
//! The script runs once as root on the freshly booted device. Every step
//! checks before it changes anything, so a second run is a no-op.

use super::{MODULES_CONF, NM_CONNECTION};
use bootforge::DeviceProfile;
use bootforge::profile::{NetworkSchema, TouchProfile};

/// Marker written once the script has completed.
pub const DONE_MARKER: &str = "/var/lib/bootforge/firstboot.done";

const GROUPS: [&str; 6] = ["spi", "i2c", "gpio", "video", "input", "dialout"];
const X11_CALIBRATION: &str = "/etc/X11/xorg.conf.d/99-bootforge-calibration.conf";

/// Quote `value` for POSIX `sh` using single quotes.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

pub(super) fn render(profile: &DeviceProfile) -> String {
    let system = &profile.system;
    let user = &system.account.username;
    let mut out = String::new();

    out.push_str("#!/bin/sh\n");
    out.push_str(&format!("# First-boot provisioning for {}.\n", profile.name));
    out.push_str("# Safe to run more than once.\nset -eu\n\n");
    out.push_str("BOOT=/boot/firmware\n[ -d \"$BOOT\" ] || BOOT=/boot\n\n");

    out.push_str(&format!("# Hostname\nif [ \"$(hostname)\" != \"{0}\" ]; then\n", profile.hostname));
    out.push_str(&format!("    echo \"{}\" > /etc/hostname\n", profile.hostname));
    out.push_str(&format!("    hostname \"{}\"\n", profile.hostname));
    out.push_str("fi\n\n");

    out.push_str("# Default account\n");
    out.push_str(&format!("if ! id -u \"{user}\" >/dev/null 2>&1; then\n"));
    out.push_str(&format!("    useradd --create-home --shell /bin/bash \"{user}\"\n"));
    out.push_str(&format!(
        "    echo {} | chpasswd\n",
        shell_quote(&format!("{user}:{}", system.account.password))
    ));
    out.push_str("fi\n");
    out.push_str(&format!("for group in {}; do\n", GROUPS.join(" ")));
    out.push_str("    if getent group \"$group\" >/dev/null; then\n");
    out.push_str(&format!("        usermod -a -G \"$group\" \"{user}\"\n"));
    out.push_str("    fi\ndone\n\n");

    out.push_str("# Locale, timezone, keyboard\n");
    out.push_str(&format!(
        "ln -sf \"/usr/share/zoneinfo/{0}\" /etc/localtime\necho \"{0}\" > /etc/timezone\n",
        system.timezone
    ));
    out.push_str(&format!(
        "if ! grep -q \"^LANG={0}$\" /etc/default/locale 2>/dev/null; then\n    \
         echo \"LANG={0}\" > /etc/default/locale\nfi\n",
        system.locale
    ));
    out.push_str(&format!(
        "if [ -f /etc/default/keyboard ] && ! grep -q '^XKBLAYOUT=\"{0}\"' /etc/default/keyboard; then\n    \
         sed -i 's/^XKBLAYOUT=.*/XKBLAYOUT=\"{0}\"/' /etc/default/keyboard\nfi\n\n",
        system.keyboard_layout
    ));

    out.push_str("# Kernel modules\n");
    out.push_str(&format!(
        "install -D -m 644 \"$BOOT/{MODULES_CONF}\" /etc/modules-load.d/bootforge.conf\n\n"
    ));

    if let Some(network) = &profile.network {
        out.push_str("# Network\n");
        if network.schema == NetworkSchema::NetworkManager {
            out.push_str(&format!(
                "install -D -m 600 \"$BOOT/{NM_CONNECTION}\" \
                 /etc/NetworkManager/system-connections/bootforge-wifi.nmconnection\n"
            ));
        }
        out.push_str(&format!(
            "if command -v iw >/dev/null 2>&1; then\n    iw reg set {} || true\nfi\n",
            network.country
        ));
        if network.wifi {
            out.push_str("if command -v rfkill >/dev/null 2>&1; then\n    rfkill unblock wifi || true\nfi\n");
        }
        if !network.ethernet {
            out.push_str("if ip link show eth0 >/dev/null 2>&1; then\n    ip link set eth0 down || true\nfi\n");
        }
        out.push('\n');
    }

    if system.ssh {
        out.push_str("# SSH\nif command -v systemctl >/dev/null 2>&1; then\n    systemctl enable ssh || true\nfi\n\n");
    }

    if !system.packages.is_empty() {
        out.push_str("# Packages\nUPDATED=0\n");
        out.push_str(&format!("for pkg in {}; do\n", system.packages.join(" ")));
        out.push_str(
            "    if ! dpkg -s \"$pkg\" >/dev/null 2>&1; then\n        \
             if [ \"$UPDATED\" -eq 0 ]; then\n            apt-get update\n            UPDATED=1\n        \
             fi\n        DEBIAN_FRONTEND=noninteractive apt-get install -y \"$pkg\"\n    fi\ndone\n\n",
        );
    }

    if let Some(touch) = &profile.touch {
        out.push_str("# Touch calibration\n");
        out.push_str(&format!("if [ ! -f {X11_CALIBRATION} ]; then\n"));
        out.push_str("    mkdir -p /etc/X11/xorg.conf.d\n");
        out.push_str(&format!("    cat > {X11_CALIBRATION} <<'EOF'\n"));
        out.push_str(&x11_calibration(touch));
        out.push_str("EOF\nfi\n\n");
    }

    out.push_str("mkdir -p /var/lib/bootforge\n");
    out.push_str(&format!("touch {DONE_MARKER}\n"));
    out
}

/// X11 input settings for the touch controller, one line each, in the order
/// they appear in the first-boot script.
#[must_use]
pub fn touch_settings(touch: &TouchProfile) -> Vec<String> {
    let cal = touch.calibration;
    let flag = |on: bool| if on { "1" } else { "0" };
    vec![
        format!("MatchProduct \"{}\"", touch.controller.to_uppercase()),
        format!(
            "Option \"Calibration\" \"{} {} {} {}\"",
            cal.x_min, cal.x_max, cal.y_min, cal.y_max
        ),
        format!("Option \"SwapAxes\" \"{}\"", flag(touch.swap_xy)),
        format!("Option \"InvertX\" \"{}\"", flag(touch.invert_x)),
        format!("Option \"InvertY\" \"{}\"", flag(touch.invert_y)),
    ]
}

fn x11_calibration(touch: &TouchProfile) -> String {
    let mut out = String::from("Section \"InputClass\"\n    Identifier \"bootforge touch\"\n");
    for setting in touch_settings(touch) {
        out.push_str("    ");
        out.push_str(&setting);
        out.push('\n');
    }
    out.push_str("EndSection\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootforge::catalogue;
    use rstest::rstest;

    #[rstest]
    #[case::plain("pi:raspberry", "'pi:raspberry'")]
    #[case::quote("pi:it's", r"'pi:it'\''s'")]
    fn shell_quote_wraps_in_single_quotes(#[case] raw: &str, #[case] quoted: &str) {
        assert_eq!(shell_quote(raw), quoted);
    }

    #[test]
    fn script_is_strict_posix_shell() {
        let profile = catalogue::find("pi4-ili9486-35").expect("profile");
        let script = render(&profile);
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("\nset -eu\n"));
        assert!(script.ends_with(&format!("touch {DONE_MARKER}\n")));
    }

    #[test]
    fn installs_are_guarded() {
        let profile = catalogue::find("pi4-ili9486-35").expect("profile");
        let script = render(&profile);
        assert!(script.contains("if ! dpkg -s \"$pkg\""));
        assert!(script.contains("for pkg in xserver-xorg-input-evdev xinput-calibrator evtest; do"));
        assert!(script.contains("if ! id -u \"pi\""));
        assert!(script.contains(&format!("if [ ! -f {X11_CALIBRATION} ]")));
    }

    #[test]
    fn calibration_carries_inversion_flags() {
        let profile = catalogue::find("pi4-ili9486-35").expect("profile");
        let script = render(&profile);
        assert!(script.contains("Option \"Calibration\" \"200 3900 200 3900\""));
        assert!(script.contains("Option \"SwapAxes\" \"1\""));
        assert!(script.contains("Option \"InvertY\" \"1\""));
    }

    #[test]
    fn network_manager_keyfile_is_installed_privately() {
        let profile = catalogue::find("pi3-ili9341-28").expect("profile");
        let script = render(&profile);
        assert!(script.contains("install -D -m 600 \"$BOOT/bootforge/wifi.nmconnection\""));
        assert!(!script.contains("systemctl enable ssh"));
        assert!(!script.contains("workshop-pass-2024"));
    }

    #[test]
    fn headless_profile_skips_touch_and_disables_ethernet() {
        let profile = catalogue::find("pi-zero2w-headless").expect("profile");
        let script = render(&profile);
        assert!(!script.contains("InputClass"));
        assert!(script.contains("ip link set eth0 down"));
        assert!(script.contains("systemctl enable ssh"));
    }
}
