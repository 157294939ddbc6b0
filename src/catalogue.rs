//! Built-in device profiles.
//!
//! These cover the boards and SPI panels the project is tested against. Users
//! with other hardware describe it in a TOML profile instead.

use crate::error::{ProfileError, Result};
use crate::profile::{
    Account, Buses, Calibration, DeviceProfile, DisplayPins, DisplayProfile, GpioAssignment,
    GpioMode, KeyManagement, LedTriggers, NetworkProfile, NetworkSchema, Peripherals, Rotation,
    SystemProfile, TouchProfile,
};

/// Names of every built-in profile, in catalogue order.
pub const PROFILE_NAMES: &[&str] = &["pi4-ili9486-35", "pi3-ili9341-28", "pi-zero2w-headless"];

/// Return every built-in profile, in catalogue order.
#[must_use]
pub fn builtin_profiles() -> Vec<DeviceProfile> {
    vec![pi4_ili9486_35(), pi3_ili9341_28(), pi_zero2w_headless()]
}

/// Look up a built-in profile by name.
///
/// # Errors
///
/// Returns [`ProfileError::UnknownProfile`] listing the available names.
///
/// # Examples
///
/// ```
/// let profile = bootforge::catalogue::find("pi-zero2w-headless").unwrap();
/// assert!(profile.display.is_none());
/// ```
pub fn find(name: &str) -> Result<DeviceProfile> {
    builtin_profiles()
        .into_iter()
        .find(|profile| profile.name == name)
        .ok_or_else(|| ProfileError::UnknownProfile {
            name: name.to_owned(),
            available: PROFILE_NAMES.join(", "),
        })
}

/// Raspberry Pi 4 with a 3.5" ILI9486 panel and ADS7846 touch.
fn pi4_ili9486_35() -> DeviceProfile {
    DeviceProfile {
        name: "pi4-ili9486-35".to_owned(),
        board: "Raspberry Pi 4 Model B".to_owned(),
        hostname: "pi4-lcd".to_owned(),
        display: Some(DisplayProfile {
            driver: "ili9486".to_owned(),
            width: 480,
            height: 320,
            rotation: Rotation::Deg90,
            refresh_hz: 50,
            spi_speed_hz: 32_000_000,
            pins: DisplayPins {
                cs: 8,
                dc: 24,
                reset: 25,
                backlight: Some(18),
            },
        }),
        touch: Some(TouchProfile {
            controller: "ads7846".to_owned(),
            cs: 7,
            irq_pin: 17,
            speed_hz: 2_000_000,
            calibration: Calibration {
                x_min: 200,
                x_max: 3900,
                y_min: 200,
                y_max: 3900,
                pressure_max: 255,
            },
            swap_xy: true,
            invert_x: false,
            invert_y: true,
        }),
        gpio: vec![GpioAssignment {
            pin: 26,
            label: "shutdown-button".to_owned(),
            mode: GpioMode::InputPullUp,
        }],
        buses: Buses {
            spi: true,
            i2c: true,
            uart: false,
        },
        peripherals: Peripherals {
            audio: true,
            bluetooth: true,
            camera: false,
        },
        leds: LedTriggers {
            activity: Some("mmc0".to_owned()),
            power: Some("default-on".to_owned()),
        },
        network: Some(NetworkProfile {
            schema: NetworkSchema::WpaSupplicant,
            country: "GB".to_owned(),
            ssid: "bootforge-setup".to_owned(),
            psk: "change-me-now".to_owned(),
            key_mgmt: KeyManagement::WpaPsk,
            hidden: false,
            wifi: true,
            ethernet: true,
        }),
        system: SystemProfile {
            locale: "en_GB.UTF-8".to_owned(),
            timezone: "Europe/London".to_owned(),
            keyboard_layout: "gb".to_owned(),
            account: Account {
                username: "pi".to_owned(),
                password: "raspberry".to_owned(),
            },
            ssh: true,
            packages: vec![
                "xserver-xorg-input-evdev".to_owned(),
                "xinput-calibrator".to_owned(),
                "evtest".to_owned(),
            ],
        },
        kernel_modules: vec!["i2c-dev".to_owned()],
    }
}

/// Raspberry Pi 3 with a 2.8" ILI9341 panel and XPT2046 touch.
///
/// The XPT2046 is register compatible with the ADS7846 and uses its driver.
fn pi3_ili9341_28() -> DeviceProfile {
    DeviceProfile {
        name: "pi3-ili9341-28".to_owned(),
        board: "Raspberry Pi 3 Model B+".to_owned(),
        hostname: "pi3-panel".to_owned(),
        display: Some(DisplayProfile {
            driver: "ili9341".to_owned(),
            width: 320,
            height: 240,
            rotation: Rotation::Deg270,
            refresh_hz: 60,
            spi_speed_hz: 16_000_000,
            pins: DisplayPins {
                cs: 8,
                dc: 22,
                reset: 27,
                backlight: Some(18),
            },
        }),
        touch: Some(TouchProfile {
            controller: "ads7846".to_owned(),
            cs: 7,
            irq_pin: 17,
            speed_hz: 1_000_000,
            calibration: Calibration {
                x_min: 300,
                x_max: 3800,
                y_min: 250,
                y_max: 3850,
                pressure_max: 255,
            },
            swap_xy: false,
            invert_x: true,
            invert_y: false,
        }),
        gpio: vec![GpioAssignment {
            pin: 5,
            label: "status-led".to_owned(),
            mode: GpioMode::OutputLow,
        }],
        buses: Buses {
            spi: true,
            i2c: false,
            uart: true,
        },
        peripherals: Peripherals {
            audio: false,
            bluetooth: false,
            camera: false,
        },
        leds: LedTriggers {
            activity: Some("heartbeat".to_owned()),
            power: None,
        },
        network: Some(NetworkProfile {
            schema: NetworkSchema::NetworkManager,
            country: "DE".to_owned(),
            ssid: "workshop".to_owned(),
            psk: "workshop-pass-2024".to_owned(),
            key_mgmt: KeyManagement::Sae,
            hidden: true,
            wifi: true,
            ethernet: true,
        }),
        system: SystemProfile {
            locale: "de_DE.UTF-8".to_owned(),
            timezone: "Europe/Berlin".to_owned(),
            keyboard_layout: "de".to_owned(),
            account: Account {
                username: "maker".to_owned(),
                password: "maker-pass".to_owned(),
            },
            ssh: false,
            packages: vec!["evtest".to_owned()],
        },
        kernel_modules: Vec::new(),
    }
}

/// Raspberry Pi Zero 2 W without a panel, reachable over SSH.
fn pi_zero2w_headless() -> DeviceProfile {
    DeviceProfile {
        name: "pi-zero2w-headless".to_owned(),
        board: "Raspberry Pi Zero 2 W".to_owned(),
        hostname: "zero".to_owned(),
        display: None,
        touch: None,
        gpio: Vec::new(),
        buses: Buses {
            spi: false,
            i2c: true,
            uart: false,
        },
        peripherals: Peripherals::default(),
        leds: LedTriggers {
            activity: Some("heartbeat".to_owned()),
            power: None,
        },
        network: Some(NetworkProfile {
            schema: NetworkSchema::WpaSupplicant,
            country: "US".to_owned(),
            ssid: "home".to_owned(),
            psk: "hunter2-hunter2".to_owned(),
            key_mgmt: KeyManagement::WpaPsk,
            hidden: false,
            wifi: true,
            ethernet: false,
        }),
        system: SystemProfile {
            locale: "en_US.UTF-8".to_owned(),
            timezone: "America/New_York".to_owned(),
            keyboard_layout: "us".to_owned(),
            account: Account {
                username: "admin".to_owned(),
                password: "zero-admin".to_owned(),
            },
            ssh: true,
            packages: vec!["git".to_owned(), "python3-pip".to_owned()],
        },
        kernel_modules: vec!["i2c-dev".to_owned()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn names_match_profiles() {
        let names: Vec<String> = builtin_profiles().into_iter().map(|p| p.name).collect();
        assert_eq!(names, PROFILE_NAMES);
    }

    #[rstest]
    #[case::pi4("pi4-ili9486-35")]
    #[case::pi3("pi3-ili9341-28")]
    #[case::zero("pi-zero2w-headless")]
    fn find_returns_named_profile(#[case] name: &str) {
        let profile = find(name).expect("profile exists");
        assert_eq!(profile.name, name);
    }

    #[test]
    fn unknown_profile_lists_available_names() {
        let err = find("pi5-mystery").expect_err("profile should not exist");
        let msg = err.to_string();
        assert!(msg.contains("pi5-mystery"));
        assert!(msg.contains("pi4-ili9486-35"));
    }
}
