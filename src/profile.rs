//! Device profile schema and validation.
//!
//! A [`DeviceProfile`] is the declarative description of one target board
//! together with its attached peripherals. Profiles come either from the
//! built-in [`catalogue`](crate::catalogue) or from a user-supplied TOML file.
//! Every string that ends up inside a generated shell script or boot
//! configuration line is restricted to a conservative character set here, so
//! later rendering stages never need to escape anything.

use crate::error::{ProfileError, Result};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Highest BCM GPIO number exposed on the 40-pin header.
pub const MAX_GPIO_PIN: u8 = 27;

/// GPIO used by SPI0 chip-select 0.
pub const SPI0_CE0: u8 = 8;

/// GPIO used by SPI0 chip-select 1.
pub const SPI0_CE1: u8 = 7;

const SPI0_PINS: [u8; 3] = [9, 10, 11];
const I2C1_PINS: [u8; 2] = [2, 3];
const UART0_PINS: [u8; 2] = [14, 15];

/// Immutable description of a target device.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeviceProfile {
    /// Catalogue name of the profile, e.g. `pi4-ili9486-35`.
    pub name: String,
    /// Human-readable board description.
    pub board: String,
    /// Hostname assigned on first boot.
    pub hostname: String,
    /// SPI display attached to the board, if any.
    #[serde(default)]
    pub display: Option<DisplayProfile>,
    /// Touch controller attached to the board, if any.
    #[serde(default)]
    pub touch: Option<TouchProfile>,
    /// Additional GPIO pin assignments.
    #[serde(default)]
    pub gpio: Vec<GpioAssignment>,
    /// Buses to enable.
    #[serde(default)]
    pub buses: Buses,
    /// On-board peripheral switches.
    #[serde(default)]
    pub peripherals: Peripherals,
    /// LED trigger assignments.
    #[serde(default)]
    pub leds: LedTriggers,
    /// Wireless network credentials, if the device should join a network.
    #[serde(default)]
    pub network: Option<NetworkProfile>,
    /// Operating-system level settings.
    pub system: SystemProfile,
    /// Extra kernel modules to load after the ones implied by peripherals.
    #[serde(default)]
    pub kernel_modules: Vec<String>,
}

/// Parameters for an SPI display driven through the `fbtft` overlay.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DisplayProfile {
    /// Controller driver name, e.g. `ili9486`.
    pub driver: String,
    /// Horizontal resolution in pixels.
    pub width: u16,
    /// Vertical resolution in pixels.
    pub height: u16,
    /// Panel rotation.
    #[serde(default)]
    pub rotation: Rotation,
    /// Refresh rate in frames per second.
    pub refresh_hz: u16,
    /// SPI clock in hertz.
    pub spi_speed_hz: u32,
    /// Pin wiring.
    pub pins: DisplayPins,
}

impl DisplayProfile {
    /// Kernel module implementing the panel driver.
    #[must_use]
    pub fn kernel_module(&self) -> String {
        format!("fb_{}", self.driver)
    }
}

/// Pin wiring of an SPI display.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DisplayPins {
    /// Chip-select GPIO (must be CE0 or CE1).
    pub cs: u8,
    /// Data/command GPIO.
    pub dc: u8,
    /// Reset GPIO.
    pub reset: u8,
    /// Backlight GPIO, when the backlight is switchable.
    #[serde(default)]
    pub backlight: Option<u8>,
}

/// Panel rotation in degrees.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, Eq, PartialEq, Hash)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    /// No rotation.
    #[default]
    Deg0,
    /// Rotated 90 degrees clockwise.
    Deg90,
    /// Rotated 180 degrees.
    Deg180,
    /// Rotated 270 degrees clockwise.
    Deg270,
}

impl Rotation {
    /// Return the rotation in degrees.
    #[must_use]
    pub const fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }
}

impl TryFrom<u16> for Rotation {
    type Error = ProfileError;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            other => Err(ProfileError::InvalidRotation { value: other }),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.degrees())
    }
}

/// Resistive touch controller sharing the SPI bus with the display.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TouchProfile {
    /// Controller overlay and kernel module name, e.g. `ads7846`.
    pub controller: String,
    /// Chip-select GPIO (must be CE0 or CE1).
    pub cs: u8,
    /// Pen-interrupt GPIO.
    pub irq_pin: u8,
    /// SPI clock in hertz.
    pub speed_hz: u32,
    /// Raw ADC calibration extents.
    pub calibration: Calibration,
    /// Swap the X and Y axes.
    #[serde(default)]
    pub swap_xy: bool,
    /// Invert the X axis.
    #[serde(default)]
    pub invert_x: bool,
    /// Invert the Y axis.
    #[serde(default)]
    pub invert_y: bool,
}

/// Raw ADC range reported by the touch controller.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Calibration {
    /// Minimum raw X reading.
    pub x_min: u16,
    /// Maximum raw X reading.
    pub x_max: u16,
    /// Minimum raw Y reading.
    pub y_min: u16,
    /// Maximum raw Y reading.
    pub y_max: u16,
    /// Maximum pressure value.
    #[serde(default = "Calibration::default_pressure_max")]
    pub pressure_max: u16,
}

impl Calibration {
    const fn default_pressure_max() -> u16 {
        255
    }
}

/// A single GPIO pin assignment.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GpioAssignment {
    /// BCM pin number.
    pub pin: u8,
    /// What the pin is wired to, e.g. `shutdown-button`.
    pub label: String,
    /// Pin direction and initial state.
    pub mode: GpioMode,
}

/// Direction and pull/level configuration of a GPIO pin.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum GpioMode {
    /// Input without pull resistor.
    Input,
    /// Input with pull-up.
    InputPullUp,
    /// Input with pull-down.
    InputPullDown,
    /// Output driven low.
    OutputLow,
    /// Output driven high.
    OutputHigh,
}

impl GpioMode {
    /// Return the firmware `gpio=` directive value for this mode.
    #[must_use]
    pub const fn directive(self) -> &'static str {
        match self {
            Self::Input => "ip,pn",
            Self::InputPullUp => "ip,pu",
            Self::InputPullDown => "ip,pd",
            Self::OutputLow => "op,dl",
            Self::OutputHigh => "op,dh",
        }
    }
}

/// Bus enablement switches.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Buses {
    /// Enable SPI0.
    pub spi: bool,
    /// Enable the ARM I2C bus.
    pub i2c: bool,
    /// Enable the primary UART.
    pub uart: bool,
}

/// On-board peripheral switches.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Peripherals {
    /// Enable analogue audio.
    pub audio: bool,
    /// Keep Bluetooth enabled.
    pub bluetooth: bool,
    /// Keep camera auto-detection enabled.
    pub camera: bool,
}

/// LED trigger assignments.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LedTriggers {
    /// Trigger for the green activity LED, e.g. `mmc0` or `heartbeat`.
    pub activity: Option<String>,
    /// Trigger for the red power LED, e.g. `default-on`.
    pub power: Option<String>,
}

/// Wireless network configuration.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NetworkProfile {
    /// Configuration format to render credentials in.
    #[serde(default)]
    pub schema: NetworkSchema,
    /// ISO 3166-1 alpha-2 regulatory domain.
    pub country: String,
    /// Network name.
    pub ssid: String,
    /// Pre-shared key. Ignored for open networks.
    #[serde(default)]
    pub psk: String,
    /// Key-management mode.
    #[serde(default)]
    pub key_mgmt: KeyManagement,
    /// The network does not broadcast its SSID.
    #[serde(default)]
    pub hidden: bool,
    /// Bring the wireless interface up.
    #[serde(default = "enabled")]
    pub wifi: bool,
    /// Bring the wired interface up.
    #[serde(default = "enabled")]
    pub ethernet: bool,
}

const fn enabled() -> bool {
    true
}

/// Supported network credential formats.
///
/// Exactly one schema is used per generated bundle.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkSchema {
    /// Legacy `wpa_supplicant.conf` on the boot partition.
    #[default]
    WpaSupplicant,
    /// NetworkManager keyfile (`.nmconnection`).
    NetworkManager,
}

impl fmt::Display for NetworkSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WpaSupplicant => f.write_str("wpa-supplicant"),
            Self::NetworkManager => f.write_str("network-manager"),
        }
    }
}

/// Wireless key-management mode.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum KeyManagement {
    /// WPA2 personal.
    #[default]
    WpaPsk,
    /// WPA3 personal.
    Sae,
    /// No encryption.
    Open,
}

/// Operating-system level settings.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SystemProfile {
    /// Default locale, e.g. `en_GB.UTF-8`.
    pub locale: String,
    /// IANA timezone, e.g. `Europe/London`.
    pub timezone: String,
    /// Console keyboard layout, e.g. `gb`.
    pub keyboard_layout: String,
    /// Default account seed.
    pub account: Account,
    /// Enable the SSH server on first boot.
    #[serde(default)]
    pub ssh: bool,
    /// Packages to install on first boot, in order.
    #[serde(default)]
    pub packages: Vec<String>,
}

/// Default login account.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Account {
    /// Login name.
    pub username: String,
    /// Initial password.
    pub password: String,
}

impl DeviceProfile {
    /// Parse and validate a profile from TOML source.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Parse`] for malformed TOML and any validation
    /// error reported by [`DeviceProfile::validate`].
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let profile: Self = toml::from_str(source).map_err(|e| ProfileError::Parse {
            reason: e.to_string(),
        })?;
        profile.validate()?;
        Ok(profile)
    }

    /// Read, parse, and validate a profile file.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Read`] if the file cannot be read, otherwise
    /// the errors of [`DeviceProfile::from_toml_str`].
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| ProfileError::Read {
            path: path.to_owned(),
            source,
        })?;
        log::debug!("loaded device profile from {path}");
        Self::from_toml_str(&source)
    }

    /// Check every cross-field invariant of the profile.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        check_chars("name", &self.name, is_name_char)?;
        check_chars("hostname", &self.hostname, is_hostname_char)?;
        if self.hostname.len() > 63 || self.hostname.starts_with('-') {
            return Err(ProfileError::InvalidField {
                field: "hostname",
                reason: "must be at most 63 characters and not start with '-'".to_owned(),
            });
        }
        if self.board.contains(['\n', '\r']) {
            return Err(ProfileError::InvalidField {
                field: "board",
                reason: "must be a single line".to_owned(),
            });
        }
        self.validate_display_and_touch()?;
        self.validate_pins()?;
        for led in [&self.leds.activity, &self.leds.power].into_iter().flatten() {
            check_chars("leds", led, is_module_char)?;
        }
        if let Some(network) = &self.network {
            validate_network(network)?;
        }
        validate_system(&self.system)?;
        for module in &self.kernel_modules {
            check_chars("kernel_modules", module, is_module_char)?;
        }
        Ok(())
    }

    fn validate_display_and_touch(&self) -> Result<()> {
        if let Some(display) = &self.display {
            check_chars("display.driver", &display.driver, is_module_char)?;
            if !self.buses.spi {
                return Err(ProfileError::BusRequired {
                    peripheral: "display",
                    bus: "spi",
                });
            }
            check_chip_select("display", display.pins.cs)?;
            if display.width == 0 || display.height == 0 || display.refresh_hz == 0 {
                return Err(ProfileError::InvalidField {
                    field: "display",
                    reason: "resolution and refresh rate must be non-zero".to_owned(),
                });
            }
        }
        if let Some(touch) = &self.touch {
            check_chars("touch.controller", &touch.controller, is_module_char)?;
            if !self.buses.spi {
                return Err(ProfileError::BusRequired {
                    peripheral: "touch",
                    bus: "spi",
                });
            }
            check_chip_select("touch", touch.cs)?;
            if let Some(display) = &self.display {
                if display.pins.cs == touch.cs {
                    return Err(ProfileError::SharedChipSelect { pin: touch.cs });
                }
            }
            let cal = touch.calibration;
            if cal.x_min >= cal.x_max {
                return Err(ProfileError::InvalidCalibration {
                    axis: 'x',
                    min: cal.x_min,
                    max: cal.x_max,
                });
            }
            if cal.y_min >= cal.y_max {
                return Err(ProfileError::InvalidCalibration {
                    axis: 'y',
                    min: cal.y_min,
                    max: cal.y_max,
                });
            }
        }
        Ok(())
    }

    /// Every GPIO claimed by the profile, keyed by pin, in pin order.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::PinConflict`] when two different functions
    /// claim the same pin, or [`ProfileError::InvalidPin`] for pins outside
    /// the header range.
    pub fn pin_map(&self) -> Result<BTreeMap<u8, String>> {
        let mut claims: BTreeMap<u8, String> = BTreeMap::new();
        let mut claim = |pin: u8, owner: String| -> Result<()> {
            if pin > MAX_GPIO_PIN {
                return Err(ProfileError::InvalidPin { pin, owner });
            }
            match claims.get(&pin) {
                Some(existing) if *existing != owner => Err(ProfileError::PinConflict {
                    pin,
                    first: existing.clone(),
                    second: owner,
                }),
                Some(_) => Ok(()),
                None => {
                    claims.insert(pin, owner);
                    Ok(())
                }
            }
        };

        if self.buses.spi {
            for pin in SPI0_PINS {
                claim(pin, "spi0".to_owned())?;
            }
            claim(SPI0_CE0, "spi0 ce0".to_owned())?;
            claim(SPI0_CE1, "spi0 ce1".to_owned())?;
        }
        if self.buses.i2c {
            for pin in I2C1_PINS {
                claim(pin, "i2c1".to_owned())?;
            }
        }
        if self.buses.uart {
            for pin in UART0_PINS {
                claim(pin, "uart0".to_owned())?;
            }
        }
        if let Some(display) = &self.display {
            claim(display.pins.dc, "display dc".to_owned())?;
            claim(display.pins.reset, "display reset".to_owned())?;
            if let Some(backlight) = display.pins.backlight {
                claim(backlight, "display backlight".to_owned())?;
            }
        }
        if let Some(touch) = &self.touch {
            claim(touch.irq_pin, "touch irq".to_owned())?;
        }
        for assignment in &self.gpio {
            claim(assignment.pin, format!("gpio {}", assignment.label))?;
        }
        Ok(claims)
    }

    fn validate_pins(&self) -> Result<()> {
        for assignment in &self.gpio {
            check_chars("gpio.label", &assignment.label, is_name_char)?;
        }
        self.pin_map().map(|_| ())
    }
}

const fn check_chip_select(owner: &'static str, pin: u8) -> Result<()> {
    if pin == SPI0_CE0 || pin == SPI0_CE1 {
        Ok(())
    } else {
        Err(ProfileError::InvalidChipSelect { owner, pin })
    }
}

fn validate_network(network: &NetworkProfile) -> Result<()> {
    let country = network.country.as_str();
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ProfileError::InvalidCountry {
            value: network.country.clone(),
        });
    }
    if network.ssid.is_empty() || network.ssid.len() > 32 {
        return Err(ProfileError::InvalidField {
            field: "network.ssid",
            reason: "must be between 1 and 32 bytes".to_owned(),
        });
    }
    check_quoted("network.ssid", &network.ssid)?;
    if network.key_mgmt != KeyManagement::Open && network.psk.is_empty() {
        return Err(ProfileError::InvalidField {
            field: "network.psk",
            reason: "is required unless key_mgmt is \"open\"".to_owned(),
        });
    }
    check_quoted("network.psk", &network.psk)
}

fn validate_system(system: &SystemProfile) -> Result<()> {
    check_chars("system.locale", &system.locale, |c| {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '@')
    })?;
    check_chars("system.timezone", &system.timezone, |c| {
        c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '+' | '-')
    })?;
    check_chars("system.keyboard_layout", &system.keyboard_layout, |c| {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '-')
    })?;
    check_chars("system.account.username", &system.account.username, |c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-')
    })?;
    if system.account.password.is_empty() || system.account.password.contains(['\n', '\r']) {
        return Err(ProfileError::InvalidField {
            field: "system.account.password",
            reason: "must be a non-empty single line".to_owned(),
        });
    }
    for package in &system.packages {
        check_chars("system.packages", package, |c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '.' | '-')
        })?;
    }
    Ok(())
}

fn check_chars(field: &'static str, value: &str, allowed: impl Fn(char) -> bool) -> Result<()> {
    if value.is_empty() {
        return Err(ProfileError::InvalidField {
            field,
            reason: "must not be empty".to_owned(),
        });
    }
    value.chars().find(|c| !allowed(*c)).map_or(Ok(()), |bad| {
        Err(ProfileError::InvalidField {
            field,
            reason: format!("contains unsupported character {bad:?} in \"{value}\""),
        })
    })
}

fn check_quoted(field: &'static str, value: &str) -> Result<()> {
    if value.chars().any(|c| c == '"' || c == '\\' || c.is_control()) {
        return Err(ProfileError::InvalidField {
            field,
            reason: "must not contain quotes, backslashes, or control characters".to_owned(),
        });
    }
    Ok(())
}

const fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

const fn is_hostname_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
}

const fn is_module_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue;
    use rstest::rstest;

    fn display_profile() -> DeviceProfile {
        catalogue::find("pi4-ili9486-35").expect("built-in profile")
    }

    #[rstest]
    fn catalogue_profiles_are_valid() {
        for profile in catalogue::builtin_profiles() {
            profile
                .validate()
                .unwrap_or_else(|e| panic!("{} failed validation: {e}", profile.name));
        }
    }

    #[rstest]
    #[case::zero(0, Rotation::Deg0)]
    #[case::ninety(90, Rotation::Deg90)]
    #[case::half(180, Rotation::Deg180)]
    #[case::three_quarter(270, Rotation::Deg270)]
    fn rotation_accepts_right_angles(#[case] degrees: u16, #[case] expected: Rotation) {
        assert_eq!(Rotation::try_from(degrees).expect("valid rotation"), expected);
        assert_eq!(u16::from(expected), degrees);
    }

    #[test]
    fn rotation_rejects_other_angles() {
        let err = Rotation::try_from(45).expect_err("45 is not a right angle");
        assert!(matches!(err, ProfileError::InvalidRotation { value: 45 }));
    }

    #[test]
    fn display_requires_spi() {
        let mut profile = display_profile();
        profile.buses.spi = false;
        let err = profile.validate().expect_err("display without SPI");
        assert!(matches!(
            err,
            ProfileError::BusRequired {
                peripheral: "display",
                ..
            }
        ));
    }

    #[test]
    fn display_and_touch_cannot_share_chip_select() {
        let mut profile = display_profile();
        if let Some(touch) = profile.touch.as_mut() {
            touch.cs = SPI0_CE0;
        }
        let err = profile.validate().expect_err("shared chip select");
        assert!(matches!(err, ProfileError::SharedChipSelect { pin: 8 }));
    }

    #[test]
    fn chip_select_must_be_ce0_or_ce1() {
        let mut profile = display_profile();
        if let Some(display) = profile.display.as_mut() {
            display.pins.cs = 22;
        }
        let err = profile.validate().expect_err("invalid chip select");
        assert!(matches!(
            err,
            ProfileError::InvalidChipSelect {
                owner: "display",
                pin: 22
            }
        ));
    }

    #[test]
    fn gpio_assignment_on_display_pin_conflicts() {
        let mut profile = display_profile();
        profile.gpio.push(GpioAssignment {
            pin: 24,
            label: "button".to_owned(),
            mode: GpioMode::InputPullUp,
        });
        let err = profile.validate().expect_err("pin 24 is display dc");
        match err {
            ProfileError::PinConflict { pin, first, second } => {
                assert_eq!(pin, 24);
                assert_eq!(first, "display dc");
                assert_eq!(second, "gpio button");
            }
            other => panic!("expected PinConflict, got {other:?}"),
        }
    }

    #[test]
    fn pins_beyond_header_are_rejected() {
        let mut profile = display_profile();
        profile.gpio.push(GpioAssignment {
            pin: 40,
            label: "beyond".to_owned(),
            mode: GpioMode::Input,
        });
        let err = profile.validate().expect_err("pin 40 is off the header");
        assert!(matches!(err, ProfileError::InvalidPin { pin: 40, .. }));
    }

    #[test]
    fn inverted_calibration_is_rejected() {
        let mut profile = display_profile();
        if let Some(touch) = profile.touch.as_mut() {
            touch.calibration.y_min = 4000;
        }
        let err = profile.validate().expect_err("y_min above y_max");
        assert!(matches!(
            err,
            ProfileError::InvalidCalibration { axis: 'y', .. }
        ));
    }

    #[rstest]
    #[case::lowercase("gb")]
    #[case::too_long("GBR")]
    #[case::empty("")]
    fn country_must_be_two_uppercase_letters(#[case] country: &str) {
        let mut profile = display_profile();
        if let Some(network) = profile.network.as_mut() {
            network.country = country.to_owned();
        }
        let err = profile.validate().expect_err("invalid country");
        assert!(matches!(err, ProfileError::InvalidCountry { .. }));
    }

    #[rstest]
    #[case::quote("My\"Net")]
    #[case::newline("My\nNet")]
    #[case::too_long("abcdefghijklmnopqrstuvwxyz0123456789")]
    fn unsafe_ssids_are_rejected(#[case] ssid: &str) {
        let mut profile = display_profile();
        if let Some(network) = profile.network.as_mut() {
            network.ssid = ssid.to_owned();
        }
        assert!(profile.validate().is_err());
    }

    #[test]
    fn package_names_cannot_carry_shell_syntax() {
        let mut profile = display_profile();
        profile.system.packages.push("vim; rm -rf /".to_owned());
        let err = profile.validate().expect_err("shell syntax in package");
        assert!(matches!(
            err,
            ProfileError::InvalidField {
                field: "system.packages",
                ..
            }
        ));
    }

    #[test]
    fn open_networks_need_no_psk() {
        let mut profile = display_profile();
        if let Some(network) = profile.network.as_mut() {
            network.key_mgmt = KeyManagement::Open;
            network.psk = String::new();
        }
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn parses_minimal_toml_profile() {
        let source = r#"
name = "custom"
board = "Raspberry Pi 4 Model B"
hostname = "kiosk"

[buses]
i2c = true

[system]
locale = "en_GB.UTF-8"
timezone = "Europe/London"
keyboard_layout = "gb"
ssh = true

[system.account]
username = "pi"
password = "raspberry"
"#;
        let profile = DeviceProfile::from_toml_str(source).expect("profile should parse");
        assert_eq!(profile.name, "custom");
        assert!(profile.buses.i2c);
        assert!(!profile.buses.spi);
        assert!(profile.display.is_none());
        assert!(profile.system.ssh);
    }

    #[test]
    fn rejects_unknown_fields() {
        let source = "name = \"x\"\nboard = \"b\"\nhostname = \"h\"\nbogus = 1\n";
        let err = DeviceProfile::from_toml_str(source).expect_err("unknown field");
        assert!(matches!(err, ProfileError::Parse { .. }));
    }

    #[test]
    fn toml_rotation_must_be_right_angle() {
        let profile = display_profile();
        let rendered = toml::to_string(&profile).expect("serialise profile");
        let broken = rendered.replace("rotation = 90", "rotation = 45");
        assert!(DeviceProfile::from_toml_str(&broken).is_err());
    }

    #[test]
    fn toml_round_trip_preserves_profile() {
        let profile = display_profile();
        let rendered = toml::to_string(&profile).expect("serialise profile");
        let parsed = DeviceProfile::from_toml_str(&rendered).expect("parse profile");
        assert_eq!(parsed, profile);
    }
}
