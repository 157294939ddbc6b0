//! Error types for device profiles and workspace configuration.
//!
//! Messages name the offending field and the constraint it broke so that a
//! hand-edited profile can be fixed without reading the source.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while loading or validating a [`DeviceProfile`](crate::profile::DeviceProfile).
#[derive(Debug, Error)]
pub enum ProfileError {
    /// No built-in profile has the requested name.
    #[error("unknown device profile \"{name}\"; available profiles: {available}")]
    UnknownProfile {
        /// The requested name.
        name: String,
        /// Comma-separated list of catalogue names.
        available: String,
    },

    /// The profile file could not be read.
    #[error("failed to read profile {path}: {source}")]
    Read {
        /// Path of the profile file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The profile source is not valid TOML for the schema.
    #[error("invalid profile: {reason}")]
    Parse {
        /// Parser message.
        reason: String,
    },

    /// A field holds a value outside its accepted format.
    #[error("invalid profile field {field}: {reason}")]
    InvalidField {
        /// Dotted field path.
        field: &'static str,
        /// What is wrong with the value.
        reason: String,
    },

    /// Rotation is not a right angle.
    #[error("unsupported rotation {value}; expected 0, 90, 180, or 270")]
    InvalidRotation {
        /// The rejected angle.
        value: u16,
    },

    /// A peripheral was configured without the bus it sits on.
    #[error("{peripheral} requires the {bus} bus; set buses.{bus} = true")]
    BusRequired {
        /// The peripheral needing the bus.
        peripheral: &'static str,
        /// The missing bus.
        bus: &'static str,
    },

    /// A chip-select pin is not one of the SPI0 chip-select lines.
    #[error("{owner} chip-select GPIO {pin} is not SPI0 CE0 (GPIO 8) or CE1 (GPIO 7)")]
    InvalidChipSelect {
        /// The peripheral owning the chip-select.
        owner: &'static str,
        /// The rejected pin.
        pin: u8,
    },

    /// Display and touch controller use the same chip-select.
    #[error("display and touch controller both use chip-select GPIO {pin}")]
    SharedChipSelect {
        /// The shared pin.
        pin: u8,
    },

    /// Two different functions claim one GPIO.
    #[error("GPIO {pin} is claimed by both {first} and {second}")]
    PinConflict {
        /// The contested pin.
        pin: u8,
        /// The function that claimed the pin first.
        first: String,
        /// The function that claimed it second.
        second: String,
    },

    /// A pin number is outside the 40-pin header range.
    #[error("GPIO {pin} for {owner} is outside the header range 0-27")]
    InvalidPin {
        /// The rejected pin.
        pin: u8,
        /// The function that requested it.
        owner: String,
    },

    /// Touch calibration extents are empty or inverted.
    #[error("touch calibration {axis}_min ({min}) must be below {axis}_max ({max})")]
    InvalidCalibration {
        /// The offending axis.
        axis: char,
        /// Configured minimum.
        min: u16,
        /// Configured maximum.
        max: u16,
    },

    /// Country code is not an ISO 3166-1 alpha-2 code.
    #[error("invalid network country \"{value}\"; expected a two-letter code such as GB")]
    InvalidCountry {
        /// The rejected value.
        value: String,
    },
}

/// Errors raised while loading the workspace configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the schema.
    #[error("invalid configuration {path}: {reason}")]
    Parse {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Parser message.
        reason: String,
    },

    /// A setting holds a value outside its accepted range.
    #[error("invalid configuration setting {setting}: {reason}")]
    OutOfRange {
        /// Dotted setting path.
        setting: &'static str,
        /// What is wrong with the value.
        reason: String,
    },
}

/// Result type alias using [`ProfileError`].
pub type Result<T> = std::result::Result<T, ProfileError>;
