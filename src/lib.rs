//! Device profiles and workspace configuration for `bootforge`.
//!
//! A [`DeviceProfile`] describes the board, panel, touch controller, buses,
//! network, and operating-system settings a freshly written boot medium must
//! carry. The provisioning pipeline itself lives in `bootforge-provisioner`;
//! this crate only owns the declarative inputs it consumes.

pub mod catalogue;
pub mod config;
pub mod error;
pub mod profile;

pub use config::BootforgeConfig;
pub use error::{ConfigError, ProfileError};
pub use profile::DeviceProfile;
