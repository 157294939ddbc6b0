//! Kernel module resolution.
//!
//! Modules are listed dependency-first: every bus driver precedes the
//! peripheral drivers that sit on it, and each module appears once.

use bootforge::DeviceProfile;

/// SPI controller driver.
pub const SPI_DRIVER: &str = "spi_bcm2835";
/// I2C controller driver.
pub const I2C_DRIVER: &str = "i2c_bcm2835";
/// Framebuffer core shared by every `fb_*` panel driver.
pub const FBTFT: &str = "fbtft";

/// Modules that must be loaded before `module`.
fn dependencies(module: &str) -> &'static [&'static str] {
    if module.starts_with("fb_") {
        &[SPI_DRIVER, FBTFT]
    } else if module == FBTFT || module == "ads7846" {
        &[SPI_DRIVER]
    } else if module == "i2c-dev" || module == "i2c_dev" {
        &[I2C_DRIVER]
    } else {
        &[]
    }
}

fn push_with_dependencies(list: &mut Vec<String>, module: &str) {
    for dependency in dependencies(module) {
        push_with_dependencies(list, dependency);
    }
    if !list.iter().any(|existing| existing == module) {
        list.push(module.to_owned());
    }
}

/// Resolve the ordered module list for `profile`.
///
/// # Examples
///
/// ```
/// use bootforge_provisioner::overlay::modules;
///
/// let profile = bootforge::catalogue::find("pi4-ili9486-35").unwrap();
/// let list = modules::resolve(&profile);
/// let spi = list.iter().position(|m| m == "spi_bcm2835").unwrap();
/// let panel = list.iter().position(|m| m == "fb_ili9486").unwrap();
/// assert!(spi < panel);
/// ```
#[must_use]
pub fn resolve(profile: &DeviceProfile) -> Vec<String> {
    let mut list = Vec::new();
    if profile.buses.spi {
        push_with_dependencies(&mut list, SPI_DRIVER);
    }
    if profile.buses.i2c {
        push_with_dependencies(&mut list, I2C_DRIVER);
    }
    if let Some(display) = &profile.display {
        push_with_dependencies(&mut list, &display.kernel_module());
    }
    if let Some(touch) = &profile.touch {
        push_with_dependencies(&mut list, &touch.controller);
    }
    for module in &profile.kernel_modules {
        push_with_dependencies(&mut list, module);
    }
    list
}

pub(super) fn render(profile: &DeviceProfile, modules: &[String]) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Kernel modules for {}, loaded in order.\n", profile.name));
    for module in modules {
        out.push_str(module);
        out.push('\n');
    }
    out
}

/// Module names listed in a rendered `modules.conf`.
#[must_use]
pub fn parse(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}
