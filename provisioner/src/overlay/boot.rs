//! `config.txt` rendering.

use bootforge::DeviceProfile;
use bootforge::profile::{DisplayProfile, SPI0_CE0, TouchProfile};

/// Directive enabling SPI0.
pub const SPI_ON: &str = "dtparam=spi=on";
/// Directive enabling the ARM I2C bus.
pub const I2C_ON: &str = "dtparam=i2c_arm=on";
/// Directive enabling the primary UART.
pub const UART_ON: &str = "enable_uart=1";
/// Directive stopping the firmware from probing DSI displays.
pub const DISPLAY_AUTODETECT_OFF: &str = "display_auto_detect=0";
/// Directive disabling the official touchscreen driver.
pub const TOUCHSCREEN_OFF: &str = "disable_touchscreen=1";
/// Directive turning Bluetooth off and freeing the PL011 UART.
pub const BLUETOOTH_OFF: &str = "dtoverlay=disable-bt";

/// Camera auto-detection directive for the requested state.
#[must_use]
pub const fn camera_directive(enabled: bool) -> &'static str {
    if enabled {
        "camera_auto_detect=1"
    } else {
        "camera_auto_detect=0"
    }
}

/// Audio directive for the requested state.
#[must_use]
pub const fn audio_directive(enabled: bool) -> &'static str {
    if enabled {
        "dtparam=audio=on"
    } else {
        "dtparam=audio=off"
    }
}

/// SPI0 device name for a chip-select GPIO.
const fn spi_device(cs: u8) -> &'static str {
    if cs == SPI0_CE0 { "spi0-0" } else { "spi0-1" }
}

/// `fbtft` overlay line for a display.
#[must_use]
pub fn display_overlay(display: &DisplayProfile) -> String {
    let mut line = format!(
        "dtoverlay=fbtft,{},{},width={},height={},rotate={},fps={},speed={},dc_pin={},reset_pin={}",
        spi_device(display.pins.cs),
        display.driver,
        display.width,
        display.height,
        display.rotation,
        display.refresh_hz,
        display.spi_speed_hz,
        display.pins.dc,
        display.pins.reset,
    );
    if let Some(backlight) = display.pins.backlight {
        line.push_str(&format!(",led_pin={backlight}"));
    }
    line
}

/// Touch controller overlay line.
#[must_use]
pub fn touch_overlay(touch: &TouchProfile) -> String {
    let cal = touch.calibration;
    let mut line = format!(
        "dtoverlay={},cs={},penirq={},penirq_pull=2,speed={},xmin={},xmax={},ymin={},ymax={},pmax={}",
        touch.controller,
        u8::from(touch.cs != SPI0_CE0),
        touch.irq_pin,
        touch.speed_hz,
        cal.x_min,
        cal.x_max,
        cal.y_min,
        cal.y_max,
        cal.pressure_max,
    );
    if touch.swap_xy {
        line.push_str(",swapxy=1");
    }
    line
}

/// Every directive `config.txt` must contain for `profile`, in file order.
///
/// Used both to render the file and to verify it afterwards.
#[must_use]
pub fn expected_directives(profile: &DeviceProfile) -> Vec<String> {
    let mut lines = Vec::new();
    if profile.buses.spi {
        lines.push(SPI_ON.to_owned());
    }
    if profile.buses.i2c {
        lines.push(I2C_ON.to_owned());
    }
    if profile.buses.uart {
        lines.push(UART_ON.to_owned());
    }
    if profile.display.is_some() {
        lines.push(DISPLAY_AUTODETECT_OFF.to_owned());
    }
    lines.push(camera_directive(profile.peripherals.camera).to_owned());
    if profile.touch.is_some() {
        lines.push(TOUCHSCREEN_OFF.to_owned());
    }
    lines.push(audio_directive(profile.peripherals.audio).to_owned());
    if !profile.peripherals.bluetooth {
        lines.push(BLUETOOTH_OFF.to_owned());
    }
    if let Some(display) = &profile.display {
        lines.push(display_overlay(display));
    }
    if let Some(touch) = &profile.touch {
        lines.push(touch_overlay(touch));
    }
    if let Some(trigger) = &profile.leds.activity {
        lines.push(format!("dtparam=act_led_trigger={trigger}"));
    }
    if let Some(trigger) = &profile.leds.power {
        lines.push(format!("dtparam=pwr_led_trigger={trigger}"));
    }
    for assignment in &profile.gpio {
        lines.push(format!("gpio={}={}", assignment.pin, assignment.mode.directive()));
    }
    lines
}

pub(super) fn render(profile: &DeviceProfile) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# Generated by bootforge for profile {} ({}).\n",
        profile.name, profile.board
    ));
    out.push_str("# Re-run provisioning rather than editing this file by hand.\n\n[all]\n");

    let directives = expected_directives(profile);
    let mut section = "";
    for line in &directives {
        let heading = heading_for(line);
        if heading != section {
            out.push_str(&format!("\n# {heading}\n"));
            section = heading;
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn heading_for(directive: &str) -> &'static str {
    if directive.starts_with("dtparam=spi")
        || directive.starts_with("dtparam=i2c")
        || directive.starts_with("enable_uart")
    {
        "Buses"
    } else if directive.contains("auto_detect") || directive.starts_with("disable_touchscreen") {
        "Auto-detection"
    } else if directive.starts_with("dtparam=audio") || directive == BLUETOOTH_OFF {
        "Audio and Bluetooth"
    } else if directive.starts_with("dtoverlay=fbtft") {
        "Display"
    } else if directive.starts_with("dtoverlay=") {
        "Touch"
    } else if directive.contains("led_trigger") {
        "LEDs"
    } else {
        "GPIO"
    }
}
