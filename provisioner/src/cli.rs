//! CLI argument definitions for `bootforge`.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the main entrypoint to keep the binary small and focused on
//! orchestration.

use crate::artifact::{ArtifactFormat, ArtifactRef, ArtifactSource, Sha256Digest, Signature};
use crate::error::Result;
use bootforge::DeviceProfile;
use bootforge::config::IntegrityConfig;
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Provision single-board computer boot media.
#[derive(Parser, Debug)]
#[command(name = "bootforge")]
#[command(version, about)]
#[command(long_about = concat!(
    "Provision single-board computer boot media.\n\n",
    "bootforge downloads a base OS image, checks its integrity, writes it to an ",
    "SD card or USB drive after an explicit confirmation, and then overlays the ",
    "device configuration (display, touch, GPIO, network, first-boot setup) onto ",
    "the boot partition before verifying the result.\n\n",
    "Writing destroys everything on the selected medium. bootforge always asks ",
    "you to type YES before writing, and asks again if the medium changes.",
))]
#[command(after_help = concat!(
    "EXIT STATUS:\n",
    "  0  configuration verified without findings\n",
    "  1  the run failed, or the arguments or configuration were invalid\n",
    "  2  configuration verified with warnings\n",
    "  3  configuration verified with errors\n\n",
    "EXAMPLES:\n",
    "  List removable media:\n",
    "    $ bootforge media\n\n",
    "  Provision a Pi 4 with a 3.5\" display:\n",
    "    $ bootforge provision -p pi4-ili9486-35 -i https://example.org/os.img.xz \\\n",
    "        -d /dev/sdb --boot-mount /media/$USER/bootfs\n\n",
    "  Preview the configuration without touching a medium:\n",
    "    $ bootforge render -p pi4-ili9486-35 -o ./preview\n\n",
    "  Re-check an already provisioned card:\n",
    "    $ bootforge verify -p pi4-ili9486-35 --boot-mount /media/$USER/bootfs",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file [default: platform config dir]/config.toml.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Directory for downloaded artifacts and lock files [default: platform-specific].
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Increase output verbosity (repeatable).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        global = true,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Suppress progress output.
    #[arg(short, long, global = true, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Write a base image to a medium and configure it for a device.
    Provision(ProvisionArgs),

    /// Render a device configuration into a directory without writing a medium.
    Render(RenderArgs),

    /// Verify the configuration on an already mounted boot partition.
    Verify(VerifyArgs),

    /// List built-in device profiles.
    Profiles(ListArgs),

    /// List removable media.
    Media(ListArgs),
}

/// Selects the device profile, by catalogue name or from a TOML file.
#[derive(Args, Debug, Clone, Default)]
#[group(required = true, multiple = false)]
pub struct ProfileArgs {
    /// Built-in profile name (see `bootforge profiles`).
    #[arg(short, long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Device profile TOML file.
    #[arg(long, value_name = "FILE")]
    pub profile_file: Option<Utf8PathBuf>,
}

impl ProfileArgs {
    /// Load the selected profile.
    ///
    /// # Errors
    ///
    /// Returns a profile error when the name is unknown or the file cannot be
    /// read or parsed.
    pub fn load(&self) -> Result<DeviceProfile> {
        let profile = match &self.profile_file {
            Some(path) => DeviceProfile::load(path)?,
            None => bootforge::catalogue::find(self.profile.as_deref().unwrap_or_default())?,
        };
        Ok(profile)
    }
}

/// Arguments for the provision command.
#[derive(Args, Debug, Clone)]
pub struct ProvisionArgs {
    /// Device profile.
    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Base image URL or local path.
    #[arg(short, long, value_name = "URL|PATH")]
    pub image: String,

    /// Expected SHA-256 of the image as downloaded.
    #[arg(long, value_name = "HEX")]
    pub sha256: Option<Sha256Digest>,

    /// Expected container format (xz, gzip, zstd, zip, raw).
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<ArtifactFormat>,

    /// Smallest plausible image size in bytes [default: from configuration].
    #[arg(long, value_name = "BYTES")]
    pub min_size: Option<u64>,

    /// Destination block device, e.g. /dev/sdb.
    #[arg(short, long, value_name = "DEVICE")]
    pub device: Utf8PathBuf,

    /// Mount point of the medium's boot partition after writing.
    #[arg(long, value_name = "DIR")]
    pub boot_mount: Utf8PathBuf,

    /// Print the final report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ProvisionArgs {
    /// The artifact described by these arguments, bounded by `limits`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bootforge::config::IntegrityConfig;
    /// use bootforge_provisioner::cli::{Cli, Command};
    /// use clap::Parser;
    ///
    /// let cli = Cli::parse_from([
    ///     "bootforge", "provision", "-p", "pi4-ili9486-35",
    ///     "-i", "os.img", "-d", "/dev/sdb", "--boot-mount", "/mnt",
    ///     "--min-size", "4096",
    /// ]);
    /// let Command::Provision(args) = cli.command else { unreachable!() };
    /// let artifact = args.artifact(&IntegrityConfig::default());
    /// assert_eq!(artifact.min_size, 4096);
    /// assert!(artifact.signature.is_none());
    /// ```
    #[must_use]
    pub fn artifact(&self, limits: &IntegrityConfig) -> ArtifactRef {
        let mut artifact = ArtifactRef::new(ArtifactSource::parse(&self.image), limits);
        if let Some(min_size) = self.min_size {
            artifact = artifact.with_min_size(min_size);
        }
        if self.sha256.is_some() || self.format.is_some() {
            artifact = artifact.with_signature(Signature {
                format: self.format,
                sha256: self.sha256.clone(),
            });
        }
        artifact
    }
}

/// Arguments for the render command.
#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Device profile.
    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Directory to render into; created when missing.
    #[arg(short, long, value_name = "DIR")]
    pub out: Utf8PathBuf,
}

/// Arguments for the verify command.
#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Device profile the surface should match.
    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Mount point of the boot partition to check.
    #[arg(long, value_name = "DIR")]
    pub boot_mount: Utf8PathBuf,

    /// Print the verification result as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the listing commands.
#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Output in JSON format.
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
