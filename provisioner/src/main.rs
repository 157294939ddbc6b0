//! `bootforge` CLI entrypoint.
//!
//! This binary provisions SD cards and USB drives for single-board computers:
//! it acquires a base image, writes it to a confirmed medium, overlays the
//! device configuration onto the boot partition, and verifies the result.

use bootforge::{BootforgeConfig, DeviceProfile};
use bootforge::catalogue::builtin_profiles;
use bootforge_provisioner::artifact::ArtifactRef;
use bootforge_provisioner::artifact::download::HttpDownloader;
use bootforge_provisioner::artifact::extraction::ImageExtractor;
use bootforge_provisioner::cli::{Cli, Command, ListArgs, ProvisionArgs, RenderArgs, VerifyArgs};
use bootforge_provisioner::dirs::{BaseDirs, SystemBaseDirs};
use bootforge_provisioner::error::{ProvisionError, Result};
use bootforge_provisioner::lock::MediumLock;
use bootforge_provisioner::medium::{LsblkEnumerator, MediumEnumerator, find_medium};
use bootforge_provisioner::operator::TerminalOperator;
use bootforge_provisioner::output::{
    StderrProgress, format_media_human, format_media_json, format_profiles_human,
    format_profiles_json, write_stderr_line,
};
use bootforge_provisioner::overlay::{self, VERIFICATION_TXT};
use bootforge_provisioner::pipeline::{Collaborators, Orchestrator, PipelineSettings, ThreadSleeper};
use bootforge_provisioner::report::{EXIT_FAILED, EXIT_PERFECT, status_exit_code};
use bootforge_provisioner::surface::FixedSurface;
use bootforge_provisioner::verify;
use bootforge_provisioner::writer::RawDeviceWriter;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use log::LevelFilter;
use std::io::Write;
use std::process::ExitCode;

const CONFIG_FILE: &str = "config.toml";

/// What a provisioning run needs beyond its collaborators.
struct ProvisionPlan {
    profile: DeviceProfile,
    artifact: ArtifactRef,
    device: Utf8PathBuf,
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbosity, cli.quiet);
    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &SystemBaseDirs, &mut stdout, &mut stderr);
    ExitCode::from(exit_code_for_run_result(run_result, &mut stderr))
}

fn init_logging(verbosity: u8, quiet: bool) {
    env_logger::Builder::new()
        .filter_level(level_filter(verbosity, quiet))
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

/// Maps `-q` and repeated `-v` onto a log level; `RUST_LOG` still overrides.
fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn run(
    cli: &Cli,
    dirs: &dyn BaseDirs,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<u8> {
    let config = load_config(cli.config.as_deref(), dirs)?;

    match &cli.command {
        Command::Provision(args) => provision(cli, &config, dirs, args, stdout),
        Command::Render(args) => render(args, stdout, stderr),
        Command::Verify(args) => verify_surface(args, stdout),
        Command::Profiles(args) => list_profiles(args, stdout),
        Command::Media(args) => list_media(args, &LsblkEnumerator::system(), stdout),
    }
}

/// Loads the configuration from `--config`, the platform config directory,
/// or built-in defaults, in that order.
fn load_config(explicit: Option<&Utf8Path>, dirs: &dyn BaseDirs) -> Result<BootforgeConfig> {
    if let Some(path) = explicit {
        if !path.is_file() {
            return Err(bootforge::ConfigError::Read {
                path: path.to_owned(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            }
            .into());
        }
        return Ok(BootforgeConfig::load_or_default(path)?);
    }
    match dirs.config_dir() {
        Some(dir) => Ok(BootforgeConfig::load_or_default(&dir.join(CONFIG_FILE))?),
        None => Ok(BootforgeConfig::default()),
    }
}

/// Determines the cache directory: CLI flag, then configuration, then the
/// platform default.
fn resolve_cache_dir(
    cli_dir: Option<&Utf8Path>,
    config: &BootforgeConfig,
    dirs: &dyn BaseDirs,
) -> Result<Utf8PathBuf> {
    cli_dir
        .map(Utf8Path::to_owned)
        .or_else(|| config.cache_dir.clone())
        .or_else(|| dirs.cache_dir())
        .ok_or(ProvisionError::MissingCacheDir)
}

fn provision(
    cli: &Cli,
    config: &BootforgeConfig,
    dirs: &dyn BaseDirs,
    args: &ProvisionArgs,
    stdout: &mut dyn Write,
) -> Result<u8> {
    let plan = ProvisionPlan {
        profile: args.profile.load()?,
        artifact: args.artifact(&config.integrity),
        device: args.device.clone(),
        json: args.json,
    };
    let settings = PipelineSettings {
        cache_dir: resolve_cache_dir(cli.cache_dir.as_deref(), config, dirs)?,
        config: config.pipeline.clone(),
    };

    let writer = RawDeviceWriter::default();
    let enumerator = LsblkEnumerator::system();
    let locator = FixedSurface::new(args.boot_mount.clone());
    let operator = TerminalOperator::stdio();
    let progress = StderrProgress::new(std::io::stderr(), cli.quiet);
    let collaborators = Collaborators {
        downloader: &HttpDownloader,
        extractor: &ImageExtractor,
        writer: &writer,
        enumerator: &enumerator,
        locator: &locator,
        operator: &operator,
        sleeper: &ThreadSleeper,
        sink: &progress,
    };
    provision_with(&plan, collaborators, settings, stdout)
}

/// Resolves and locks the medium, runs the pipeline, and prints the report.
fn provision_with(
    plan: &ProvisionPlan,
    collaborators: Collaborators<'_>,
    settings: PipelineSettings,
    stdout: &mut dyn Write,
) -> Result<u8> {
    let medium = find_medium(collaborators.enumerator, &plan.device)?.ok_or_else(|| {
        ProvisionError::MediumNotFound {
            device: plan.device.to_string(),
        }
    })?;
    let _lock = MediumLock::acquire(&settings.cache_dir, &medium.path)?;

    let report = Orchestrator::new(collaborators, settings).run(&plan.profile, &plan.artifact, medium);
    if plan.json {
        write_stdout(stdout, to_json(&report)?);
    } else {
        write_stdout(stdout, report.render().trim_end());
    }
    Ok(report.exit_code())
}

/// Builds the configuration into a directory and verifies it there.
fn render(args: &RenderArgs, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<u8> {
    let profile = args.profile.load()?;
    profile.validate()?;
    let bundle = overlay::build(&profile);
    let written = overlay::write(&bundle, &args.out)?;
    for path in &written {
        write_stderr_line(stderr, format_args!("wrote {path}"));
    }

    let result = verify::verify(&args.out, &profile);
    overlay::write_file(&args.out, VERIFICATION_TXT, &result.render(&profile))?;
    write_stdout(stdout, result.render(&profile).trim_end());
    Ok(status_exit_code(result.status()))
}

/// Re-runs verification against an already provisioned surface.
fn verify_surface(args: &VerifyArgs, stdout: &mut dyn Write) -> Result<u8> {
    let profile = args.profile.load()?;
    let result = verify::verify(&args.boot_mount, &profile);
    if args.json {
        write_stdout(stdout, to_json(&result)?);
    } else {
        write_stdout(stdout, result.render(&profile).trim_end());
    }
    Ok(status_exit_code(result.status()))
}

fn list_profiles(args: &ListArgs, stdout: &mut dyn Write) -> Result<u8> {
    let profiles = builtin_profiles();
    let text = if args.json {
        format_profiles_json(&profiles)
    } else {
        format_profiles_human(&profiles)
    };
    write_stdout(stdout, text.trim_end());
    Ok(EXIT_PERFECT)
}

fn list_media(
    args: &ListArgs,
    enumerator: &dyn MediumEnumerator,
    stdout: &mut dyn Write,
) -> Result<u8> {
    let media = enumerator.list()?;
    let text = if args.json {
        format_media_json(&media)
    } else {
        format_media_human(&media)
    };
    write_stdout(stdout, text.trim_end());
    Ok(EXIT_PERFECT)
}

fn to_json(value: &impl serde::Serialize) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| ProvisionError::Io(std::io::Error::other(e)))
}

fn write_stdout(stdout: &mut dyn Write, text: impl std::fmt::Display) {
    if writeln!(stdout, "{text}").is_err() {
        // A closed pipe leaves nothing to report to.
    }
}

fn exit_code_for_run_result(result: Result<u8>, stderr: &mut dyn Write) -> u8 {
    match result {
        Ok(code) => code,
        Err(err) => {
            write_stderr_line(stderr, format_args!("error: {err}"));
            EXIT_FAILED
        }
    }
}
