//! Tests for CLI parsing and argument helpers.

use super::*;
use clap::CommandFactory;
use rstest::rstest;

const PROVISION: &[&str] = &[
    "bootforge",
    "provision",
    "-p",
    "pi4-ili9486-35",
    "-i",
    "https://example.test/os.img.xz",
    "-d",
    "/dev/sdb",
    "--boot-mount",
    "/media/bootfs",
];

fn provision_args(extra: &[&str]) -> ProvisionArgs {
    let argv: Vec<&str> = PROVISION.iter().chain(extra).copied().collect();
    match Cli::parse_from(argv).command {
        Command::Provision(args) => args,
        other => panic!("expected Provision command, got {other:?}"),
    }
}

#[test]
fn cli_definition_is_consistent() {
    Cli::command().debug_assert();
}

#[test]
fn provision_parses_required_arguments() {
    let args = provision_args(&[]);
    assert_eq!(args.profile.profile.as_deref(), Some("pi4-ili9486-35"));
    assert_eq!(args.image, "https://example.test/os.img.xz");
    assert_eq!(args.device, Utf8PathBuf::from("/dev/sdb"));
    assert_eq!(args.boot_mount, Utf8PathBuf::from("/media/bootfs"));
    assert!(!args.json);
}

#[test]
fn provision_requires_a_device() {
    let result = Cli::try_parse_from([
        "bootforge",
        "provision",
        "-p",
        "pi4-ili9486-35",
        "-i",
        "os.img",
        "--boot-mount",
        "/mnt",
    ]);
    assert!(result.is_err());
}

#[test]
fn profile_name_and_file_are_exclusive() {
    let result = Cli::try_parse_from([
        "bootforge",
        "render",
        "-p",
        "pi4-ili9486-35",
        "--profile-file",
        "board.toml",
        "-o",
        "out",
    ]);
    assert!(result.is_err());
}

#[test]
fn a_profile_is_required() {
    assert!(Cli::try_parse_from(["bootforge", "render", "-o", "out"]).is_err());
}

#[test]
fn artifact_uses_configured_minimum_by_default() {
    let artifact = provision_args(&[]).artifact(&IntegrityConfig::default());
    assert_eq!(artifact.min_size, 50_000_000);
    assert!(matches!(artifact.source, ArtifactSource::Url(_)));
    assert!(artifact.signature.is_none());
}

#[test]
fn artifact_carries_declared_signature() {
    let digest = "ab".repeat(32);
    let args = provision_args(&["--sha256", digest.as_str(), "--format", "xz", "--min-size", "1024"]);
    let artifact = args.artifact(&IntegrityConfig::default());

    assert_eq!(artifact.min_size, 1024);
    assert_eq!(artifact.expected_format(), Some(ArtifactFormat::Xz));
    assert_eq!(
        artifact.expected_sha256().map(Sha256Digest::as_str),
        Some(digest.as_str())
    );
}

#[rstest]
#[case::short_digest(&["--sha256", "abc"])]
#[case::unknown_format(&["--format", "rar"])]
fn malformed_signature_is_rejected(#[case] extra: &[&str]) {
    let argv: Vec<&str> = PROVISION.iter().chain(extra).copied().collect();
    assert!(Cli::try_parse_from(argv).is_err());
}

#[test]
fn verbosity_counts_and_is_global() {
    let cli = Cli::parse_from(["bootforge", "profiles", "-vv"]);
    assert_eq!(cli.verbosity, 2);
    assert!(!cli.quiet);
}

#[test]
fn quiet_conflicts_with_verbose() {
    assert!(Cli::try_parse_from(["bootforge", "-q", "-v", "media"]).is_err());
}

#[rstest]
#[case::profiles("profiles")]
#[case::media("media")]
fn listing_commands_accept_json(#[case] name: &str) {
    let cli = Cli::parse_from(["bootforge", name, "--json"]);
    match cli.command {
        Command::Profiles(args) | Command::Media(args) => assert!(args.json),
        other => panic!("expected a listing command, got {other:?}"),
    }
}

#[test]
fn verify_parses_boot_mount_and_profile_file() {
    let cli = Cli::parse_from([
        "bootforge",
        "verify",
        "--profile-file",
        "board.toml",
        "--boot-mount",
        "/mnt/boot",
    ]);
    match cli.command {
        Command::Verify(args) => {
            assert_eq!(args.profile.profile_file, Some(Utf8PathBuf::from("board.toml")));
            assert_eq!(args.boot_mount, Utf8PathBuf::from("/mnt/boot"));
        }
        other => panic!("expected Verify command, got {other:?}"),
    }
}

#[test]
fn global_paths_parse_after_subcommand() {
    let cli = Cli::parse_from([
        "bootforge",
        "media",
        "--cache-dir",
        "/tmp/cache",
        "--config",
        "/tmp/bootforge.toml",
    ]);
    assert_eq!(cli.cache_dir, Some(Utf8PathBuf::from("/tmp/cache")));
    assert_eq!(cli.config, Some(Utf8PathBuf::from("/tmp/bootforge.toml")));
}

#[test]
fn profile_args_load_builtin_profile() {
    let args = ProfileArgs {
        profile: Some("pi-zero2w-headless".to_owned()),
        profile_file: None,
    };
    let profile = args.load().expect("builtin profile");
    assert_eq!(profile.name, "pi-zero2w-headless");
}

#[test]
fn profile_args_report_unknown_name() {
    let args = ProfileArgs {
        profile: Some("pi5-mystery".to_owned()),
        profile_file: None,
    };
    let err = args.load().expect_err("unknown profile");
    assert!(err.to_string().contains("pi5-mystery"));
}
