//! Unit tests for the verification engine.

use super::*;
use crate::overlay;
use crate::test_utils::utf8_temp_dir;
use bootforge::catalogue;
use bootforge::profile::NetworkSchema;
use rstest::rstest;

fn written(name: &str) -> (tempfile::TempDir, camino::Utf8PathBuf, DeviceProfile) {
    let (dir, root) = utf8_temp_dir();
    let profile = catalogue::find(name).expect("profile");
    overlay::write(&overlay::build(&profile), &root).expect("overlay written");
    (dir, root, profile)
}

#[rstest]
#[case::pi4("pi4-ili9486-35")]
#[case::pi3("pi3-ili9341-28")]
#[case::zero("pi-zero2w-headless")]
fn freshly_written_surface_is_perfect(#[case] name: &str) {
    let (_dir, root, profile) = written(name);
    let result = verify(&root, &profile);
    assert_eq!(result.errors(), 0, "{:#?}", result.findings());
    assert_eq!(result.warnings(), 0, "{:#?}", result.findings());
    assert_eq!(result.status(), Status::Perfect);
}

#[test]
fn empty_surface_reports_missing_files_as_errors() {
    let (_dir, root) = utf8_temp_dir();
    let profile = catalogue::find("pi4-ili9486-35").expect("profile");
    let result = verify(&root, &profile);

    assert_eq!(result.status(), Status::Issues);
    let config = result.finding(overlay::CONFIG_TXT).expect("config finding");
    assert_eq!(config.outcome, Outcome::Error);
    assert_eq!(config.detail, "missing");
}

#[test]
fn missing_directive_is_a_warning() {
    let (_dir, root, profile) = written("pi4-ili9486-35");
    let path = root.join(overlay::CONFIG_TXT);
    let content = std::fs::read_to_string(&path).expect("read config");
    std::fs::write(&path, content.replace("dtparam=spi=on\n", "")).expect("rewrite config");

    let result = verify(&root, &profile);
    assert_eq!(result.status(), Status::Good);
    let finding = result
        .finding("config.txt: dtparam=spi=on")
        .expect("spi finding");
    assert_eq!(finding.outcome, Outcome::Warning);
}

#[test]
fn short_psk_warns_while_ssid_and_ssh_pass() {
    let (dir, root) = utf8_temp_dir();
    let mut profile = catalogue::find("pi-zero2w-headless").expect("profile");
    if let Some(network) = profile.network.as_mut() {
        network.ssid = "NetA".to_owned();
        network.psk = "Secret1".to_owned();
    }
    profile.system.ssh = true;
    overlay::write(&overlay::build(&profile), &root).expect("overlay written");

    let result = verify(&root, &profile);
    let outcome = |check: &str| result.finding(check).map(|finding| finding.outcome);
    assert_eq!(outcome("network: ssid"), Some(Outcome::Pass));
    assert_eq!(outcome("ssh"), Some(Outcome::Pass));
    assert_eq!(outcome("network: psk"), Some(Outcome::Warning));
    assert_eq!(result.status(), Status::Good);
    drop(dir);
}

#[test]
fn missing_ssh_marker_is_an_error() {
    let (_dir, root, profile) = written("pi-zero2w-headless");
    std::fs::remove_file(root.join(overlay::SSH_MARKER)).expect("remove marker");

    let result = verify(&root, &profile);
    assert_eq!(result.finding("ssh").map(|f| f.outcome), Some(Outcome::Error));
    assert_eq!(result.status(), Status::Issues);
}

#[test]
fn stale_fragment_of_other_schema_warns() {
    let (_dir, root, profile) = written("pi3-ili9341-28");
    assert_eq!(
        profile.network.as_ref().map(|n| n.schema),
        Some(NetworkSchema::NetworkManager)
    );
    std::fs::write(root.join(overlay::WPA_SUPPLICANT_CONF), "country=DE\n").expect("stale file");

    let result = verify(&root, &profile);
    assert_eq!(
        result.finding("network: stale fragment").map(|f| f.outcome),
        Some(Outcome::Warning)
    );
}

#[test]
fn reordered_modules_warn() {
    let (_dir, root, profile) = written("pi4-ili9486-35");
    let mut listed = overlay::modules::resolve(&profile);
    listed.reverse();
    std::fs::write(root.join(overlay::MODULES_CONF), listed.join("\n") + "\n").expect("rewrite");

    let result = verify(&root, &profile);
    let finding = result.finding("modules: order").expect("modules finding");
    assert_eq!(finding.outcome, Outcome::Warning);
    assert!(finding.detail.contains("dependency order"));
}

#[test]
fn touch_settings_are_checked_against_the_profile() {
    let (_dir, root, mut profile) = written("pi4-ili9486-35");
    if let Some(touch) = profile.touch.as_mut() {
        touch.invert_x = !touch.invert_x;
        touch.calibration.x_max = 4000;
    }

    let result = verify(&root, &profile);
    assert_eq!(result.status(), Status::Good);
    let stale: Vec<&Finding> = result
        .findings()
        .iter()
        .filter(|finding| finding.check.starts_with("firstboot: touch"))
        .filter(|finding| finding.outcome == Outcome::Warning)
        .collect();
    assert_eq!(stale.len(), 2, "{stale:#?}");
    assert!(stale.iter().any(|finding| finding.check.contains("InvertX")));
    assert!(stale.iter().any(|finding| finding.check.contains("Calibration")));
}

#[test]
fn matching_touch_settings_pass() {
    let (_dir, root, profile) = written("pi4-ili9486-35");
    let result = verify(&root, &profile);
    let touch_checks = result
        .findings()
        .iter()
        .filter(|finding| finding.check.starts_with("firstboot: touch"))
        .inspect(|finding| assert_eq!(finding.outcome, Outcome::Pass, "{finding:?}"))
        .count();
    assert_eq!(touch_checks, 5);
}

#[test]
fn checks_continue_after_errors() {
    let (_dir, root, profile) = written("pi4-ili9486-35");
    std::fs::remove_file(root.join(overlay::CONFIG_TXT)).expect("remove config");

    let result = verify(&root, &profile);
    assert_eq!(result.errors(), 1);
    assert!(result.finding(overlay::PINOUT_TXT).is_some());
}

#[test]
fn counters_follow_recorded_findings() {
    let mut result = VerificationResult::default();
    assert_eq!(result.status(), Status::Perfect);
    result.record(Finding::pass("a", "ok"));
    result.record(Finding::warning("b", "meh"));
    assert_eq!(result.status(), Status::Good);
    result.record(Finding::error("c", "bad"));
    assert_eq!(
        (result.successes(), result.warnings(), result.errors()),
        (1, 1, 1)
    );
    assert_eq!(result.status(), Status::Issues);
}

#[test]
fn rendered_report_lists_findings() {
    let (_dir, root, profile) = written("pi-zero2w-headless");
    let text = verify(&root, &profile).render(&profile);
    assert!(text.starts_with("bootforge verification for pi-zero2w-headless\nStatus: Perfect"));
    assert!(text.contains("[PASS] ssh: enabled"));
}
