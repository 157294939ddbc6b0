//! Post-write verification of the configuration surface.
//!
//! [`verify`] re-reads the files the overlay wrote and scores them against
//! the profile. Checks run in a fixed order and never stop early: a missing
//! file is an error, a present file lacking an expected setting is a
//! warning. The result is a [`VerificationResult`] whose [`Status`] is
//! derived from the counters alone.

mod checks;

use bootforge::DeviceProfile;
use camino::Utf8Path;
use serde::Serialize;
use std::fmt;

/// Outcome of a single check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The check passed.
    Pass,
    /// The file is present but a recommended setting is missing or off.
    Warning,
    /// A required file is missing or unreadable.
    Error,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Warning => "WARN",
            Self::Error => "FAIL",
        })
    }
}

/// One itemised verification finding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// What was checked, e.g. `network: ssid`.
    pub check: String,
    /// How it went.
    pub outcome: Outcome,
    /// Human-readable explanation.
    pub detail: String,
}

impl Finding {
    /// A passing finding.
    pub fn pass(check: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(check, Outcome::Pass, detail)
    }

    /// A warning finding.
    pub fn warning(check: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(check, Outcome::Warning, detail)
    }

    /// An error finding.
    pub fn error(check: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(check, Outcome::Error, detail)
    }

    fn new(check: impl Into<String>, outcome: Outcome, detail: impl Into<String>) -> Self {
        Self {
            check: check.into(),
            outcome,
            detail: detail.into(),
        }
    }
}

/// Overall conformance grade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Status {
    /// No errors and no warnings.
    Perfect,
    /// Warnings only.
    Good,
    /// At least one error.
    Issues,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Perfect => "Perfect",
            Self::Good => "Good",
            Self::Issues => "Issues",
        })
    }
}

/// Accumulated verification findings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    successes: u32,
    warnings: u32,
    errors: u32,
    findings: Vec<Finding>,
}

impl VerificationResult {
    /// Append `finding` and update the counters.
    pub fn record(&mut self, finding: Finding) {
        match finding.outcome {
            Outcome::Pass => self.successes += 1,
            Outcome::Warning => self.warnings += 1,
            Outcome::Error => self.errors += 1,
        }
        self.findings.push(finding);
    }

    /// Number of passing checks.
    #[must_use]
    pub const fn successes(&self) -> u32 {
        self.successes
    }

    /// Number of warnings.
    #[must_use]
    pub const fn warnings(&self) -> u32 {
        self.warnings
    }

    /// Number of errors.
    #[must_use]
    pub const fn errors(&self) -> u32 {
        self.errors
    }

    /// Findings in check order.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// Look up the first finding for `check`.
    #[must_use]
    pub fn finding(&self, check: &str) -> Option<&Finding> {
        self.findings.iter().find(|finding| finding.check == check)
    }

    /// Grade derived from the counters.
    #[must_use]
    pub const fn status(&self) -> Status {
        if self.errors > 0 {
            Status::Issues
        } else if self.warnings > 0 {
            Status::Good
        } else {
            Status::Perfect
        }
    }

    /// Plain-text report suitable for `bootforge/verification.txt`.
    #[must_use]
    pub fn render(&self, profile: &DeviceProfile) -> String {
        let mut out = String::new();
        out.push_str(&format!("bootforge verification for {}\n", profile.name));
        out.push_str(&format!(
            "Status: {} ({} passed, {} warnings, {} errors)\n\n",
            self.status(),
            self.successes,
            self.warnings,
            self.errors
        ));
        for finding in &self.findings {
            out.push_str(&format!("[{}] {}: {}\n", finding.outcome, finding.check, finding.detail));
        }
        out
    }
}

/// Verify the configuration surface at `mount_root` against `profile`.
///
/// # Examples
///
/// ```
/// use bootforge_provisioner::verify::{self, Status};
///
/// let dir = tempfile::tempdir().unwrap();
/// let root = camino::Utf8Path::from_path(dir.path()).unwrap();
/// let profile = bootforge::catalogue::find("pi-zero2w-headless").unwrap();
///
/// // Nothing written yet: every required file is missing.
/// assert_eq!(verify::verify(root, &profile).status(), Status::Issues);
/// ```
#[must_use]
pub fn verify(mount_root: &Utf8Path, profile: &DeviceProfile) -> VerificationResult {
    let mut result = VerificationResult::default();
    let surface = checks::Surface::new(mount_root);
    checks::boot_config(&surface, profile, &mut result);
    checks::network(&surface, profile, &mut result);
    checks::system_settings(&surface, profile, &mut result);
    checks::ssh_marker(&surface, profile, &mut result);
    checks::kernel_modules(&surface, profile, &mut result);
    checks::firstboot_script(&surface, profile, &mut result);
    checks::documents(&surface, &mut result);
    log::info!(
        "verification of {mount_root}: {} ({} passed, {} warnings, {} errors)",
        result.status(),
        result.successes,
        result.warnings,
        result.errors
    );
    result
}

#[cfg(test)]
mod tests;
