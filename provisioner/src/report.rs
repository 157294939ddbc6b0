//! Final outcome of a pipeline run.

use crate::artifact::integrity::IntegrityReport;
use crate::error::Failure;
use crate::medium::MediumHandle;
use crate::pipeline::PipelineState;
use crate::verify::{Status, VerificationResult};
use camino::Utf8PathBuf;
use serde::Serialize;

/// Exit code for a run that reported a perfect verification.
pub const EXIT_PERFECT: u8 = 0;
/// Exit code for a failed run or a usage error.
pub const EXIT_FAILED: u8 = 1;
/// Exit code for a run that reported warnings only.
pub const EXIT_GOOD: u8 = 2;
/// Exit code for a run whose verification found errors.
pub const EXIT_ISSUES: u8 = 3;

/// Exit code for a verification grade.
#[must_use]
pub const fn status_exit_code(status: Status) -> u8 {
    match status {
        Status::Perfect => EXIT_PERFECT,
        Status::Good => EXIT_GOOD,
        Status::Issues => EXIT_ISSUES,
    }
}

/// A state change recorded during the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// State left.
    pub from: PipelineState,
    /// State entered.
    pub to: PipelineState,
}

/// Everything a run produced, successful or not.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    /// Profile the run was for.
    pub profile: String,
    /// Final pipeline state.
    pub state: PipelineState,
    /// Every transition, in order.
    pub transitions: Vec<Transition>,
    /// Acquisition attempts made.
    pub acquisition_attempts: u32,
    /// Confirmation prompts shown across all targets.
    pub confirmation_prompts: u32,
    /// Integrity check outcome, once checked.
    pub integrity: Option<IntegrityReport>,
    /// Extracted image written to the medium.
    pub image: Option<Utf8PathBuf>,
    /// Medium that received the image.
    pub medium: Option<MediumHandle>,
    /// Configuration files written, in bundle order.
    pub written_files: Vec<Utf8PathBuf>,
    /// Post-write verification, present once the run is reported.
    pub verification: Option<VerificationResult>,
    /// Classified failure, present when the run failed.
    pub failure: Option<Failure>,
}

impl Report {
    pub(crate) fn new(profile: &str) -> Self {
        Self {
            profile: profile.to_owned(),
            state: PipelineState::Init,
            transitions: Vec::new(),
            acquisition_attempts: 0,
            confirmation_prompts: 0,
            integrity: None,
            image: None,
            medium: None,
            written_files: Vec::new(),
            verification: None,
            failure: None,
        }
    }

    /// Verification grade, when the run got that far.
    #[must_use]
    pub fn status(&self) -> Option<Status> {
        self.verification.as_ref().map(VerificationResult::status)
    }

    /// States visited, starting with `Init`.
    #[must_use]
    pub fn states(&self) -> Vec<PipelineState> {
        std::iter::once(PipelineState::Init)
            .chain(self.transitions.iter().map(|t| t.to))
            .collect()
    }

    /// Process exit code for this outcome.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match (self.state, self.status()) {
            (PipelineState::Reported, Some(status)) => status_exit_code(status),
            _ => EXIT_FAILED,
        }
    }

    /// Human-readable summary.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Profile: {}\n", self.profile));
        if let Some(medium) = &self.medium {
            out.push_str(&format!("Medium: {}\n", medium.path));
        }
        if let Some(image) = &self.image {
            out.push_str(&format!("Image: {image}\n"));
        }
        out.push_str(&format!("State: {}\n", self.state));
        if let Some(failure) = &self.failure {
            out.push_str(&format!("Failure: {failure}\n"));
            out.push_str(&format!("Hint: {}\n", failure.hint()));
        }
        if let Some(result) = &self.verification {
            out.push_str(&format!(
                "Verification: {} ({} passed, {} warnings, {} errors)\n",
                result.status(),
                result.successes(),
                result.warnings(),
                result.errors()
            ));
            for finding in result.findings() {
                if finding.outcome != crate::verify::Outcome::Pass {
                    out.push_str(&format!("  [{}] {}: {}\n", finding.outcome, finding.check, finding.detail));
                }
            }
        }
        out
    }
}
