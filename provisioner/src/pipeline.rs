//! Provisioning pipeline orchestration.
//!
//! The [`Orchestrator`] drives one run through its stages:
//!
//! ```text
//! Init → Downloading → Verifying → AwaitingConfirmation → Writing
//!      → Configuring → PostVerifying → Reported
//! ```
//!
//! Any stage may end the run in `Failed`, which is terminal. The orchestrator
//! owns the retry policy: acquisition is retried with capped exponential
//! backoff, integrity failures never are, and a failed write may be offered
//! exactly one re-target that must be confirmed again from scratch. All
//! device, network, and terminal I/O goes through the injected
//! [`Collaborators`].

use crate::artifact::ArtifactRef;
use crate::artifact::download::Downloader;
use crate::artifact::extraction::Extractor;
use crate::artifact::integrity;
use crate::error::{Failure, FailureKind};
use crate::guard::{CONFIRMATION_TOKEN, Confirmed, GuardRefusal, SafetyGuard};
use crate::medium::{EnumeratorProbe, MediumEnumerator, MediumHandle, find_medium};
use crate::operator::Operator;
use crate::overlay::{self, VERIFICATION_TXT};
use crate::report::{Report, Transition};
use crate::surface::SurfaceLocator;
use crate::verify::{self, Finding};
use crate::writer::{BlockWriter, WriteError, WriteProgress};
use bootforge::DeviceProfile;
use bootforge::config::PipelineConfig;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Stage of a pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineState {
    /// Nothing has happened yet.
    Init,
    /// Acquiring the artifact.
    Downloading,
    /// Checking integrity and extracting the image.
    Verifying,
    /// Waiting for the operator to consent to the destructive write.
    AwaitingConfirmation,
    /// Writing the image to the medium.
    Writing,
    /// Writing the configuration overlay.
    Configuring,
    /// Verifying the written configuration.
    PostVerifying,
    /// The run completed and produced a verification result.
    Reported,
    /// The run stopped with a classified failure.
    Failed,
}

impl PipelineState {
    /// Whether the pipeline may move from `self` to `next`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bootforge_provisioner::pipeline::PipelineState;
    ///
    /// assert!(PipelineState::Writing.can_transition_to(PipelineState::AwaitingConfirmation));
    /// assert!(!PipelineState::Failed.can_transition_to(PipelineState::Downloading));
    /// assert!(!PipelineState::Downloading.can_transition_to(PipelineState::Writing));
    /// ```
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use PipelineState as S;
        matches!(
            (self, next),
            (S::Init, S::Downloading)
                | (S::Downloading, S::Verifying)
                | (S::Verifying, S::AwaitingConfirmation)
                | (S::AwaitingConfirmation, S::Writing)
                | (S::Writing, S::Configuring | S::AwaitingConfirmation)
                | (S::Configuring, S::PostVerifying)
                | (S::PostVerifying, S::Reported)
                | (
                    S::Init
                        | S::Downloading
                        | S::Verifying
                        | S::AwaitingConfirmation
                        | S::Writing
                        | S::Configuring,
                    S::Failed
                )
        )
    }

    /// Whether the run has ended.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Reported | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Progress notifications emitted during a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageEvent {
    /// The pipeline changed state.
    Transition {
        /// Previous state.
        from: PipelineState,
        /// New state.
        to: PipelineState,
    },
    /// An acquisition attempt is starting.
    Acquiring {
        /// One-based attempt number.
        attempt: u32,
        /// Attempt budget.
        attempts: u32,
    },
    /// An acquisition attempt failed and will be retried after `delay`.
    Retrying {
        /// The attempt that failed.
        attempt: u32,
        /// Backoff before the next attempt.
        delay: Duration,
        /// Why the attempt failed.
        reason: String,
    },
    /// Bytes written to the medium so far.
    Writing(WriteProgress),
}

/// Receiver of [`StageEvent`]s.
pub trait ProgressSink {
    /// Handle one event.
    fn event(&self, event: &StageEvent);
}

/// A sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn event(&self, _event: &StageEvent) {}
}

/// Waits between acquisition attempts.
pub trait Sleeper {
    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeps on the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// External collaborators a run delegates to.
pub struct Collaborators<'a> {
    /// Fetches the artifact.
    pub downloader: &'a dyn Downloader,
    /// Produces the raw image.
    pub extractor: &'a dyn Extractor,
    /// Writes the image to the medium.
    pub writer: &'a dyn BlockWriter,
    /// Re-resolves media.
    pub enumerator: &'a dyn MediumEnumerator,
    /// Finds the configuration surface after writing.
    pub locator: &'a dyn SurfaceLocator,
    /// Answers confirmation and re-target prompts.
    pub operator: &'a dyn Operator,
    /// Waits between retries.
    pub sleeper: &'a dyn Sleeper,
    /// Receives progress events.
    pub sink: &'a dyn ProgressSink,
}

/// Tunables for a run.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    /// Where artifacts are downloaded and images extracted.
    pub cache_dir: Utf8PathBuf,
    /// Retry and confirmation limits.
    pub config: PipelineConfig,
}

/// Sequences the provisioning stages.
pub struct Orchestrator<'a> {
    collaborators: Collaborators<'a>,
    settings: PipelineSettings,
}

/// Mutable state of one run.
struct Run<'s> {
    state: PipelineState,
    report: Report,
    sink: &'s dyn ProgressSink,
}

impl Run<'_> {
    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.state
        );
        log::info!("pipeline: {} -> {next}", self.state);
        self.sink.event(&StageEvent::Transition {
            from: self.state,
            to: next,
        });
        self.report.transitions.push(Transition {
            from: self.state,
            to: next,
        });
        self.state = next;
        self.report.state = next;
    }

    fn emit(&self, event: &StageEvent) {
        self.sink.event(event);
    }
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator over `collaborators`.
    #[must_use]
    pub const fn new(collaborators: Collaborators<'a>, settings: PipelineSettings) -> Self {
        Self {
            collaborators,
            settings,
        }
    }

    /// Run the pipeline to completion and return its report.
    ///
    /// Never panics on collaborator failure: every failure ends the run in
    /// [`PipelineState::Failed`] with a classified [`Failure`] in the report.
    pub fn run(
        &self,
        profile: &DeviceProfile,
        artifact: &ArtifactRef,
        medium: MediumHandle,
    ) -> Report {
        let mut run = Run {
            state: PipelineState::Init,
            report: Report::new(&profile.name),
            sink: self.collaborators.sink,
        };
        if let Err(failure) = self.drive(&mut run, profile, artifact, medium) {
            log::error!("pipeline failed: {failure}");
            run.advance(PipelineState::Failed);
            run.report.failure = Some(failure);
        }
        run.report
    }

    fn drive(
        &self,
        run: &mut Run<'_>,
        profile: &DeviceProfile,
        artifact: &ArtifactRef,
        medium: MediumHandle,
    ) -> Result<(), Failure> {
        profile
            .validate()
            .map_err(|e| Failure::new(FailureKind::InvalidProfile, e.to_string()))?;

        run.advance(PipelineState::Downloading);
        let fetched = self.acquire(run, artifact)?;

        run.advance(PipelineState::Verifying);
        let image = self.check_and_extract(run, artifact, &fetched)?;

        run.advance(PipelineState::AwaitingConfirmation);
        let written = self.confirm_and_write(run, &image, medium)?;

        run.advance(PipelineState::Configuring);
        let root = self.configure(run, profile, &written)?;

        run.advance(PipelineState::PostVerifying);
        let mut result = verify::verify(&root, profile);
        if let Err(err) = overlay::write_file(&root, VERIFICATION_TXT, &result.render(profile)) {
            log::warn!("could not write verification report: {err}");
            result.record(Finding::warning(VERIFICATION_TXT, err.to_string()));
        }
        run.report.verification = Some(result);

        run.advance(PipelineState::Reported);
        Ok(())
    }

    fn acquire(&self, run: &mut Run<'_>, artifact: &ArtifactRef) -> Result<Utf8PathBuf, Failure> {
        let config = &self.settings.config;
        let attempts = config.acquisition_attempts.max(1);
        let mut delay = config.initial_backoff();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            run.emit(&StageEvent::Acquiring { attempt, attempts });
            run.report.acquisition_attempts = attempt;
            match self
                .collaborators
                .downloader
                .fetch(artifact, &self.settings.cache_dir)
            {
                Ok(path) => {
                    log::info!("acquired {} as {path}", artifact.source);
                    return Ok(path);
                }
                Err(err) if !err.is_transient() => {
                    return Err(Failure::new(FailureKind::AcquisitionFailed, err.to_string()));
                }
                Err(err) => {
                    log::warn!("acquisition attempt {attempt}/{attempts} failed: {err}");
                    last_error = err.to_string();
                    if attempt < attempts {
                        run.emit(&StageEvent::Retrying {
                            attempt,
                            delay,
                            reason: last_error.clone(),
                        });
                        self.collaborators.sleeper.sleep(delay);
                        delay = delay.saturating_mul(2).min(config.max_backoff());
                    }
                }
            }
        }
        Err(Failure::new(
            FailureKind::AcquisitionFailed,
            format!("gave up after {attempts} attempt(s): {last_error}"),
        ))
    }

    fn check_and_extract(
        &self,
        run: &mut Run<'_>,
        artifact: &ArtifactRef,
        fetched: &Utf8Path,
    ) -> Result<Utf8PathBuf, Failure> {
        let report = integrity::check(artifact, fetched);
        let failed = report.reason.clone();
        run.report.integrity = Some(report);
        if let Some(reason) = failed {
            self.discard(artifact);
            return Err(Failure::new(
                FailureKind::IntegrityFailed,
                format!("{fetched}: {reason}"),
            ));
        }

        let work_dir = self.settings.cache_dir.join("images");
        let image = self
            .collaborators
            .extractor
            .extract(fetched, &work_dir)
            .map_err(|e| {
                self.discard(artifact);
                Failure::new(FailureKind::IntegrityFailed, e.to_string())
            })?;
        run.report.image = Some(image.clone());
        Ok(image)
    }

    /// Evicts a corrupt artifact so the next run acquires it afresh.
    fn discard(&self, artifact: &ArtifactRef) {
        if let Err(err) = self
            .collaborators
            .downloader
            .discard(artifact, &self.settings.cache_dir)
        {
            log::warn!("could not discard cached artifact {}: {err}", artifact.source);
        }
    }

    fn confirm_and_write(
        &self,
        run: &mut Run<'_>,
        image: &Utf8Path,
        selected: MediumHandle,
    ) -> Result<MediumHandle, Failure> {
        let c = &self.collaborators;
        let probe = EnumeratorProbe::new(c.enumerator);
        let guard = SafetyGuard::new(&probe, c.operator, self.settings.config.max_reconfirmations);
        let mut target = selected;
        let mut retargeted = false;

        loop {
            let confirmed = guard.confirm(&target).map_err(refusal_failure)?;
            run.report.confirmation_prompts += confirmed.prompts();
            run.advance(PipelineState::Writing);

            let (medium, err) = match self.write(run, image, confirmed) {
                Ok(medium) => return Ok(medium),
                Err(failed) => failed,
            };
            if retargeted || !err.is_retargetable() {
                return Err(Failure::new(FailureKind::WriteFailed, err.to_string()));
            }
            log::warn!("write to {} failed: {err}", medium.path);
            let Some(path) = c.operator.offer_retarget(&medium, &err) else {
                return Err(Failure::new(
                    FailureKind::WriteFailed,
                    format!("{err}; no replacement medium chosen"),
                ));
            };
            target = find_medium(c.enumerator, &path)
                .map_err(|e| Failure::new(FailureKind::WriteFailed, e.to_string()))?
                .ok_or_else(|| {
                    Failure::new(
                        FailureKind::WriteFailed,
                        format!("{err}; replacement medium {path} not found"),
                    )
                })?;
            retargeted = true;
            run.advance(PipelineState::AwaitingConfirmation);
        }
    }

    /// Writing consumes the guard's proof of consent.
    fn write(
        &self,
        run: &Run<'_>,
        image: &Utf8Path,
        confirmed: Confirmed<MediumHandle>,
    ) -> Result<MediumHandle, (MediumHandle, WriteError)> {
        let medium = confirmed.into_resource();
        log::info!("writing {image} to {}", medium.path);
        let mut on_progress = |progress: WriteProgress| run.emit(&StageEvent::Writing(progress));
        match self
            .collaborators
            .writer
            .write(image, &medium, &mut on_progress)
        {
            Ok(()) => Ok(medium),
            Err(err) => Err((medium, err)),
        }
    }

    fn configure(
        &self,
        run: &mut Run<'_>,
        profile: &DeviceProfile,
        medium: &MediumHandle,
    ) -> Result<Utf8PathBuf, Failure> {
        run.report.medium = Some(medium.clone());
        let root = self
            .collaborators
            .locator
            .locate(medium)
            .map_err(|e| Failure::new(FailureKind::ConfigWriteFailed, e.to_string()))?;
        let bundle = overlay::build(profile);
        run.report.written_files = overlay::write(&bundle, &root)
            .map_err(|e| Failure::new(FailureKind::ConfigWriteFailed, e.to_string()))?;
        Ok(root)
    }
}

fn refusal_failure(refusal: GuardRefusal) -> Failure {
    match refusal {
        GuardRefusal::Declined => Failure::new(
            FailureKind::UserAborted,
            format!("confirmation was not {CONFIRMATION_TOKEN}"),
        ),
        other => Failure::new(FailureKind::WriteFailed, other.to_string()),
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
