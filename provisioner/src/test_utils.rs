//! Shared test utilities for the provisioner crate.
//!
//! Stub collaborators that let tests drive the pipeline without a network,
//! a block device, or a terminal.

use crate::artifact::download::{DownloadError, Downloader};
use crate::artifact::ArtifactRef;
use crate::command::CommandExecutor;
use crate::guard::{Confirm, ConfirmationPrompt};
use crate::medium::{EnumerationError, MediumEnumerator, MediumHandle};
use crate::operator::Operator;
use crate::pipeline::{ProgressSink, Sleeper, StageEvent};
use crate::writer::{BlockWriter, WriteError, WriteProgress};
use camino::{Utf8Path, Utf8PathBuf};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io;
use std::process::{ExitStatus, Output};
use std::time::Duration;

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code as u32)
}

/// Creates a successful command `Output` with the given stdout.
pub fn stdout_output(stdout: &str) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// Represents an expected command invocation for testing.
#[derive(Debug)]
pub struct ExpectedCall {
    /// The command to execute (e.g., "lsblk").
    pub cmd: &'static str,
    /// The arguments to pass to the command.
    pub args: Vec<&'static str>,
    /// The result to return when this command is invoked.
    pub result: io::Result<Output>,
}

/// A stub implementation of `CommandExecutor` for testing.
///
/// Records expected command invocations and returns predefined results,
/// allowing tests to verify command execution without side effects.
#[derive(Debug)]
pub struct StubExecutor {
    expected: RefCell<VecDeque<ExpectedCall>>,
}

impl StubExecutor {
    /// Creates a new `StubExecutor` with the given expected calls.
    pub fn new(expected: Vec<ExpectedCall>) -> Self {
        Self {
            expected: RefCell::new(expected.into()),
        }
    }

    /// Asserts that all expected command invocations have been consumed.
    ///
    /// # Panics
    ///
    /// Panics if there are remaining expected calls that were not invoked.
    pub fn assert_finished(&self) {
        assert!(
            self.expected.borrow().is_empty(),
            "expected no further command invocations"
        );
    }
}

impl CommandExecutor for StubExecutor {
    fn run(&self, cmd: &str, args: &[&str]) -> io::Result<Output> {
        let mut expected = self.expected.borrow_mut();
        let call = expected.pop_front().expect("unexpected command invocation");

        assert_eq!(call.cmd, cmd);
        assert_eq!(call.args.as_slice(), args);

        call.result
    }
}

/// Creates a temporary directory and returns it with its UTF-8 path.
///
/// # Panics
///
/// Panics if the directory cannot be created or its path is not UTF-8.
pub fn utf8_temp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("UTF-8 temp path");
    (dir, path)
}

/// Bytes of a raw disk image of `len` bytes carrying an MBR boot signature.
///
/// # Panics
///
/// Panics if `len` is too small to hold the signature.
pub fn raw_image(len: usize) -> Vec<u8> {
    assert!(len >= 512, "a raw image needs at least one sector");
    let mut bytes = vec![0_u8; len];
    bytes[510] = 0x55;
    bytes[511] = 0xAA;
    bytes
}

/// Writes a raw image of `len` bytes to `dir/name` and returns its path.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_raw_image(dir: &Utf8Path, name: &str, len: usize) -> Utf8PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, raw_image(len)).expect("write raw image");
    path
}

/// A removable medium with the given properties.
pub fn medium(path: &str, size_bytes: u64, model: &str) -> MediumHandle {
    MediumHandle {
        path: Utf8PathBuf::from(path),
        size_bytes,
        model: model.to_owned(),
        removable: true,
        transport: Some("usb".to_owned()),
    }
}

/// Downloader returning scripted results, one per call.
#[derive(Debug, Default)]
pub struct StubDownloader {
    results: RefCell<VecDeque<Result<Utf8PathBuf, DownloadError>>>,
    calls: Cell<u32>,
    discards: Cell<u32>,
}

impl StubDownloader {
    /// Returns `results` in order; further calls fail with a network error.
    pub fn new(results: Vec<Result<Utf8PathBuf, DownloadError>>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            calls: Cell::new(0),
            discards: Cell::new(0),
        }
    }

    /// Always succeeds with `path`.
    pub fn serving(path: Utf8PathBuf) -> Self {
        Self::new(vec![Ok(path)])
    }

    /// Number of fetch calls made.
    pub fn calls(&self) -> u32 {
        self.calls.get()
    }

    /// Number of times a cached copy was discarded.
    pub fn discards(&self) -> u32 {
        self.discards.get()
    }
}

impl Downloader for StubDownloader {
    fn fetch(
        &self,
        artifact: &ArtifactRef,
        _cache_dir: &Utf8Path,
    ) -> Result<Utf8PathBuf, DownloadError> {
        self.calls.set(self.calls.get() + 1);
        self.results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| {
                Err(DownloadError::Network {
                    url: artifact.source.to_string(),
                    reason: "connection refused".to_owned(),
                })
            })
    }

    fn discard(&self, _artifact: &ArtifactRef, _cache_dir: &Utf8Path) -> io::Result<()> {
        self.discards.set(self.discards.get() + 1);
        Ok(())
    }
}

/// Block writer that records targets instead of writing.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    results: RefCell<VecDeque<Result<(), WriteError>>>,
    targets: RefCell<Vec<Utf8PathBuf>>,
}

impl RecordingWriter {
    /// Succeeds on every call.
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// Returns `results` in order, then succeeds.
    pub fn with_results(results: Vec<Result<(), WriteError>>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            targets: RefCell::new(Vec::new()),
        }
    }

    /// Device paths written to, in call order.
    pub fn targets(&self) -> Vec<Utf8PathBuf> {
        self.targets.borrow().clone()
    }

    /// Number of write calls made.
    pub fn calls(&self) -> usize {
        self.targets.borrow().len()
    }
}

impl BlockWriter for RecordingWriter {
    fn write(
        &self,
        image: &Utf8Path,
        medium: &MediumHandle,
        on_progress: &mut dyn FnMut(WriteProgress),
    ) -> Result<(), WriteError> {
        self.targets.borrow_mut().push(medium.path.clone());
        let result = self.results.borrow_mut().pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            let total = std::fs::metadata(image).map(|m| m.len()).unwrap_or(0);
            on_progress(WriteProgress {
                written: total,
                total,
            });
        }
        result
    }
}

/// Enumerator returning a scripted sequence of listings.
///
/// Once the sequence is exhausted the last listing is repeated.
#[derive(Debug, Default)]
pub struct StubEnumerator {
    listings: RefCell<VecDeque<Vec<MediumHandle>>>,
    last: RefCell<Vec<MediumHandle>>,
    calls: Cell<u32>,
}

impl StubEnumerator {
    /// Always lists `media`.
    pub fn fixed(media: Vec<MediumHandle>) -> Self {
        Self::sequence(vec![media])
    }

    /// Lists each entry of `listings` in turn.
    pub fn sequence(listings: Vec<Vec<MediumHandle>>) -> Self {
        Self {
            listings: RefCell::new(listings.into()),
            last: RefCell::new(Vec::new()),
            calls: Cell::new(0),
        }
    }

    /// Number of list calls made.
    pub fn calls(&self) -> u32 {
        self.calls.get()
    }
}

impl MediumEnumerator for StubEnumerator {
    fn list(&self) -> Result<Vec<MediumHandle>, EnumerationError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(next) = self.listings.borrow_mut().pop_front() {
            *self.last.borrow_mut() = next;
        }
        Ok(self.last.borrow().clone())
    }
}

/// Operator answering from scripts and recording every prompt.
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: RefCell<VecDeque<Option<String>>>,
    retargets: RefCell<VecDeque<Option<Utf8PathBuf>>>,
    prompts: RefCell<Vec<ConfirmationPrompt>>,
    offers: Cell<u32>,
}

impl ScriptedOperator {
    /// Answer confirmation prompts with `answers`; `None` once exhausted.
    pub fn answering(answers: &[&str]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().map(|a| Some((*a).to_owned())).collect()),
            ..Self::default()
        }
    }

    /// Answer re-target offers with `paths` in order; decline once exhausted.
    #[must_use]
    pub fn with_retargets(self, paths: &[Option<&str>]) -> Self {
        *self.retargets.borrow_mut() = paths.iter().map(|p| p.map(Utf8PathBuf::from)).collect();
        self
    }

    /// Prompts shown so far.
    pub fn prompts(&self) -> Vec<ConfirmationPrompt> {
        self.prompts.borrow().clone()
    }

    /// Re-target offers made so far.
    pub fn offers(&self) -> u32 {
        self.offers.get()
    }
}

impl Confirm for ScriptedOperator {
    fn confirm(&self, prompt: &ConfirmationPrompt) -> Option<String> {
        self.prompts.borrow_mut().push(prompt.clone());
        self.answers.borrow_mut().pop_front().flatten()
    }
}

impl Operator for ScriptedOperator {
    fn offer_retarget(&self, _failed: &MediumHandle, _error: &WriteError) -> Option<Utf8PathBuf> {
        self.offers.set(self.offers.get() + 1);
        self.retargets.borrow_mut().pop_front().flatten()
    }
}

/// Sink collecting every event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: RefCell<Vec<StageEvent>>,
}

impl RecordingSink {
    /// Events received so far.
    pub fn events(&self) -> Vec<StageEvent> {
        self.events.borrow().clone()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: &StageEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Sleeper that records requested delays without waiting.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    /// Delays requested so far.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.delays.borrow_mut().push(duration);
    }
}
