//! Operator-facing output for the `bootforge` CLI.
//!
//! Progress goes to standard error so that standard output carries only the
//! final report or listing, which keeps `--json` output machine-readable.

use crate::medium::{MediumHandle, human_size};
use crate::pipeline::{PipelineState, ProgressSink, StageEvent};
use bootforge::DeviceProfile;
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fmt::Display;
use std::io::Write;

/// Writes a single line to stderr, ignoring failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Progress sink printing stage changes to a stream.
///
/// Write progress is reported in steps of ten percent; quiet mode suppresses
/// everything except retries.
pub struct StderrProgress<W> {
    stream: RefCell<W>,
    quiet: bool,
    last_decile: Cell<Option<u64>>,
}

impl<W: Write> StderrProgress<W> {
    /// Report progress to `stream`.
    pub fn new(stream: W, quiet: bool) -> Self {
        Self {
            stream: RefCell::new(stream),
            quiet,
            last_decile: Cell::new(None),
        }
    }

    /// Consume the sink and return the stream.
    pub fn into_inner(self) -> W {
        self.stream.into_inner()
    }

    fn line(&self, message: impl Display) {
        write_stderr_line(&mut *self.stream.borrow_mut(), message);
    }
}

impl<W: Write> ProgressSink for StderrProgress<W> {
    fn event(&self, event: &StageEvent) {
        match event {
            StageEvent::Retrying {
                attempt,
                delay,
                reason,
            } => self.line(format_args!(
                "attempt {attempt} failed ({reason}); retrying in {}s",
                delay.as_secs()
            )),
            _ if self.quiet => {}
            StageEvent::Transition { to, .. } => {
                if let Some(label) = stage_label(*to) {
                    self.line(label);
                }
            }
            StageEvent::Acquiring { attempt, attempts } if *attempt > 1 => {
                self.line(format_args!("Downloading (attempt {attempt} of {attempts})..."));
            }
            StageEvent::Acquiring { .. } => {}
            StageEvent::Writing(progress) => {
                let decile = progress.percent().checked_div(10).unwrap_or_default();
                if self.last_decile.get() != Some(decile) {
                    self.last_decile.set(Some(decile));
                    self.line(format_args!(
                        "  {:>3}% ({} of {})",
                        progress.percent(),
                        human_size(progress.written),
                        human_size(progress.total)
                    ));
                }
            }
        }
    }
}

fn stage_label(state: PipelineState) -> Option<&'static str> {
    match state {
        PipelineState::Downloading => Some("Downloading image..."),
        PipelineState::Verifying => Some("Checking image integrity..."),
        PipelineState::AwaitingConfirmation => Some("Waiting for confirmation..."),
        PipelineState::Writing => Some("Writing image to medium..."),
        PipelineState::Configuring => Some("Writing configuration..."),
        PipelineState::PostVerifying => Some("Verifying configuration..."),
        PipelineState::Init | PipelineState::Reported | PipelineState::Failed => None,
    }
}

/// Format the built-in profiles for human-readable output.
#[must_use]
pub fn format_profiles_human(profiles: &[DeviceProfile]) -> String {
    if profiles.is_empty() {
        return String::from("No profiles available.");
    }
    let width = profiles.iter().map(|p| p.name.len()).max().unwrap_or(0);
    let mut output = String::from("Built-in profiles:\n\n");
    for profile in profiles {
        let display = profile
            .display
            .as_ref()
            .map_or_else(|| "headless".to_owned(), |d| format!("{} {}x{}", d.driver, d.width, d.height));
        output.push_str(&format!(
            "  {:<width$}  {} ({display})\n",
            profile.name, profile.board
        ));
    }
    output
}

/// JSON-serialisable summary of one profile.
#[derive(Debug, Serialize)]
pub struct ProfileEntry<'a> {
    /// Catalogue name.
    pub name: &'a str,
    /// Board description.
    pub board: &'a str,
    /// Display driver, absent for headless profiles.
    pub display: Option<&'a str>,
    /// Whether the profile configures a wireless network.
    pub network: bool,
    /// Whether SSH is enabled.
    pub ssh: bool,
}

/// Format the built-in profiles as JSON.
#[must_use]
pub fn format_profiles_json(profiles: &[DeviceProfile]) -> String {
    let entries: Vec<ProfileEntry<'_>> = profiles
        .iter()
        .map(|p| ProfileEntry {
            name: &p.name,
            board: &p.board,
            display: p.display.as_ref().map(|d| d.driver.as_str()),
            network: p.network.is_some(),
            ssh: p.system.ssh,
        })
        .collect();
    serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_owned())
}

/// Format removable media for human-readable output.
#[must_use]
pub fn format_media_human(media: &[MediumHandle]) -> String {
    if media.is_empty() {
        return String::from("No removable media found.\n\nInsert an SD card or USB drive and try again.");
    }
    let mut output = String::from("Removable media:\n\n");
    for medium in media {
        let model = if medium.model.is_empty() {
            "unknown model"
        } else {
            medium.model.as_str()
        };
        output.push_str(&format!(
            "  {:<14} {:>10}  {model} ({})\n",
            medium.path.as_str(),
            human_size(medium.size_bytes),
            medium.transport.as_deref().unwrap_or("unknown")
        ));
    }
    output
}

/// Format removable media as JSON.
#[must_use]
pub fn format_media_json(media: &[MediumHandle]) -> String {
    serde_json::to_string_pretty(media).unwrap_or_else(|_| "[]".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::medium;
    use crate::writer::WriteProgress;
    use std::time::Duration;

    fn sink(quiet: bool) -> StderrProgress<Vec<u8>> {
        StderrProgress::new(Vec::new(), quiet)
    }

    fn text(sink: StderrProgress<Vec<u8>>) -> String {
        String::from_utf8(sink.into_inner()).expect("UTF-8 output")
    }

    #[test]
    fn write_stderr_line_appends_newline() {
        let mut buffer = Vec::new();
        write_stderr_line(&mut buffer, "hello");
        assert_eq!(buffer, b"hello\n");
    }

    #[test]
    fn transitions_are_labelled() {
        let progress = sink(false);
        progress.event(&StageEvent::Transition {
            from: PipelineState::Init,
            to: PipelineState::Downloading,
        });
        progress.event(&StageEvent::Transition {
            from: PipelineState::PostVerifying,
            to: PipelineState::Reported,
        });
        assert_eq!(text(progress), "Downloading image...\n");
    }

    #[test]
    fn write_progress_is_throttled_to_deciles() {
        let progress = sink(false);
        for written in [0, 10, 15, 50, 100] {
            progress.event(&StageEvent::Writing(WriteProgress {
                written,
                total: 100,
            }));
        }
        let shown = text(progress);
        assert_eq!(shown.lines().count(), 4);
        assert!(shown.contains("100%"));
    }

    #[test]
    fn quiet_mode_still_reports_retries() {
        let progress = sink(true);
        progress.event(&StageEvent::Transition {
            from: PipelineState::Init,
            to: PipelineState::Downloading,
        });
        progress.event(&StageEvent::Retrying {
            attempt: 1,
            delay: Duration::from_secs(2),
            reason: "timed out".to_owned(),
        });
        assert_eq!(text(progress), "attempt 1 failed (timed out); retrying in 2s\n");
    }

    #[test]
    fn profiles_list_names_every_profile() {
        let profiles = bootforge::catalogue::builtin_profiles();
        let human = format_profiles_human(&profiles);
        for profile in &profiles {
            assert!(human.contains(&profile.name));
        }
        assert!(human.contains("headless"));

        let json: serde_json::Value =
            serde_json::from_str(&format_profiles_json(&profiles)).expect("valid JSON");
        assert_eq!(json.as_array().map(Vec::len), Some(profiles.len()));
        assert_eq!(json[0]["name"], profiles[0].name.as_str());
    }

    #[test]
    fn empty_media_list_gives_advice() {
        assert!(format_media_human(&[]).contains("No removable media found"));
        assert_eq!(format_media_json(&[]), "[]");
    }

    #[test]
    fn media_list_shows_size_and_model() {
        let media = vec![medium("/dev/sdb", 31_914_983_424, "Card Reader")];
        let human = format_media_human(&media);
        assert!(human.contains("/dev/sdb"));
        assert!(human.contains("29.7 GiB"));
        assert!(human.contains("Card Reader (usb)"));

        let json: serde_json::Value =
            serde_json::from_str(&format_media_json(&media)).expect("valid JSON");
        assert_eq!(json[0]["size_bytes"], 31_914_983_424_u64);
    }
}
