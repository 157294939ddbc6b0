//! The human at the terminal.
//!
//! The pipeline asks the operator two things: whether a medium may be
//! erased, and whether to try a different medium after a failed write.

use crate::guard::{CONFIRMATION_TOKEN, Confirm, ConfirmationPrompt};
use crate::medium::MediumHandle;
use crate::writer::WriteError;
use camino::Utf8PathBuf;
use std::cell::RefCell;
use std::io::{self, BufRead, Write};

/// Interactive decisions the pipeline delegates to a person.
pub trait Operator: Confirm {
    /// Offer a replacement medium after `error` on `failed`.
    ///
    /// Returns the device path to try next, or `None` to give up.
    fn offer_retarget(&self, failed: &MediumHandle, error: &WriteError) -> Option<Utf8PathBuf>;
}

/// Operator reading answers from a line-oriented input.
pub struct TerminalOperator<I, O> {
    input: RefCell<I>,
    output: RefCell<O>,
}

impl TerminalOperator<io::StdinLock<'static>, io::Stderr> {
    /// Read from standard input and prompt on standard error.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<I: BufRead, O: Write> TerminalOperator<I, O> {
    /// Create an operator over arbitrary streams.
    pub fn new(input: I, output: O) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }

    /// Consume the operator and return the output stream.
    pub fn into_output(self) -> O {
        self.output.into_inner()
    }

    fn say(&self, text: &str) {
        let mut output = self.output.borrow_mut();
        if write!(output, "{text}").and_then(|()| output.flush()).is_err() {
            // Best-effort prompt; the answer is still read.
        }
    }

    /// Read one line; `None` on end of input or a read error.
    fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        match self.input.borrow_mut().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }
}

impl<I: BufRead, O: Write> Confirm for TerminalOperator<I, O> {
    fn confirm(&self, prompt: &ConfirmationPrompt) -> Option<String> {
        let mut text = String::new();
        if let Some(notice) = &prompt.change_notice {
            text.push_str(&format!("\n!! {notice}\n"));
        }
        text.push_str(&format!(
            "\nALL DATA on {} will be destroyed.\nType {CONFIRMATION_TOKEN} to continue: ",
            prompt.summary
        ));
        self.say(&text);
        self.read_line()
    }
}

impl<I: BufRead, O: Write> Operator for TerminalOperator<I, O> {
    fn offer_retarget(&self, failed: &MediumHandle, error: &WriteError) -> Option<Utf8PathBuf> {
        self.say(&format!(
            "\nWriting to {} failed: {error}\nEnter another device path to retry, or press Enter to stop: ",
            failed.path
        ));
        self.read_line()
            .map(|line| line.trim().to_owned())
            .filter(|line| !line.is_empty())
            .map(Utf8PathBuf::from)
    }
}
