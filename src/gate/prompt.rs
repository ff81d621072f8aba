use crate::error::ConfirmationError;
use colored::*;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};
use tokio::sync::oneshot;

/// The user's answer to a confirmation prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Confirm,
    Cancel,
}

/// Text shown by the UI boundary when asking for confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_body")]
    pub body: String,

    #[serde(default = "default_cancel_label")]
    pub cancel_label: String,

    #[serde(default = "default_confirm_label")]
    pub confirm_label: String,
}

fn default_title() -> String {
    "Delete Logs".to_string()
}

fn default_body() -> String {
    "Are you sure you want to delete all logs? This action cannot be undone.".to_string()
}

fn default_cancel_label() -> String {
    "Cancel".to_string()
}

fn default_confirm_label() -> String {
    "Delete".to_string()
}

impl Default for ConfirmationRequest {
    fn default() -> Self {
        Self {
            title: default_title(),
            body: default_body(),
            cancel_label: default_cancel_label(),
            confirm_label: default_confirm_label(),
        }
    }
}

/// One-shot reply handle given to the UI boundary with each request.
///
/// Consuming it sends the answer. Dropping it unanswered counts as a cancel.
pub struct PromptReply {
    tx: oneshot::Sender<Choice>,
}

impl PromptReply {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Choice>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn respond(self, choice: Choice) {
        // The gate may have gone away; nothing left to notify
        let _ = self.tx.send(choice);
    }

    pub fn confirm(self) {
        self.respond(Choice::Confirm);
    }

    pub fn cancel(self) {
        self.respond(Choice::Cancel);
    }
}

/// UI boundary able to render a confirmation prompt.
///
/// `present` must return promptly; the answer is delivered later through
/// the reply handle, from whatever context owns the UI.
pub trait ConfirmationPrompt: Send + Sync {
    fn present(
        &self,
        request: ConfirmationRequest,
        reply: PromptReply,
    ) -> Result<(), ConfirmationError>;
}

/// Answers every prompt with a fixed choice (`--yes`, scripted use)
#[derive(Debug, Clone, Copy)]
pub struct AutoPrompt(pub Choice);

impl ConfirmationPrompt for AutoPrompt {
    fn present(
        &self,
        _request: ConfirmationRequest,
        reply: PromptReply,
    ) -> Result<(), ConfirmationError> {
        reply.respond(self.0);
        Ok(())
    }
}

/// Asks on the terminal. Only an explicit confirm label (or `y`/`yes`)
/// confirms; anything else, including end of input, cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl TerminalPrompt {
    pub fn new() -> Self {
        Self
    }

    fn ask(request: &ConfirmationRequest) -> io::Result<Choice> {
        let mut stdout = io::stdout();
        writeln!(stdout)?;
        writeln!(stdout, "{}", request.title.yellow().bold())?;
        writeln!(stdout, "{}", request.body)?;
        write!(
            stdout,
            "[{}] / [{}] > ",
            request.cancel_label.dimmed(),
            request.confirm_label.red().bold()
        )?;
        stdout.flush()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer)?;
        Ok(parse_answer(&answer, request))
    }
}

fn parse_answer(answer: &str, request: &ConfirmationRequest) -> Choice {
    let answer = answer.trim();
    if answer.eq_ignore_ascii_case(&request.confirm_label)
        || answer.eq_ignore_ascii_case("y")
        || answer.eq_ignore_ascii_case("yes")
    {
        Choice::Confirm
    } else {
        Choice::Cancel
    }
}

impl ConfirmationPrompt for TerminalPrompt {
    fn present(
        &self,
        request: ConfirmationRequest,
        reply: PromptReply,
    ) -> Result<(), ConfirmationError> {
        std::thread::Builder::new()
            .name("logcap-prompt".to_string())
            .spawn(move || match Self::ask(&request) {
                Ok(choice) => reply.respond(choice),
                // Reply dropped: treated as a dismissal
                Err(_) => drop(reply),
            })
            .map(|_| ())
            .map_err(|e| ConfirmationError::Unreachable(format!("Failed to start prompt: {}", e)))
    }
}
