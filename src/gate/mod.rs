// Gate module - Confirmation before destructive operations

mod prompt;
mod session;

pub use prompt::{AutoPrompt, Choice, ConfirmationPrompt, ConfirmationRequest, PromptReply, TerminalPrompt};
pub use session::{GateState, SessionGate};
