use crate::error::{CaptureError, Result};
use crate::gate::{Choice, ConfirmationPrompt, ConfirmationRequest, PromptReply};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Gate lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    AwaitingResponse,
}

/// Puts the gate back to Idle when the request completes or is dropped
struct AwaitingGuard<'a> {
    state: &'a Mutex<GateState>,
}

impl Drop for AwaitingGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = GateState::Idle;
    }
}

/// Confirmation workflow guarding destructive operations.
///
/// The gate never touches the store itself; it only decides which of the two
/// callbacks runs. A request made while another is awaiting its answer is
/// rejected with [`CaptureError::GateBusy`] without invoking either callback.
pub struct SessionGate<P: ConfirmationPrompt + ?Sized> {
    prompt: Arc<P>,
    request: ConfirmationRequest,
    state: Mutex<GateState>,
}

impl<P: ConfirmationPrompt + ?Sized> SessionGate<P> {
    /// Create a gate using the default "Delete Logs" prompt text
    pub fn new(prompt: Arc<P>) -> Self {
        Self::with_request(prompt, ConfirmationRequest::default())
    }

    /// Create a gate with custom prompt text
    pub fn with_request(prompt: Arc<P>, request: ConfirmationRequest) -> Self {
        Self {
            prompt,
            request,
            state: Mutex::new(GateState::Idle),
        }
    }

    pub fn state(&self) -> GateState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Ask for confirmation, then run exactly one of the callbacks.
    ///
    /// The chosen callback runs on the caller's task, after the prompt has
    /// been answered. A prompt that cannot be shown, or is dismissed without
    /// an answer, runs `on_cancel`.
    ///
    /// # Returns
    /// * `Ok(T)` - Output of whichever callback ran
    /// * `Err(CaptureError::GateBusy)` - Another request is still pending
    pub async fn request_clear<T, C, CF, X, XF>(&self, on_confirm: C, on_cancel: X) -> Result<T>
    where
        C: FnOnce() -> CF,
        CF: Future<Output = T>,
        X: FnOnce() -> XF,
        XF: Future<Output = T>,
    {
        {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state == GateState::AwaitingResponse {
                return Err(CaptureError::GateBusy);
            }
            *state = GateState::AwaitingResponse;
        }
        let _guard = AwaitingGuard { state: &self.state };

        let choice = self.ask().await;
        debug!("Clear request answered: {:?}", choice);

        let output = match choice {
            Choice::Confirm => on_confirm().await,
            Choice::Cancel => on_cancel().await,
        };
        Ok(output)
    }

    async fn ask(&self) -> Choice {
        let (reply, answer) = PromptReply::channel();

        if let Err(e) = self.prompt.present(self.request.clone(), reply) {
            warn!("{}; treating as cancel", e);
            return Choice::Cancel;
        }

        answer.await.unwrap_or(Choice::Cancel)
    }
}
