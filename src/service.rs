// Service module - Log actions exposed to the application's UI layer

use crate::config::CaptureConfig;
use crate::error::{CaptureError, Result};
use crate::gate::{ConfirmationPrompt, SessionGate};
use crate::logs::{
    tail_entries, timestamp_prefix, FileStore, LogEntry, LogReadOptions, LogStore,
};
use chrono::Local;
use std::sync::Arc;
use tracing::{error, info};

/// Returned by every action while the store is unavailable
pub const NOT_INITIALIZED: &str = "Logger not initialized";

/// Prefix of the status returned when reading fails
pub const READ_FAILED: &str = "Error retrieving logs";

/// Returned by `log_path` while the store is unavailable
pub const PATH_UNAVAILABLE: &str = "Path unavailable";

pub const LOG_SAVED: &str = "Log saved!";
pub const LOGS_CLEARED: &str = "Logs cleared successfully";
pub const CLEAR_CANCELLED: &str = "Clear cancelled";
pub const NOTHING_TO_SEND: &str = "Nothing to send";

/// Outcome of a clear request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    Cancelled,
    Failed(String),
}

impl ClearOutcome {
    pub fn status(&self) -> String {
        match self {
            ClearOutcome::Cleared => LOGS_CLEARED.to_string(),
            ClearOutcome::Cancelled => CLEAR_CANCELLED.to_string(),
            ClearOutcome::Failed(e) => format!("Failed to clear logs: {}", e),
        }
    }
}

/// Send, read and clear actions over a store, with destructive actions
/// routed through a [`SessionGate`].
///
/// A service whose store could not be opened stays usable: every action
/// returns a sentinel status instead of failing.
pub struct LogService {
    store: Option<Arc<dyn LogStore>>,
    gate: SessionGate<dyn ConfirmationPrompt>,
}

impl LogService {
    /// Open the configured file store. Never fails; on error the service is
    /// left uninitialized and the error is logged.
    pub async fn initialize(config: &CaptureConfig, prompt: Arc<dyn ConfirmationPrompt>) -> Self {
        match FileStore::open(&config.log_dir, &config.file_name).await {
            Ok(store) => {
                info!("Log service initialized at {}", store.path().display());
                Self::with_store(Arc::new(store), prompt, config)
            }
            Err(e) => {
                error!("Failed to initialize log service: {}", e);
                Self::uninitialized(prompt, config)
            }
        }
    }

    /// Build a service over an existing store
    pub fn with_store(
        store: Arc<dyn LogStore>,
        prompt: Arc<dyn ConfirmationPrompt>,
        config: &CaptureConfig,
    ) -> Self {
        Self {
            store: Some(store),
            gate: SessionGate::with_request(prompt, config.prompt.clone()),
        }
    }

    /// Build a service with no backing store
    pub fn uninitialized(prompt: Arc<dyn ConfirmationPrompt>, config: &CaptureConfig) -> Self {
        Self {
            store: None,
            gate: SessionGate::with_request(prompt, config.prompt.clone()),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.store.is_some()
    }

    /// Shared handle to the store, for wiring a sink
    pub fn store(&self) -> Result<Arc<dyn LogStore>> {
        self.store.clone().ok_or(CaptureError::NotInitialized)
    }

    /// Append a manual, timestamped entry. Bypasses level filtering.
    pub async fn send_log(&self, message: &str) -> String {
        let Some(store) = &self.store else {
            return NOT_INITIALIZED.to_string();
        };
        if message.trim().is_empty() {
            return NOTHING_TO_SEND.to_string();
        }

        let entry = format!("{} {}", timestamp_prefix(&Local::now()), message);
        match store.append(&entry).await {
            Ok(()) => {
                info!("Log sent: {}", message);
                LOG_SAVED.to_string()
            }
            Err(e) => format!("Failed to send log: {}", e),
        }
    }

    /// Full log contents, or a sentinel
    pub async fn read_logs(&self) -> String {
        let Some(store) = &self.store else {
            return NOT_INITIALIZED.to_string();
        };

        match store.read_all().await {
            Ok(contents) => contents,
            Err(e) => format!("{}: {}", READ_FAILED, e),
        }
    }

    /// Last entries matching `options`
    pub async fn tail_logs(&self, options: &LogReadOptions) -> Result<Vec<LogEntry>> {
        let store = self.store()?;
        let contents = store.read_all().await?;
        Ok(tail_entries(&contents, options))
    }

    /// Ask for confirmation, then clear the store
    pub async fn clear_logs(&self) -> Result<ClearOutcome> {
        let store = self.store()?;

        self.gate
            .request_clear(
                || async move {
                    match store.clear().await {
                        Ok(()) => {
                            info!("Logs deleted");
                            ClearOutcome::Cleared
                        }
                        Err(e) => ClearOutcome::Failed(e.to_string()),
                    }
                },
                || async { ClearOutcome::Cancelled },
            )
            .await
    }

    /// Status string for a clear request
    pub async fn clear_logs_status(&self) -> String {
        match self.clear_logs().await {
            Ok(outcome) => outcome.status(),
            Err(CaptureError::NotInitialized) => NOT_INITIALIZED.to_string(),
            Err(e) => e.to_string(),
        }
    }

    /// Absolute path of the log file, or a sentinel
    pub fn log_path(&self) -> String {
        match &self.store {
            Some(store) => store.path().display().to_string(),
            None => PATH_UNAVAILABLE.to_string(),
        }
    }
}
