use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the log capture service
#[derive(Debug, Error)]
pub enum CaptureError {
    // Initialization errors
    #[error("Logger initialization failed: {0}")]
    InitializationError(String),

    #[error("Logger not initialized")]
    NotInitialized,

    // Store errors
    #[error(transparent)]
    Store(#[from] StoreError),

    // Confirmation errors
    #[error(transparent)]
    Confirmation(#[from] ConfirmationError),

    #[error("A clear request is already awaiting confirmation")]
    GateBusy,

    // Sink errors
    #[error("Log sink is closed")]
    SinkClosed,

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // Child process capture errors
    #[error("Failed to capture command output: {0}")]
    CaptureFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Failure of a store operation
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O failure on {}: {source}", path.display())]
    IoFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::IoFailure {
            path: path.into(),
            source,
        }
    }
}

/// The UI boundary could not present or complete a confirmation prompt
#[derive(Debug, Error)]
pub enum ConfirmationError {
    #[error("Confirmation prompt unavailable: {0}")]
    Unreachable(String),
}

/// Result type alias for log capture operations
pub type Result<T> = std::result::Result<T, CaptureError>;
