use crate::logs::LogLevel;
use serde::{Deserialize, Serialize};

/// Per-level admission toggles consulted by the sink on every event.
///
/// Assert events share the `log_errors` toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelFilter {
    #[serde(default = "enabled")]
    pub log_debug: bool,

    #[serde(default = "enabled")]
    pub log_warnings: bool,

    #[serde(default = "enabled")]
    pub log_errors: bool,

    #[serde(default = "enabled")]
    pub log_exceptions: bool,
}

fn enabled() -> bool {
    true
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::all()
    }
}

impl LevelFilter {
    /// Admit every level
    pub fn all() -> Self {
        Self {
            log_debug: true,
            log_warnings: true,
            log_errors: true,
            log_exceptions: true,
        }
    }

    /// Admit nothing
    pub fn none() -> Self {
        Self {
            log_debug: false,
            log_warnings: false,
            log_errors: false,
            log_exceptions: false,
        }
    }

    /// Admit only errors, asserts and exceptions
    pub fn errors_only() -> Self {
        Self {
            log_errors: true,
            log_exceptions: true,
            ..Self::none()
        }
    }

    /// Whether a record of the given level passes the filter
    pub fn admits(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Debug => self.log_debug,
            LogLevel::Warning => self.log_warnings,
            LogLevel::Error | LogLevel::Assert => self.log_errors,
            LogLevel::Exception => self.log_exceptions,
        }
    }
}
