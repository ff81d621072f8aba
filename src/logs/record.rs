use chrono::{DateTime, Local};
use std::fmt;
use std::str::FromStr;

/// Timestamp format used for every persisted entry
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Severity of a captured log event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Debug,
    Warning,
    Error,
    Assert,
    Exception,
}

impl LogLevel {
    /// Label written between brackets in the log file
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Assert => "ASSERT",
            LogLevel::Exception => "EXCEPTION",
        }
    }

    /// Whether a stack trace is persisted alongside the message
    pub fn carries_stack_trace(&self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Exception)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "log" => Ok(LogLevel::Debug),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "assert" => Ok(LogLevel::Assert),
            "exception" => Ok(LogLevel::Exception),
            other => Err(format!(
                "unknown log level '{}'. Expected one of: debug, warning, error, assert, exception",
                other
            )),
        }
    }
}

/// One log event observed on the stream. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    timestamp: DateTime<Local>,
    level: LogLevel,
    message: String,
    stack_trace: Option<String>,
}

impl LogRecord {
    /// Create a record stamped with the current local time
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self::at(Local::now(), level, message, None)
    }

    /// Create a record with an explicit timestamp and optional stack trace
    pub fn at(
        timestamp: DateTime<Local>,
        level: LogLevel,
        message: impl Into<String>,
        stack_trace: Option<String>,
    ) -> Self {
        Self {
            timestamp,
            level,
            message: message.into(),
            stack_trace,
        }
    }

    /// Attach a stack trace, consuming the record
    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack_trace(&self) -> Option<&str> {
        self.stack_trace.as_deref()
    }

    /// Format the record body: `[LEVEL] message`, followed by the stack trace
    /// on the next line(s) for errors and exceptions.
    pub fn format_body(&self) -> String {
        let mut body = format!("[{}] {}", self.level.label(), self.message);

        if self.level.carries_stack_trace() {
            if let Some(trace) = self.stack_trace.as_deref().filter(|t| !t.is_empty()) {
                body.push('\n');
                body.push_str(trace.trim_end_matches('\n'));
            }
        }

        body
    }

    /// Format the full persisted entry: `[TIMESTAMP] [LEVEL] message`
    pub fn format_line(&self) -> String {
        format!("{} {}", timestamp_prefix(&self.timestamp), self.format_body())
    }
}

/// Bracketed timestamp prefix shared by sink entries and manual entries
pub fn timestamp_prefix(timestamp: &DateTime<Local>) -> String {
    format!("[{}]", timestamp.format(TIMESTAMP_FORMAT))
}
