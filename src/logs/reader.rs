use crate::error::Result;
use crate::logs::{LogLevel, LogStore, EMPTY_LOG_SENTINEL, TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;

/// Options for reading logs
#[derive(Debug, Clone)]
pub struct LogReadOptions {
    /// Number of entries to read from the end of the log
    pub lines: usize,
    /// Optional filter pattern (simple substring match on the message)
    pub filter: Option<String>,
}

impl Default for LogReadOptions {
    fn default() -> Self {
        Self {
            lines: 100,
            filter: None,
        }
    }
}

/// A parsed log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// The timestamp from the log entry
    pub timestamp: Option<String>,
    /// The level label, when the entry was written by the sink
    pub level: Option<LogLevel>,
    /// The log message, including any stack trace lines
    pub message: String,
}

impl LogEntry {
    /// Parse the first line of an entry.
    ///
    /// Format: `[YYYY-MM-DD HH:MM:SS] [LEVEL] message`, where the level is
    /// absent for manual entries.
    fn parse(line: &str) -> Option<Self> {
        let rest = line.strip_prefix('[')?;
        let end_bracket = rest.find(']')?;
        let timestamp = &rest[..end_bracket];
        // Bracketed text that is not a timestamp belongs to a stack trace
        NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
        let timestamp = timestamp.to_string();
        let rest = rest[end_bracket + 1..].trim_start();

        let (level, message) = match Self::parse_level(rest) {
            Some((level, message)) => (Some(level), message),
            None => (None, rest),
        };

        Some(Self {
            timestamp: Some(timestamp),
            level,
            message: message.to_string(),
        })
    }

    fn parse_level(text: &str) -> Option<(LogLevel, &str)> {
        let rest = text.strip_prefix('[')?;
        let end_bracket = rest.find(']')?;
        let level = rest[..end_bracket].parse().ok()?;
        Some((level, rest[end_bracket + 1..].trim_start()))
    }

    fn plain(line: &str) -> Self {
        Self {
            timestamp: None,
            level: None,
            message: line.to_string(),
        }
    }
}

/// Split raw log contents into entries.
///
/// Lines without a leading timestamp (stack traces) are attached to the
/// preceding entry.
pub fn parse_entries(contents: &str) -> Vec<LogEntry> {
    if contents == EMPTY_LOG_SENTINEL {
        return Vec::new();
    }

    let mut entries: Vec<LogEntry> = Vec::new();
    for line in contents.lines() {
        match LogEntry::parse(line) {
            Some(entry) => entries.push(entry),
            None => match entries.last_mut() {
                Some(previous) => {
                    previous.message.push('\n');
                    previous.message.push_str(line);
                }
                None => entries.push(LogEntry::plain(line)),
            },
        }
    }
    entries
}

/// Keep the last `options.lines` entries matching `options.filter`
pub fn tail_entries(contents: &str, options: &LogReadOptions) -> Vec<LogEntry> {
    let mut entries = parse_entries(contents);

    if let Some(ref pattern) = options.filter {
        entries.retain(|entry| entry.message.contains(pattern.as_str()));
    }

    let start_index = entries.len().saturating_sub(options.lines);
    entries.split_off(start_index)
}

/// Read the last entries from a store
pub async fn read_last_entries(store: &dyn LogStore, options: &LogReadOptions) -> Result<Vec<LogEntry>> {
    let contents = store.read_all().await?;
    Ok(tail_entries(&contents, options))
}
