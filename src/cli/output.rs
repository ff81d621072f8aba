// Output formatting and display for CLI

use crate::logs::{LogEntry, LogLevel, EMPTY_LOG_SENTINEL};
use crate::service::{ClearOutcome, LOG_SAVED};
use colored::*;

/// Print a status string returned by an action
pub fn print_status(status: &str) {
    if status == LOG_SAVED {
        print_success_msg(status);
    } else {
        print_info(status);
    }
}

/// Print the result of a clear request
pub fn print_clear_outcome(outcome: &ClearOutcome) {
    match outcome {
        ClearOutcome::Cleared => print_success_msg(&outcome.status()),
        ClearOutcome::Cancelled => println!("{} {}", "•".yellow().bold(), outcome.status()),
        ClearOutcome::Failed(_) => print_error(&outcome.status()),
    }
}

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a success message
pub fn print_success_msg(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print the raw contents of the log file
pub fn print_raw_logs(contents: &str) {
    if contents == EMPTY_LOG_SENTINEL {
        println!("{}", EMPTY_LOG_SENTINEL.yellow());
        return;
    }
    print!("{}", contents);
    if !contents.ends_with('\n') {
        println!();
    }
}

/// Print parsed entries with level coloring
pub fn print_entries(entries: &[LogEntry]) {
    if entries.is_empty() {
        println!("{}", EMPTY_LOG_SENTINEL.yellow());
        return;
    }

    println!("\n{}", "Logs".bold().underline());
    println!();

    for entry in entries {
        let timestamp = entry
            .timestamp
            .as_deref()
            .map(|ts| format!("[{}]", ts).dimmed().to_string())
            .unwrap_or_default();
        let level = entry
            .level
            .map(format_level_colored)
            .unwrap_or_default();

        let mut head = String::new();
        if !timestamp.is_empty() {
            head.push_str(&timestamp);
            head.push(' ');
        }
        if !level.is_empty() {
            head.push_str(&level);
            head.push(' ');
        }

        let mut lines = entry.message.lines();
        println!("{}{}", head, lines.next().unwrap_or(""));
        for continuation in lines {
            println!("    {}", continuation.dimmed());
        }
    }

    println!();
    println!(
        "{}",
        format!("Total: {} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" })
            .dimmed()
            .italic()
    );
}

/// Format a level label with color coding
fn format_level_colored(level: LogLevel) -> String {
    let label = format!("[{}]", level.label());
    match level {
        LogLevel::Debug => label.bright_black().to_string(),
        LogLevel::Warning => label.yellow().to_string(),
        LogLevel::Error => label.red().to_string(),
        LogLevel::Assert => label.magenta().to_string(),
        LogLevel::Exception => label.red().bold().to_string(),
    }
}
