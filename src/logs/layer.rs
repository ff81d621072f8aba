//! Bridges `tracing` events emitted by the application into a [`LogStream`].

use crate::logs::{LogLevel, LogRecord, LogStream};
use std::fmt::Write as FmtWrite;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Root target of this crate. Its own diagnostics are never fed back into
/// the stream, so the tool does not log into the file it manages.
const INTERNAL_TARGET: &str = "logcap";

/// A tracing layer that republishes events on a [`LogStream`]
pub struct CaptureLayer {
    stream: Arc<LogStream>,
}

impl CaptureLayer {
    pub fn new(stream: Arc<LogStream>) -> Self {
        Self { stream }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_internal(metadata.target()) {
            return;
        }

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let level = if visitor.assertion {
            LogLevel::Assert
        } else {
            map_level(metadata.level())
        };

        let mut message = visitor.message;
        if !visitor.fields.is_empty() {
            if !message.is_empty() {
                message.push(' ');
            }
            message.push_str(&visitor.fields);
        }

        let mut record = LogRecord::new(level, message);
        if let Some(trace) = visitor.stack_trace {
            record = record.with_stack_trace(trace);
        }
        self.stream.publish(&record);
    }
}

fn is_internal(target: &str) -> bool {
    target
        .strip_prefix(INTERNAL_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

fn map_level(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warning,
        _ => LogLevel::Debug,
    }
}

/// Collects the message, an optional `stack_trace` field and an optional
/// `assertion` flag. Remaining fields are rendered as `key=value`.
#[derive(Default)]
struct RecordVisitor {
    message: String,
    fields: String,
    stack_trace: Option<String>,
    assertion: bool,
}

impl RecordVisitor {
    fn push_field(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={:?}", field.name(), value);
    }
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message.push_str(value),
            "stack_trace" => self.stack_trace = Some(value.to_string()),
            _ => self.push_field(field, &value),
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "assertion" {
            self.assertion = value;
        } else {
            self.push_field(field, &value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => {
                let _ = write!(self.message, "{:?}", value);
            }
            "stack_trace" => self.stack_trace = Some(format!("{:?}", value)),
            _ => self.push_field(field, value),
        }
    }
}
