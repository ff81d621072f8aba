// Logs module - Log capture, filtering and persistence

mod filter;
mod layer;
mod reader;
mod record;
mod sink;
mod store;
mod stream;

pub use filter::LevelFilter;
pub use layer::CaptureLayer;
pub use reader::{parse_entries, read_last_entries, tail_entries, LogEntry, LogReadOptions};
pub use record::{timestamp_prefix, LogLevel, LogRecord, TIMESTAMP_FORMAT};
pub use sink::{LogSink, DEFAULT_BUFFER_CAPACITY};
pub use store::{FileStore, LogStore, MemoryStore, DEFAULT_LOG_FILE_NAME, EMPTY_LOG_SENTINEL};
pub use stream::{install_panic_hook, LogObserver, LogStream, SubscriptionId};
