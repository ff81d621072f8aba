use crate::logs::{LogLevel, LogRecord};
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Something that wants to see every log event emitted on a [`LogStream`]
pub trait LogObserver: Send + Sync {
    fn observe(&self, record: &LogRecord);
}

/// Handle returned by [`LogStream::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Resets the dispatch flag even if an observer panics
struct DispatchGuard;

impl DispatchGuard {
    fn enter() -> Option<Self> {
        DISPATCHING.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(DispatchGuard)
            }
        })
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|flag| flag.set(false));
    }
}

/// Application-wide stream of log events.
///
/// Anything logged while an observer is being dispatched on the same thread
/// is dropped, so an observer that logs cannot feed itself.
pub struct LogStream {
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn LogObserver>)>>,
    next_id: AtomicU64,
}

impl LogStream {
    pub fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an observer
    pub fn subscribe(&self, observer: Arc<dyn LogObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        observers.push((id, observer));
        id
    }

    /// Remove an observer. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write().unwrap_or_else(|e| e.into_inner());
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    /// Number of registered observers
    pub fn observer_count(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Emit a `(message, stack trace, level)` event stamped with the current time
    pub fn emit(&self, level: LogLevel, message: impl Into<String>, stack_trace: Option<String>) {
        let mut record = LogRecord::new(level, message);
        if let Some(trace) = stack_trace {
            record = record.with_stack_trace(trace);
        }
        self.publish(&record);
    }

    /// Dispatch an already built record to every observer
    pub fn publish(&self, record: &LogRecord) {
        let Some(_guard) = DispatchGuard::enter() else {
            return;
        };

        // Snapshot so observers may (un)subscribe while being called
        let observers: Vec<Arc<dyn LogObserver>> = self
            .observers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in observers {
            observer.observe(record);
        }
    }
}

impl Default for LogStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Publish panics on `stream` as exception records, then run the previous hook
pub fn install_panic_hook(stream: Arc<LogStream>) {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let message = match info.payload().downcast_ref::<&str>() {
            Some(s) => s.to_string(),
            None => match info.payload().downcast_ref::<String>() {
                Some(s) => s.clone(),
                None => "panic".to_string(),
            },
        };
        let message = match info.location() {
            Some(location) => format!("{} ({})", message, location),
            None => message,
        };
        let trace = std::backtrace::Backtrace::force_capture().to_string();

        stream.emit(LogLevel::Exception, message, Some(trace));
        original_hook(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collector {
        seen: Mutex<Vec<LogRecord>>,
    }

    impl LogObserver for Collector {
        fn observe(&self, record: &LogRecord) {
            self.seen.lock().unwrap().push(record.clone());
        }
    }

    /// Logs back into the stream it observes
    struct Echo {
        stream: Arc<LogStream>,
        calls: AtomicU64,
    }

    impl LogObserver for Echo {
        fn observe(&self, record: &LogRecord) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.stream
                .emit(LogLevel::Debug, format!("echo: {}", record.message()), None);
        }
    }

    #[test]
    fn test_emit_reaches_subscribers() {
        let stream = LogStream::new();
        let collector = Arc::new(Collector::default());
        stream.subscribe(collector.clone());

        stream.emit(LogLevel::Warning, "disk almost full", None);
        stream.emit(LogLevel::Error, "disk full", Some("trace".to_string()));

        let seen = collector.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].level(), LogLevel::Warning);
        assert_eq!(seen[1].stack_trace(), Some("trace"));
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let stream = LogStream::new();
        let collector = Arc::new(Collector::default());
        let id = stream.subscribe(collector.clone());

        assert!(stream.unsubscribe(id));
        assert!(!stream.unsubscribe(id));
        assert_eq!(stream.observer_count(), 0);

        stream.emit(LogLevel::Debug, "ignored", None);
        assert!(collector.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reentrant_emit_is_dropped() {
        let stream = Arc::new(LogStream::new());
        let echo = Arc::new(Echo {
            stream: Arc::clone(&stream),
            calls: AtomicU64::new(0),
        });
        let collector = Arc::new(Collector::default());
        stream.subscribe(echo.clone());
        stream.subscribe(collector.clone());

        stream.emit(LogLevel::Debug, "hello", None);

        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
        let seen = collector.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].message(), "hello");
    }

    #[test]
    fn test_dispatch_flag_released_after_emit() {
        let stream = LogStream::new();
        let collector = Arc::new(Collector::default());
        stream.subscribe(collector.clone());

        stream.emit(LogLevel::Debug, "first", None);
        stream.emit(LogLevel::Debug, "second", None);

        assert_eq!(collector.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_panic_hook_publishes_exception() {
        static PREVIOUS_HOOK_RAN: AtomicU64 = AtomicU64::new(0);

        let stream = Arc::new(LogStream::new());
        let collector = Arc::new(Collector::default());
        stream.subscribe(collector.clone());

        std::panic::set_hook(Box::new(|_| {
            PREVIOUS_HOOK_RAN.fetch_add(1, Ordering::SeqCst);
        }));
        install_panic_hook(Arc::clone(&stream));

        let result = std::panic::catch_unwind(|| panic!("boom at level 3"));

        // Drop both hooks and put the default one back
        drop(std::panic::take_hook());
        assert!(result.is_err());

        assert!(PREVIOUS_HOOK_RAN.load(Ordering::SeqCst) >= 1);
        let seen = collector.seen.lock().unwrap();
        let record = seen
            .iter()
            .find(|r| r.message().starts_with("boom at level 3"))
            .expect("panic was not published");
        assert_eq!(record.level(), LogLevel::Exception);
        assert!(record.message().contains("stream.rs"));
        assert!(!record.stack_trace().unwrap_or("").is_empty());
    }
}
