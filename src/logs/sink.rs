use crate::error::{CaptureError, Result};
use crate::logs::{LevelFilter, LogObserver, LogRecord, LogStore, LogStream, SubscriptionId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default number of formatted entries buffered ahead of the store
pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

/// Messages consumed by the flush task
enum SinkCommand {
    Append(String),
    Flush(oneshot::Sender<()>),
    Stop,
}

struct SinkInner {
    filter: RwLock<LevelFilter>,
    tx: mpsc::Sender<SinkCommand>,
    dropped: AtomicU64,
    failed: Arc<AtomicU64>,
    subscription: Mutex<Option<SubscriptionId>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Filters log records and forwards admitted ones to a [`LogStore`].
///
/// `observe` never blocks and never fails: entries go into a bounded buffer
/// that a single background task drains in arrival order. When the buffer is
/// full the entry is dropped and counted.
///
/// The stream only holds a weak handle to an attached sink. Dropping the last
/// clone closes the buffer; the flush task then writes what is left and
/// exits, and the stale subscription ignores further records. `shutdown`
/// does the same while also unsubscribing and waiting for the drain.
#[derive(Clone)]
pub struct LogSink {
    inner: Arc<SinkInner>,
}

impl LogSink {
    /// Start a sink writing to `store`. Must be called within a tokio runtime.
    ///
    /// # Arguments
    /// * `store` - Destination for admitted entries
    /// * `filter` - Initial level filter
    /// * `capacity` - Number of entries that may wait for the store
    pub fn start(store: Arc<dyn LogStore>, filter: LevelFilter, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let failed = Arc::new(AtomicU64::new(0));
        let worker = tokio::spawn(Self::flush_task(store, rx, Arc::clone(&failed)));

        Self {
            inner: Arc::new(SinkInner {
                filter: RwLock::new(filter),
                tx,
                dropped: AtomicU64::new(0),
                failed,
                subscription: Mutex::new(None),
                worker: Mutex::new(Some(worker)),
            }),
        }
    }

    /// Filter and enqueue a record
    pub fn observe(&self, record: &LogRecord) {
        self.inner.observe(record);
    }

    /// Current level filter
    pub fn filter(&self) -> LevelFilter {
        self.inner.filter()
    }

    /// Replace the level filter
    pub fn set_filter(&self, filter: LevelFilter) {
        *self.inner.filter.write().unwrap_or_else(|e| e.into_inner()) = filter;
    }

    /// Subscribe to `stream`. Does nothing if already attached.
    pub fn attach(&self, stream: &LogStream) {
        let mut subscription = self
            .inner
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if subscription.is_none() {
            let observer = AttachedSink(Arc::downgrade(&self.inner));
            *subscription = Some(stream.subscribe(Arc::new(observer)));
        }
    }

    /// Unsubscribe from `stream`. Does nothing if not attached.
    pub fn detach(&self, stream: &LogStream) {
        let mut subscription = self
            .inner
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(id) = subscription.take() {
            stream.unsubscribe(id);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.inner
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Wait until every entry enqueued before this call has reached the store
    pub async fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.inner
            .tx
            .send(SinkCommand::Flush(ack_tx))
            .await
            .map_err(|_| CaptureError::SinkClosed)?;
        ack_rx.await.map_err(|_| CaptureError::SinkClosed)
    }

    /// Detach from `stream`, drain the buffer and stop the flush task
    pub async fn shutdown(&self, stream: &LogStream) -> Result<()> {
        self.detach(stream);

        // Ignore a closed channel: the task is already gone
        let _ = self.inner.tx.send(SinkCommand::Stop).await;

        let worker = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(worker) = worker {
            worker
                .await
                .map_err(|e| CaptureError::Other(format!("Flush task failed: {}", e)))?;
        }
        Ok(())
    }

    /// Entries discarded because the buffer was full
    pub fn dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }

    /// Entries the store failed to persist
    pub fn failed(&self) -> u64 {
        self.inner.failed.load(Ordering::Relaxed)
    }

    /// Background task that owns the store side of the sink
    async fn flush_task(
        store: Arc<dyn LogStore>,
        mut rx: mpsc::Receiver<SinkCommand>,
        failed: Arc<AtomicU64>,
    ) {
        // Only the first failure of a run is reported
        let mut reported = false;

        while let Some(command) = rx.recv().await {
            match command {
                SinkCommand::Append(line) => match store.append(&line).await {
                    Ok(()) => reported = false,
                    Err(e) => {
                        failed.fetch_add(1, Ordering::Relaxed);
                        if !reported {
                            warn!("Failed to persist log entry, suppressing further reports: {}", e);
                            reported = true;
                        }
                    }
                },
                SinkCommand::Flush(ack) => {
                    let _ = ack.send(());
                }
                SinkCommand::Stop => break,
            }
        }

        debug!("Log sink flush task stopped");
    }
}

impl SinkInner {
    fn observe(&self, record: &LogRecord) {
        if !self.filter().admits(record.level()) {
            return;
        }

        match self.tx.try_send(SinkCommand::Append(record.format_line())) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // Shut down; nothing to do
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    fn filter(&self) -> LevelFilter {
        *self.filter.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Stream-side handle of an attached sink. Does not keep the sink alive.
struct AttachedSink(Weak<SinkInner>);

impl LogObserver for AttachedSink {
    fn observe(&self, record: &LogRecord) {
        if let Some(inner) = self.0.upgrade() {
            inner.observe(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::logs::{LogLevel, MemoryStore, EMPTY_LOG_SENTINEL};
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use tokio::sync::Semaphore;

    /// Store that fails every append
    struct BrokenStore {
        path: PathBuf,
    }

    #[async_trait]
    impl LogStore for BrokenStore {
        async fn append(&self, _line: &str) -> std::result::Result<(), StoreError> {
            Err(StoreError::io(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            ))
        }

        async fn read_all(&self) -> std::result::Result<String, StoreError> {
            Ok(EMPTY_LOG_SENTINEL.to_string())
        }

        async fn clear(&self) -> std::result::Result<(), StoreError> {
            Ok(())
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    /// Store whose appends wait for a permit
    struct StalledStore {
        inner: MemoryStore,
        permits: Semaphore,
    }

    #[async_trait]
    impl LogStore for StalledStore {
        async fn append(&self, line: &str) -> std::result::Result<(), StoreError> {
            let permit = self.permits.acquire().await.expect("semaphore closed");
            permit.forget();
            self.inner.append(line).await
        }

        async fn read_all(&self) -> std::result::Result<String, StoreError> {
            self.inner.read_all().await
        }

        async fn clear(&self) -> std::result::Result<(), StoreError> {
            self.inner.clear().await
        }

        fn path(&self) -> &Path {
            self.inner.path()
        }
    }

    #[tokio::test]
    async fn test_disabled_level_does_not_touch_store() {
        let store = Arc::new(MemoryStore::new());
        let sink = LogSink::start(store.clone(), LevelFilter::none(), 16);

        sink.observe(&LogRecord::new(LogLevel::Debug, "x"));
        sink.observe(&LogRecord::new(LogLevel::Exception, "y"));
        sink.flush().await.unwrap();

        assert_eq!(store.read_all().await.unwrap(), EMPTY_LOG_SENTINEL);
    }

    #[tokio::test]
    async fn test_errors_only_filter() {
        let store = Arc::new(MemoryStore::new());
        let sink = LogSink::start(store.clone(), LevelFilter::errors_only(), 16);

        sink.observe(&LogRecord::new(LogLevel::Debug, "x"));
        sink.observe(&LogRecord::new(LogLevel::Error, "y"));
        sink.flush().await.unwrap();

        let contents = store.read_all().await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("[ERROR] y"));
        assert!(lines[0].starts_with('['));
    }

    #[tokio::test]
    async fn test_stack_trace_follows_error_line() {
        let store = Arc::new(MemoryStore::new());
        let sink = LogSink::start(store.clone(), LevelFilter::all(), 16);

        sink.observe(&LogRecord::new(LogLevel::Exception, "boom").with_stack_trace("frame 1\nframe 2"));
        sink.flush().await.unwrap();

        let contents = store.read_all().await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("[EXCEPTION] boom"));
        assert_eq!(lines[1], "frame 1");
        assert_eq!(lines[2], "frame 2");
    }

    #[tokio::test]
    async fn test_set_filter_applies_to_later_records() {
        let store = Arc::new(MemoryStore::new());
        let sink = LogSink::start(store.clone(), LevelFilter::all(), 16);

        sink.observe(&LogRecord::new(LogLevel::Debug, "kept"));
        sink.set_filter(LevelFilter::errors_only());
        sink.observe(&LogRecord::new(LogLevel::Debug, "skipped"));
        sink.flush().await.unwrap();

        let contents = store.read_all().await.unwrap();
        assert!(contents.contains("kept"));
        assert!(!contents.contains("skipped"));
        assert_eq!(sink.filter(), LevelFilter::errors_only());
    }

    #[tokio::test]
    async fn test_store_failures_are_swallowed() {
        let store = Arc::new(BrokenStore {
            path: PathBuf::from("/broken"),
        });
        let sink = LogSink::start(store, LevelFilter::all(), 16);

        for i in 0..5 {
            sink.observe(&LogRecord::new(LogLevel::Error, format!("entry {}", i)));
        }
        sink.flush().await.unwrap();

        assert_eq!(sink.failed(), 5);
    }

    #[tokio::test]
    async fn test_full_buffer_drops_instead_of_blocking() {
        let store = Arc::new(StalledStore {
            inner: MemoryStore::new(),
            permits: Semaphore::new(0),
        });
        let sink = LogSink::start(store.clone(), LevelFilter::all(), 1);

        // At most one entry in flight and one buffered
        for i in 0..3 {
            sink.observe(&LogRecord::new(LogLevel::Debug, format!("entry {}", i)));
        }
        assert!(sink.dropped() >= 1);

        store.permits.add_permits(3);
        sink.flush().await.unwrap();

        let contents = store.read_all().await.unwrap();
        assert_eq!(contents.lines().count() as u64, 3 - sink.dropped());
        assert!(contents.contains("entry 0"));
    }

    #[tokio::test]
    async fn test_attach_and_detach_are_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let stream = LogStream::new();
        let sink = LogSink::start(store.clone(), LevelFilter::all(), 16);

        sink.attach(&stream);
        sink.attach(&stream);
        assert_eq!(stream.observer_count(), 1);
        assert!(sink.is_attached());

        stream.emit(LogLevel::Warning, "via stream", None);

        sink.detach(&stream);
        sink.detach(&stream);
        assert_eq!(stream.observer_count(), 0);
        assert!(!sink.is_attached());

        stream.emit(LogLevel::Warning, "after detach", None);
        sink.flush().await.unwrap();

        let contents = store.read_all().await.unwrap();
        assert!(contents.contains("[WARNING] via stream"));
        assert!(!contents.contains("after detach"));
    }

    #[tokio::test]
    async fn test_shutdown_drains_buffer() {
        let store = Arc::new(MemoryStore::new());
        let stream = LogStream::new();
        let sink = LogSink::start(store.clone(), LevelFilter::all(), 16);
        sink.attach(&stream);

        stream.emit(LogLevel::Debug, "last words", None);
        sink.shutdown(&stream).await.unwrap();

        assert!(!sink.is_attached());
        assert!(store.read_all().await.unwrap().contains("last words"));
        assert!(matches!(sink.flush().await, Err(CaptureError::SinkClosed)));
    }

    #[tokio::test]
    async fn test_concurrent_producers_keep_their_order() {
        let store = Arc::new(MemoryStore::new());
        let sink = LogSink::start(store.clone(), LevelFilter::all(), 4096);

        let mut producers = Vec::new();
        for producer in 0..4 {
            let sink = sink.clone();
            producers.push(std::thread::spawn(move || {
                for i in 0..100 {
                    sink.observe(&LogRecord::new(
                        LogLevel::Debug,
                        format!("p{} {}", producer, i),
                    ));
                }
            }));
        }
        for producer in producers {
            producer.join().unwrap();
        }
        sink.flush().await.unwrap();

        let contents = store.read_all().await.unwrap();
        assert_eq!(contents.lines().count(), 400);
        for producer in 0..4 {
            let prefix = format!("[DEBUG] p{} ", producer);
            let sequence: Vec<u32> = contents
                .lines()
                .filter_map(|line| line.split_once(&prefix))
                .map(|(_, n)| n.parse().unwrap())
                .collect();
            assert_eq!(sequence, (0..100).collect::<Vec<u32>>());
        }
    }

    #[tokio::test]
    async fn test_dropping_sink_releases_it() {
        let store = Arc::new(MemoryStore::new());
        let stream = LogStream::new();
        let sink = LogSink::start(store.clone(), LevelFilter::all(), 16);
        sink.attach(&stream);

        stream.emit(LogLevel::Warning, "before drop", None);
        drop(sink);

        // The flush task drains the closed buffer on its own
        let mut contents = String::new();
        for _ in 0..100 {
            contents = store.read_all().await.unwrap();
            if contents.contains("before drop") {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(contents.contains("before drop"));

        stream.emit(LogLevel::Warning, "after drop", None);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!store.read_all().await.unwrap().contains("after drop"));
    }
}
