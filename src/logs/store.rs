use crate::error::{CaptureError, Result, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Returned by `read_all` when nothing has been logged yet
pub const EMPTY_LOG_SENTINEL: &str = "No logs available";

/// Default name of the log file inside the log directory
pub const DEFAULT_LOG_FILE_NAME: &str = "logs.txt";

/// Durable, append-only persistence for formatted log lines.
///
/// Implementations persist whatever they are given; admission decisions
/// belong to the sink. Every operation is serialized against the others.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append one entry. A trailing newline is added when missing.
    async fn append(&self, line: &str) -> std::result::Result<(), StoreError>;

    /// Full contents, or [`EMPTY_LOG_SENTINEL`] when empty or missing
    async fn read_all(&self) -> std::result::Result<String, StoreError>;

    /// Remove every entry. Clearing an empty store is a no-op.
    async fn clear(&self) -> std::result::Result<(), StoreError>;

    /// Location of the backing log, stable for the lifetime of the store.
    ///
    /// File-backed stores return an absolute path. Stores with no file
    /// behind them return a descriptive label instead.
    fn path(&self) -> &Path;
}

/// LogStore backed by a single text file
pub struct FileStore {
    /// Absolute path to the log file
    path: PathBuf,
    /// Held for the duration of exactly one file operation
    lock: Mutex<()>,
}

impl FileStore {
    /// Open a store for `file_name` inside `log_dir`
    ///
    /// # Arguments
    /// * `log_dir` - Directory where the log file lives (created if missing)
    /// * `file_name` - Name of the log file
    ///
    /// # Returns
    /// * `Ok(FileStore)` - Directory is ready; the file is created on first append
    /// * `Err(CaptureError)` - Directory could not be created or resolved
    pub async fn open<P: AsRef<Path>>(log_dir: P, file_name: &str) -> Result<Self> {
        let log_dir = log_dir.as_ref();

        tokio::fs::create_dir_all(log_dir).await.map_err(|e| {
            CaptureError::InitializationError(format!(
                "Failed to create log directory {}: {}",
                log_dir.display(),
                e
            ))
        })?;

        let log_dir = tokio::fs::canonicalize(log_dir).await.map_err(|e| {
            CaptureError::InitializationError(format!(
                "Failed to resolve log directory {}: {}",
                log_dir.display(),
                e
            ))
        })?;

        let path = log_dir.join(file_name);
        debug!("Log store opened at {}", path.display());

        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    /// Open a store with the default file name
    pub async fn in_dir<P: AsRef<Path>>(log_dir: P) -> Result<Self> {
        Self::open(log_dir, DEFAULT_LOG_FILE_NAME).await
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::io(&self.path, source)
    }
}

#[async_trait]
impl LogStore for FileStore {
    async fn append(&self, line: &str) -> std::result::Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        // Handle is dropped at the end of this scope on every path
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        let mut entry = String::with_capacity(line.len() + 1);
        entry.push_str(line);
        if !line.ends_with('\n') {
            entry.push('\n');
        }

        file.write_all(entry.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        Ok(())
    }

    async fn read_all(&self) -> std::result::Result<String, StoreError> {
        let _guard = self.lock.lock().await;

        // Invalid UTF-8 from a torn write is replaced, not rejected
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(EMPTY_LOG_SENTINEL.to_string()),
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(EMPTY_LOG_SENTINEL.to_string())
            }
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn clear(&self) -> std::result::Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        // Truncate in place so the path stays valid for later appends
        match tokio::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
            .await
        {
            Ok(_) => {
                debug!("Log store cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// In-memory LogStore, useful for embedding and tests.
///
/// Has no backing file: `path()` returns the label `:memory:`, which is not
/// an absolute path.
pub struct MemoryStore {
    label: PathBuf,
    contents: Mutex<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            label: PathBuf::from(":memory:"),
            contents: Mutex::new(String::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn append(&self, line: &str) -> std::result::Result<(), StoreError> {
        let mut contents = self.contents.lock().await;
        contents.push_str(line);
        if !line.ends_with('\n') {
            contents.push('\n');
        }
        Ok(())
    }

    async fn read_all(&self) -> std::result::Result<String, StoreError> {
        let contents = self.contents.lock().await;
        if contents.is_empty() {
            Ok(EMPTY_LOG_SENTINEL.to_string())
        } else {
            Ok(contents.clone())
        }
    }

    async fn clear(&self) -> std::result::Result<(), StoreError> {
        self.contents.lock().await.clear();
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.label
    }
}
