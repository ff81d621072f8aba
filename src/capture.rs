// Capture module - Feed a child process's output into the log stream

use crate::error::{CaptureError, Result};
use crate::logs::{LogLevel, LogStream};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Result of a captured run
#[derive(Debug)]
pub struct CaptureSummary {
    pub status: ExitStatus,
    pub stdout_lines: usize,
    pub stderr_lines: usize,
}

/// Run `program` with `args`, publishing stdout lines as debug records and
/// stderr lines as error records on `stream`.
///
/// # Returns
/// * `Ok(CaptureSummary)` - The process exited and both pipes were drained
/// * `Err(CaptureError)` - The process could not be spawned or waited on
pub async fn capture_command(
    stream: Arc<LogStream>,
    program: &str,
    args: &[String],
) -> Result<CaptureSummary> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CaptureError::CaptureFailed(format!("Failed to spawn {}: {}", program, e)))?;

    let stdout = child.stdout.take().ok_or_else(|| {
        CaptureError::CaptureFailed(format!("No stdout pipe available for {}", program))
    })?;
    let stderr = child.stderr.take().ok_or_else(|| {
        CaptureError::CaptureFailed(format!("No stderr pipe available for {}", program))
    })?;

    let stdout_task = tokio::spawn(forward_lines(
        BufReader::new(stdout),
        Arc::clone(&stream),
        LogLevel::Debug,
    ));
    let stderr_task = tokio::spawn(forward_lines(
        BufReader::new(stderr),
        Arc::clone(&stream),
        LogLevel::Error,
    ));

    let status = child
        .wait()
        .await
        .map_err(|e| CaptureError::CaptureFailed(format!("Failed to wait for {}: {}", program, e)))?;

    let stdout_lines = stdout_task
        .await
        .map_err(|e| CaptureError::CaptureFailed(format!("stdout reader failed: {}", e)))?;
    let stderr_lines = stderr_task
        .await
        .map_err(|e| CaptureError::CaptureFailed(format!("stderr reader failed: {}", e)))?;

    debug!(
        "{} exited with {} ({} stdout / {} stderr lines)",
        program, status, stdout_lines, stderr_lines
    );

    Ok(CaptureSummary {
        status,
        stdout_lines,
        stderr_lines,
    })
}

/// Publish each line read from `reader` until EOF or a read error
async fn forward_lines<R>(reader: R, stream: Arc<LogStream>, level: LogLevel) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut count = 0;

    // A read error means the pipe is gone
    while let Ok(Some(line)) = lines.next_line().await {
        stream.emit(level, line, None);
        count += 1;
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::{LogObserver, LogRecord};
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

    #[tokio::test]
    async fn test_capture_both_pipes() {
        let stream = Arc::new(LogStream::new());
        let collector = Arc::new(Collector::default());
        stream.subscribe(collector.clone());

        let summary = capture_command(
            Arc::clone(&stream),
            "/bin/sh",
            &[
                "-c".to_string(),
                "echo 'stdout message' && echo 'stderr message' >&2".to_string(),
            ],
        )
        .await
        .unwrap();

        assert!(summary.status.success());
        assert_eq!(summary.stdout_lines, 1);
        assert_eq!(summary.stderr_lines, 1);

        let seen = collector.seen.lock().unwrap();
        assert!(seen
            .iter()
            .any(|r| r.level() == LogLevel::Debug && r.message() == "stdout message"));
        assert!(seen
            .iter()
            .any(|r| r.level() == LogLevel::Error && r.message() == "stderr message"));
    }

    #[tokio::test]
    async fn test_capture_preserves_line_order() {
        let stream = Arc::new(LogStream::new());
        let collector = Arc::new(Collector::default());
        stream.subscribe(collector.clone());

        capture_command(
            Arc::clone(&stream),
            "/bin/sh",
            &["-c".to_string(), "for i in 1 2 3 4 5; do echo line-$i; done".to_string()],
        )
        .await
        .unwrap();

        let seen = collector.seen.lock().unwrap();
        let messages: Vec<&str> = seen.iter().map(|r| r.message()).collect();
        assert_eq!(messages, vec!["line-1", "line-2", "line-3", "line-4", "line-5"]);
    }

    #[tokio::test]
    async fn test_capture_missing_program() {
        let stream = Arc::new(LogStream::new());
        let result = capture_command(stream, "/nonexistent/program", &[]).await;
        assert!(matches!(result, Err(CaptureError::CaptureFailed(_))));
    }
}
