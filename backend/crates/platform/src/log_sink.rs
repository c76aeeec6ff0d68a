//! Asynchronous append-only audit log
//!
//! Producers push formatted records onto a shared queue and return
//! immediately; a single writer thread owns the file handle. The writer swaps
//! the whole pending queue out under the lock and performs file I/O outside
//! of it, so producers are never blocked behind disk writes.
//!
//! ## Record format
//! ```text
//! [2024-01-15T14:30:25+03:00] [INFO] [Thread:ThreadId(3)] message
//! ```

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use crate::{fs, time};

/// Name of the writer thread
const WRITER_THREAD_NAME: &str = "log-sink-writer";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum LogSinkError {
    /// Log file cannot be opened for appending
    #[error("Cannot open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writer thread could not be started
    #[error("Failed to start log writer thread: {0}")]
    Spawn(#[source] io::Error),
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Warning,
    Info,
}

impl Severity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Severity::Success => "SUCCESS",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One formatted entry, stamped on the producing thread
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub timestamp: String,
    pub severity: Severity,
    pub thread: String,
    pub message: String,
}

impl LogRecord {
    fn capture(severity: Severity, message: String) -> Self {
        Self {
            timestamp: time::moscow_timestamp(),
            severity,
            thread: format!("{:?}", thread::current().id()),
            message,
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] [Thread:{}] {}",
            self.timestamp, self.severity, self.thread, self.message
        )
    }
}

// ============================================================================
// Sink
// ============================================================================

#[derive(Default)]
struct Queue {
    records: Vec<LogRecord>,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    queue: Mutex<Queue>,
    ready: Condvar,
}

struct Binding {
    path: PathBuf,
    writer: Option<JoinHandle<()>>,
}

/// Audit log with a dedicated writer thread
///
/// Logging starts disabled; call [`LogSink::enable`] to begin recording.
/// Enabling and disabling never restart the writer.
pub struct LogSink {
    shared: Arc<Shared>,
    enabled: AtomicBool,
    closed: AtomicBool,
    binding: Mutex<Binding>,
}

impl LogSink {
    /// Open `path` for appending and start the writer thread
    ///
    /// Fails if the file cannot be opened. Later write failures are reported
    /// through `tracing` only.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, LogSinkError> {
        let path = path.into();
        let shared = Arc::new(Shared::default());
        let file = open_append(&path)?;
        let writer = start_writer(Arc::clone(&shared), file, &path)?;

        Ok(Self {
            shared,
            enabled: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            binding: Mutex::new(Binding {
                path,
                writer: Some(writer),
            }),
        })
    }

    /// Queue a record; no-op while disabled
    pub fn log(&self, severity: Severity, message: impl Into<String>) {
        if !self.is_enabled() || self.closed.load(Ordering::Acquire) {
            return;
        }
        let record = LogRecord::capture(severity, message.into());
        self.shared.queue.lock().records.push(record);
        self.shared.ready.notify_one();
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Path the writer is currently bound to
    pub fn path(&self) -> PathBuf {
        self.binding.lock().path.clone()
    }

    /// Rebind the sink to a new file
    ///
    /// The new file is opened first; on failure the current writer keeps
    /// running. Otherwise the current writer drains its pending records into
    /// the old file and a new writer is started on `new_path`. If that writer
    /// cannot start, the sink goes back to the old file.
    pub fn set_file_path(&self, new_path: impl Into<PathBuf>) -> Result<(), LogSinkError> {
        let new_path = new_path.into();
        let file = open_append(&new_path)?;

        let mut binding = self.binding.lock();
        self.stop_writer(&mut binding);
        self.shared.queue.lock().shutdown = false;

        match start_writer(Arc::clone(&self.shared), file, &new_path) {
            Ok(writer) => {
                binding.path = new_path;
                binding.writer = Some(writer);
                self.closed.store(false, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                self.restore_writer(&mut binding);
                Err(e)
            }
        }
    }

    /// Drain pending records and stop the writer; later records are dropped
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let mut binding = self.binding.lock();
        self.stop_writer(&mut binding);
    }

    /// Restart the writer on the bound path; close the sink if that fails
    fn restore_writer(&self, binding: &mut Binding) {
        let restarted = open_append(&binding.path)
            .and_then(|file| start_writer(Arc::clone(&self.shared), file, &binding.path));
        match restarted {
            Ok(writer) => binding.writer = Some(writer),
            Err(e) => {
                tracing::error!(path = %binding.path.display(), error = %e, "Log writer could not be restarted, closing sink");
                self.closed.store(true, Ordering::Release);
                self.shared.queue.lock().records.clear();
            }
        }
    }

    fn stop_writer(&self, binding: &mut Binding) {
        let Some(handle) = binding.writer.take() else {
            return;
        };
        self.shared.queue.lock().shutdown = true;
        self.shared.ready.notify_all();
        if handle.join().is_err() {
            tracing::error!(path = %binding.path.display(), "Log writer thread panicked");
        }
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink")
            .field("path", &self.path())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

// ============================================================================
// Writer thread
// ============================================================================

fn start_writer(
    shared: Arc<Shared>,
    file: File,
    path: &Path,
) -> Result<JoinHandle<()>, LogSinkError> {
    let path = path.to_path_buf();
    thread::Builder::new()
        .name(WRITER_THREAD_NAME.to_string())
        .spawn(move || write_loop(&shared, file, &path))
        .map_err(LogSinkError::Spawn)
}

fn open_append(path: &Path) -> Result<File, LogSinkError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::ensure_dir(parent).map_err(|source| LogSinkError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LogSinkError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn write_loop(shared: &Shared, file: File, path: &Path) {
    let mut out = BufWriter::new(file);
    loop {
        let (batch, stop) = {
            let mut queue = shared.queue.lock();
            while queue.records.is_empty() && !queue.shutdown {
                shared.ready.wait(&mut queue);
            }
            (std::mem::take(&mut queue.records), queue.shutdown)
        };
        write_batch(&mut out, &batch, path);
        if stop {
            break;
        }
    }

    // Final drain: anything pushed after the last swap
    let rest = std::mem::take(&mut shared.queue.lock().records);
    write_batch(&mut out, &rest, path);
}

fn write_batch(out: &mut BufWriter<File>, batch: &[LogRecord], path: &Path) {
    if batch.is_empty() {
        return;
    }
    for record in batch {
        if let Err(e) = writeln!(out, "{record}") {
            tracing::warn!(path = %path.display(), error = %e, "Dropping log records after write failure");
            return;
        }
    }
    if let Err(e) = out.flush() {
        tracing::warn!(path = %path.display(), error = %e, "Log flush failed");
    }
}
