//! Error sinks receiving [`ReaderError`] records.

use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::ReaderError;

/// Destination for diagnostic records produced during a read.
///
/// Sinks are shared behind an `Arc` and may be reused across reads, so both
/// methods take `&self`.
pub trait ErrorSink: Send + Sync + Debug {
    /// Accept one error record.
    fn report(&self, error: &ReaderError);

    /// Release buffered output. Called once when a read ends.
    fn flush(&self) {}
}

/// Sink that discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullErrorSink;

impl ErrorSink for NullErrorSink {
    fn report(&self, _error: &ReaderError) {}
}

/// In-memory sink collecting records, useful for tests and inspection.
#[derive(Debug, Clone, Default)]
pub struct MemoryErrorSink {
    errors: Arc<Mutex<Vec<ReaderError>>>,
    flushes: Arc<Mutex<usize>>,
}

impl MemoryErrorSink {
    /// Create a new empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the collected records.
    pub fn errors(&self) -> Vec<ReaderError> {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of collected records.
    pub fn len(&self) -> usize {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of times a read released this sink.
    pub fn flush_count(&self) -> usize {
        *self.flushes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clear collected records.
    pub fn clear(&self) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ErrorSink for MemoryErrorSink {
    fn report(&self, error: &ReaderError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error.clone());
    }

    fn flush(&self) {
        *self.flushes.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }
}

/// Appends records to a file as line-delimited JSON.
///
/// Writes are best-effort: a failing write is logged and the read continues.
#[derive(Debug)]
pub struct JsonLinesErrorSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesErrorSink {
    /// Open (or create) `path` for appending.
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Get the log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ErrorSink for JsonLinesErrorSink {
    fn report(&self, error: &ReaderError) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let written = serde_json::to_writer(&mut *writer, error)
            .map_err(io::Error::from)
            .and_then(|_| writer.write_all(b"\n"));
        if let Err(e) = written {
            log::warn!("failed to write error record to {}: {}", self.path.display(), e);
        }
    }

    fn flush(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writer.flush() {
            log::warn!("failed to flush error log {}: {}", self.path.display(), e);
        }
    }
}
