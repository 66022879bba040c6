//! Per-read options shared by every reader.

use std::fmt;
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::error::{ErrorAction, ErrorSink, NullErrorSink};
use crate::metrics::{MetricsHandle, ProgressCadence, ProgressCallback, ProgressReport};

/// Options controlling one read.
///
/// Owned by the caller; the reader only clones the shared handles. Keep a
/// clone of [`metrics`](Self::metrics) to inspect counters after the stream
/// is exhausted or dropped.
#[derive(Clone)]
pub struct ReadOptions {
    pub error_action: ErrorAction,
    pub error_sink: Arc<dyn ErrorSink>,
    pub progress: Option<ProgressCallback>,
    pub progress_cadence: ProgressCadence,
    pub cancellation: CancellationToken,
    pub metrics: MetricsHandle,
    /// Identifier written into error records ("-" when absent)
    pub file_id: Option<String>,
    /// Total source length in bytes, enabling percentage progress
    pub source_len: Option<u64>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            error_action: ErrorAction::default(),
            error_sink: Arc::new(NullErrorSink),
            progress: None,
            progress_cadence: ProgressCadence::default(),
            cancellation: CancellationToken::default(),
            metrics: MetricsHandle::default(),
            file_id: None,
            source_len: None,
        }
    }
}

impl fmt::Debug for ReadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOptions")
            .field("error_action", &self.error_action)
            .field("error_sink", &self.error_sink)
            .field("progress", &self.progress.is_some())
            .field("progress_cadence", &self.progress_cadence)
            .field("cancellation", &self.cancellation)
            .field("file_id", &self.file_id)
            .field("source_len", &self.source_len)
            .finish()
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the action applied to violations.
    pub fn with_error_action(mut self, action: ErrorAction) -> Self {
        self.error_action = action;
        self
    }

    /// Set the error sink.
    pub fn with_error_sink(mut self, sink: impl ErrorSink + 'static) -> Self {
        self.error_sink = Arc::new(sink);
        self
    }

    /// Set an error sink shared with other reads.
    pub fn with_shared_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = sink;
        self
    }

    /// Set the progress callback.
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProgressReport) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn with_progress_cadence(mut self, cadence: ProgressCadence) -> Self {
        self.progress_cadence = cadence;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Use an existing metrics handle instead of a fresh one.
    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_file_id(mut self, id: impl Into<String>) -> Self {
        self.file_id = Some(id.into());
        self
    }

    pub fn with_source_len(mut self, len: u64) -> Self {
        self.source_len = Some(len);
        self
    }

    /// Get the metrics handle.
    pub fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }

    /// Get the cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}
