//! Read metrics and progress reporting.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters describing one read.
///
/// `completed_at` is only set when the stream finished normally; a Stop, a
/// Throw or a cancellation leaves it unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReaderMetrics {
    /// Physical lines consumed from the source
    pub lines_read: u64,
    /// Records parsed, including skipped ones
    pub raw_records: u64,
    /// Records handed to the caller
    pub records_emitted: u64,
    /// Violations handled
    pub error_count: u64,
    pub terminated_early: bool,
    pub termination_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReaderMetrics {
    /// Whether the read finished normally.
    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }
}

/// Shared, cloneable handle to the metrics of a read.
///
/// The reader mutates the counters in place, so a handle kept by the caller
/// stays inspectable after the iterator is dropped.
#[derive(Debug, Clone, Default)]
pub struct MetricsHandle {
    inner: Arc<Mutex<ReaderMetrics>>,
}

impl MetricsHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> ReaderMetrics {
        self.lock().clone()
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut ReaderMetrics) -> R) -> R {
        f(&mut self.lock())
    }

    /// Reset every counter, allowing the handle to be reused for another read.
    pub fn reset(&self) {
        *self.lock() = ReaderMetrics::default();
    }

    fn lock(&self) -> MutexGuard<'_, ReaderMetrics> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How often the progress callback fires.
///
/// A report is due when either threshold has been reached since the last
/// report. A zero or absent threshold is disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressCadence {
    pub every_records: u64,
    pub every: Option<Duration>,
}

impl Default for ProgressCadence {
    fn default() -> Self {
        Self {
            every_records: 1000,
            every: Some(Duration::from_secs(1)),
        }
    }
}

impl ProgressCadence {
    /// Report after every `n` emitted records only.
    pub fn records(n: u64) -> Self {
        Self {
            every_records: n,
            every: None,
        }
    }

    /// Report on wall time only.
    pub fn interval(every: Duration) -> Self {
        Self {
            every_records: 0,
            every: Some(every),
        }
    }
}

/// Snapshot passed to the progress callback.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    pub records_emitted: u64,
    pub raw_records: u64,
    pub lines_read: u64,
    pub elapsed: Duration,
    /// Share of the source consumed, 0.0 to 100.0, when its length is known
    pub percent: Option<f64>,
}

/// Caller-supplied progress callback.
pub type ProgressCallback = Arc<dyn Fn(&ProgressReport) + Send + Sync>;

/// Decides when a report is due.
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    cadence: ProgressCadence,
    started: Instant,
    last_at: Instant,
    last_records: u64,
}

impl ProgressTracker {
    pub(crate) fn new(cadence: ProgressCadence) -> Self {
        let now = Instant::now();
        Self {
            cadence,
            started: now,
            last_at: now,
            last_records: 0,
        }
    }

    /// Restart the clock when the read actually begins.
    pub(crate) fn restart(&mut self) {
        let now = Instant::now();
        self.started = now;
        self.last_at = now;
        self.last_records = 0;
    }

    /// Check the cadence after `emitted` records; marks the report as sent when due.
    pub(crate) fn due(&mut self, emitted: u64) -> bool {
        let by_count = self.cadence.every_records > 0
            && emitted.saturating_sub(self.last_records) >= self.cadence.every_records;
        let by_time = self
            .cadence
            .every
            .is_some_and(|every| !every.is_zero() && self.last_at.elapsed() >= every);
        if by_count || by_time {
            self.last_records = emitted;
            self.last_at = Instant::now();
            true
        } else {
            false
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Percentage of `consumed` over `total`, clamped to 100.
pub(crate) fn percent_of(consumed: u64, total: Option<u64>) -> Option<f64> {
    match total {
        Some(0) => Some(100.0),
        Some(total) => Some((consumed as f64 / total as f64 * 100.0).min(100.0)),
        None => None,
    }
}
