//! Per-read bookkeeping shared by the CSV, JSON and YAML readers.
//!
//! A reader owns one [`ReadSession`]. The session turns violations into
//! [`ReaderError`] records, applies the configured [`ErrorAction`], keeps the
//! metrics handle current and fires progress reports. Readers implement
//! [`RecordSource`] and call [`drive`] from `Iterator::next`.

use std::sync::Arc;

use chrono::Utc;

use crate::cancel::CancellationToken;
use crate::config::ReadOptions;
use crate::error::{ErrorAction, ErrorSink, ReadError, ReaderError, Violation};
use crate::format::FormatKind;
use crate::metrics::{MetricsHandle, ProgressCallback, ProgressReport, ProgressTracker, percent_of};

/// Result of one reader step.
///
/// Faults (Throw, I/O, cancellation) travel on the `Err` arm of the step.
#[derive(Debug)]
pub(crate) enum ReadOutcome<T> {
    /// A record ready for the caller
    Record(T),
    /// A unit was discarded; keep going
    Skip,
    /// End gracefully without completion
    Stop,
    /// The source is exhausted
    End,
}

pub(crate) struct ReadSession {
    reader: FormatKind,
    action: ErrorAction,
    sink: Arc<dyn ErrorSink>,
    progress: Option<ProgressCallback>,
    tracker: ProgressTracker,
    cancel: CancellationToken,
    metrics: MetricsHandle,
    file: String,
    source_len: Option<u64>,
    stop_reason: Option<String>,
    cadence_enabled: bool,
    started: bool,
    finished: bool,
}

impl ReadSession {
    pub(crate) fn new(reader: FormatKind, options: &ReadOptions) -> Self {
        Self {
            reader,
            action: options.error_action,
            sink: Arc::clone(&options.error_sink),
            progress: options.progress.clone(),
            tracker: ProgressTracker::new(options.progress_cadence),
            cancel: options.cancellation.clone(),
            metrics: options.metrics.clone(),
            file: options.file_id.clone().unwrap_or_else(|| "-".into()),
            source_len: options.source_len,
            stop_reason: None,
            cadence_enabled: true,
            started: false,
            finished: false,
        }
    }

    /// Mark the read as started. Only the first call has an effect.
    pub(crate) fn begin(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.tracker.restart();
        self.metrics.update(|m| m.started_at = Some(Utc::now()));
        log::debug!("{} read of '{}' started", self.reader, self.file);
    }

    pub(crate) fn poll_cancel(&self) -> Result<(), ReadError> {
        self.cancel.poll()
    }

    pub(crate) fn metrics(&self) -> &MetricsHandle {
        &self.metrics
    }

    pub(crate) fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn action(&self) -> ErrorAction {
        self.action
    }

    pub(crate) fn source_len(&self) -> Option<u64> {
        self.source_len
    }

    pub(crate) fn add_lines(&self, lines: u64) {
        if lines > 0 {
            self.metrics.update(|m| m.lines_read += lines);
        }
    }

    /// Count one parsed record and return its 1-based index.
    pub(crate) fn count_raw_record(&self) -> u64 {
        self.metrics.update(|m| {
            m.raw_records += 1;
            m.raw_records
        })
    }

    /// Index the next raw record would get, without counting it.
    pub(crate) fn next_record_index(&self) -> u64 {
        self.metrics.update(|m| m.raw_records + 1)
    }

    /// Record a violation, forward it to the sink and apply the error action.
    pub(crate) fn handle<T>(
        &mut self,
        violation: Violation,
        line: u64,
        record: u64,
    ) -> Result<ReadOutcome<T>, ReadError> {
        self.metrics.update(|m| m.error_count += 1);
        let error = ReaderError {
            ts: Utc::now(),
            reader: self.reader,
            file: self.file.clone(),
            line,
            record,
            error_type: violation.error_type,
            message: violation.message,
            excerpt: violation.excerpt,
            action: self.action,
        };
        log::warn!(
            "{} reader: {} at line {} record {}: {}",
            self.reader,
            error.error_type,
            line,
            record,
            error.message
        );
        self.sink.report(&error);

        match self.action {
            ErrorAction::Skip => Ok(ReadOutcome::Skip),
            ErrorAction::Stop => {
                self.stop_reason = Some(format!("stopped on {}: {}", error.error_type, error.message));
                Ok(ReadOutcome::Stop)
            }
            ErrorAction::Throw => Err(match violation.conversion {
                Some(conversion) => ReadError::Conversion(conversion),
                None => ReadError::Violation(Box::new(error)),
            }),
        }
    }

    /// Count an emitted record and fire progress when due.
    pub(crate) fn record_emitted(&mut self, position: Option<u64>) {
        let emitted = self.metrics.update(|m| {
            m.records_emitted += 1;
            m.records_emitted
        });
        if self.progress.is_some() && self.cadence_enabled && self.tracker.due(emitted) {
            self.report_progress(position.and_then(|p| percent_of(p, self.source_len)));
        }
    }

    /// Only explicit reports fire from now on.
    pub(crate) fn disable_progress_cadence(&mut self) {
        self.cadence_enabled = false;
    }

    /// Fire a progress report regardless of cadence.
    pub(crate) fn report_progress(&self, percent: Option<f64>) {
        let Some(callback) = &self.progress else {
            return;
        };
        let snapshot = self.metrics.snapshot();
        callback(&ProgressReport {
            records_emitted: snapshot.records_emitted,
            raw_records: snapshot.raw_records,
            lines_read: snapshot.lines_read,
            elapsed: self.tracker.elapsed(),
            percent,
        });
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    fn finish_completed(&mut self) {
        let snapshot = self.metrics.update(|m| {
            m.completed_at = Some(Utc::now());
            m.clone()
        });
        log::info!(
            "{} read of '{}' completed: {} emitted, {} parsed, {} errors",
            self.reader,
            self.file,
            snapshot.records_emitted,
            snapshot.raw_records,
            snapshot.error_count
        );
        self.close();
    }

    fn finish_stopped(&mut self) {
        let message = self
            .stop_reason
            .take()
            .unwrap_or_else(|| "stopped".to_string());
        log::info!("{} read of '{}' {}", self.reader, self.file, message);
        self.metrics.update(|m| {
            m.terminated_early = true;
            m.termination_message = Some(message);
        });
        self.close();
    }

    fn finish_failed(&mut self, error: &ReadError) {
        if error.is_cancelled() {
            log::debug!("{} read of '{}' cancelled", self.reader, self.file);
        } else {
            log::info!("{} read of '{}' failed: {}", self.reader, self.file, error);
            self.metrics.update(|m| {
                m.terminated_early = true;
                m.termination_message = Some(error.to_string());
            });
        }
        self.close();
    }

    fn close(&mut self) {
        self.finished = true;
        self.sink.flush();
    }
}

impl Drop for ReadSession {
    fn drop(&mut self) {
        if self.started && !self.finished {
            self.sink.flush();
        }
    }
}

/// A reader that can be stepped by [`drive`].
pub(crate) trait RecordSource {
    type Item;

    fn session(&mut self) -> &mut ReadSession;

    /// Produce the next outcome. Violations must already be handled.
    fn advance(&mut self) -> Result<ReadOutcome<Self::Item>, ReadError>;

    /// Bytes consumed so far, for percentage progress.
    fn position(&self) -> Option<u64> {
        None
    }
}

/// Pull the next record from a source, closing the session when the stream ends.
pub(crate) fn drive<S: RecordSource>(source: &mut S) -> Option<Result<S::Item, ReadError>> {
    if source.session().is_finished() {
        return None;
    }
    source.session().begin();
    loop {
        match source.advance() {
            Ok(ReadOutcome::Record(item)) => {
                let position = source.position();
                source.session().record_emitted(position);
                return Some(Ok(item));
            }
            Ok(ReadOutcome::Skip) => continue,
            Ok(ReadOutcome::Stop) => {
                source.session().finish_stopped();
                return None;
            }
            Ok(ReadOutcome::End) => {
                source.session().finish_completed();
                return None;
            }
            Err(error) => {
                source.session().finish_failed(&error);
                return Some(Err(error));
            }
        }
    }
}
