//! Guarded JSON reader.
//!
//! The root shape is detected first: an array root streams its elements, a
//! single object or scalar root is one record when allowed, and the
//! newline-delimited mode reads consecutive top-level values. Each element's
//! exact bytes are captured by a structural scanner, so size ceilings are
//! measured on the source and malformed elements can be skipped.

mod scanner;

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::config::{JsonLimits, ReadOptions};
use crate::error::{EXCERPT_CHARS, ErrorType, ReadError, Violation, truncate_chars};
use crate::format::FormatKind;
use crate::guard;
use crate::materialize::{Binder, FieldValue, MaterializationSession, Materialize};
use crate::metrics::MetricsHandle;
use crate::session::{ReadOutcome, ReadSession, RecordSource, drive};

use scanner::{Captured, Scanner, is_structural};

/// Element validator. `Ok(false)` rejects the element; `Err` reports a
/// validator failure.
pub type JsonValidator = Arc<dyn Fn(&Value) -> Result<bool, String> + Send + Sync>;

/// JSON reading options.
#[derive(Clone)]
pub struct JsonOptions {
    /// Accept a single object root as one record
    pub allow_single_object: bool,
    /// Accept a scalar root as one record
    pub allow_scalar_root: bool,
    /// Reject every root but an array
    pub require_array_root: bool,
    /// Read consecutive top-level values as records
    pub newline_delimited: bool,
    /// Use the validation path even without a validator
    pub force_guard_rails: bool,
    pub limits: JsonLimits,
    pub validator: Option<JsonValidator>,
}

impl Default for JsonOptions {
    fn default() -> Self {
        Self {
            allow_single_object: true,
            allow_scalar_root: false,
            require_array_root: false,
            newline_delimited: false,
            force_guard_rails: false,
            limits: JsonLimits::default(),
            validator: None,
        }
    }
}

impl fmt::Debug for JsonOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonOptions")
            .field("allow_single_object", &self.allow_single_object)
            .field("allow_scalar_root", &self.allow_scalar_root)
            .field("require_array_root", &self.require_array_root)
            .field("newline_delimited", &self.newline_delimited)
            .field("force_guard_rails", &self.force_guard_rails)
            .field("limits", &self.limits)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl JsonOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_single_object(mut self, allow: bool) -> Self {
        self.allow_single_object = allow;
        self
    }

    pub fn with_scalar_root(mut self, allow: bool) -> Self {
        self.allow_scalar_root = allow;
        self
    }

    pub fn with_require_array_root(mut self, require: bool) -> Self {
        self.require_array_root = require;
        self
    }

    pub fn with_newline_delimited(mut self, enabled: bool) -> Self {
        self.newline_delimited = enabled;
        self
    }

    pub fn with_force_guard_rails(mut self, force: bool) -> Self {
        self.force_guard_rails = force;
        self
    }

    pub fn with_limits(mut self, limits: JsonLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Run `validator` on every element.
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Value) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Whether elements go straight from bytes to field values.
    fn fast_path(&self) -> bool {
        self.validator.is_none() && !self.force_guard_rails && self.limits.max_string_length == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootMode {
    Array,
    Single,
    Lines,
}

/// Lazy iterator of typed records from JSON text.
pub struct JsonReader<R, T> {
    scanner: Scanner<BufReader<R>>,
    options: JsonOptions,
    session: ReadSession,
    binder: Binder<T>,
    mode: Option<RootMode>,
    elements_seen: u64,
    expect_separator: bool,
    ended: bool,
    lines_reported: u64,
}

impl<T: Materialize> JsonReader<File, T> {
    /// Open a file. The file identifier and source length default to the
    /// path and the file size.
    pub fn from_path(
        path: impl AsRef<Path>,
        options: JsonOptions,
        mut read: ReadOptions,
    ) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if read.source_len.is_none() {
            read.source_len = Some(file.metadata()?.len());
        }
        if read.file_id.is_none() {
            read.file_id = Some(path.display().to_string());
        }
        Ok(Self::new(file, options, read))
    }
}

impl<R: Read, T: Materialize> JsonReader<R, T> {
    pub fn new(reader: R, options: JsonOptions, read: ReadOptions) -> Self {
        Self {
            scanner: Scanner::new(BufReader::new(reader)),
            options,
            session: ReadSession::new(FormatKind::Json, &read),
            binder: Binder::global(),
            mode: None,
            elements_seen: 0,
            expect_separator: false,
            ended: false,
            lines_reported: 0,
        }
    }

    /// Use plans from `session` instead of the global one.
    pub fn with_materialization_session(mut self, session: &MaterializationSession) -> Self {
        self.binder = Binder::new(session.plan::<T>());
        self
    }

    pub fn metrics(&self) -> MetricsHandle {
        self.session.metrics().clone()
    }

    fn sync_lines(&mut self) {
        let lines = self.scanner.lines_consumed();
        self.session.add_lines(lines - self.lines_reported);
        self.lines_reported = lines;
    }

    /// Detect the root shape. Returns an outcome when the read must end here.
    fn detect_root(&mut self) -> Result<Option<ReadOutcome<T>>, ReadError> {
        let Some(first) = self.scanner.skip_ws()? else {
            self.sync_lines();
            return Ok(Some(ReadOutcome::End));
        };
        self.sync_lines();

        if self.options.newline_delimited {
            self.mode = Some(RootMode::Lines);
            return Ok(None);
        }

        let opts = &self.options;
        let rejected = match first {
            b'[' => {
                self.scanner.bump()?;
                self.mode = Some(RootMode::Array);
                return Ok(None);
            }
            b'{' if opts.allow_single_object && !opts.require_array_root => None,
            b'{' => Some(("object", "a single object root is not accepted")),
            _ if opts.allow_scalar_root && !opts.require_array_root => None,
            _ => Some(("scalar", "a scalar root is not accepted")),
        };

        match rejected {
            None => {
                self.mode = Some(RootMode::Single);
                if !self.options.fast_path() {
                    self.session.disable_progress_cadence();
                    self.session.report_progress(Some(0.0));
                }
                Ok(None)
            }
            Some((kind, message)) => {
                let violation = Violation::new(ErrorType::JsonRootError, message)
                    .with_excerpt(format!("root={}", kind));
                let line = self.scanner.line();
                Ok(Some(self.finish_with(violation, line, 0)?))
            }
        }
    }

    /// Handle a violation after which the stream cannot continue.
    fn finish_with(
        &mut self,
        violation: Violation,
        line: u64,
        record: u64,
    ) -> Result<ReadOutcome<T>, ReadError> {
        self.ended = true;
        match self.session.handle::<T>(violation, line, record)? {
            ReadOutcome::Stop => Ok(ReadOutcome::Stop),
            _ => Ok(ReadOutcome::End),
        }
    }

    fn next_in_array(&mut self) -> Result<ReadOutcome<T>, ReadError> {
        let line = self.scanner.line();
        let Some(mut b) = self.scanner.skip_ws()? else {
            let v = structural("unexpected end of input inside array", "");
            return self.finish_with(v, line, self.session.next_record_index());
        };

        if self.expect_separator {
            match b {
                b']' => {
                    self.scanner.bump()?;
                    return self.after_root();
                }
                b',' => {
                    self.scanner.bump()?;
                    self.expect_separator = false;
                    match self.scanner.skip_ws()? {
                        Some(next) => b = next,
                        None => {
                            let v = structural("unexpected end of input inside array", ",");
                            return self.finish_with(v, line, self.session.next_record_index());
                        }
                    }
                    if is_structural(b) {
                        let v = structural("expected a value after ','", (b as char).to_string());
                        let line = self.scanner.line();
                        return self.finish_with(v, line, self.session.next_record_index());
                    }
                }
                other => {
                    let v = structural(
                        "expected ',' or ']' between elements",
                        (other as char).to_string(),
                    );
                    let line = self.scanner.line();
                    return self.finish_with(v, line, self.session.next_record_index());
                }
            }
        } else if b == b']' {
            self.scanner.bump()?;
            return self.after_root();
        } else if is_structural(b) {
            let v = structural("expected a value", (b as char).to_string());
            let line = self.scanner.line();
            return self.finish_with(v, line, self.session.next_record_index());
        }

        self.expect_separator = true;
        self.element()
    }

    fn next_line_value(&mut self) -> Result<ReadOutcome<T>, ReadError> {
        let Some(b) = self.scanner.skip_ws()? else {
            self.sync_lines();
            return Ok(ReadOutcome::End);
        };
        if is_structural(b) {
            let line = self.scanner.line();
            let record = self.session.count_raw_record();
            self.scanner.skip_line()?;
            self.sync_lines();
            let v = structural("expected a value", (b as char).to_string());
            return self.session.handle(v, line, record);
        }
        self.element()
    }

    /// Only whitespace may follow the root value.
    fn after_root(&mut self) -> Result<ReadOutcome<T>, ReadError> {
        self.ended = true;
        let trailing = self.scanner.skip_ws()?;
        self.sync_lines();
        match trailing {
            None => {
                if self.mode == Some(RootMode::Single) && !self.options.fast_path() {
                    self.session.report_progress(Some(100.0));
                }
                Ok(ReadOutcome::End)
            }
            Some(b) => {
                let v = structural("trailing content after the root value", (b as char).to_string());
                let line = self.scanner.line();
                self.finish_with(v, line, self.session.next_record_index())
            }
        }
    }

    fn element(&mut self) -> Result<ReadOutcome<T>, ReadError> {
        let limits = self.options.limits;
        let line = self.scanner.line();
        let index = self.elements_seen + 1;
        if let Some(violation) = guard::json_element_count(&limits, index) {
            return self.finish_with(violation, line, index);
        }
        self.elements_seen = index;

        let captured = self
            .scanner
            .capture(limits.max_element_bytes, self.session.cancellation())?;
        self.sync_lines();
        let record = self.session.count_raw_record();

        if !captured.complete {
            let v = structural("unexpected end of input inside element", excerpt(&captured));
            return self.finish_with(v, line, record);
        }
        if let Some(violation) = guard::json_element_size(&limits, captured.size) {
            return self.session.handle(violation, line, record);
        }

        let value = match self.parse(&captured)? {
            Ok(value) => value,
            Err(violation) => {
                if self.mode == Some(RootMode::Lines)
                    && violation.error_type == ErrorType::JsonException
                {
                    self.scanner.skip_line()?;
                    self.sync_lines();
                }
                return self.session.handle(violation, line, record);
            }
        };

        self.session.poll_cancel()?;
        match self.binder.materialize_value(value) {
            Ok(item) => Ok(ReadOutcome::Record(item)),
            Err(e) => {
                let v = Violation::conversion(ErrorType::JsonException, e).with_excerpt(excerpt(&captured));
                self.session.handle(v, line, record)
            }
        }
    }

    /// Turn captured bytes into a field value, on the fast or validation path.
    fn parse(&self, captured: &Captured) -> Result<Result<FieldValue, Violation>, ReadError> {
        let malformed = |e: serde_json::Error| {
            Violation::new(ErrorType::JsonException, format!("malformed element: {}", e))
                .with_excerpt(excerpt(captured))
        };

        if self.options.fast_path() {
            return Ok(serde_json::from_slice::<FieldValue>(&captured.bytes).map_err(malformed));
        }

        let value: Value = match serde_json::from_slice(&captured.bytes) {
            Ok(value) => value,
            Err(e) => return Ok(Err(malformed(e))),
        };
        if let Some(violation) =
            guard::json_strings(&self.options.limits, &value, self.session.cancellation())?
        {
            return Ok(Err(violation));
        }
        if let Some(validator) = &self.options.validator {
            self.session.poll_cancel()?;
            match validator(&value) {
                Ok(true) => {}
                Ok(false) => {
                    return Ok(Err(Violation::new(
                        ErrorType::JsonValidationFailed,
                        "element rejected by validator",
                    )
                    .with_excerpt(excerpt(captured))));
                }
                Err(message) => {
                    return Ok(Err(Violation::new(
                        ErrorType::JsonValidationError,
                        format!("validator failed: {}", message),
                    )
                    .with_excerpt(excerpt(captured))));
                }
            }
        }
        Ok(serde_json::from_slice::<FieldValue>(&captured.bytes).map_err(malformed))
    }
}

fn structural(message: impl Into<String>, excerpt: impl Into<String>) -> Violation {
    Violation::new(ErrorType::JsonException, message).with_excerpt(excerpt)
}

fn excerpt(captured: &Captured) -> String {
    let end = captured.bytes.len().min(EXCERPT_CHARS * 4);
    truncate_chars(&String::from_utf8_lossy(&captured.bytes[..end]), EXCERPT_CHARS)
}

impl<R: Read, T: Materialize> RecordSource for JsonReader<R, T> {
    type Item = T;

    fn session(&mut self) -> &mut ReadSession {
        &mut self.session
    }

    fn advance(&mut self) -> Result<ReadOutcome<T>, ReadError> {
        self.session.poll_cancel()?;
        if self.ended {
            return Ok(ReadOutcome::End);
        }
        let mode = match self.mode {
            Some(mode) => mode,
            None => {
                if let Some(outcome) = self.detect_root()? {
                    return Ok(outcome);
                }
                match self.mode {
                    Some(mode) => mode,
                    None => return Ok(ReadOutcome::End),
                }
            }
        };

        match mode {
            RootMode::Array => self.next_in_array(),
            RootMode::Lines => self.next_line_value(),
            RootMode::Single if self.elements_seen == 0 => self.element(),
            RootMode::Single => self.after_root(),
        }
    }

    fn position(&self) -> Option<u64> {
        Some(self.scanner.consumed())
    }
}

impl<R: Read, T: Materialize> Iterator for JsonReader<R, T> {
    type Item = Result<T, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        drive(self)
    }
}
