//! Guarded CSV reader.
//!
//! Records are split by a byte-level tokenizer with a configurable quoting
//! discipline, checked against [`CsvLimits`], mapped onto a [`Schema`] and
//! typed by per-column inference before materialization.

mod inference;
mod tokenizer;

pub use inference::ColumnType;

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{CsvLimits, ReadOptions};
use crate::error::{ErrorType, ReadError, Violation};
use crate::format::FormatKind;
use crate::guard;
use crate::materialize::{Binder, FieldValue, MaterializationSession, Materialize};
use crate::metrics::MetricsHandle;
use crate::schema::Schema;
use crate::session::{ReadOutcome, ReadSession, RecordSource, drive};

use inference::ColumnState;
use tokenizer::{RawRecord, Tokenizer};

/// Quoting discipline of the tokenizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteMode {
    /// Quotes only open a field; `""` inside quotes is an escaped quote
    #[default]
    Strict,
    /// Any quote toggles quoted mode
    Lenient,
    /// Like Strict, but any quote inside field content is an error
    ErrorOnIllegal,
}

impl QuoteMode {
    /// Parse a quote mode from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "strict" => Some(QuoteMode::Strict),
            "lenient" => Some(QuoteMode::Lenient),
            "error_on_illegal" | "erroronillegal" => Some(QuoteMode::ErrorOnIllegal),
            _ => None,
        }
    }
}

/// Receives the record index and raw text of every parsed record.
pub type RawRecordObserver = Arc<dyn Fn(u64, &str) + Send + Sync>;

/// CSV parsing options.
#[derive(Clone)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub quote: u8,
    /// First non-blank record is a header
    pub has_header: bool,
    /// Field names overriding the header
    pub schema: Option<Vec<String>>,
    pub quote_mode: QuoteMode,
    pub infer_types: bool,
    /// Rows sampled before column types are fixed
    pub sample_rows: usize,
    pub preserve_leading_zeros: bool,
    pub skip_empty_lines: bool,
    pub limits: CsvLimits,
    /// Opt-in raw record capture
    pub raw_observer: Option<RawRecordObserver>,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            has_header: true,
            schema: None,
            quote_mode: QuoteMode::default(),
            infer_types: true,
            sample_rows: 100,
            preserve_leading_zeros: true,
            skip_empty_lines: true,
            limits: CsvLimits::default(),
            raw_observer: None,
        }
    }
}

impl fmt::Debug for CsvOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsvOptions")
            .field("delimiter", &(self.delimiter as char))
            .field("quote", &(self.quote as char))
            .field("has_header", &self.has_header)
            .field("schema", &self.schema)
            .field("quote_mode", &self.quote_mode)
            .field("infer_types", &self.infer_types)
            .field("sample_rows", &self.sample_rows)
            .field("preserve_leading_zeros", &self.preserve_leading_zeros)
            .field("skip_empty_lines", &self.skip_empty_lines)
            .field("limits", &self.limits)
            .field("raw_observer", &self.raw_observer.is_some())
            .finish()
    }
}

impl CsvOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_quote(mut self, quote: u8) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Use explicit field names instead of the header's.
    pub fn with_schema<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.schema = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_quote_mode(mut self, mode: QuoteMode) -> Self {
        self.quote_mode = mode;
        self
    }

    pub fn with_type_inference(mut self, infer: bool) -> Self {
        self.infer_types = infer;
        self
    }

    pub fn with_sample_rows(mut self, rows: usize) -> Self {
        self.sample_rows = rows;
        self
    }

    pub fn with_preserve_leading_zeros(mut self, preserve: bool) -> Self {
        self.preserve_leading_zeros = preserve;
        self
    }

    pub fn with_skip_empty_lines(mut self, skip: bool) -> Self {
        self.skip_empty_lines = skip;
        self
    }

    pub fn with_limits(mut self, limits: CsvLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Receive the raw text of every record.
    pub fn with_raw_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(u64, &str) + Send + Sync + 'static,
    {
        self.raw_observer = Some(Arc::new(observer));
        self
    }
}

struct Row {
    values: Vec<String>,
    line: u64,
    record: u64,
}

/// A parsed unit waiting for its turn while types are being sampled.
enum Pending {
    Row(Row),
    Violation {
        violation: Violation,
        line: u64,
        record: u64,
    },
}

/// Lazy iterator of typed records from CSV text.
///
/// Nothing is read before the first call to `next`. A reader built with
/// [`CsvReader::new`] takes the source by value; pass `&mut source` to keep
/// ownership.
pub struct CsvReader<R, T> {
    tokenizer: Tokenizer<R>,
    options: CsvOptions,
    session: ReadSession,
    binder: Binder<T>,
    schema: Option<Schema>,
    columns: Vec<ColumnState>,
    pending: VecDeque<Pending>,
    header_done: bool,
    sampled: bool,
    lines_reported: u64,
}

impl<T: Materialize> CsvReader<File, T> {
    /// Open a file. The file identifier and source length default to the
    /// path and the file size.
    pub fn from_path(
        path: impl AsRef<Path>,
        options: CsvOptions,
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

impl<R: Read, T: Materialize> CsvReader<R, T> {
    pub fn new(reader: R, options: CsvOptions, read: ReadOptions) -> Self {
        let tokenizer = Tokenizer::new(reader, options.delimiter, options.quote, options.quote_mode)
            .with_capture(options.raw_observer.is_some())
            .with_store_limit(options.limits.max_record_length);
        Self {
            tokenizer,
            session: ReadSession::new(FormatKind::Csv, &read),
            binder: Binder::global(),
            schema: None,
            columns: Vec::new(),
            pending: VecDeque::new(),
            header_done: false,
            sampled: !options.infer_types,
            lines_reported: 0,
            options,
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

    /// The schema, once the header or first record has been read.
    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    /// Current type of every column.
    pub fn column_types(&self) -> Vec<ColumnType> {
        self.columns.iter().map(ColumnState::column_type).collect()
    }

    fn set_schema(&mut self, schema: Schema) {
        let initial = if self.options.infer_types {
            ColumnState::sampling()
        } else {
            ColumnState::Enforced(ColumnType::Text)
        };
        self.columns = vec![initial; schema.len()];
        self.schema = Some(schema);
    }

    fn next_raw(&mut self) -> Result<Option<RawRecord>, ReadError> {
        let record = self.tokenizer.next_record(self.session.cancellation())?;
        let lines = self.tokenizer.lines_consumed();
        self.session.add_lines(lines - self.lines_reported);
        self.lines_reported = lines;
        Ok(record)
    }

    /// Consume the header. Returns an outcome when the read must end here.
    fn read_header(&mut self) -> Result<Option<ReadOutcome<T>>, ReadError> {
        if self.options.has_header {
            let header = loop {
                match self.next_raw()? {
                    None => return Ok(Some(ReadOutcome::End)),
                    Some(rec) if rec.is_blank() && self.options.skip_empty_lines => continue,
                    Some(rec) => break rec,
                }
            };
            if let Some(violation) = header.error {
                // A broken header leaves nothing to skip to.
                return match self.session.handle::<T>(violation, header.line, 0)? {
                    ReadOutcome::Stop => Ok(Some(ReadOutcome::Stop)),
                    _ => Ok(Some(ReadOutcome::End)),
                };
            }
            if self.options.schema.is_none() {
                self.set_schema(Schema::from_header(&header.fields));
            }
        }
        if let Some(names) = self.options.schema.clone() {
            self.set_schema(Schema::new(names));
        }
        Ok(None)
    }

    /// Tokenize and check the next record.
    fn next_unit(&mut self) -> Result<Option<Pending>, ReadError> {
        loop {
            let Some(rec) = self.next_raw()? else {
                return Ok(None);
            };
            if rec.is_blank() && self.options.skip_empty_lines {
                continue;
            }
            let record = self.session.count_raw_record();
            if let Some(observer) = &self.options.raw_observer {
                observer(record, rec.raw.as_deref().unwrap_or(&rec.prefix));
            }

            let line = rec.line;
            if let Some(violation) = rec.error {
                return Ok(Some(Pending::Violation {
                    violation,
                    line,
                    record,
                }));
            }
            if let Some(violation) =
                guard::csv_record(&self.options.limits, rec.columns, rec.raw_len, &rec.prefix)
            {
                return Ok(Some(Pending::Violation {
                    violation,
                    line,
                    record,
                }));
            }

            if self.schema.is_none() {
                self.set_schema(Schema::synthetic(rec.columns));
            }
            let names = self.schema.as_ref().map(Schema::names).unwrap_or_default();
            if rec.columns != names.len() {
                let violation = Violation::new(
                    ErrorType::SchemaError,
                    format!("expected {} fields, found {}", names.len(), rec.columns),
                )
                .with_excerpt(field_summary(names, &rec.fields));
                return Ok(Some(Pending::Violation {
                    violation,
                    line,
                    record,
                }));
            }

            return Ok(Some(Pending::Row(Row {
                values: rec.fields,
                line,
                record,
            })));
        }
    }

    /// Buffer the first rows and fix column types from them.
    fn sample(&mut self) -> Result<(), ReadError> {
        let preserve = self.options.preserve_leading_zeros;
        let mut rows = 0;
        while rows < self.options.sample_rows {
            let Some(unit) = self.next_unit()? else {
                break;
            };
            if let Pending::Row(row) = &unit {
                for (state, value) in self.columns.iter_mut().zip(&row.values) {
                    state.observe(value, preserve);
                }
                rows += 1;
            }
            self.pending.push_back(unit);
        }
        for state in &mut self.columns {
            state.finalize();
        }
        self.sampled = true;
        log::debug!(
            "csv column types after {} sampled rows: {:?}",
            rows,
            self.column_types()
        );
        Ok(())
    }

    fn materialize(&mut self, row: Row) -> Result<ReadOutcome<T>, ReadError> {
        self.session.poll_cancel()?;

        let names = self.schema.as_ref().map(Schema::names).unwrap_or_default();
        let preserve = self.options.preserve_leading_zeros;
        let mut values: Vec<FieldValue> = Vec::with_capacity(row.values.len());
        for (i, (state, raw)) in self.columns.iter_mut().zip(&row.values).enumerate() {
            let (value, demoted) = state.convert(raw, preserve);
            if demoted {
                log::debug!(
                    "csv column '{}' demoted to text at line {}",
                    names.get(i).map(String::as_str).unwrap_or("?"),
                    row.line
                );
            }
            values.push(value);
        }

        match self.binder.materialize_row(names, &values) {
            Ok(record) => Ok(ReadOutcome::Record(record)),
            Err(e) => {
                let violation = Violation::conversion(ErrorType::SchemaError, e)
                    .with_excerpt(field_summary(names, &row.values));
                self.session.handle(violation, row.line, row.record)
            }
        }
    }
}

/// `name=value` pairs for excerpts.
fn field_summary(names: &[String], values: &[String]) -> String {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| match names.get(i) {
            Some(name) => format!("{}={}", name, v),
            None => format!("#{}={}", i + 1, v),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl<R: Read, T: Materialize> RecordSource for CsvReader<R, T> {
    type Item = T;

    fn session(&mut self) -> &mut ReadSession {
        &mut self.session
    }

    fn advance(&mut self) -> Result<ReadOutcome<T>, ReadError> {
        if !self.header_done {
            self.header_done = true;
            if let Some(outcome) = self.read_header()? {
                return Ok(outcome);
            }
        }
        if !self.sampled {
            self.sample()?;
        }

        let unit = match self.pending.pop_front() {
            Some(unit) => unit,
            None => match self.next_unit()? {
                Some(unit) => unit,
                None => return Ok(ReadOutcome::End),
            },
        };
        match unit {
            Pending::Row(row) => self.materialize(row),
            Pending::Violation {
                violation,
                line,
                record,
            } => self.session.handle(violation, line, record),
        }
    }

    fn position(&self) -> Option<u64> {
        Some(self.tokenizer.consumed())
    }
}

impl<R: Read, T: Materialize> Iterator for CsvReader<R, T> {
    type Item = Result<T, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        drive(self)
    }
}
