//! Byte-level record tokenizer.

use std::io::{ErrorKind, Read};

use super::QuoteMode;
use crate::cancel::CancellationToken;
use crate::error::{EXCERPT_CHARS, ErrorType, ReadError, Violation, truncate_chars};

const BUF_SIZE: usize = 64 * 1024;
const PREFIX_BYTES: usize = EXCERPT_CHARS * 4;

/// One physical record as split by the tokenizer.
#[derive(Debug)]
pub(crate) struct RawRecord {
    /// Field contents; empty when the record was oversized
    pub fields: Vec<String>,
    /// Line where the record starts, 1-based
    pub line: u64,
    /// Bytes in the record, excluding the terminator
    pub raw_len: usize,
    pub columns: usize,
    /// Leading characters of the raw text
    pub prefix: String,
    /// Full raw text, when capture is on and the record was not oversized
    pub raw: Option<String>,
    /// Quoting error found while splitting
    pub error: Option<Violation>,
}

impl RawRecord {
    pub(crate) fn is_blank(&self) -> bool {
        self.raw_len == 0 && self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    FieldStart,
    Unquoted,
    Quoted,
    /// A quote was seen inside a quoted field
    QuotedQuote,
    /// Skipping the rest of a broken record
    Discard,
}

struct RecordBuilder {
    line: u64,
    fields: Vec<String>,
    field: Vec<u8>,
    raw_len: usize,
    prefix: Vec<u8>,
    raw: Option<Vec<u8>>,
    columns: usize,
    store_limit: usize,
    oversized: bool,
    error: Option<Violation>,
}

impl RecordBuilder {
    fn new(line: u64, capture: bool, store_limit: usize) -> Self {
        Self {
            line,
            fields: Vec::new(),
            field: Vec::new(),
            raw_len: 0,
            prefix: Vec::new(),
            raw: capture.then(Vec::new),
            columns: 0,
            store_limit,
            oversized: false,
            error: None,
        }
    }

    fn raw(&mut self, b: u8) {
        self.raw_len += 1;
        if self.prefix.len() < PREFIX_BYTES {
            self.prefix.push(b);
        }
        if !self.oversized && self.store_limit > 0 && self.raw_len > self.store_limit {
            self.oversized = true;
            self.fields = Vec::new();
            self.field = Vec::new();
            self.raw = None;
        }
        if let Some(raw) = &mut self.raw {
            raw.push(b);
        }
    }

    fn push(&mut self, b: u8) {
        if !self.oversized {
            self.field.push(b);
        }
    }

    fn end_field(&mut self) {
        self.columns += 1;
        if !self.oversized {
            let bytes = std::mem::take(&mut self.field);
            self.fields.push(lossy(bytes));
        }
    }

    fn fail(&mut self, message: &str) {
        if self.error.is_none() {
            self.error = Some(Violation::new(ErrorType::CsvQuoteError, message));
        }
    }

    fn finish(self) -> RawRecord {
        let prefix = truncate_chars(&String::from_utf8_lossy(&self.prefix), EXCERPT_CHARS);
        let error = self.error.map(|v| v.with_excerpt(prefix.clone()));
        RawRecord {
            fields: self.fields,
            line: self.line,
            raw_len: self.raw_len,
            columns: self.columns,
            prefix,
            raw: self.raw.map(lossy),
            error,
        }
    }
}

fn lossy(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn is_newline(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

/// Splits a byte stream into records under a quoting discipline.
///
/// Owns its own read buffer; the source is polled for cancellation on every
/// refill.
pub(crate) struct Tokenizer<R> {
    reader: R,
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
    eof: bool,
    delimiter: u8,
    quote: u8,
    mode: QuoteMode,
    capture: bool,
    store_limit: usize,
    terminators: u64,
    last_byte: Option<u8>,
    skip_lf: bool,
    consumed: u64,
}

impl<R: Read> Tokenizer<R> {
    pub(crate) fn new(reader: R, delimiter: u8, quote: u8, mode: QuoteMode) -> Self {
        Self {
            reader,
            buf: vec![0; BUF_SIZE].into_boxed_slice(),
            pos: 0,
            len: 0,
            eof: false,
            delimiter,
            quote,
            mode,
            capture: false,
            store_limit: 0,
            terminators: 0,
            last_byte: None,
            skip_lf: false,
            consumed: 0,
        }
    }

    /// Keep the full raw text of every record.
    pub(crate) fn with_capture(mut self, capture: bool) -> Self {
        self.capture = capture;
        self
    }

    /// Stop buffering record content once a record grows past `limit` bytes.
    pub(crate) fn with_store_limit(mut self, limit: usize) -> Self {
        self.store_limit = limit;
        self
    }

    /// Physical lines consumed so far, counting a trailing unterminated line.
    pub(crate) fn lines_consumed(&self) -> u64 {
        let partial = self.last_byte.is_some_and(|b| !is_newline(b));
        self.terminators + u64::from(partial)
    }

    pub(crate) fn consumed(&self) -> u64 {
        self.consumed
    }

    fn next_byte(&mut self, cancel: &CancellationToken) -> Result<Option<u8>, ReadError> {
        if self.pos == self.len {
            if self.eof {
                return Ok(None);
            }
            cancel.poll()?;
            self.len = loop {
                match self.reader.read(&mut self.buf) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            };
            self.pos = 0;
            if self.len == 0 {
                self.eof = true;
                return Ok(None);
            }
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        self.consumed += 1;
        Ok(Some(b))
    }

    /// Read the next record, or `None` at end of input.
    pub(crate) fn next_record(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<RawRecord>, ReadError> {
        let mut rec = RecordBuilder::new(self.terminators + 1, self.capture, self.store_limit);
        let mut state = State::FieldStart;
        let mut started = false;

        loop {
            let Some(b) = self.next_byte(cancel)? else {
                if !started {
                    return Ok(None);
                }
                match state {
                    State::Quoted => rec.fail("unterminated quoted field"),
                    State::Discard => {}
                    _ => rec.end_field(),
                }
                return Ok(Some(rec.finish()));
            };

            let prev = self.last_byte.replace(b);
            if self.skip_lf {
                self.skip_lf = false;
                if b == b'\n' {
                    continue;
                }
            }
            if b == b'\r' || (b == b'\n' && prev != Some(b'\r')) {
                self.terminators += 1;
            }
            if !started {
                started = true;
                rec.line = self.terminators + 1 - u64::from(is_newline(b));
            }

            match state {
                State::FieldStart => {
                    if b == self.quote {
                        rec.raw(b);
                        state = State::Quoted;
                    } else if b == self.delimiter {
                        rec.raw(b);
                        rec.end_field();
                    } else if is_newline(b) {
                        rec.end_field();
                        return Ok(Some(self.end_record(rec, b)));
                    } else {
                        rec.raw(b);
                        rec.push(b);
                        state = State::Unquoted;
                    }
                }
                State::Unquoted => {
                    if b == self.delimiter {
                        rec.raw(b);
                        rec.end_field();
                        state = State::FieldStart;
                    } else if is_newline(b) {
                        rec.end_field();
                        return Ok(Some(self.end_record(rec, b)));
                    } else if b == self.quote {
                        rec.raw(b);
                        if self.mode == QuoteMode::Lenient {
                            state = State::Quoted;
                        } else {
                            rec.fail("quote inside unquoted field");
                            state = State::Discard;
                        }
                    } else {
                        rec.raw(b);
                        rec.push(b);
                    }
                }
                State::Quoted => {
                    rec.raw(b);
                    if b == self.quote {
                        state = State::QuotedQuote;
                    } else {
                        rec.push(b);
                    }
                }
                State::QuotedQuote => {
                    if b == self.quote {
                        rec.raw(b);
                        if self.mode == QuoteMode::ErrorOnIllegal {
                            rec.fail("escaped quote inside field");
                            state = State::Discard;
                        } else {
                            rec.push(b);
                            state = State::Quoted;
                        }
                    } else if b == self.delimiter {
                        rec.raw(b);
                        rec.end_field();
                        state = State::FieldStart;
                    } else if is_newline(b) {
                        rec.end_field();
                        return Ok(Some(self.end_record(rec, b)));
                    } else {
                        rec.raw(b);
                        if self.mode == QuoteMode::Lenient {
                            rec.push(b);
                            state = State::Unquoted;
                        } else {
                            rec.fail("unexpected character after closing quote");
                            state = State::Discard;
                        }
                    }
                }
                State::Discard => {
                    if is_newline(b) {
                        return Ok(Some(self.end_record(rec, b)));
                    }
                    rec.raw(b);
                }
            }
        }
    }

    fn end_record(&mut self, rec: RecordBuilder, terminator: u8) -> RawRecord {
        self.skip_lf = terminator == b'\r';
        rec.finish()
    }
}
