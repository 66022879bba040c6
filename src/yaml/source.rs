//! Incremental character source shared by the parser and the anchor scanner.
//!
//! Bytes are decoded as UTF-8 a chunk at a time; invalid sequences become
//! U+FFFD. Two consumers read the same characters: the event parser and, when
//! anchor names are needed, a token scanner that trails it. Characters are
//! queued only for the consumer that has not read them yet.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{EXCERPT_CHARS, truncate_chars};

const CHUNK_BYTES: usize = 8 * 1024;

/// Finished lines kept for error excerpts.
const KEPT_LINES: usize = 16;

const PARSER: usize = 0;
const ANCHORS: usize = 1;

/// Recent lines seen by the parser.
#[derive(Debug)]
struct LineWindow {
    recent: VecDeque<(u64, String)>,
    current: String,
    /// Line being read, 1-based
    line: u64,
    /// Characters on the current line, kept or not
    width: usize,
}

impl LineWindow {
    fn new() -> Self {
        Self {
            recent: VecDeque::with_capacity(KEPT_LINES),
            current: String::new(),
            line: 1,
            width: 0,
        }
    }

    fn push(&mut self, c: char) {
        if c == '\n' {
            let mut done = mem::take(&mut self.current);
            if done.ends_with('\r') {
                done.pop();
            }
            if self.recent.len() == KEPT_LINES {
                self.recent.pop_front();
            }
            self.recent.push_back((self.line, done));
            self.line += 1;
            self.width = 0;
            return;
        }
        if self.width < EXCERPT_CHARS {
            self.current.push(c);
        }
        self.width += 1;
    }

    fn text(&self, line: u64) -> Option<String> {
        if line == self.line {
            return Some(truncate_chars(self.current.trim_end_matches('\r'), EXCERPT_CHARS));
        }
        self.recent
            .iter()
            .find(|(n, _)| *n == line)
            .map(|(_, text)| text.clone())
    }

    /// Lines read so far, counting an unterminated last line.
    fn count(&self) -> u64 {
        if self.width > 0 { self.line } else { self.line - 1 }
    }
}

/// Decoder and per-consumer queues over one reader.
#[derive(Debug)]
pub(super) struct CharTee<R> {
    reader: R,
    pending: Vec<u8>,
    queues: [VecDeque<char>; 2],
    tracking_anchors: bool,
    eof: bool,
    error: Option<io::Error>,
    decoded: u64,
    replaced: u64,
    lines: LineWindow,
}

impl<R: Read> CharTee<R> {
    pub(super) fn shared(reader: R, track_anchors: bool) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(Self {
            reader,
            pending: Vec::new(),
            queues: [VecDeque::new(), VecDeque::new()],
            tracking_anchors: track_anchors,
            eof: false,
            error: None,
            decoded: 0,
            replaced: 0,
            lines: LineWindow::new(),
        }))
    }

    fn pop(&mut self, consumer: usize) -> Option<char> {
        loop {
            if let Some(c) = self.queues[consumer].pop_front() {
                if consumer == PARSER {
                    self.lines.push(c);
                }
                return Some(c);
            }
            if self.eof {
                return None;
            }
            self.fill();
        }
    }

    /// Read one chunk and decode what is complete.
    fn fill(&mut self) {
        let mut chunk = [0u8; CHUNK_BYTES];
        loop {
            match self.reader.read(&mut chunk) {
                Ok(0) => self.eof = true,
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.error = Some(e);
                    self.eof = true;
                }
            }
            break;
        }
        self.decode();
    }

    fn decode(&mut self) {
        let bytes = mem::take(&mut self.pending);
        let mut start = 0;
        while start < bytes.len() {
            let (valid, bad) = match std::str::from_utf8(&bytes[start..]) {
                Ok(_) => (bytes.len() - start, None),
                Err(e) => (e.valid_up_to(), Some(e.error_len())),
            };
            if let Ok(text) = std::str::from_utf8(&bytes[start..start + valid]) {
                self.enqueue(text.chars());
            }
            start += valid;
            match bad {
                None => {}
                Some(None) if !self.eof => break,
                Some(len) => {
                    let offset = self.decoded + start as u64;
                    if self.replaced == 0 {
                        log::warn!("invalid UTF-8 at byte {} replaced with U+FFFD", offset);
                    }
                    self.replaced += 1;
                    self.enqueue(std::iter::once(char::REPLACEMENT_CHARACTER));
                    start += len.unwrap_or(bytes.len() - start);
                }
            }
        }
        self.decoded += start as u64;
        self.pending = bytes[start..].to_vec();
    }

    fn enqueue(&mut self, chars: impl Iterator<Item = char> + Clone) {
        if self.tracking_anchors {
            self.queues[ANCHORS].extend(chars.clone());
        }
        self.queues[PARSER].extend(chars);
    }

    /// Characters the anchor scanner has yet to read.
    pub(super) fn anchor_lag(&self) -> usize {
        self.queues[ANCHORS].len()
    }

    /// Stop queueing characters for the anchor scanner.
    pub(super) fn stop_tracking_anchors(&mut self) {
        self.tracking_anchors = false;
        self.queues[ANCHORS] = VecDeque::new();
    }

    pub(super) fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Text of a recent line, for excerpts.
    pub(super) fn line_text(&self, line: u64) -> Option<String> {
        self.lines.text(line)
    }

    pub(super) fn lines_read(&self) -> u64 {
        self.lines.count()
    }

    /// Invalid byte sequences replaced so far.
    pub(super) fn replaced(&self) -> u64 {
        self.replaced
    }
}

pub(super) fn lock<R>(tee: &Mutex<CharTee<R>>) -> MutexGuard<'_, CharTee<R>> {
    tee.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One consumer's view of the shared characters.
pub(super) struct TeeChars<R> {
    tee: Arc<Mutex<CharTee<R>>>,
    consumer: usize,
}

impl<R> TeeChars<R> {
    pub(super) fn parser(tee: &Arc<Mutex<CharTee<R>>>) -> Self {
        Self {
            tee: Arc::clone(tee),
            consumer: PARSER,
        }
    }

    pub(super) fn anchors(tee: &Arc<Mutex<CharTee<R>>>) -> Self {
        Self {
            tee: Arc::clone(tee),
            consumer: ANCHORS,
        }
    }
}

impl<R: Read> Iterator for TeeChars<R> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        lock(&self.tee).pop(self.consumer)
    }
}
