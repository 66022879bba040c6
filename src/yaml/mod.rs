//! YAML reader with an event-level security filter.
//!
//! Parser events are checked before any record is built: anchors and
//! aliases, custom tags, nesting depth, record count and scalar length. A
//! record that breaks a container-level rule is discarded whole and the event
//! stream is resynchronized at the next record boundary. An oversized scalar
//! only drops that value and its key.
//!
//! If the first document's root is a sequence, its elements are the records;
//! otherwise every document is one record.
//!
//! The source is decoded and parsed incrementally, one event at a time.
//! Invalid UTF-8 is replaced with U+FFFD. Only a window of recent lines is
//! kept for excerpts.

mod scalar;
mod source;

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::mem;
use std::path::Path;
use std::sync::{Arc, Mutex};

use yaml_rust2::parser::{Event, Parser};
use yaml_rust2::scanner::{Marker, Scanner, TokenType};

use crate::config::{ReadOptions, YamlLimits};
use crate::error::{EXCERPT_CHARS, ErrorType, ReadError, Violation, truncate_chars};
use crate::format::FormatKind;
use crate::guard;
use crate::materialize::{Binder, FieldValue, MaterializationSession, Materialize};
use crate::metrics::MetricsHandle;
use crate::session::{ReadOutcome, ReadSession, RecordSource, drive};

use scalar::CoreTag;
use source::{CharTee, TeeChars, lock};

/// Characters the anchor scanner may trail the parser by.
const ANCHOR_SCAN_LAG: usize = 64 * 1024;

/// YAML reading options. Everything is disallowed by default.
#[derive(Debug, Clone, Default)]
pub struct YamlOptions {
    /// Accept anchors and expand aliases
    pub allow_aliases: bool,
    /// Accept tags outside the core schema
    pub allow_custom_tags: bool,
    /// Check each record's runtime type against `allowed_types`
    pub restrict_types: bool,
    /// Accepted runtime type names; empty means exactly the target type
    pub allowed_types: Vec<String>,
    pub limits: YamlLimits,
}

impl YamlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_aliases(mut self, allow: bool) -> Self {
        self.allow_aliases = allow;
        self
    }

    pub fn with_custom_tags(mut self, allow: bool) -> Self {
        self.allow_custom_tags = allow;
        self
    }

    pub fn with_type_restriction(mut self, enabled: bool) -> Self {
        self.restrict_types = enabled;
        self
    }

    /// Add a runtime type name to the allow-set and turn restriction on.
    pub fn with_allowed_type(mut self, name: impl Into<String>) -> Self {
        self.allowed_types.push(name.into());
        self.restrict_types = true;
        self
    }

    pub fn with_limits(mut self, limits: YamlLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RootMode {
    Documents,
    Sequence,
}

/// Where the reader is relative to record boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Waiting for a document root or the end of the stream
    Between,
    /// Inside a root sequence; each node is a record
    InRootSequence,
    /// The document root has been read
    AfterRoot,
}

/// An open container of the record being built.
enum Frame {
    Seq {
        items: Vec<FieldValue>,
        anchor: usize,
    },
    Map {
        entries: Vec<(String, FieldValue)>,
        state: KeyState,
        anchor: usize,
    },
}

enum KeyState {
    /// The next node is a key
    Key,
    /// The next node is the value for this key
    Value(String),
    /// The next node is dropped
    Drop,
}

enum Built<T> {
    Value(FieldValue),
    Outcome(ReadOutcome<T>),
}

/// A parse failure with the line it was found on.
type Fault = (Violation, u64);

/// Lazy iterator of typed records from YAML text.
pub struct YamlReader<R, T> {
    tee: Arc<Mutex<CharTee<R>>>,
    parser: Parser<TeeChars<R>>,
    /// Trails the parser to recover anchor names; absent once aliases are allowed
    anchor_scanner: Option<Scanner<TeeChars<R>>>,
    anchor_names: HashMap<usize, String>,
    anchors_scanned: usize,
    anchors: HashMap<usize, FieldValue>,
    options: YamlOptions,
    session: ReadSession,
    binder: Binder<T>,
    mode: Option<RootMode>,
    position: Position,
    records_seen: u64,
    lines_reported: u64,
    ended: bool,
}

impl<R, T> fmt::Debug for YamlReader<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YamlReader")
            .field("options", &self.options)
            .field("mode", &self.mode)
            .field("records_seen", &self.records_seen)
            .field("ended", &self.ended)
            .finish()
    }
}

impl<T: Materialize> YamlReader<File, T> {
    /// Open a file. The file identifier and source length default to the
    /// path and the file size.
    pub fn from_path(
        path: impl AsRef<Path>,
        options: YamlOptions,
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

impl<R: Read, T: Materialize> YamlReader<R, T> {
    pub fn new(reader: R, options: YamlOptions, read: ReadOptions) -> Self {
        let track_anchors = !options.allow_aliases;
        let tee = CharTee::shared(reader, track_anchors);
        Self {
            parser: Parser::new(TeeChars::parser(&tee)),
            anchor_scanner: track_anchors.then(|| Scanner::new(TeeChars::anchors(&tee))),
            tee,
            anchor_names: HashMap::new(),
            anchors_scanned: 0,
            anchors: HashMap::new(),
            options,
            session: ReadSession::new(FormatKind::Yaml, &read),
            binder: Binder::global(),
            mode: None,
            position: Position::Between,
            records_seen: 0,
            lines_reported: 0,
            ended: false,
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

    fn next_event(&mut self) -> Result<Result<(Event, u64), Fault>, ReadError> {
        self.session.poll_cancel()?;
        let next = self.parser.next_token();
        if let Some(e) = lock(&self.tee).take_error() {
            return Err(e.into());
        }
        match next {
            Ok((event, mark)) => {
                let line = line_of(&mark);
                self.sync_lines(line.saturating_sub(1));
                self.track_anchors(&event);
                Ok(Ok((event, line)))
            }
            Err(e) => {
                let line = line_of(e.marker());
                let excerpt = lock(&self.tee)
                    .line_text(line)
                    .map(|l| truncate_chars(&l, EXCERPT_CHARS))
                    .unwrap_or_default();
                let violation =
                    Violation::new(ErrorType::YamlException, format!("malformed YAML: {}", e.info()))
                        .with_excerpt(excerpt);
                Ok(Err((violation, line)))
            }
        }
    }

    fn sync_lines(&mut self, lines: u64) {
        if lines > self.lines_reported {
            self.session.add_lines(lines - self.lines_reported);
            self.lines_reported = lines;
        }
    }

    /// Record the names of anchors as the parser meets them, and keep the
    /// anchor scanner within `ANCHOR_SCAN_LAG` of the parser.
    fn track_anchors(&mut self, event: &Event) {
        if self.anchor_scanner.is_none() {
            return;
        }
        let anchor = match event {
            Event::Scalar(_, _, anchor, _)
            | Event::SequenceStart(anchor, _)
            | Event::MappingStart(anchor, _) => *anchor,
            _ => 0,
        };
        if anchor != 0 {
            self.scan_anchors_to(anchor);
        }
        if lock(&self.tee).anchor_lag() > ANCHOR_SCAN_LAG {
            while lock(&self.tee).anchor_lag() > 0 {
                if !self.scan_one_anchor_token() {
                    break;
                }
            }
        }
    }

    /// Scan until the anchor with parser id `id` has been seen.
    fn scan_anchors_to(&mut self, id: usize) {
        while self.anchors_scanned < id {
            if !self.scan_one_anchor_token() {
                break;
            }
        }
    }

    /// Advance the anchor scanner by one token. Returns false once it is done.
    fn scan_one_anchor_token(&mut self) -> bool {
        let Some(scanner) = self.anchor_scanner.as_mut() else {
            return false;
        };
        match scanner.next() {
            Some(token) => {
                if let TokenType::Anchor(name) = token.1 {
                    self.anchors_scanned += 1;
                    self.anchor_names.insert(self.anchors_scanned, name);
                }
                true
            }
            None => {
                self.anchor_scanner = None;
                lock(&self.tee).stop_tracking_anchors();
                false
            }
        }
    }

    /// Name of the anchor with parser id `id`.
    fn anchor_name(&mut self, id: usize) -> String {
        self.scan_anchors_to(id);
        self.anchor_names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| format!("#{}", id))
    }

    /// Alias and tag policy for a node.
    fn node_policy(&mut self, anchor: usize, tag: Option<&CoreTag>) -> Option<Violation> {
        if anchor != 0 && !self.options.allow_aliases {
            let name = self.anchor_name(anchor);
            return Some(guard::yaml_alias("anchor", &name));
        }
        match tag {
            Some(CoreTag::Custom(written)) if !self.options.allow_custom_tags => {
                Some(guard::yaml_tag(written))
            }
            _ => None,
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

    /// Consume events until `open` containers have closed.
    fn skip_open(&mut self, mut open: usize) -> Result<Option<Fault>, ReadError> {
        while open > 0 {
            match self.next_event()? {
                Ok((Event::SequenceStart(..) | Event::MappingStart(..), _)) => open += 1,
                Ok((Event::SequenceEnd | Event::MappingEnd, _)) => open -= 1,
                Ok((Event::StreamEnd, _)) => break,
                Ok(_) => {}
                Err(fault) => return Ok(Some(fault)),
            }
        }
        Ok(None)
    }

    /// Discard the record after a container-level violation.
    fn reject(
        &mut self,
        violation: Violation,
        line: u64,
        record: u64,
        open: usize,
    ) -> Result<Built<T>, ReadError> {
        match self.session.handle::<T>(violation, line, record)? {
            ReadOutcome::Skip => {}
            other => return Ok(Built::Outcome(other)),
        }
        if let Some((violation, line)) = self.skip_open(open)? {
            return Ok(Built::Outcome(self.finish_with(violation, line, record)?));
        }
        Ok(Built::Outcome(ReadOutcome::Skip))
    }

    /// Build one record's value from its first event onward.
    fn build(&mut self, first: Event, first_line: u64, record: u64) -> Result<Built<T>, ReadError> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut pending = Some((first, first_line));

        loop {
            let (event, line) = match pending.take() {
                Some(step) => step,
                None => match self.next_event()? {
                    Ok(step) => step,
                    Err((violation, line)) => {
                        return Ok(Built::Outcome(self.finish_with(violation, line, record)?));
                    }
                },
            };

            if let Some(Frame::Map { state, .. }) = stack.last_mut() {
                if matches!(state, KeyState::Drop) {
                    *state = KeyState::Key;
                    if matches!(event, Event::SequenceStart(..) | Event::MappingStart(..)) {
                        if let Some((violation, line)) = self.skip_open(1)? {
                            return Ok(Built::Outcome(self.finish_with(violation, line, record)?));
                        }
                    }
                    continue;
                }
            }

            let is_map = matches!(event, Event::MappingStart(..));
            let completed = match event {
                Event::Alias(id) => {
                    if !self.options.allow_aliases {
                        let name = self.anchor_name(id);
                        let violation = guard::yaml_alias("alias", &name);
                        return self.reject(violation, line, record, stack.len());
                    }
                    Some(self.anchors.get(&id).cloned().unwrap_or_default())
                }
                Event::Scalar(value, style, anchor, tag) => {
                    let tag = tag.map(|t| CoreTag::classify(&t));
                    if let Some(violation) = self.node_policy(anchor, tag.as_ref()) {
                        return self.reject(violation, line, record, stack.len());
                    }
                    if let Some(violation) = guard::yaml_scalar(&self.options.limits, &value) {
                        match self.session.handle::<T>(violation, line, record)? {
                            ReadOutcome::Skip => {}
                            other => return Ok(Built::Outcome(other)),
                        }
                        match stack.last_mut() {
                            None => return Ok(Built::Outcome(ReadOutcome::Skip)),
                            Some(Frame::Map { state, .. }) => {
                                *state = match *state {
                                    KeyState::Key => KeyState::Drop,
                                    _ => KeyState::Key,
                                };
                            }
                            Some(Frame::Seq { .. }) => {}
                        }
                        None
                    } else if awaiting_key(&stack) {
                        if anchor != 0 {
                            self.anchors.insert(anchor, FieldValue::Text(value.clone()));
                        }
                        if let Some(Frame::Map { state, .. }) = stack.last_mut() {
                            *state = KeyState::Value(value);
                        }
                        None
                    } else {
                        match scalar::resolve(value, style, tag.as_ref()) {
                            Ok(resolved) => {
                                if anchor != 0 {
                                    self.anchors.insert(anchor, resolved.clone());
                                }
                                Some(resolved)
                            }
                            Err(message) => {
                                let violation = Violation::new(ErrorType::YamlException, message);
                                return self.reject(violation, line, record, stack.len());
                            }
                        }
                    }
                }
                Event::SequenceStart(anchor, tag) | Event::MappingStart(anchor, tag) => {
                    let tag = tag.map(|t| CoreTag::classify(&t));
                    let depth = stack.len() + 1;
                    let violation = match self.node_policy(anchor, tag.as_ref()) {
                        Some(v) => Some(v),
                        None => guard::yaml_depth(&self.options.limits, depth),
                    };
                    if let Some(violation) = violation {
                        return self.reject(violation, line, record, depth);
                    }
                    if awaiting_key(&stack) {
                        let violation = Violation::new(
                            ErrorType::YamlException,
                            "complex mapping keys are not supported",
                        )
                        .with_excerpt(if is_map { "key=mapping" } else { "key=sequence" });
                        return self.reject(violation, line, record, depth);
                    }
                    stack.push(if is_map {
                        Frame::Map {
                            entries: Vec::new(),
                            state: KeyState::Key,
                            anchor,
                        }
                    } else {
                        Frame::Seq {
                            items: Vec::new(),
                            anchor,
                        }
                    });
                    None
                }
                Event::SequenceEnd | Event::MappingEnd => {
                    let (value, anchor) = match stack.pop() {
                        Some(Frame::Seq { items, anchor }) => (FieldValue::List(items), anchor),
                        Some(Frame::Map { entries, anchor, .. }) => (FieldValue::Map(entries), anchor),
                        None => {
                            let violation = Violation::new(
                                ErrorType::YamlException,
                                "unbalanced collection end",
                            );
                            return Ok(Built::Outcome(self.finish_with(violation, line, record)?));
                        }
                    };
                    if anchor != 0 {
                        self.anchors.insert(anchor, value.clone());
                    }
                    Some(value)
                }
                _ => {
                    let violation = Violation::new(
                        ErrorType::YamlException,
                        "unexpected end of document inside a record",
                    );
                    return Ok(Built::Outcome(self.finish_with(violation, line, record)?));
                }
            };

            let Some(value) = completed else {
                continue;
            };
            match stack.last_mut() {
                None => return Ok(Built::Value(value)),
                Some(Frame::Seq { items, .. }) => items.push(value),
                Some(Frame::Map { entries, state, .. }) => match mem::replace(state, KeyState::Key) {
                    KeyState::Value(key) => entries.push((key, value)),
                    KeyState::Key => *state = KeyState::Value(value.to_string()),
                    KeyState::Drop => {}
                },
            }
        }
    }

    /// Check the record count, build the record and materialize it.
    fn record(&mut self, first: Event, line: u64) -> Result<ReadOutcome<T>, ReadError> {
        let index = self.records_seen + 1;
        if let Some(violation) = guard::yaml_documents(&self.options.limits, index) {
            return self.finish_with(violation, line, index);
        }
        self.records_seen = index;
        let record = self.session.count_raw_record();

        let value = match self.build(first, line, record)? {
            Built::Value(value) => value,
            Built::Outcome(outcome) => return Ok(outcome),
        };

        self.session.poll_cancel()?;
        let item = match self.binder.materialize_value(value) {
            Ok(item) => item,
            Err(e) => {
                let excerpt = e.raw.clone();
                let v = Violation::conversion(ErrorType::YamlException, e).with_excerpt(excerpt);
                return self.session.handle(v, line, record);
            }
        };

        if self.options.restrict_types {
            let runtime = item.runtime_type();
            let allowed = if self.options.allowed_types.is_empty() {
                runtime == type_name::<T>()
            } else {
                self.options.allowed_types.iter().any(|t| t == runtime)
            };
            if !allowed {
                let v = Violation::new(
                    ErrorType::TypeRestriction,
                    format!("type '{}' is not in the allowed set", runtime),
                )
                .with_excerpt(runtime);
                return self.session.handle(v, line, record);
            }
        }
        Ok(ReadOutcome::Record(item))
    }

    /// Policy for the root sequence itself. Returns an outcome when the
    /// sequence is rejected.
    fn enter_root_sequence(
        &mut self,
        anchor: usize,
        tag: Option<CoreTag>,
        line: u64,
    ) -> Result<Option<ReadOutcome<T>>, ReadError> {
        let Some(violation) = self.node_policy(anchor, tag.as_ref()) else {
            self.position = Position::InRootSequence;
            return Ok(None);
        };
        self.position = Position::AfterRoot;
        let record = self.session.next_record_index();
        match self.session.handle::<T>(violation, line, record)? {
            ReadOutcome::Skip => {}
            other => return Ok(Some(other)),
        }
        match self.skip_open(1)? {
            Some((violation, line)) => Ok(Some(self.finish_with(violation, line, record)?)),
            None => Ok(None),
        }
    }
}

fn awaiting_key(stack: &[Frame]) -> bool {
    matches!(
        stack.last(),
        Some(Frame::Map {
            state: KeyState::Key,
            ..
        })
    )
}

fn line_of(mark: &Marker) -> u64 {
    mark.line() as u64
}

impl<R: Read, T: Materialize> RecordSource for YamlReader<R, T> {
    type Item = T;

    fn session(&mut self) -> &mut ReadSession {
        &mut self.session
    }

    fn advance(&mut self) -> Result<ReadOutcome<T>, ReadError> {
        self.session.poll_cancel()?;
        if self.ended {
            return Ok(ReadOutcome::End);
        }

        loop {
            let (event, line) = match self.next_event()? {
                Ok(step) => step,
                Err((violation, line)) => {
                    let record = self.session.next_record_index();
                    return self.finish_with(violation, line, record);
                }
            };
            match event {
                Event::StreamEnd => {
                    self.ended = true;
                    let (total, replaced) = {
                        let tee = lock(&self.tee);
                        (tee.lines_read(), tee.replaced())
                    };
                    self.sync_lines(total);
                    if replaced > 0 {
                        log::debug!("{} invalid UTF-8 sequences replaced", replaced);
                    }
                    return Ok(ReadOutcome::End);
                }
                Event::DocumentEnd => self.position = Position::Between,
                Event::SequenceEnd if self.position == Position::InRootSequence => {
                    self.position = Position::AfterRoot;
                }
                Event::SequenceStart(anchor, tag)
                    if self.position == Position::Between
                        && self.mode != Some(RootMode::Documents) =>
                {
                    self.mode = Some(RootMode::Sequence);
                    let tag = tag.map(|t| CoreTag::classify(&t));
                    if let Some(outcome) = self.enter_root_sequence(anchor, tag, line)? {
                        return Ok(outcome);
                    }
                }
                Event::Scalar(..)
                | Event::SequenceStart(..)
                | Event::MappingStart(..)
                | Event::Alias(..) => {
                    if self.position == Position::Between {
                        self.mode.get_or_insert(RootMode::Documents);
                        self.position = Position::AfterRoot;
                    }
                    match self.record(event, line)? {
                        ReadOutcome::Skip => continue,
                        outcome => return Ok(outcome),
                    }
                }
                _ => {}
            }
        }
    }
}

impl<R: Read, T: Materialize> Iterator for YamlReader<R, T> {
    type Item = Result<T, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        drive(self)
    }
}
