//! Structural scanner that captures the exact bytes of one JSON value.

use std::io::{BufRead, ErrorKind};

use crate::cancel::CancellationToken;
use crate::error::ReadError;

/// Bytes between cancellation polls inside one value.
const POLL_EVERY: u64 = 64 * 1024;

/// One captured value.
#[derive(Debug, Default)]
pub(crate) struct Captured {
    /// Source bytes, cut off once `size` passes the storage limit
    pub bytes: Vec<u8>,
    /// Exact source size of the value
    pub size: usize,
    /// False when input ended inside the value
    pub complete: bool,
}

impl Captured {
    fn push(&mut self, b: u8, limit: usize) {
        self.size += 1;
        if limit == 0 || self.size <= limit {
            self.bytes.push(b);
        }
    }
}

pub(crate) struct Scanner<R> {
    reader: R,
    newlines: u64,
    last_byte: Option<u8>,
    consumed: u64,
}

impl<R: BufRead> Scanner<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            newlines: 0,
            last_byte: None,
            consumed: 0,
        }
    }

    /// Line of the next unread byte, 1-based.
    pub(crate) fn line(&self) -> u64 {
        self.newlines + 1
    }

    /// Physical lines consumed so far, counting a trailing unterminated line.
    pub(crate) fn lines_consumed(&self) -> u64 {
        let partial = self.last_byte.is_some_and(|b| b != b'\n');
        self.newlines + u64::from(partial)
    }

    pub(crate) fn consumed(&self) -> u64 {
        self.consumed
    }

    pub(crate) fn peek(&mut self) -> Result<Option<u8>, ReadError> {
        loop {
            match self.reader.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub(crate) fn bump(&mut self) -> Result<Option<u8>, ReadError> {
        let b = self.peek()?;
        if let Some(b) = b {
            self.reader.consume(1);
            self.consumed += 1;
            if b == b'\n' {
                self.newlines += 1;
            }
            self.last_byte = Some(b);
        }
        Ok(b)
    }

    /// Skip whitespace and peek the next byte.
    pub(crate) fn skip_ws(&mut self) -> Result<Option<u8>, ReadError> {
        while let Some(b) = self.peek()? {
            if !b.is_ascii_whitespace() {
                return Ok(Some(b));
            }
            self.bump()?;
        }
        Ok(None)
    }

    /// Consume the rest of the current line.
    pub(crate) fn skip_line(&mut self) -> Result<(), ReadError> {
        while let Some(b) = self.bump()? {
            if b == b'\n' {
                break;
            }
        }
        Ok(())
    }

    /// Capture one value starting at the next byte.
    ///
    /// Containers are matched by depth outside strings; scalars run to the
    /// next structural byte or whitespace. Bytes past `limit` are counted
    /// but not stored.
    pub(crate) fn capture(
        &mut self,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Captured, ReadError> {
        let mut out = Captured::default();
        let Some(first) = self.bump()? else {
            return Ok(out);
        };
        out.push(first, limit);

        match first {
            b'{' | b'[' => {
                let mut depth = 1usize;
                let mut in_string = false;
                let mut escaped = false;
                while depth > 0 {
                    let Some(b) = self.bump()? else {
                        return Ok(out);
                    };
                    out.push(b, limit);
                    if self.consumed % POLL_EVERY == 0 {
                        cancel.poll()?;
                    }
                    if in_string {
                        if escaped {
                            escaped = false;
                        } else if b == b'\\' {
                            escaped = true;
                        } else if b == b'"' {
                            in_string = false;
                        }
                    } else {
                        match b {
                            b'"' => in_string = true,
                            b'{' | b'[' => depth += 1,
                            b'}' | b']' => depth -= 1,
                            _ => {}
                        }
                    }
                }
            }
            b'"' => {
                let mut escaped = false;
                loop {
                    let Some(b) = self.bump()? else {
                        return Ok(out);
                    };
                    out.push(b, limit);
                    if escaped {
                        escaped = false;
                    } else if b == b'\\' {
                        escaped = true;
                    } else if b == b'"' {
                        break;
                    }
                }
            }
            _ => {
                while let Some(b) = self.peek()? {
                    if is_value_end(b) {
                        break;
                    }
                    self.bump()?;
                    out.push(b, limit);
                }
            }
        }
        out.complete = true;
        Ok(out)
    }
}

fn is_value_end(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b',' | b']' | b'}' | b':')
}

/// Bytes that cannot start a value.
pub(crate) fn is_structural(b: u8) -> bool {
    matches!(b, b',' | b']' | b'}' | b':')
}
