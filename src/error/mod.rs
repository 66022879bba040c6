//! Error types and policies for guarded reads.
//!
//! This module provides:
//! - `ErrorAction`: What a reader does when it meets a violation (Throw, Skip or Stop)
//! - `ErrorType`: The tag attached to every diagnostic record
//! - `ReaderError`: A serializable diagnostic forwarded to an error sink
//! - `ConversionError`: A value that could not become the target type
//! - `ReadError`: The error surfaced to the caller of a record stream

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::{FormatError, FormatKind};

mod sink;

pub use sink::{ErrorSink, JsonLinesErrorSink, MemoryErrorSink, NullErrorSink};

/// Maximum number of characters kept in an excerpt.
pub const EXCERPT_CHARS: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorAction {
    /// Return the error to the caller and end the stream
    #[default]
    Throw,
    /// Discard the offending unit and keep reading
    Skip,
    /// End the stream gracefully without a completion timestamp
    Stop,
}

impl ErrorAction {
    /// Parse an action from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "throw" | "fail" => Some(ErrorAction::Throw),
            "skip" => Some(ErrorAction::Skip),
            "stop" => Some(ErrorAction::Stop),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorAction::Throw => write!(f, "Throw"),
            ErrorAction::Skip => write!(f, "Skip"),
            ErrorAction::Stop => write!(f, "Stop"),
        }
    }
}

/// Category tag carried by every [`ReaderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorType {
    SchemaError,
    CsvQuoteError,
    CsvLimitExceeded,
    JsonRootError,
    JsonException,
    JsonValidationError,
    JsonValidationFailed,
    JsonSizeLimit,
    YamlSecurityError,
    TypeRestriction,
    YamlException,
}

impl ErrorType {
    /// The tag as written into error records.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::SchemaError => "SchemaError",
            ErrorType::CsvQuoteError => "CsvQuoteError",
            ErrorType::CsvLimitExceeded => "CsvLimitExceeded",
            ErrorType::JsonRootError => "JsonRootError",
            ErrorType::JsonException => "JsonException",
            ErrorType::JsonValidationError => "JsonValidationError",
            ErrorType::JsonValidationFailed => "JsonValidationFailed",
            ErrorType::JsonSizeLimit => "JsonSizeLimit",
            ErrorType::YamlSecurityError => "YamlSecurityError",
            ErrorType::TypeRestriction => "TypeRestriction",
            ErrorType::YamlException => "YamlException",
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A diagnostic record describing one handled violation.
///
/// Serializes to `{ts, reader, file, line, record, errorType, message, excerpt, action}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderError {
    /// When the violation was handled
    pub ts: DateTime<Utc>,
    /// Format of the reader that produced it
    pub reader: FormatKind,
    /// File or stream identifier ("-" when unknown)
    pub file: String,
    /// Physical line where the offending unit started (best effort for JSON/YAML)
    pub line: u64,
    /// Logical record index, 1-based
    pub record: u64,
    #[serde(rename = "errorType")]
    pub error_type: ErrorType,
    pub message: String,
    /// Bounded snippet of the offending data
    pub excerpt: Option<String>,
    /// Action applied by the reader
    pub action: ErrorAction,
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} line {} record {}: {}",
            self.error_type, self.file, self.line, self.record, self.message
        )?;
        if let Some(excerpt) = &self.excerpt {
            write!(f, " (excerpt: {})", excerpt)?;
        }
        Ok(())
    }
}

impl std::error::Error for ReaderError {}

/// A field value that could not be converted into its target member type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "cannot convert column {column_index} ('{column_name}') value '{raw}' to {target_type}: {message}"
)]
pub struct ConversionError {
    /// Position of the source field (0-based)
    pub column_index: usize,
    pub column_name: String,
    /// Excerpt of the raw value
    pub raw: String,
    pub target_type: String,
    pub message: String,
}

/// Error returned by a record stream.
///
/// Only the Throw action and genuine faults surface here; skipped and stopped
/// violations are visible through the error sink and metrics instead.
#[derive(Debug, Error)]
pub enum ReadError {
    /// A structural or policy violation under the Throw action
    #[error("{0}")]
    Violation(Box<ReaderError>),

    /// A conversion failure under the Throw action
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The cancellation token fired
    #[error("read cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Format(#[from] FormatError),
}

impl ReadError {
    /// The diagnostic record behind a Throw, if any.
    pub fn reader_error(&self) -> Option<&ReaderError> {
        match self {
            ReadError::Violation(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReadError::Cancelled)
    }
}

/// A violation found by a reader, before the error action is applied.
#[derive(Debug, Clone)]
pub(crate) struct Violation {
    pub error_type: ErrorType,
    pub message: String,
    pub excerpt: Option<String>,
    pub conversion: Option<ConversionError>,
}

impl Violation {
    pub(crate) fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            excerpt: None,
            conversion: None,
        }
    }

    pub(crate) fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(truncate_chars(&excerpt.into(), EXCERPT_CHARS));
        self
    }

    pub(crate) fn conversion(error_type: ErrorType, error: ConversionError) -> Self {
        Self {
            error_type,
            message: error.to_string(),
            excerpt: None,
            conversion: Some(error),
        }
    }
}

/// Cut a string down to at most `max` characters.
pub(crate) fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(feature = "miette")]
mod miette_impl;

#[cfg(feature = "miette")]
pub use miette_impl::*;
