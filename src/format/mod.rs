//! Format kinds and the paired record writer.
//!
//! This module provides:
//! - `FormatKind`: The formats a reader understands
//! - `FormatError`: Errors that can occur while writing records
//! - `serialize_records` / `write_records`: Write a record slice back out in the
//!   same shape the readers accept, so data can round-trip

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(feature = "csv")]
mod csv;

/// Represents the supported data formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    /// Delimited text with an optional header row
    Csv,
    /// JSON array, single root, or newline-delimited values
    Json,
    /// One or more YAML documents
    Yaml,
}

impl std::fmt::Display for FormatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatKind::Csv => write!(f, "csv"),
            FormatKind::Json => write!(f, "json"),
            FormatKind::Yaml => write!(f, "yaml"),
        }
    }
}

impl FormatKind {
    /// Parse a format kind from a string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" | "tsv" => Some(FormatKind::Csv),
            "json" | "ndjson" | "jsonl" => Some(FormatKind::Json),
            "yaml" | "yml" => Some(FormatKind::Yaml),
            _ => None,
        }
    }

    /// Get file extensions for this format.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            FormatKind::Csv => &["csv", "tsv"],
            FormatKind::Json => &["json", "ndjson", "jsonl"],
            FormatKind::Yaml => &["yaml", "yml"],
        }
    }

    /// Guess the format from a path's extension.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?;
        [FormatKind::Csv, FormatKind::Json, FormatKind::Yaml]
            .into_iter()
            .find(|k| k.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Check if this format is available (feature enabled).
    pub fn is_available(&self) -> bool {
        match self {
            #[cfg(feature = "csv")]
            FormatKind::Csv => true,
            #[cfg(not(feature = "csv"))]
            FormatKind::Csv => false,

            FormatKind::Json => true,

            #[cfg(feature = "yaml")]
            FormatKind::Yaml => true,
            #[cfg(not(feature = "yaml"))]
            FormatKind::Yaml => false,
        }
    }
}

/// Errors that can occur during format operations.
#[derive(Debug, Error)]
pub enum FormatError {
    /// No format could be resolved for an input
    #[error("No format matched the input '{0}'")]
    NoFormatMatched(String),

    /// Format feature not enabled
    #[error("Format '{0}' is not enabled. Enable the corresponding feature.")]
    NotEnabled(FormatKind),

    /// I/O error during format operation
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serde error: {0}")]
    Serde(Box<dyn std::error::Error + Send + Sync>),
}

/// Serialize a slice of records to bytes using the specified format.
pub fn serialize_records<T: Serialize>(kind: FormatKind, records: &[T]) -> Result<Vec<u8>, FormatError> {
    let mut out = Vec::new();
    write_records(kind, records, &mut out)?;
    Ok(out)
}

/// Serialize a slice of records into a writer using the specified format.
///
/// CSV writes a header row from the first record's field names, JSON writes
/// one array, YAML writes one top-level sequence.
pub fn write_records<T: Serialize>(
    kind: FormatKind,
    records: &[T],
    writer: &mut dyn Write,
) -> Result<(), FormatError> {
    match kind {
        #[cfg(feature = "csv")]
        FormatKind::Csv => csv::write_records(records, writer),

        FormatKind::Json => {
            serde_json::to_writer_pretty(&mut *writer, records)
                .map_err(|e| FormatError::Serde(Box::new(e)))?;
            writer.write_all(b"\n")?;
            Ok(())
        }

        #[cfg(feature = "yaml")]
        FormatKind::Yaml => {
            serde_yaml::to_writer(writer, records).map_err(|e| FormatError::Serde(Box::new(e)))
        }

        #[allow(unreachable_patterns)]
        _ => Err(FormatError::NotEnabled(kind)),
    }
}
