//! Reader configuration loaded from YAML or JSON.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{GuardRailLimits, ReadOptions};
use crate::error::{ErrorAction, JsonLinesErrorSink, ReadError};
use crate::format::FormatKind;
use crate::json::JsonOptions;
use crate::metrics::ProgressCadence;

#[cfg(feature = "csv")]
use crate::csv::{CsvOptions, QuoteMode};
#[cfg(feature = "yaml")]
use crate::yaml::YamlOptions;

/// Configuration for a family of reads.
///
/// Every field is optional; omitted values keep the reader defaults.
///
/// ```yaml
/// error_action: skip
/// error_log: errors.jsonl
/// progress_every_records: 500
/// limits:
///   csv:
///     max_columns: 64
/// csv:
///   delimiter: ";"
///   quote_mode: lenient
/// yaml:
///   allow_aliases: false
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// "throw", "skip" or "stop"
    pub error_action: Option<String>,
    /// Path of a JSON-lines error log
    pub error_log: Option<PathBuf>,
    pub progress_every_records: Option<u64>,
    pub progress_interval_ms: Option<u64>,
    pub limits: GuardRailLimits,
    pub csv: CsvSection,
    pub json: JsonSection,
    pub yaml: YamlSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvSection {
    /// Single-character delimiter
    pub delimiter: Option<String>,
    /// Single-character quote
    pub quote: Option<String>,
    /// "strict", "lenient" or "error_on_illegal"
    pub quote_mode: Option<String>,
    pub has_header: Option<bool>,
    pub schema: Option<Vec<String>>,
    pub infer_types: Option<bool>,
    pub sample_rows: Option<usize>,
    pub preserve_leading_zeros: Option<bool>,
    pub skip_empty_lines: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonSection {
    pub allow_single_object: Option<bool>,
    pub allow_scalar_root: Option<bool>,
    pub require_array_root: Option<bool>,
    pub newline_delimited: Option<bool>,
    pub force_guard_rails: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YamlSection {
    pub allow_aliases: bool,
    pub allow_custom_tags: bool,
    pub restrict_types: bool,
    pub allowed_types: Vec<String>,
}

impl ReaderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from YAML text.
    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(text: &str) -> Result<Self, ReadError> {
        serde_yaml::from_str(text).map_err(|e| ReadError::Config(format!("invalid YAML config: {}", e)))
    }

    /// Parse a configuration from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ReadError> {
        serde_json::from_str(text).map_err(|e| ReadError::Config(format!("invalid JSON config: {}", e)))
    }

    /// Load a configuration file; the format follows the extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        match FormatKind::from_path(path) {
            Some(FormatKind::Json) => Self::from_json_str(&text),
            #[cfg(feature = "yaml")]
            Some(FormatKind::Yaml) => Self::from_yaml_str(&text),
            _ => Err(ReadError::Config(format!(
                "unsupported configuration file: {}",
                path.display()
            ))),
        }
    }

    pub fn with_error_action(mut self, action: impl Into<String>) -> Self {
        self.error_action = Some(action.into());
        self
    }

    pub fn with_error_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_log = Some(path.into());
        self
    }

    pub fn with_limits(mut self, limits: GuardRailLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The configured error action, `Throw` when absent.
    pub fn action(&self) -> Result<ErrorAction, ReadError> {
        match self.error_action.as_deref() {
            None => Ok(ErrorAction::default()),
            Some(s) => ErrorAction::from_str(s)
                .ok_or_else(|| ReadError::Config(format!("unknown error action: {}", s))),
        }
    }

    /// Build per-read options. Opens the error log when one is configured.
    pub fn read_options(&self) -> Result<ReadOptions, ReadError> {
        let mut options = ReadOptions::new().with_error_action(self.action()?);
        if let Some(path) = &self.error_log {
            options = options.with_error_sink(JsonLinesErrorSink::new(path)?);
        }
        if self.progress_every_records.is_some() || self.progress_interval_ms.is_some() {
            options = options.with_progress_cadence(ProgressCadence {
                every_records: self.progress_every_records.unwrap_or(0),
                every: self.progress_interval_ms.map(Duration::from_millis),
            });
        }
        Ok(options)
    }

    #[cfg(feature = "csv")]
    pub fn csv_options(&self) -> Result<CsvOptions, ReadError> {
        let section = &self.csv;
        let mut options = CsvOptions::new().with_limits(self.limits.csv);
        if let Some(d) = &section.delimiter {
            options = options.with_delimiter(single_byte("delimiter", d)?);
        }
        if let Some(q) = &section.quote {
            options = options.with_quote(single_byte("quote", q)?);
        }
        if let Some(mode) = &section.quote_mode {
            let mode = QuoteMode::from_str(mode)
                .ok_or_else(|| ReadError::Config(format!("unknown quote mode: {}", mode)))?;
            options = options.with_quote_mode(mode);
        }
        if let Some(header) = section.has_header {
            options = options.with_header(header);
        }
        if let Some(schema) = &section.schema {
            options = options.with_schema(schema.iter().cloned());
        }
        if let Some(infer) = section.infer_types {
            options = options.with_type_inference(infer);
        }
        if let Some(rows) = section.sample_rows {
            options = options.with_sample_rows(rows);
        }
        if let Some(preserve) = section.preserve_leading_zeros {
            options = options.with_preserve_leading_zeros(preserve);
        }
        if let Some(skip) = section.skip_empty_lines {
            options = options.with_skip_empty_lines(skip);
        }
        Ok(options)
    }

    pub fn json_options(&self) -> JsonOptions {
        let section = &self.json;
        let defaults = JsonOptions::default();
        JsonOptions::new()
            .with_limits(self.limits.json)
            .with_single_object(section.allow_single_object.unwrap_or(defaults.allow_single_object))
            .with_scalar_root(section.allow_scalar_root.unwrap_or(defaults.allow_scalar_root))
            .with_require_array_root(section.require_array_root.unwrap_or(defaults.require_array_root))
            .with_newline_delimited(section.newline_delimited.unwrap_or(defaults.newline_delimited))
            .with_force_guard_rails(section.force_guard_rails.unwrap_or(defaults.force_guard_rails))
    }

    #[cfg(feature = "yaml")]
    pub fn yaml_options(&self) -> YamlOptions {
        let section = &self.yaml;
        YamlOptions {
            allow_aliases: section.allow_aliases,
            allow_custom_tags: section.allow_custom_tags,
            restrict_types: section.restrict_types || !section.allowed_types.is_empty(),
            allowed_types: section.allowed_types.clone(),
            limits: self.limits.yaml,
        }
    }
}

#[cfg(feature = "csv")]
fn single_byte(what: &str, value: &str) -> Result<u8, ReadError> {
    match value.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(ReadError::Config(format!(
            "{} must be a single ASCII character, got {:?}",
            what, value
        ))),
    }
}
