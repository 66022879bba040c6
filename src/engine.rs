//! Format-dispatching ingestion engine.

use crate::config::{InputSpec, ReadOptions, ReaderConfig};
use crate::error::ReadError;
use crate::format::{FormatError, FormatKind};
use crate::json::{JsonOptions, JsonReader};
use crate::materialize::Materialize;

#[cfg(feature = "csv")]
use crate::csv::{CsvOptions, CsvReader};
#[cfg(feature = "yaml")]
use crate::yaml::{YamlOptions, YamlReader};

/// A lazy stream of typed records from any reader.
pub type RecordStream<T> = Box<dyn Iterator<Item = Result<T, ReadError>>>;

/// Opens inputs and hands them to the reader for their format.
///
/// The engine holds the per-format options; per-read options (error action,
/// sink, progress, cancellation, metrics) are passed to each read.
#[derive(Debug, Clone, Default)]
pub struct IngestEngine {
    #[cfg(feature = "csv")]
    csv: CsvOptions,
    json: JsonOptions,
    #[cfg(feature = "yaml")]
    yaml: YamlOptions,
}

impl IngestEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an engine from the format sections and limits of a configuration.
    pub fn from_config(config: &ReaderConfig) -> Result<Self, ReadError> {
        Ok(Self {
            #[cfg(feature = "csv")]
            csv: config.csv_options()?,
            json: config.json_options(),
            #[cfg(feature = "yaml")]
            yaml: config.yaml_options(),
        })
    }

    #[cfg(feature = "csv")]
    pub fn with_csv_options(mut self, options: CsvOptions) -> Self {
        self.csv = options;
        self
    }

    pub fn with_json_options(mut self, options: JsonOptions) -> Self {
        self.json = options;
        self
    }

    #[cfg(feature = "yaml")]
    pub fn with_yaml_options(mut self, options: YamlOptions) -> Self {
        self.yaml = options;
        self
    }

    #[cfg(feature = "csv")]
    pub fn csv_options(&self) -> &CsvOptions {
        &self.csv
    }

    pub fn json_options(&self) -> &JsonOptions {
        &self.json
    }

    #[cfg(feature = "yaml")]
    pub fn yaml_options(&self) -> &YamlOptions {
        &self.yaml
    }

    /// Open an input and return its record stream.
    ///
    /// The format is the input's explicit one or follows the extension. A
    /// `.tsv` input is tab-delimited and `.ndjson`/`.jsonl` inputs are
    /// newline-delimited. The provider's id and length hint fill in
    /// `file_id` and `source_len` when the options leave them unset. Nothing
    /// is parsed until the stream is first polled.
    pub fn read<T: Materialize>(
        &self,
        spec: &InputSpec,
        mut options: ReadOptions,
    ) -> Result<RecordStream<T>, ReadError> {
        let kind = spec.resolve_format()?;
        if !kind.is_available() {
            return Err(FormatError::NotEnabled(kind).into());
        }

        let reader = spec.provider.open()?;
        if options.file_id.is_none() {
            options.file_id = Some(spec.provider.id().to_string());
        }
        if options.source_len.is_none() {
            options.source_len = spec.provider.len_hint();
        }
        log::debug!("opened '{}' as {}", spec.raw, kind);
        let extension = spec.extension();

        match kind {
            #[cfg(feature = "csv")]
            FormatKind::Csv => {
                let mut csv = self.csv.clone();
                if extension.as_deref() == Some("tsv") {
                    csv = csv.with_delimiter(b'\t');
                }
                Ok(Box::new(CsvReader::<_, T>::new(reader, csv, options)))
            }
            FormatKind::Json => {
                let mut json = self.json.clone();
                if matches!(extension.as_deref(), Some("ndjson" | "jsonl")) {
                    json = json.with_newline_delimited(true);
                }
                Ok(Box::new(JsonReader::<_, T>::new(reader, json, options)))
            }
            #[cfg(feature = "yaml")]
            FormatKind::Yaml => Ok(Box::new(YamlReader::<_, T>::new(
                reader,
                self.yaml.clone(),
                options,
            ))),
            #[allow(unreachable_patterns)]
            other => Err(FormatError::NotEnabled(other).into()),
        }
    }

    /// Read an input to the end, stopping at the first error.
    pub fn read_all<T: Materialize>(
        &self,
        spec: &InputSpec,
        options: ReadOptions,
    ) -> Result<Vec<T>, ReadError> {
        self.read::<T>(spec, options)?.collect()
    }
}
