//! # ingestguard
//!
//! Guard-railed streaming ingestion of CSV, JSON and YAML into typed records.
//!
//! ## Overview
//!
//! ingestguard provides:
//! - **Incremental readers**: `CsvReader`, `JsonReader` and `YamlReader` are lazy
//!   iterators of `Result<T, ReadError>`; nothing is read before the first `next()`
//! - **Guard rails**: per-format ceilings (columns, record length, element count and
//!   size, string length, nesting depth, document count, scalar length)
//! - **YAML security filter**: anchors, aliases and custom tags are rejected at the
//!   event level before a record is built
//! - **Error actions**: `Throw`, `Skip` or `Stop`, with every violation recorded as a
//!   structured `ReaderError` in an `ErrorSink`
//! - **Metrics and progress**: a shared `MetricsHandle`, record or time based progress
//!   callbacks, cooperative cancellation
//! - **Materialization**: field values become any `Materialize` type through a cached
//!   plan with staged, fuzzy name resolution
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ingestguard::{CsvOptions, CsvReader, ErrorAction, ReadOptions, materialize_properties};
//!
//! #[derive(Debug, Default)]
//! struct Trade {
//!     symbol: String,
//!     quantity: i64,
//! }
//!
//! materialize_properties!(Trade { symbol: String, quantity: i64 });
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let read = ReadOptions::new().with_error_action(ErrorAction::Skip);
//!     let metrics = read.metrics().clone();
//!     for trade in CsvReader::<_, Trade>::from_path("trades.csv", CsvOptions::new(), read)? {
//!         println!("{:?}", trade?);
//!     }
//!     println!("{:?}", metrics.snapshot());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `csv` - CSV reader and writer (enabled by default)
//! - `yaml` - YAML reader, writer and YAML configuration files (enabled by default)
//! - `miette` - Pretty error reporting with miette
//! - `cli` - The `ingestguard_inspect` binary

pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod io;
pub mod json;
pub mod materialize;
pub mod metrics;
pub mod schema;

#[cfg(feature = "csv")]
pub mod csv;
#[cfg(feature = "yaml")]
pub mod yaml;

mod guard;
mod session;

// Re-exports for convenience
pub use cancel::CancellationToken;
pub use config::{
    CsvLimits, GuardRailLimits, InputSpec, JsonLimits, ReadOptions, ReaderConfig, YamlLimits,
};
pub use engine::{IngestEngine, RecordStream};
pub use error::{
    ConversionError, ErrorAction, ErrorSink, ErrorType, JsonLinesErrorSink, MemoryErrorSink,
    NullErrorSink, ReadError, ReaderError,
};
pub use format::{FormatError, FormatKind, serialize_records, write_records};
pub use io::{FileInput, InMemorySource, InputProvider, StdinInput};
pub use json::{JsonOptions, JsonReader, JsonValidator};
pub use materialize::{
    DynamicRecord, FieldValue, FromField, MaterializationPlan, MaterializationSession,
    Materialize,
};
pub use metrics::{MetricsHandle, ProgressCadence, ProgressReport, ReaderMetrics};
pub use schema::Schema;

#[cfg(feature = "csv")]
pub use csv::{ColumnType, CsvOptions, CsvReader, QuoteMode};
#[cfg(feature = "yaml")]
pub use yaml::{YamlOptions, YamlReader};

// Miette re-exports
#[cfg(feature = "miette")]
pub use error::ReadDiagnostic;
