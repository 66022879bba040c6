//! Configuration types for reads.
//!
//! This module provides:
//! - `ReadOptions`: Per-read error action, sink, progress, cancellation and metrics
//! - `CsvLimits`, `JsonLimits`, `YamlLimits`, `GuardRailLimits`: Guard rail ceilings
//! - `InputSpec`: A source plus its format
//! - `ReaderConfig`: Serde-loaded reader configuration

mod file;
mod limits;
mod options;
mod spec;

pub use file::{CsvSection, JsonSection, ReaderConfig, YamlSection};
pub use limits::{CsvLimits, GuardRailLimits, JsonLimits, YamlLimits};
pub use options::ReadOptions;
pub use spec::InputSpec;
