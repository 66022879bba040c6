//! Per-read options and input specs.

use std::sync::Arc;

use crate::config::{InputSpec, ReadOptions};
use crate::error::{ErrorAction, ReadError};
use crate::format::{FormatError, FormatKind};
use crate::io::InMemorySource;
use crate::metrics::ProgressCadence;

#[test]
fn read_options_defaults() {
    let read = ReadOptions::new();
    assert_eq!(read.error_action, ErrorAction::Throw);
    assert!(read.progress.is_none());
    assert_eq!(read.progress_cadence, ProgressCadence::default());
    assert!(!read.cancellation().is_cancelled());
    assert_eq!(read.file_id, None);
    assert_eq!(read.source_len, None);
}

#[test]
fn shared_metrics_handle_is_visible_to_callers() {
    let read = ReadOptions::new();
    let handle = read.metrics().clone();
    read.metrics().update(|m| m.lines_read = 3);
    assert_eq!(handle.snapshot().lines_read, 3);
}

#[test]
fn input_spec_resolves_explicit_then_extension() {
    let spec = InputSpec::from_path("data/people.csv");
    assert_eq!(spec.resolve_format().expect("csv"), FormatKind::Csv);

    let spec = InputSpec::from_path("data/people.csv").with_format(FormatKind::Json);
    assert_eq!(spec.resolve_format().expect("explicit"), FormatKind::Json);

    let spec = InputSpec::new("stream", Arc::new(InMemorySource::from_string("stream", "")));
    assert!(matches!(
        spec.resolve_format(),
        Err(FormatError::NoFormatMatched(raw)) if raw == "stream"
    ));
}

#[test]
fn format_errors_convert_into_read_errors() {
    let err: ReadError = FormatError::NotEnabled(FormatKind::Yaml).into();
    assert!(err.to_string().contains("not enabled"));
}
