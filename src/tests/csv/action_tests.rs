//! Throw, Skip and Stop applied to CSV violations.

use crate::config::{CsvLimits, ReadOptions};
use crate::csv::{CsvOptions, CsvReader};
use crate::error::{ErrorAction, ErrorType, MemoryErrorSink, ReadError};
use crate::materialize::DynamicRecord;

const WIDE_ROW: &str = "a,b\n1,2\n3,4,5\n6,7\n";

#[derive(Debug, Default, PartialEq)]
struct Person {
    name: String,
    age: i32,
}

crate::materialize_properties!(Person { name: String, age: i32 });

fn narrow(action: ErrorAction, sink: &MemoryErrorSink) -> CsvReader<&'static [u8], DynamicRecord> {
    let csv = CsvOptions::new().with_limits(CsvLimits::default().with_max_columns(2));
    let read = ReadOptions::new()
        .with_error_action(action)
        .with_error_sink(sink.clone())
        .with_file_id("wide.csv");
    CsvReader::new(WIDE_ROW.as_bytes(), csv, read)
}

#[test]
fn skip_drops_the_record_and_continues() {
    let sink = MemoryErrorSink::new();
    let reader = narrow(ErrorAction::Skip, &sink);
    let metrics = reader.metrics();
    let rows: Vec<DynamicRecord> = reader.collect::<Result<_, _>>().expect("skip never throws");

    assert_eq!(rows.len(), 2);
    let m = metrics.snapshot();
    assert_eq!(m.records_emitted, 2);
    assert_eq!(m.raw_records, 3);
    assert_eq!(m.error_count, 1);
    assert!(m.is_completed());
    assert!(!m.terminated_early);

    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    let error = &errors[0];
    assert_eq!(error.error_type, ErrorType::CsvLimitExceeded);
    assert_eq!(error.action, ErrorAction::Skip);
    assert_eq!(error.file, "wide.csv");
    assert_eq!(error.line, 3);
    assert_eq!(error.record, 2);
    assert_eq!(error.excerpt.as_deref(), Some("3,4,5"));
}

#[test]
fn stop_ends_the_stream_without_completion() {
    let sink = MemoryErrorSink::new();
    let reader = narrow(ErrorAction::Stop, &sink);
    let metrics = reader.metrics();
    let rows: Vec<DynamicRecord> = reader.collect::<Result<_, _>>().expect("stop never throws");

    assert_eq!(rows.len(), 1);
    let m = metrics.snapshot();
    assert!(m.terminated_early);
    assert!(m.termination_message.is_some());
    assert!(m.completed_at.is_none());
    assert_eq!(m.error_count, 1);
    assert_eq!(sink.errors()[0].action, ErrorAction::Stop);
}

#[test]
fn throw_surfaces_the_violation_and_ends() {
    let sink = MemoryErrorSink::new();
    let mut reader = narrow(ErrorAction::Throw, &sink);
    let metrics = reader.metrics();

    assert!(reader.next().expect("first record").is_ok());
    let err = reader.next().expect("violation").expect_err("throw");
    let record = err.reader_error().expect("diagnostic record");
    assert_eq!(record.error_type, ErrorType::CsvLimitExceeded);
    assert_eq!(record.action, ErrorAction::Throw);
    assert!(reader.next().is_none());

    let m = metrics.snapshot();
    assert!(m.terminated_early);
    assert!(!m.is_completed());
    assert_eq!(sink.len(), 1, "thrown errors are recorded too");
}

#[test]
fn conversion_failure_under_throw_names_the_column() {
    let mut reader: CsvReader<_, Person> = CsvReader::new(
        "name,age\nAda,abc\n".as_bytes(),
        CsvOptions::new(),
        ReadOptions::new(),
    );
    let err = reader.next().expect("one result").expect_err("age is not numeric");
    match err {
        ReadError::Conversion(conversion) => {
            assert_eq!(conversion.column_name, "age");
            assert_eq!(conversion.column_index, 1);
            assert_eq!(conversion.raw, "abc");
        }
        other => panic!("expected conversion error, got {other:?}"),
    }
}

#[test]
fn conversion_failure_under_skip_is_a_schema_error() {
    let sink = MemoryErrorSink::new();
    let read = ReadOptions::new()
        .with_error_action(ErrorAction::Skip)
        .with_error_sink(sink.clone());
    let rows: Vec<Person> = CsvReader::new(
        "name,age\nAda,abc\nLin,41\n".as_bytes(),
        CsvOptions::new(),
        read,
    )
    .collect::<Result<_, _>>()
    .expect("skip");

    assert_eq!(rows, vec![Person { name: "Lin".into(), age: 41 }]);
    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorType::SchemaError);
    assert_eq!(errors[0].excerpt.as_deref(), Some("name=Ada, age=abc"));
}

#[test]
fn broken_header_ends_the_read_under_skip() {
    let sink = MemoryErrorSink::new();
    let read = ReadOptions::new()
        .with_error_action(ErrorAction::Skip)
        .with_error_sink(sink.clone());
    let reader: CsvReader<_, DynamicRecord> =
        CsvReader::new("a\"b,c\n1,2\n".as_bytes(), CsvOptions::new(), read);
    let metrics = reader.metrics();

    assert_eq!(reader.count(), 0);
    assert_eq!(sink.errors()[0].error_type, ErrorType::CsvQuoteError);
    assert_eq!(sink.errors()[0].record, 0);
    assert!(metrics.snapshot().is_completed());
}
