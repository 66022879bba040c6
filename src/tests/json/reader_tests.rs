//! Root detection, newline-delimited input and structural recovery.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};

use crate::cancel::CancellationToken;
use crate::config::ReadOptions;
use crate::error::{ErrorAction, ErrorType, MemoryErrorSink, ReadError};
use crate::json::{JsonOptions, JsonReader};
use crate::materialize::FieldValue;
use crate::metrics::ProgressCadence;

#[derive(Debug, Default, PartialEq)]
struct Person {
    name: String,
    age: i32,
}

crate::materialize_properties!(Person { name: String, age: i32 });

fn skipping(sink: &MemoryErrorSink) -> ReadOptions {
    ReadOptions::new()
        .with_error_action(ErrorAction::Skip)
        .with_error_sink(sink.clone())
}

fn values(text: &str, options: JsonOptions, read: ReadOptions) -> Vec<Value> {
    JsonReader::<_, Value>::new(text.as_bytes(), options, read)
        .collect::<Result<_, _>>()
        .expect("read succeeds")
}

#[test]
fn array_root_streams_elements() {
    let text = "[\n  {\"name\": \"Ada\", \"age\": 36},\n  {\"name\": \"Lin\", \"age\": 41}\n]\n";
    let read = ReadOptions::new();
    let metrics = read.metrics().clone();
    let people: Vec<Person> = JsonReader::new(text.as_bytes(), JsonOptions::new(), read)
        .collect::<Result<_, _>>()
        .expect("valid array");

    assert_eq!(
        people,
        vec![
            Person { name: "Ada".into(), age: 36 },
            Person { name: "Lin".into(), age: 41 },
        ]
    );
    let m = metrics.snapshot();
    assert_eq!(m.records_emitted, 2);
    assert_eq!(m.raw_records, 2);
    assert_eq!(m.lines_read, 4);
    assert!(m.is_completed());
}

#[test]
fn empty_array_and_empty_input_yield_nothing() {
    assert!(values("[]", JsonOptions::new(), ReadOptions::new()).is_empty());
    assert!(values("  \n", JsonOptions::new(), ReadOptions::new()).is_empty());
}

#[test]
fn single_object_root_is_one_record() {
    let out = values("{\"id\": 1}", JsonOptions::new(), ReadOptions::new());
    assert_eq!(out, vec![json!({"id": 1})]);
}

#[test]
fn single_object_root_rejected_when_array_required() {
    let options = JsonOptions::new().with_require_array_root(true);
    let mut reader = JsonReader::<_, Value>::new("{\"id\": 1}".as_bytes(), options, ReadOptions::new());
    let err = reader.next().expect("root error").expect_err("throw");
    let record = err.reader_error().expect("diagnostic");
    assert_eq!(record.error_type, ErrorType::JsonRootError);
    assert_eq!(record.excerpt.as_deref(), Some("root=object"));
    assert!(reader.next().is_none());
}

#[test]
fn scalar_root_is_rejected_by_default() {
    let sink = MemoryErrorSink::new();
    let read = skipping(&sink);
    let metrics = read.metrics().clone();
    assert!(values("42", JsonOptions::new(), read).is_empty());

    assert_eq!(sink.errors()[0].error_type, ErrorType::JsonRootError);
    assert_eq!(sink.errors()[0].excerpt.as_deref(), Some("root=scalar"));
    assert!(metrics.snapshot().is_completed());
}

#[test]
fn scalar_root_accepted_when_allowed() {
    let options = JsonOptions::new().with_scalar_root(true);
    let out: Vec<FieldValue> = JsonReader::new("42".as_bytes(), options, ReadOptions::new())
        .collect::<Result<_, _>>()
        .expect("scalar root");
    assert_eq!(out, vec![FieldValue::Int(42)]);
}

#[test]
fn newline_delimited_values_are_records() {
    let text = "{\"name\":\"Ada\",\"age\":36}\n{\"name\":\"Lin\",\"age\":41}\n";
    let options = JsonOptions::new().with_newline_delimited(true);
    let people: Vec<Person> = JsonReader::new(text.as_bytes(), options, ReadOptions::new())
        .collect::<Result<_, _>>()
        .expect("ndjson");
    assert_eq!(people.len(), 2);
    assert_eq!(people[1].name, "Lin");
}

#[test]
fn newline_delimited_junk_skips_to_the_next_line() {
    let text = "{\"a\":1}\n,junk\n{\"a\":2}\n";
    let sink = MemoryErrorSink::new();
    let options = JsonOptions::new().with_newline_delimited(true);
    let out = values(text, options, skipping(&sink));

    assert_eq!(out, vec![json!({"a": 1}), json!({"a": 2})]);
    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorType::JsonException);
    assert_eq!(errors[0].line, 2);
}

#[test]
fn newline_delimited_text_line_is_one_error() {
    let text = "{\"a\":1}\nthis is junk\n{\"a\":2}\n";
    let sink = MemoryErrorSink::new();
    let read = skipping(&sink);
    let metrics = read.metrics().clone();
    let options = JsonOptions::new().with_newline_delimited(true);
    let out = values(text, options, read);

    assert_eq!(out, vec![json!({"a": 1}), json!({"a": 2})]);
    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorType::JsonException);
    assert_eq!(errors[0].line, 2);
    assert_eq!(errors[0].excerpt.as_deref(), Some("this"));

    let m = metrics.snapshot();
    assert_eq!(m.error_count, 1);
    assert_eq!(m.raw_records, 3);
    assert_eq!(m.records_emitted, 2);
}

#[test]
fn malformed_element_is_skipped() {
    let sink = MemoryErrorSink::new();
    let out = values("[{\"a\":1},{\"a\":},{\"a\":3}]", JsonOptions::new(), skipping(&sink));

    assert_eq!(out, vec![json!({"a": 1}), json!({"a": 3})]);
    let errors = sink.errors();
    assert_eq!(errors[0].error_type, ErrorType::JsonException);
    assert_eq!(errors[0].record, 2);
    assert_eq!(errors[0].excerpt.as_deref(), Some("{\"a\":}"));
}

#[test]
fn missing_separator_ends_the_stream() {
    let sink = MemoryErrorSink::new();
    let read = skipping(&sink);
    let metrics = read.metrics().clone();
    let out = values("[{\"a\":1} {\"a\":2}]", JsonOptions::new(), read);

    assert_eq!(out.len(), 1);
    assert_eq!(sink.len(), 1);
    assert!(sink.errors()[0].message.contains("expected ','"));
    assert!(metrics.snapshot().is_completed());
}

#[test]
fn truncated_input_is_reported() {
    let sink = MemoryErrorSink::new();
    let out = values("[{\"a\":1},{\"a\":", JsonOptions::new(), skipping(&sink));
    assert_eq!(out.len(), 1);
    assert!(sink.errors()[0].message.contains("unexpected end of input"));
}

#[test]
fn trailing_content_after_root_is_an_error() {
    let mut reader = JsonReader::<_, Value>::new("[1] x".as_bytes(), JsonOptions::new(), ReadOptions::new());
    assert_eq!(reader.next().expect("element").expect("valid"), json!(1));
    let err = reader.next().expect("trailing").expect_err("throw");
    assert!(err.to_string().contains("trailing content"), "{err}");
}

#[test]
fn conversion_failure_under_throw() {
    let text = "[{\"name\": \"Ada\", \"age\": \"old\"}]";
    let mut reader: JsonReader<_, Person> =
        JsonReader::new(text.as_bytes(), JsonOptions::new(), ReadOptions::new());
    match reader.next().expect("one result") {
        Err(ReadError::Conversion(e)) => assert_eq!(e.column_name, "age"),
        other => panic!("expected conversion error, got {other:?}"),
    }
}

#[test]
fn conversion_failure_under_skip_is_a_json_exception() {
    let sink = MemoryErrorSink::new();
    let text = "[{\"name\": \"Ada\", \"age\": \"old\"}, {\"name\": \"Lin\", \"age\": 41}]";
    let people: Vec<Person> = JsonReader::new(text.as_bytes(), JsonOptions::new(), skipping(&sink))
        .collect::<Result<_, _>>()
        .expect("skip");
    assert_eq!(people, vec![Person { name: "Lin".into(), age: 41 }]);
    assert_eq!(sink.errors()[0].error_type, ErrorType::JsonException);
}

#[test]
fn single_root_on_validation_path_reports_start_and_end() {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&reports);
    let read = ReadOptions::new()
        .with_progress(move |r| seen.lock().expect("lock").push(r.percent))
        .with_progress_cadence(ProgressCadence::records(1));
    let options = JsonOptions::new().with_force_guard_rails(true);
    let out = values("{\"id\": 1}", options, read);

    assert_eq!(out.len(), 1);
    assert_eq!(*reports.lock().expect("lock"), vec![Some(0.0), Some(100.0)]);
}

#[test]
fn cancelled_token_stops_before_reading() {
    let token = CancellationToken::new();
    token.cancel();
    let read = ReadOptions::new().with_cancellation(token);
    let metrics = read.metrics().clone();
    let mut reader = JsonReader::<_, Value>::new("[1, 2]".as_bytes(), JsonOptions::new(), read);

    assert!(reader.next().expect("cancel").expect_err("cancelled").is_cancelled());
    assert!(reader.next().is_none());
    let m = metrics.snapshot();
    assert_eq!(m.raw_records, 0);
    assert!(!m.terminated_early);
}
