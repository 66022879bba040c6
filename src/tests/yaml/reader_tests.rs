//! Documents, root sequences and structural errors.

use crate::cancel::CancellationToken;
use crate::config::ReadOptions;
use crate::error::{ErrorAction, ErrorType, MemoryErrorSink};
use crate::materialize::{DynamicRecord, FieldValue};
use crate::yaml::{YamlOptions, YamlReader};

#[derive(Debug, Default, PartialEq)]
struct Person {
    name: String,
    age: i32,
}

crate::materialize_properties!(Person { name: String, age: i32 });

fn people(text: &str) -> Vec<Person> {
    YamlReader::new(text.as_bytes(), YamlOptions::new(), ReadOptions::new())
        .collect::<Result<_, _>>()
        .expect("valid yaml")
}

#[test]
fn every_document_is_a_record() {
    let out = people("---\nname: Ada\nage: 36\n---\nname: Lin\nage: 41\n");
    assert_eq!(
        out,
        vec![
            Person { name: "Ada".into(), age: 36 },
            Person { name: "Lin".into(), age: 41 },
        ]
    );
}

#[test]
fn root_sequence_elements_are_records() {
    let out = people("- name: Ada\n  age: 36\n- name: Lin\n  age: 41\n");
    assert_eq!(out.len(), 2);
    assert_eq!(out[1], Person { name: "Lin".into(), age: 41 });
}

#[test]
fn nested_values_are_preserved() {
    let text = "id: 7\ntags: [a, b]\nowner:\n  name: Ada\n";
    let out: Vec<DynamicRecord> =
        YamlReader::new(text.as_bytes(), YamlOptions::new(), ReadOptions::new())
            .collect::<Result<_, _>>()
            .expect("valid");
    let record = &out[0];
    assert_eq!(record.get("id"), Some(&FieldValue::Int(7)));
    assert_eq!(
        record.get("tags"),
        Some(&FieldValue::List(vec![
            FieldValue::Text("a".into()),
            FieldValue::Text("b".into()),
        ]))
    );
    assert_eq!(
        record.get("owner").and_then(|o| o.get("name")),
        Some(&FieldValue::Text("Ada".into()))
    );
}

#[test]
fn empty_document_is_a_null_record() {
    let out: Vec<FieldValue> =
        YamlReader::new("---\n---\nx: 1\n".as_bytes(), YamlOptions::new(), ReadOptions::new())
            .collect::<Result<_, _>>()
            .expect("valid");
    assert_eq!(out.len(), 2);
    assert_eq!(out[0], FieldValue::Null);
}

#[test]
fn empty_stream_completes_without_records() {
    let read = ReadOptions::new();
    let metrics = read.metrics().clone();
    let out: Vec<FieldValue> = YamlReader::new("".as_bytes(), YamlOptions::new(), read)
        .collect::<Result<_, _>>()
        .expect("valid");
    assert!(out.is_empty());
    assert!(metrics.snapshot().is_completed());
}

#[test]
fn metrics_count_records_and_lines() {
    let read = ReadOptions::new();
    let metrics = read.metrics().clone();
    let out: Vec<Person> = YamlReader::new(
        "- name: Ada\n  age: 36\n- name: Lin\n  age: 41\n".as_bytes(),
        YamlOptions::new(),
        read,
    )
    .collect::<Result<_, _>>()
    .expect("valid");

    assert_eq!(out.len(), 2);
    let m = metrics.snapshot();
    assert_eq!(m.records_emitted, 2);
    assert_eq!(m.raw_records, 2);
    assert_eq!(m.lines_read, 4);
    assert!(m.is_completed());
}

#[test]
fn malformed_yaml_surfaces_under_throw() {
    let mut reader: YamlReader<_, FieldValue> =
        YamlReader::new("a: [1, 2\n".as_bytes(), YamlOptions::new(), ReadOptions::new());
    let err = reader.next().expect("parse error").expect_err("throw");
    let record = err.reader_error().expect("diagnostic");
    assert_eq!(record.error_type, ErrorType::YamlException);
    assert!(record.message.starts_with("malformed YAML"));
    assert!(reader.next().is_none());
}

#[test]
fn complex_keys_are_rejected() {
    let sink = MemoryErrorSink::new();
    let read = ReadOptions::new()
        .with_error_action(ErrorAction::Skip)
        .with_error_sink(sink.clone());
    let out: Vec<FieldValue> =
        YamlReader::new("? [a, b]\n: 1\n".as_bytes(), YamlOptions::new(), read)
            .collect::<Result<_, _>>()
            .expect("skip");
    assert!(out.is_empty());
    assert_eq!(sink.errors()[0].excerpt.as_deref(), Some("key=sequence"));
}

#[test]
fn conversion_failure_is_a_yaml_exception() {
    let sink = MemoryErrorSink::new();
    let read = ReadOptions::new()
        .with_error_action(ErrorAction::Skip)
        .with_error_sink(sink.clone());
    let out: Vec<Person> = YamlReader::new(
        "- name: Ada\n  age: old\n- name: Lin\n  age: 41\n".as_bytes(),
        YamlOptions::new(),
        read,
    )
    .collect::<Result<_, _>>()
    .expect("skip");

    assert_eq!(out, vec![Person { name: "Lin".into(), age: 41 }]);
    let error = &sink.errors()[0];
    assert_eq!(error.error_type, ErrorType::YamlException);
    assert_eq!(error.excerpt.as_deref(), Some("old"));
    assert_eq!(error.record, 1);
}

#[test]
fn nothing_is_read_before_the_first_next() {
    let token = CancellationToken::new();
    let read = ReadOptions::new().with_cancellation(token.clone());
    let metrics = read.metrics().clone();
    let mut reader: YamlReader<_, FieldValue> =
        YamlReader::new("- 1\n- 2\n".as_bytes(), YamlOptions::new(), read);
    assert!(metrics.snapshot().started_at.is_none());

    token.cancel();
    assert!(reader.next().expect("cancel").expect_err("cancelled").is_cancelled());
    assert_eq!(metrics.snapshot().raw_records, 0);
}

/// Hands out at most `step` bytes per read.
struct Trickle<'a> {
    bytes: &'a [u8],
    step: usize,
}

impl std::io::Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.step.min(buf.len()).min(self.bytes.len());
        buf[..n].copy_from_slice(&self.bytes[..n]);
        self.bytes = &self.bytes[n..];
        Ok(n)
    }
}

#[test]
fn invalid_utf8_is_replaced_not_fatal() {
    let sink = MemoryErrorSink::new();
    let read = ReadOptions::new()
        .with_error_action(ErrorAction::Skip)
        .with_error_sink(sink.clone());
    let metrics = read.metrics().clone();
    let out: Vec<DynamicRecord> = YamlReader::new(
        &b"a: 1\n---\nb: \xff\xfe\n"[..],
        YamlOptions::new(),
        read,
    )
    .collect::<Result<_, _>>()
    .expect("skip");

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].get("a"), Some(&FieldValue::Int(1)));
    assert_eq!(
        out[1].get("b"),
        Some(&FieldValue::Text("\u{FFFD}\u{FFFD}".into()))
    );
    assert!(sink.is_empty());
    let m = metrics.snapshot();
    assert_eq!(m.error_count, 0);
    assert!(m.is_completed());
}

#[test]
fn multibyte_characters_survive_split_reads() {
    let text = "- name: Zoë\n  age: 36\n- name: 李\n  age: 41\n";
    let out: Vec<Person> = YamlReader::new(
        Trickle { bytes: text.as_bytes(), step: 1 },
        YamlOptions::new(),
        ReadOptions::new(),
    )
    .collect::<Result<_, _>>()
    .expect("valid");

    assert_eq!(
        out,
        vec![
            Person { name: "Zoë".into(), age: 36 },
            Person { name: "李".into(), age: 41 },
        ]
    );
}

#[test]
fn records_arrive_before_the_source_is_exhausted() {
    let mut text = String::new();
    for i in 0..5_000 {
        text.push_str(&format!("- name: p{}\n  age: {}\n", i, i % 90));
    }
    let mut source = Trickle { bytes: text.as_bytes(), step: 512 };
    let first = {
        let mut reader: YamlReader<_, Person> =
            YamlReader::new(&mut source, YamlOptions::new(), ReadOptions::new());
        reader.next().expect("record").expect("valid")
    };

    assert_eq!(first, Person { name: "p0".into(), age: 0 });
    assert!(!source.bytes.is_empty());
}

#[test]
fn parse_error_late_in_the_stream_keeps_earlier_records() {
    let sink = MemoryErrorSink::new();
    let read = ReadOptions::new()
        .with_error_action(ErrorAction::Skip)
        .with_error_sink(sink.clone());
    let mut text = String::new();
    for i in 0..200 {
        text.push_str(&format!("- {}\n", i));
    }
    text.push_str("- [1, 2\n");
    let out: Vec<FieldValue> = YamlReader::new(text.as_bytes(), YamlOptions::new(), read)
        .collect::<Result<_, _>>()
        .expect("skip");

    assert_eq!(out.len(), 200);
    let error = &sink.errors()[0];
    assert_eq!(error.error_type, ErrorType::YamlException);
    assert!(error.line >= 201);
}
