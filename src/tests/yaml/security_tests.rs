//! Aliases, custom tags, depth, document count, scalar length and type
//! restriction.

use crate::config::{ReadOptions, YamlLimits};
use crate::error::{ConversionError, ErrorAction, ErrorType, MemoryErrorSink};
use crate::materialize::{DynamicRecord, FieldValue, Materialize, Shape};
use crate::yaml::{YamlOptions, YamlReader};

fn read_skipping<T: Materialize>(
    text: &str,
    options: YamlOptions,
    sink: &MemoryErrorSink,
) -> Vec<T> {
    let read = ReadOptions::new()
        .with_error_action(ErrorAction::Skip)
        .with_error_sink(sink.clone());
    YamlReader::new(text.as_bytes(), options, read)
        .collect::<Result<_, _>>()
        .expect("skip never throws")
}

#[test]
fn anchors_are_rejected_by_default() {
    let sink = MemoryErrorSink::new();
    let text = "base: &b\n  x: 1\ncopy: *b\n";
    let out: Vec<DynamicRecord> = read_skipping(text, YamlOptions::new(), &sink);

    assert!(out.is_empty());
    let errors = sink.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type, ErrorType::YamlSecurityError);
    assert_eq!(errors[0].excerpt.as_deref(), Some("b"));
    assert!(errors[0].message.starts_with("anchor"));
}

#[test]
fn aliases_expand_when_allowed() {
    let sink = MemoryErrorSink::new();
    let text = "base: &b\n  x: 1\ncopy: *b\n";
    let out: Vec<DynamicRecord> = read_skipping(text, YamlOptions::new().with_aliases(true), &sink);

    assert!(sink.is_empty());
    let expected = FieldValue::Map(vec![("x".to_string(), FieldValue::Int(1))]);
    assert_eq!(out[0].get("copy"), Some(&expected));
    assert_eq!(out[0].get("base"), Some(&expected));
}

#[test]
fn alias_to_a_rejected_anchor_is_reported_by_name() {
    let sink = MemoryErrorSink::new();
    let out: Vec<FieldValue> = read_skipping("- &a 1\n- *a\n- 3\n", YamlOptions::new(), &sink);

    assert_eq!(out, vec![FieldValue::Int(3)]);
    let errors = sink.errors();
    assert_eq!(errors.len(), 2);
    assert!(errors[1].message.starts_with("alias"));
    assert_eq!(errors[1].excerpt.as_deref(), Some("a"));
    assert_eq!(errors[1].record, 2);
}

#[test]
fn custom_tags_are_rejected_by_default() {
    let sink = MemoryErrorSink::new();
    let out: Vec<FieldValue> =
        read_skipping("- !python/object x\n- plain\n", YamlOptions::new(), &sink);

    assert_eq!(out, vec![FieldValue::Text("plain".into())]);
    let error = &sink.errors()[0];
    assert_eq!(error.error_type, ErrorType::YamlSecurityError);
    assert_eq!(error.excerpt.as_deref(), Some("!python/object"));
}

#[test]
fn custom_tags_pass_when_allowed() {
    let sink = MemoryErrorSink::new();
    let options = YamlOptions::new().with_custom_tags(true);
    let out: Vec<FieldValue> = read_skipping("- !python/object x\n- plain\n", options, &sink);
    assert_eq!(out.len(), 2);
    assert!(sink.is_empty());
}

#[test]
fn deep_records_are_discarded_whole() {
    let sink = MemoryErrorSink::new();
    let options = YamlOptions::new().with_limits(YamlLimits::default().with_max_depth(2));
    let text = "---\na:\n  b:\n    c: 1\nz: 2\n---\na:\n  b: 1\n";
    let out: Vec<DynamicRecord> = read_skipping(text, options, &sink);

    assert_eq!(out.len(), 1);
    assert!(out[0].get("z").is_none());
    let error = &sink.errors()[0];
    assert_eq!(error.error_type, ErrorType::YamlSecurityError);
    assert_eq!(error.excerpt.as_deref(), Some("depth=3 max=2"));
}

#[test]
fn document_count_limit_ends_the_stream() {
    let sink = MemoryErrorSink::new();
    let options = YamlOptions::new().with_limits(YamlLimits::default().with_max_documents(2));
    let out: Vec<FieldValue> = read_skipping("- 1\n- 2\n- 3\n- 4\n", options, &sink);

    assert_eq!(out, vec![FieldValue::Int(1), FieldValue::Int(2)]);
    assert_eq!(sink.len(), 1);
    assert_eq!(sink.errors()[0].excerpt.as_deref(), Some("documents=3 max=2"));
}

#[test]
fn long_scalar_values_drop_only_their_entry() {
    let sink = MemoryErrorSink::new();
    let options = YamlOptions::new().with_limits(YamlLimits::default().with_max_scalar_length(8));
    let text = "name: Ada\nbio: averyverylongtext\nage: 3\n";
    let out: Vec<DynamicRecord> = read_skipping(text, options, &sink);

    assert_eq!(out.len(), 1);
    let names: Vec<&str> = out[0].names().collect();
    assert_eq!(names, ["name", "age"]);
    assert_eq!(sink.errors()[0].excerpt.as_deref(), Some("length=17 max=8"));
}

#[test]
fn long_keys_drop_their_value() {
    let sink = MemoryErrorSink::new();
    let options = YamlOptions::new().with_limits(YamlLimits::default().with_max_scalar_length(8));
    let text = "averyverylongkey:\n  nested: 1\nname: x\n";
    let out: Vec<DynamicRecord> = read_skipping(text, options, &sink);

    let names: Vec<&str> = out[0].names().collect();
    assert_eq!(names, ["name"]);
    assert_eq!(sink.len(), 1);
}

#[test]
fn long_root_scalars_drop_the_record() {
    let sink = MemoryErrorSink::new();
    let options = YamlOptions::new().with_limits(YamlLimits::default().with_max_scalar_length(8));
    let out: Vec<FieldValue> = read_skipping("- short\n- waytoolongvalue\n- [ok]\n", options, &sink);
    assert_eq!(
        out,
        vec![
            FieldValue::Text("short".into()),
            FieldValue::List(vec![FieldValue::Text("ok".into())]),
        ]
    );
}

#[test]
fn security_violation_under_stop_terminates() {
    let read = ReadOptions::new().with_error_action(ErrorAction::Stop);
    let metrics = read.metrics().clone();
    let out: Vec<FieldValue> =
        YamlReader::new("- 1\n- &a 2\n- 3\n".as_bytes(), YamlOptions::new(), read)
            .collect::<Result<_, _>>()
            .expect("stop never throws");

    assert_eq!(out, vec![FieldValue::Int(1)]);
    let m = metrics.snapshot();
    assert!(m.terminated_early);
    assert!(!m.is_completed());
}

#[derive(Debug, PartialEq)]
enum Figure {
    Circle,
    Square,
}

impl Materialize for Figure {
    fn shape() -> Shape<Self> {
        Shape::Dynamic(|value| match value.get("kind").and_then(FieldValue::as_str) {
            Some("circle") => Ok(Figure::Circle),
            Some("square") => Ok(Figure::Square),
            _ => Err(ConversionError {
                column_index: 0,
                column_name: "kind".into(),
                raw: value.excerpt(),
                target_type: "Figure".into(),
                message: "unknown figure".into(),
            }),
        })
    }

    fn runtime_type(&self) -> &'static str {
        match self {
            Figure::Circle => "Circle",
            Figure::Square => "Square",
        }
    }
}

const FIGURES: &str = "- kind: circle\n- kind: square\n- kind: circle\n";

#[test]
fn type_restriction_filters_runtime_types() {
    let sink = MemoryErrorSink::new();
    let options = YamlOptions::new().with_allowed_type("Circle");
    let out: Vec<Figure> = read_skipping(FIGURES, options, &sink);

    assert_eq!(out, vec![Figure::Circle, Figure::Circle]);
    let error = &sink.errors()[0];
    assert_eq!(error.error_type, ErrorType::TypeRestriction);
    assert_eq!(error.excerpt.as_deref(), Some("Square"));
    assert_eq!(error.record, 2);
}

#[test]
fn empty_allow_set_means_the_target_type_only() {
    let sink = MemoryErrorSink::new();
    let options = YamlOptions::new().with_type_restriction(true);
    let figures: Vec<Figure> = read_skipping(FIGURES, options.clone(), &sink);
    assert!(figures.is_empty());
    assert_eq!(sink.len(), 3);

    let sink = MemoryErrorSink::new();
    let records: Vec<DynamicRecord> = read_skipping(FIGURES, options, &sink);
    assert_eq!(records.len(), 3);
    assert!(sink.is_empty());
}

#[test]
fn anchor_names_are_found_deep_into_the_stream() {
    let sink = MemoryErrorSink::new();
    let mut text = String::new();
    for i in 0..10_000 {
        text.push_str(&format!("- {}\n", i));
    }
    text.push_str("- &late 1\n- *late\n- &later x\n");
    let out: Vec<FieldValue> = read_skipping(&text, YamlOptions::new(), &sink);

    assert_eq!(out.len(), 10_000);
    let excerpts: Vec<_> = sink.errors().iter().map(|e| e.excerpt.clone()).collect();
    assert_eq!(
        excerpts,
        vec![
            Some("late".to_string()),
            Some("late".to_string()),
            Some("later".to_string()),
        ]
    );
}
