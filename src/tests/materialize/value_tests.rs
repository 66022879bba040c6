//! Field values and dynamic records.

use rust_decimal::Decimal;
use serde_json::json;

use crate::materialize::{DynamicRecord, FieldValue};

#[test]
fn display_renders_nested_values() {
    let value = FieldValue::Map(vec![
        ("a".into(), FieldValue::List(vec![FieldValue::Int(1), FieldValue::Null])),
        ("b".into(), FieldValue::Text("x".into())),
    ]);
    assert_eq!(value.to_string(), "{a: [1, null], b: x}");
}

#[test]
fn excerpts_are_bounded() {
    let value = FieldValue::Text("y".repeat(500));
    assert_eq!(value.excerpt().chars().count(), 128);
}

#[test]
fn json_numbers_pick_the_narrowest_variant() {
    let value: FieldValue = serde_json::from_value(json!([1, 5000000000u64, 18446744073709551615u64, 1.5]))
        .expect("deserialize");
    assert_eq!(
        value,
        FieldValue::List(vec![
            FieldValue::Int(1),
            FieldValue::Long(5_000_000_000),
            FieldValue::Decimal(Decimal::from(u64::MAX)),
            FieldValue::Float(1.5),
        ])
    );
}

#[test]
fn serialization_keeps_order_and_stringifies_decimals() {
    let mut record = DynamicRecord::new();
    record.insert("z", FieldValue::Decimal(Decimal::new(150, 2)));
    record.insert("a", FieldValue::Bool(true));
    let text = serde_json::to_string(&record).expect("serialize");
    assert_eq!(text, r#"{"z":"1.50","a":true}"#);
}

#[test]
fn insert_replaces_existing_fields() {
    let mut record = DynamicRecord::new();
    record.insert("a", FieldValue::Int(1));
    record.insert("b", FieldValue::Int(2));
    record.insert("a", FieldValue::Int(3));

    assert_eq!(record.len(), 2);
    assert_eq!(record.get("a"), Some(&FieldValue::Int(3)));
    let names: Vec<&str> = record.names().collect();
    assert_eq!(names, ["a", "b"]);
}

#[test]
fn map_lookup_by_name() {
    let value = FieldValue::Map(vec![("k".into(), FieldValue::Bool(false))]);
    assert_eq!(value.get("k"), Some(&FieldValue::Bool(false)));
    assert_eq!(value.get("missing"), None);
    assert_eq!(FieldValue::Int(1).get("k"), None);
}
