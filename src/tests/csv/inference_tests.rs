//! Column type inference, leading zeros and runtime demotion.

use crate::config::ReadOptions;
use crate::csv::{ColumnType, CsvOptions, CsvReader};
use crate::materialize::{DynamicRecord, FieldValue};

fn column(text: &str, csv: CsvOptions) -> (Vec<FieldValue>, Vec<ColumnType>) {
    let mut reader: CsvReader<_, DynamicRecord> =
        CsvReader::new(text.as_bytes(), csv, ReadOptions::new());
    let mut values = Vec::new();
    for record in reader.by_ref() {
        let record = record.expect("valid record");
        values.push(record.get("v").cloned().unwrap_or_default());
    }
    (values, reader.column_types())
}

#[test]
fn infers_each_candidate_type() {
    let text = "flag,count,price,at,id\n\
                true,3000000000,2.50,2024-01-15T10:30:00,67e55044-10b1-426f-9247-bb680e5fe0c8\n";
    let mut reader: CsvReader<_, DynamicRecord> =
        CsvReader::new(text.as_bytes(), CsvOptions::new(), ReadOptions::new());
    let record = reader.next().expect("record").expect("valid");

    assert_eq!(
        reader.column_types(),
        vec![
            ColumnType::Boolean,
            ColumnType::Long,
            ColumnType::Decimal,
            ColumnType::Timestamp,
            ColumnType::Uuid,
        ]
    );
    assert_eq!(record.get("flag"), Some(&FieldValue::Bool(true)));
    assert_eq!(record.get("count"), Some(&FieldValue::Long(3_000_000_000)));
    assert!(matches!(record.get("at"), Some(FieldValue::Timestamp(_))));
}

#[test]
fn small_integers_prefer_the_32_bit_type() {
    let (values, types) = column("v\n1\n2\n", CsvOptions::new());
    assert_eq!(types, vec![ColumnType::Integer]);
    assert_eq!(values, vec![FieldValue::Int(1), FieldValue::Int(2)]);
}

#[test]
fn leading_zeros_keep_the_column_as_text() {
    let (values, types) = column("v\n1\n2\n007\n3\n", CsvOptions::new());
    assert_eq!(types, vec![ColumnType::Text]);
    assert_eq!(values[2], FieldValue::Text("007".into()));
    assert_eq!(values[0], FieldValue::Text("1".into()));
}

#[test]
fn leading_zeros_convert_when_preservation_is_off() {
    let csv = CsvOptions::new().with_preserve_leading_zeros(false);
    let (values, types) = column("v\n1\n2\n007\n3\n", csv);
    assert_eq!(types, vec![ColumnType::Integer]);
    assert_eq!(values[2], FieldValue::Int(7));
}

#[test]
fn long_digit_runs_stay_text() {
    let (values, types) = column("v\n1234567890123456789\n", CsvOptions::new());
    assert_eq!(types, vec![ColumnType::Text]);
    assert_eq!(values[0], FieldValue::Text("1234567890123456789".into()));
}

#[test]
fn unsampled_mismatch_demotes_without_error() {
    let read = ReadOptions::new();
    let metrics = read.metrics().clone();
    let csv = CsvOptions::new().with_sample_rows(2);
    let mut reader: CsvReader<_, DynamicRecord> =
        CsvReader::new("v\n1\n2\nx\n4\n".as_bytes(), csv, read);
    let values: Vec<FieldValue> = reader
        .by_ref()
        .map(|r| r.expect("demotion is not an error").get("v").cloned().unwrap_or_default())
        .collect();

    assert_eq!(
        values,
        vec![
            FieldValue::Int(1),
            FieldValue::Int(2),
            FieldValue::Text("x".into()),
            FieldValue::Text("4".into()),
        ]
    );
    assert_eq!(reader.column_types(), vec![ColumnType::Text]);
    assert_eq!(metrics.snapshot().error_count, 0);
}

#[test]
fn one_sampling_failure_is_tolerated() {
    let (values, _) = column("v\n1\nx\n3\n", CsvOptions::new());
    assert_eq!(values[0], FieldValue::Int(1));
    assert_eq!(values[1], FieldValue::Text("x".into()));
    assert_eq!(values[2], FieldValue::Text("3".into()));
}

#[test]
fn empty_fields_are_null() {
    let (values, _) = column("v,w\n,1\n,2\n", CsvOptions::new());
    assert_eq!(values, vec![FieldValue::Null, FieldValue::Null]);
}

#[test]
fn blank_fields_do_not_demote_a_typed_column() {
    let (values, types) = column("v\n1\n2\n \n3\n", CsvOptions::new());

    assert_eq!(
        values,
        vec![
            FieldValue::Int(1),
            FieldValue::Int(2),
            FieldValue::Null,
            FieldValue::Int(3),
        ]
    );
    assert_eq!(types, vec![ColumnType::Integer]);
}

#[test]
fn blank_fields_stay_text_in_text_columns() {
    let (values, _) = column("v\nab\n \ncd\n", CsvOptions::new());
    assert_eq!(values[1], FieldValue::Text(" ".into()));
}

#[test]
fn inference_off_keeps_text() {
    let csv = CsvOptions::new().with_type_inference(false);
    let (values, types) = column("v\n1\n", csv);
    assert_eq!(types, vec![ColumnType::Text]);
    assert_eq!(values, vec![FieldValue::Text("1".into())]);
}
