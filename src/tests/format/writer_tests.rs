//! Records written by the paired writer read back unchanged.

use serde::Serialize;

use crate::config::ReadOptions;
use crate::format::{FormatKind, serialize_records};
use crate::json::{JsonOptions, JsonReader};

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
struct Reading {
    sensor: String,
    value: f64,
    ok: bool,
}

crate::materialize_properties!(Reading { sensor: String, value: f64, ok: bool });

fn readings() -> Vec<Reading> {
    vec![
        Reading { sensor: "a-1".into(), value: 20.5, ok: true },
        Reading { sensor: "b, \"quoted\"".into(), value: -3.25, ok: false },
    ]
}

#[test]
fn json_output_reads_back() {
    let bytes = serialize_records(FormatKind::Json, &readings()).expect("write json");
    let back: Vec<Reading> = JsonReader::new(bytes.as_slice(), JsonOptions::new(), ReadOptions::new())
        .collect::<Result<_, _>>()
        .expect("read json");
    assert_eq!(back, readings());
}

#[cfg(feature = "csv")]
#[test]
fn csv_output_reads_back() {
    use crate::csv::{CsvOptions, CsvReader};

    let bytes = serialize_records(FormatKind::Csv, &readings()).expect("write csv");
    let text = String::from_utf8(bytes.clone()).expect("utf-8");
    assert!(text.starts_with("sensor,value,ok\n"), "{text}");

    let back: Vec<Reading> = CsvReader::new(bytes.as_slice(), CsvOptions::new(), ReadOptions::new())
        .collect::<Result<_, _>>()
        .expect("read csv");
    assert_eq!(back, readings());
}

#[cfg(feature = "yaml")]
#[test]
fn yaml_output_reads_back() {
    use crate::yaml::{YamlOptions, YamlReader};

    let bytes = serialize_records(FormatKind::Yaml, &readings()).expect("write yaml");
    let back: Vec<Reading> = YamlReader::new(bytes.as_slice(), YamlOptions::new(), ReadOptions::new())
        .collect::<Result<_, _>>()
        .expect("read yaml");
    assert_eq!(back, readings());
}
