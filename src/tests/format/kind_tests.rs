use crate::format::FormatKind;

#[test]
fn kinds_parse_from_names() {
    assert_eq!(FormatKind::from_str("CSV"), Some(FormatKind::Csv));
    assert_eq!(FormatKind::from_str("jsonl"), Some(FormatKind::Json));
    assert_eq!(FormatKind::from_str("yml"), Some(FormatKind::Yaml));
    assert_eq!(FormatKind::from_str("xml"), None);
}

#[test]
fn kinds_follow_the_extension() {
    assert_eq!(FormatKind::from_path("data/people.TSV"), Some(FormatKind::Csv));
    assert_eq!(FormatKind::from_path("events.ndjson"), Some(FormatKind::Json));
    assert_eq!(FormatKind::from_path("config.yaml"), Some(FormatKind::Yaml));
    assert_eq!(FormatKind::from_path("README"), None);
}

#[test]
fn kinds_serialize_lowercase() {
    assert_eq!(
        serde_json::to_string(&FormatKind::Yaml).expect("serialize"),
        "\"yaml\""
    );
    assert_eq!(FormatKind::Csv.to_string(), "csv");
}

#[test]
fn json_is_always_available() {
    assert!(FormatKind::Json.is_available());
    assert_eq!(FormatKind::Csv.is_available(), cfg!(feature = "csv"));
    assert_eq!(FormatKind::Yaml.is_available(), cfg!(feature = "yaml"));
}
