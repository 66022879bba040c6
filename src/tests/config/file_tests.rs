//! Configuration files.

use std::io::Write;

use crate::config::{GuardRailLimits, ReaderConfig};
use crate::error::{ErrorAction, ReadError};

#[test]
fn empty_config_keeps_defaults() {
    let config = ReaderConfig::from_json_str("{}").expect("empty config");
    assert_eq!(config, ReaderConfig::default());
    assert_eq!(config.action().expect("action"), ErrorAction::Throw);
    assert_eq!(config.limits, GuardRailLimits::default());
}

#[test]
fn json_config_sets_limits_and_sections() {
    let text = r#"{
        "error_action": "skip",
        "progress_every_records": 10,
        "limits": { "json": { "max_elements": 5 }, "yaml": { "max_depth": 4 } },
        "json": { "newline_delimited": true }
    }"#;
    let config = ReaderConfig::from_json_str(text).expect("valid config");

    assert_eq!(config.action().expect("action"), ErrorAction::Skip);
    assert_eq!(config.limits.json.max_elements, 5);
    assert_eq!(config.limits.yaml.max_depth, 4);

    let json = config.json_options();
    assert!(json.newline_delimited);
    assert!(json.allow_single_object);
    assert_eq!(json.limits.max_elements, 5);

    let read = config.read_options().expect("read options");
    assert_eq!(read.error_action, ErrorAction::Skip);
    assert_eq!(read.progress_cadence.every_records, 10);
    assert_eq!(read.progress_cadence.every, None);
}

#[test]
fn unknown_error_action_is_a_config_error() {
    let config = ReaderConfig::new().with_error_action("explode");
    assert!(matches!(config.action(), Err(ReadError::Config(_))));
    assert!(config.read_options().is_err());
}

#[test]
fn malformed_json_config_is_rejected() {
    let err = ReaderConfig::from_json_str("{ not json").expect_err("malformed");
    assert!(err.to_string().contains("invalid JSON config"));
}

#[test]
fn error_log_is_opened_with_the_read_options() {
    let dir = tempfile::tempdir().expect("temp dir");
    let log = dir.path().join("errors.jsonl");
    let config = ReaderConfig::new().with_error_action("stop").with_error_log(&log);
    let read = config.read_options().expect("opens the log");
    assert_eq!(read.error_action, ErrorAction::Stop);
    assert!(log.exists());
}

#[test]
fn unsupported_config_extension() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(file, "error_action = 'skip'").expect("write");
    let err = ReaderConfig::from_path(file.path()).expect_err("toml is not a config format");
    assert!(matches!(err, ReadError::Config(_)));
}

#[test]
fn json_config_file_loads_by_extension() {
    let mut file = tempfile::Builder::new()
        .suffix(".json")
        .tempfile()
        .expect("temp file");
    write!(file, r#"{{"error_action": "Stop"}}"#).expect("write");
    let config = ReaderConfig::from_path(file.path()).expect("json config");
    assert_eq!(config.action().expect("action"), ErrorAction::Stop);
}

#[cfg(feature = "csv")]
#[test]
fn csv_section_builds_options() {
    use crate::csv::QuoteMode;

    let text = r#"{
        "limits": { "csv": { "max_columns": 3 } },
        "csv": { "delimiter": ";", "quote_mode": "lenient", "has_header": false, "schema": ["a", "b"] }
    }"#;
    let csv = ReaderConfig::from_json_str(text)
        .expect("config")
        .csv_options()
        .expect("csv options");

    assert_eq!(csv.delimiter, b';');
    assert_eq!(csv.quote_mode, QuoteMode::Lenient);
    assert!(!csv.has_header);
    assert_eq!(csv.schema, Some(vec!["a".to_string(), "b".to_string()]));
    assert_eq!(csv.limits.max_columns, 3);
}

#[cfg(feature = "csv")]
#[test]
fn csv_section_rejects_bad_characters_and_modes() {
    let wide = ReaderConfig::from_json_str(r#"{"csv": {"delimiter": "::"}}"#).expect("config");
    assert!(matches!(wide.csv_options(), Err(ReadError::Config(_))));

    let mode = ReaderConfig::from_json_str(r#"{"csv": {"quote_mode": "loose"}}"#).expect("config");
    assert!(matches!(mode.csv_options(), Err(ReadError::Config(_))));
}

#[cfg(feature = "yaml")]
#[test]
fn yaml_config_text() {
    let text = "error_action: skip\nlimits:\n  yaml:\n    max_scalar_length: 64\nyaml:\n  allow_aliases: true\n  allowed_types: [Circle]\n";
    let config = ReaderConfig::from_yaml_str(text).expect("yaml config");
    let yaml = config.yaml_options();

    assert!(yaml.allow_aliases);
    assert!(!yaml.allow_custom_tags);
    assert!(yaml.restrict_types);
    assert_eq!(yaml.allowed_types, vec!["Circle".to_string()]);
    assert_eq!(yaml.limits.max_scalar_length, 64);
}
