//! Guard rail checks evaluated by the readers at record, element and event
//! checkpoints. Each check returns the violation to hand to the session, or
//! `None` when the unit is within limits.

use serde_json::Value;

use crate::cancel::CancellationToken;
use crate::config::{CsvLimits, JsonLimits, YamlLimits};
use crate::error::{ErrorType, ReadError, Violation};

/// Check one CSV record. The column count is checked before the raw length.
pub(crate) fn csv_record(
    limits: &CsvLimits,
    columns: usize,
    raw_len: usize,
    prefix: &str,
) -> Option<Violation> {
    if limits.max_columns > 0 && columns > limits.max_columns {
        return Some(
            Violation::new(
                ErrorType::CsvLimitExceeded,
                format!(
                    "record has {} columns, limit is {}",
                    columns, limits.max_columns
                ),
            )
            .with_excerpt(prefix),
        );
    }
    if limits.max_record_length > 0 && raw_len > limits.max_record_length {
        return Some(
            Violation::new(
                ErrorType::CsvLimitExceeded,
                format!(
                    "record is {} bytes long, limit is {}",
                    raw_len, limits.max_record_length
                ),
            )
            .with_excerpt(prefix),
        );
    }
    None
}

/// Check the running element count; `index` is the 1-based element index.
pub(crate) fn json_element_count(limits: &JsonLimits, index: u64) -> Option<Violation> {
    if limits.max_elements > 0 && index > limits.max_elements {
        Some(
            Violation::new(
                ErrorType::JsonSizeLimit,
                format!("element count exceeds limit of {}", limits.max_elements),
            )
            .with_excerpt(format!("elements={} max={}", index, limits.max_elements)),
        )
    } else {
        None
    }
}

/// Check the exact source size of one element.
pub(crate) fn json_element_size(limits: &JsonLimits, bytes: usize) -> Option<Violation> {
    if limits.max_element_bytes > 0 && bytes > limits.max_element_bytes {
        Some(
            Violation::new(
                ErrorType::JsonSizeLimit,
                format!(
                    "element is {} bytes, limit is {}",
                    bytes, limits.max_element_bytes
                ),
            )
            .with_excerpt(format!("bytes={} max={}", bytes, limits.max_element_bytes)),
        )
    } else {
        None
    }
}

/// Walk a parsed element and check every string and key against the length
/// ceiling. The walk polls `cancel` so huge documents stay interruptible.
pub(crate) fn json_strings(
    limits: &JsonLimits,
    value: &Value,
    cancel: &CancellationToken,
) -> Result<Option<Violation>, ReadError> {
    let max = limits.max_string_length;
    if max == 0 {
        return Ok(None);
    }

    let mut stack = vec![value];
    while let Some(node) = stack.pop() {
        cancel.poll()?;
        match node {
            Value::String(s) => {
                if let Some(v) = json_string(s, max, "string") {
                    return Ok(Some(v));
                }
            }
            Value::Array(items) => stack.extend(items.iter()),
            Value::Object(map) => {
                for (key, item) in map {
                    if let Some(v) = json_string(key, max, "key") {
                        return Ok(Some(v));
                    }
                    stack.push(item);
                }
            }
            _ => {}
        }
    }
    Ok(None)
}

fn json_string(s: &str, max: usize, what: &str) -> Option<Violation> {
    let len = s.chars().count();
    (len > max).then(|| {
        Violation::new(
            ErrorType::JsonSizeLimit,
            format!("{} of {} characters exceeds limit of {}", what, len, max),
        )
        .with_excerpt(s)
    })
}

pub(crate) fn yaml_depth(limits: &YamlLimits, depth: usize) -> Option<Violation> {
    if limits.max_depth > 0 && depth > limits.max_depth {
        Some(
            Violation::new(
                ErrorType::YamlSecurityError,
                "nesting depth exceeds limit".to_string(),
            )
            .with_excerpt(format!("depth={} max={}", depth, limits.max_depth)),
        )
    } else {
        None
    }
}

/// Check the record count at the start of a document or root element.
pub(crate) fn yaml_documents(limits: &YamlLimits, index: u64) -> Option<Violation> {
    if limits.max_documents > 0 && index > limits.max_documents {
        Some(
            Violation::new(
                ErrorType::YamlSecurityError,
                format!("document count exceeds limit of {}", limits.max_documents),
            )
            .with_excerpt(format!("documents={} max={}", index, limits.max_documents)),
        )
    } else {
        None
    }
}

pub(crate) fn yaml_scalar(limits: &YamlLimits, scalar: &str) -> Option<Violation> {
    if limits.max_scalar_length == 0 {
        return None;
    }
    let len = scalar.chars().count();
    (len > limits.max_scalar_length).then(|| {
        Violation::new(
            ErrorType::YamlSecurityError,
            "scalar length exceeds limit".to_string(),
        )
        .with_excerpt(format!("length={} max={}", len, limits.max_scalar_length))
    })
}

/// An alias or anchor while aliases are disallowed. The excerpt is the
/// anchor name.
pub(crate) fn yaml_alias(kind: &str, name: &str) -> Violation {
    Violation::new(
        ErrorType::YamlSecurityError,
        format!("{} found while aliases are disallowed", kind),
    )
    .with_excerpt(name)
}

pub(crate) fn yaml_tag(tag: &str) -> Violation {
    Violation::new(
        ErrorType::YamlSecurityError,
        format!("custom tag '{}' is not allowed", tag),
    )
    .with_excerpt(tag)
}
