//! Tag policy and core schema scalar resolution.

use std::str::FromStr;

use rust_decimal::Decimal;
use yaml_rust2::parser::Tag;
use yaml_rust2::scanner::TScalarStyle;

use crate::materialize::{FieldValue, integer_value, parse_bool};

const CORE_PREFIX: &str = "tag:yaml.org,2002:";

/// Core tags accepted when custom tags are disallowed.
const CORE_TAGS: [&str; 7] = ["str", "int", "float", "bool", "null", "seq", "map"];

/// A tag resolved against the core schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CoreTag {
    /// The non-specific `!`
    NonSpecific,
    /// A core tag by its short name
    Core(&'static str),
    /// Anything else, in written form
    Custom(String),
}

impl CoreTag {
    pub(crate) fn classify(tag: &Tag) -> Self {
        let full = if tag.handle == "!!" {
            format!("{}{}", CORE_PREFIX, tag.suffix)
        } else {
            format!("{}{}", tag.handle, tag.suffix)
        };
        if full == "!" {
            return CoreTag::NonSpecific;
        }
        if let Some(short) = full.strip_prefix(CORE_PREFIX) {
            if let Some(core) = CORE_TAGS.iter().find(|t| **t == short) {
                return CoreTag::Core(*core);
            }
            return CoreTag::Custom(format!("!!{}", short));
        }
        CoreTag::Custom(full)
    }
}

/// Resolve a scalar to a field value.
///
/// Plain untagged scalars follow the core schema; quoted ones are text.
/// Returns `Err` when an explicit core tag does not fit the value.
pub(crate) fn resolve(
    value: String,
    style: TScalarStyle,
    tag: Option<&CoreTag>,
) -> Result<FieldValue, String> {
    match tag {
        Some(CoreTag::Core("str")) | Some(CoreTag::NonSpecific) => Ok(FieldValue::Text(value)),
        Some(CoreTag::Core(name)) => {
            let resolved = match *name {
                "int" => int(&value),
                "float" => float(&value)
                    .or_else(|| value.trim().parse::<f64>().ok().map(FieldValue::Float)),
                "bool" => parse_bool(value.trim()).map(FieldValue::Bool),
                "null" => is_null(&value).then_some(FieldValue::Null),
                _ => None,
            };
            resolved.ok_or_else(|| format!("value '{}' does not match tag !!{}", value, name))
        }
        Some(CoreTag::Custom(_)) | None if style != TScalarStyle::Plain => {
            Ok(FieldValue::Text(value))
        }
        _ => Ok(plain(value)),
    }
}

/// Core schema resolution of a plain scalar.
pub(crate) fn plain(value: String) -> FieldValue {
    if is_null(&value) {
        return FieldValue::Null;
    }
    match value.as_str() {
        "true" | "True" | "TRUE" => return FieldValue::Bool(true),
        "false" | "False" | "FALSE" => return FieldValue::Bool(false),
        _ => {}
    }
    if let Some(v) = int(&value).or_else(|| float(&value)) {
        return v;
    }
    FieldValue::Text(value)
}

fn is_null(value: &str) -> bool {
    matches!(value, "" | "~" | "null" | "Null" | "NULL")
}

fn int(value: &str) -> Option<FieldValue> {
    let (negative, digits) = match value.as_bytes().first()? {
        b'-' => (true, &value[1..]),
        b'+' => (false, &value[1..]),
        _ => (false, value),
    };
    let (radix, body) = if let Some(hex) = digits.strip_prefix("0x") {
        (16, hex)
    } else if let Some(oct) = digits.strip_prefix("0o") {
        (8, oct)
    } else {
        (10, digits)
    };
    if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    match i64::from_str_radix(body, radix) {
        Ok(n) => Some(integer_value(if negative { -n } else { n })),
        Err(_) if radix == 10 => {
            let big = Decimal::from_str(body).ok()?;
            Some(FieldValue::Decimal(if negative { -big } else { big }))
        }
        Err(_) => None,
    }
}

fn float(value: &str) -> Option<FieldValue> {
    let unsigned = value.strip_prefix(['-', '+']).unwrap_or(value);
    match unsigned {
        ".inf" | ".Inf" | ".INF" => {
            let inf = if value.starts_with('-') {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
            return Some(FieldValue::Float(inf));
        }
        ".nan" | ".NaN" | ".NAN" if unsigned.len() == value.len() => {
            return Some(FieldValue::Float(f64::NAN));
        }
        _ => {}
    }
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(i) => (&unsigned[..i], Some(&unsigned[i + 1..])),
        None => (unsigned, None),
    };
    let (whole, frac) = match mantissa.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (mantissa, None),
    };
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let mantissa_ok = match frac {
        Some(f) => digits(whole) && digits(f) && !(whole.is_empty() && f.is_empty()),
        None => !whole.is_empty() && digits(whole),
    };
    let exponent_ok = exponent.is_none_or(|e| {
        let e = e.strip_prefix(['-', '+']).unwrap_or(e);
        !e.is_empty() && digits(e)
    });
    if !mantissa_ok || !exponent_ok || (frac.is_none() && exponent.is_none()) {
        return None;
    }
    value.parse::<f64>().ok().map(FieldValue::Float)
}
