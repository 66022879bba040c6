//! Conversion of field values into member types.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use super::value::{DynamicRecord, FieldValue};

/// A member type a field value can be converted into.
///
/// `missing` supplies the value used when no source field binds to a member,
/// and for a `Null` field on a type without a null representation.
pub trait FromField: Sized {
    fn from_field(value: &FieldValue) -> Result<Self, String>;

    fn missing() -> Self;
}

fn unexpected(expected: &str, value: &FieldValue) -> String {
    format!("expected {}, found {}", expected, value.kind_name())
}

macro_rules! integer_from_field {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromField for $t {
                fn from_field(value: &FieldValue) -> Result<Self, String> {
                    let out_of_range = || format!("value out of range for {}", stringify!($t));
                    match value {
                        FieldValue::Null => Ok(0),
                        FieldValue::Int(i) => <$t>::try_from(*i).map_err(|_| out_of_range()),
                        FieldValue::Long(i) => <$t>::try_from(*i).map_err(|_| out_of_range()),
                        FieldValue::Decimal(d) if d.fract().is_zero() => d
                            .to_i128()
                            .and_then(|i| <$t>::try_from(i).ok())
                            .ok_or_else(out_of_range),
                        FieldValue::Float(f) if f.is_finite() && f.fract() == 0.0 => {
                            if *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                                <$t>::try_from(*f as i64).map_err(|_| out_of_range())
                            } else {
                                Err(out_of_range())
                            }
                        }
                        FieldValue::Text(s) => s.trim().parse::<$t>().map_err(|e| e.to_string()),
                        other => Err(unexpected("an integer", other)),
                    }
                }

                fn missing() -> Self {
                    0
                }
            }
        )*
    };
}

integer_from_field!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

macro_rules! float_from_field {
    ($($t:ty),* $(,)?) => {
        $(
            impl FromField for $t {
                fn from_field(value: &FieldValue) -> Result<Self, String> {
                    match value {
                        FieldValue::Null => Ok(0.0),
                        FieldValue::Int(i) => Ok(*i as $t),
                        FieldValue::Long(i) => Ok(*i as $t),
                        FieldValue::Float(f) => Ok(*f as $t),
                        FieldValue::Decimal(d) => d
                            .to_f64()
                            .map(|f| f as $t)
                            .ok_or_else(|| format!("decimal {} is not representable", d)),
                        FieldValue::Text(s) => s.trim().parse::<$t>().map_err(|e| e.to_string()),
                        other => Err(unexpected("a number", other)),
                    }
                }

                fn missing() -> Self {
                    0.0
                }
            }
        )*
    };
}

float_from_field!(f32, f64);

impl FromField for bool {
    fn from_field(value: &FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Null => Ok(false),
            FieldValue::Bool(b) => Ok(*b),
            FieldValue::Int(0) | FieldValue::Long(0) => Ok(false),
            FieldValue::Int(1) | FieldValue::Long(1) => Ok(true),
            FieldValue::Text(s) => parse_bool(s).ok_or_else(|| format!("'{}' is not a boolean", s)),
            other => Err(unexpected("a boolean", other)),
        }
    }

    fn missing() -> Self {
        false
    }
}

/// Accepted spellings: true/false, yes/no, 1/0 (case-insensitive).
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

impl FromField for String {
    fn from_field(value: &FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Null => Ok(String::new()),
            FieldValue::Text(s) => Ok(s.clone()),
            FieldValue::List(_) | FieldValue::Map(_) => {
                serde_json::to_string(value).map_err(|e| e.to_string())
            }
            other => Ok(other.to_string()),
        }
    }

    fn missing() -> Self {
        String::new()
    }
}

impl FromField for Decimal {
    fn from_field(value: &FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Null => Ok(Decimal::ZERO),
            FieldValue::Int(i) => Ok(Decimal::from(*i)),
            FieldValue::Long(i) => Ok(Decimal::from(*i)),
            FieldValue::Decimal(d) => Ok(*d),
            FieldValue::Float(f) => Decimal::try_from(*f).map_err(|e| e.to_string()),
            FieldValue::Text(s) => parse_decimal(s).ok_or_else(|| format!("'{}' is not a decimal", s)),
            other => Err(unexpected("a decimal", other)),
        }
    }

    fn missing() -> Self {
        Decimal::ZERO
    }
}

pub(crate) fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

/// Parse the timestamp spellings recognized by CSV inference and conversion.
///
/// Values with an offset are normalized to UTC; a bare date is midnight.
pub(crate) fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.len() < 10 || !s.as_bytes()[0].is_ascii_digit() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

impl FromField for NaiveDateTime {
    fn from_field(value: &FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Timestamp(t) => Ok(*t),
            FieldValue::Text(s) => {
                parse_timestamp(s).ok_or_else(|| format!("'{}' is not a timestamp", s))
            }
            FieldValue::Long(secs) => DateTime::from_timestamp(*secs, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| format!("{} is out of range for a timestamp", secs)),
            FieldValue::Int(secs) => DateTime::from_timestamp(i64::from(*secs), 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| format!("{} is out of range for a timestamp", secs)),
            FieldValue::Null => Ok(NaiveDateTime::default()),
            other => Err(unexpected("a timestamp", other)),
        }
    }

    fn missing() -> Self {
        NaiveDateTime::default()
    }
}

impl FromField for NaiveDate {
    fn from_field(value: &FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Timestamp(t) => Ok(t.date()),
            FieldValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .ok()
                .or_else(|| parse_timestamp(s).map(|t| t.date()))
                .ok_or_else(|| format!("'{}' is not a date", s)),
            FieldValue::Null => Ok(NaiveDate::default()),
            other => Err(unexpected("a date", other)),
        }
    }

    fn missing() -> Self {
        NaiveDate::default()
    }
}

impl FromField for DateTime<Utc> {
    fn from_field(value: &FieldValue) -> Result<Self, String> {
        NaiveDateTime::from_field(value).map(|t| t.and_utc())
    }

    fn missing() -> Self {
        DateTime::<Utc>::default()
    }
}

impl FromField for Uuid {
    fn from_field(value: &FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Uuid(u) => Ok(*u),
            FieldValue::Text(s) => Uuid::parse_str(s.trim()).map_err(|e| e.to_string()),
            FieldValue::Null => Ok(Uuid::nil()),
            other => Err(unexpected("a uuid", other)),
        }
    }

    fn missing() -> Self {
        Uuid::nil()
    }
}

impl<T: FromField> FromField for Option<T> {
    fn from_field(value: &FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Null => Ok(None),
            other => T::from_field(other).map(Some),
        }
    }

    fn missing() -> Self {
        None
    }
}

impl<T: FromField> FromField for Vec<T> {
    fn from_field(value: &FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Null => Ok(Vec::new()),
            FieldValue::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| T::from_field(item).map_err(|e| format!("item {}: {}", i, e)))
                .collect(),
            other => Err(unexpected("a list", other)),
        }
    }

    fn missing() -> Self {
        Vec::new()
    }
}

impl FromField for FieldValue {
    fn from_field(value: &FieldValue) -> Result<Self, String> {
        Ok(value.clone())
    }

    fn missing() -> Self {
        FieldValue::Null
    }
}

impl FromField for serde_json::Value {
    fn from_field(value: &FieldValue) -> Result<Self, String> {
        Ok(serde_json::Value::from(value))
    }

    fn missing() -> Self {
        serde_json::Value::Null
    }
}

impl FromField for DynamicRecord {
    fn from_field(value: &FieldValue) -> Result<Self, String> {
        match value {
            FieldValue::Map(fields) => Ok(DynamicRecord::from_fields(fields.clone())),
            FieldValue::Null => Ok(DynamicRecord::new()),
            other => Err(unexpected("a mapping", other)),
        }
    }

    fn missing() -> Self {
        DynamicRecord::new()
    }
}
