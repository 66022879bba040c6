//! Per-column type inference.
//!
//! A column samples values against candidate types, then enforces the winner.
//! An enforced column that meets a value it cannot convert is demoted to text
//! for the rest of the read.

use std::fmt;

use rust_decimal::Decimal;
use std::str::FromStr;
use uuid::Uuid;

use crate::materialize::{FieldValue, parse_timestamp};

/// Types a CSV column can be inferred as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Boolean,
    /// 32-bit integer
    Integer,
    /// 64-bit integer
    Long,
    Decimal,
    Float,
    Timestamp,
    Uuid,
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Boolean => "boolean",
            ColumnType::Integer => "integer",
            ColumnType::Long => "long",
            ColumnType::Decimal => "decimal",
            ColumnType::Float => "float",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Uuid => "uuid",
            ColumnType::Text => "text",
        };
        f.write_str(name)
    }
}

/// Candidates in precedence order.
const PRECEDENCE: [ColumnType; 7] = [
    ColumnType::Boolean,
    ColumnType::Integer,
    ColumnType::Long,
    ColumnType::Decimal,
    ColumnType::Float,
    ColumnType::Timestamp,
    ColumnType::Uuid,
];

/// Parse failures a candidate survives during sampling.
const TOLERATED_FAILURES: u8 = 1;

/// More digits than this are kept as text.
const MAX_NUMERIC_DIGITS: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Candidate {
    pub ty: ColumnType,
    pub failures: u8,
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ColumnState {
    Sampling(Vec<Candidate>),
    Enforced(ColumnType),
    Demoted,
}

impl ColumnState {
    pub(crate) fn sampling() -> Self {
        ColumnState::Sampling(
            PRECEDENCE
                .iter()
                .map(|&ty| Candidate {
                    ty,
                    failures: 0,
                    matched: false,
                })
                .collect(),
        )
    }

    /// The type values currently convert to.
    pub(crate) fn column_type(&self) -> ColumnType {
        match self {
            ColumnState::Sampling(candidates) => {
                candidates.first().map_or(ColumnType::Text, |c| c.ty)
            }
            ColumnState::Enforced(ty) => *ty,
            ColumnState::Demoted => ColumnType::Text,
        }
    }

    /// Let a sampled value vote. Empty values do not vote.
    pub(crate) fn observe(&mut self, value: &str, preserve_leading_zeros: bool) {
        let ColumnState::Sampling(candidates) = self else {
            return;
        };
        if value.trim().is_empty() {
            return;
        }
        if must_preserve(value, preserve_leading_zeros) {
            *self = ColumnState::Demoted;
            return;
        }
        for candidate in candidates.iter_mut() {
            if parse_as(candidate.ty, value).is_some() {
                candidate.matched = true;
            } else {
                candidate.failures += 1;
            }
        }
        candidates.retain(|c| c.failures <= TOLERATED_FAILURES);
        if candidates.is_empty() {
            *self = ColumnState::Demoted;
        }
    }

    /// End sampling. Among survivors that matched at least one value, the
    /// fewest failures win, then precedence.
    pub(crate) fn finalize(&mut self) {
        if let ColumnState::Sampling(candidates) = self {
            let winner = candidates
                .iter()
                .filter(|c| c.matched)
                .min_by_key(|c| c.failures)
                .map(|c| c.ty);
            *self = match winner {
                Some(ty) => ColumnState::Enforced(ty),
                None => ColumnState::Demoted,
            };
        }
    }

    /// Convert a value under enforcement, demoting the column on failure.
    ///
    /// Blank values are null in typed columns, as they cast no vote while
    /// sampling. Returns the value and whether this call demoted the column.
    pub(crate) fn convert(&mut self, value: &str, preserve_leading_zeros: bool) -> (FieldValue, bool) {
        if value.is_empty() {
            return (FieldValue::Null, false);
        }
        let ty = self.column_type();
        if ty == ColumnType::Text {
            return (FieldValue::Text(value.to_string()), false);
        }
        if value.trim().is_empty() {
            return (FieldValue::Null, false);
        }
        if !must_preserve(value, preserve_leading_zeros) {
            if let Some(converted) = parse_as(ty, value) {
                return (converted, false);
            }
        }
        *self = ColumnState::Demoted;
        (FieldValue::Text(value.to_string()), true)
    }
}

/// Leading-zero and long-digit values keep their text form.
pub(crate) fn must_preserve(value: &str, preserve_leading_zeros: bool) -> bool {
    let v = value.trim();
    let unsigned = v.strip_prefix(['-', '+']).unwrap_or(v);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (unsigned, ""),
    };
    let numeric = !int_part.is_empty()
        && int_part.bytes().all(|b| b.is_ascii_digit())
        && frac_part.bytes().all(|b| b.is_ascii_digit());
    if !numeric {
        return false;
    }
    if int_part.len() + frac_part.len() > MAX_NUMERIC_DIGITS {
        return true;
    }
    preserve_leading_zeros && int_part.len() > 1 && int_part.starts_with('0')
}

/// Strict parse of a value as `ty`.
pub(crate) fn parse_as(ty: ColumnType, value: &str) -> Option<FieldValue> {
    let v = value.trim();
    match ty {
        ColumnType::Boolean => {
            if v.eq_ignore_ascii_case("true") {
                Some(FieldValue::Bool(true))
            } else if v.eq_ignore_ascii_case("false") {
                Some(FieldValue::Bool(false))
            } else {
                None
            }
        }
        ColumnType::Integer => v.parse::<i32>().ok().map(FieldValue::Int),
        ColumnType::Long => v.parse::<i64>().ok().map(FieldValue::Long),
        ColumnType::Decimal => Decimal::from_str(v).ok().map(FieldValue::Decimal),
        ColumnType::Float => v
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && v.bytes().any(|b| b.is_ascii_digit()))
            .map(FieldValue::Float),
        ColumnType::Timestamp => parse_timestamp(v).map(FieldValue::Timestamp),
        ColumnType::Uuid => (v.len() == 36)
            .then(|| Uuid::parse_str(v).ok())
            .flatten()
            .map(FieldValue::Uuid),
        ColumnType::Text => Some(FieldValue::Text(value.to_string())),
    }
}
