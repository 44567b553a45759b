//! Per-value parse attempts shared by inference and write-time coercion.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::types::RawValue;

/// Spelling family of a boolean token. A boolean column must stick to one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BoolFamily {
    TrueFalse,
    YesNo,
    OneZero,
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Canonical storage format for date-time values.
pub(crate) const CANONICAL_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn parse_bool(v: &RawValue) -> Option<(bool, BoolFamily)> {
    match v {
        RawValue::Bool(b) => Some((*b, BoolFamily::TrueFalse)),
        RawValue::Int(1) => Some((true, BoolFamily::OneZero)),
        RawValue::Int(0) => Some((false, BoolFamily::OneZero)),
        RawValue::Float(f) if *f == 1.0 => Some((true, BoolFamily::OneZero)),
        RawValue::Float(f) if *f == 0.0 => Some((false, BoolFamily::OneZero)),
        RawValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some((true, BoolFamily::TrueFalse)),
            "false" => Some((false, BoolFamily::TrueFalse)),
            "yes" => Some((true, BoolFamily::YesNo)),
            "no" => Some((false, BoolFamily::YesNo)),
            "1" => Some((true, BoolFamily::OneZero)),
            "0" => Some((false, BoolFamily::OneZero)),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn parse_integer(v: &RawValue) -> Option<i64> {
    match v {
        RawValue::Int(i) => Some(*i),
        // Spreadsheets store every number as a float.
        RawValue::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15 => {
            Some(*f as i64)
        }
        RawValue::Text(s) => {
            let t = s.trim();
            let digits = t.strip_prefix(['+', '-']).unwrap_or(t);
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            t.parse::<i64>().ok()
        }
        _ => None,
    }
}

pub(crate) fn parse_float(v: &RawValue) -> Option<f64> {
    match v {
        RawValue::Int(i) => Some(*i as f64),
        RawValue::Float(f) if f.is_finite() => Some(*f),
        RawValue::Text(s) => {
            let t = s.trim();
            // Rejects "inf"/"nan" spellings that `f64::from_str` accepts.
            if !t.bytes().any(|b| b.is_ascii_digit()) {
                return None;
            }
            t.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

pub(crate) fn parse_datetime(v: &RawValue) -> Option<NaiveDateTime> {
    match v {
        RawValue::Text(s) => parse_datetime_str(s.trim()),
        _ => None,
    }
}

fn parse_datetime_str(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}
