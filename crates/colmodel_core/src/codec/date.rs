//! Date coercion shared by validation, serialization and inflation.
//!
//! Callers hand in date values, epoch milliseconds or date strings
//! interchangeably. Coercion first tries a direct numeric reading and only then
//! falls back to the general date parser.

use crate::model::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const NAIVE_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Converts a date-like value into epoch milliseconds.
///
/// Returns `None` when the value cannot be read as an instant.
pub fn coerce_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Date(date) => Some(date.timestamp_millis()),
        Value::Number(millis) => finite_millis(*millis),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<f64>() {
                Ok(millis) if millis.is_finite() => finite_millis(millis),
                _ => parse_date_str(trimmed).map(|date| date.timestamp_millis()),
            }
        }
        _ => None,
    }
}

/// Converts a date-like value into a UTC instant.
pub fn coerce_date(value: &Value) -> Option<DateTime<Utc>> {
    coerce_timestamp(value).and_then(date_from_millis)
}

pub fn date_from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// General date parser: RFC 3339, RFC 2822, then zone-less forms read as UTC.
pub fn parse_date_str(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();

    if let Ok(date) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(date.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for format in NAIVE_DATE_FORMATS {
        if let Ok(day) = NaiveDate::parse_from_str(trimmed, format) {
            return day
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    None
}

fn finite_millis(millis: f64) -> Option<i64> {
    if !millis.is_finite() || millis.abs() > 8.64e15 {
        return None;
    }
    Some(millis.trunc() as i64)
}
