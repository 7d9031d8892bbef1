//! Date parsing and epoch conversion.
//!
//! Records carry dates as RFC 3339 strings (or bare `YYYY-MM-DD` dates,
//! read as midnight UTC). Index documents carry them as epoch seconds.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;

/// Parses a date string into a UTC datetime.
pub fn parse(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Returns `true` if the value is a string holding a parseable date.
pub fn is_date(value: &Value) -> bool {
    value.as_str().and_then(parse).is_some()
}

/// Converts a record-side value to epoch seconds.
///
/// Numbers are taken as already converted. Dates are floored to whole
/// seconds. Anything else yields `None`.
pub fn to_epoch(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(text) => {
            let dt = parse(text)?;
            Some(Value::from(dt.timestamp_millis().div_euclid(1000)))
        }
        _ => None,
    }
}

/// Converts a document-side value back to a date string.
///
/// Strings that already hold a date are kept. Epoch seconds (integral or
/// fractional) become an RFC 3339 string. Anything else yields `None`.
pub fn from_epoch(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) if is_date(value) => Some(value.clone()),
        Value::Number(n) => {
            let millis = if let Some(secs) = n.as_i64() {
                secs.checked_mul(1000)?
            } else {
                let secs = n.as_f64()?;
                if !secs.is_finite() {
                    return None;
                }
                (secs * 1000.0).floor() as i64
            };
            let dt = DateTime::<Utc>::from_timestamp_millis(millis)?;
            Some(Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)))
        }
        _ => None,
    }
}
