//! Lenient decoding of backend payloads.
//!
//! The backend does not guarantee payload shape: fields may be absent,
//! `null`, carry a number where a string is expected, or appear under
//! more than one name. Payload types decode from a [`Value`] field by
//! field with these helpers, so one bad field or list element costs only
//! itself and never the enclosing payload.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::types::Timestamp;

pub(crate) type Object = Map<String, Value>;

/// The value of the first of `keys` present with a non-null value.
///
/// Payloads that carry both spellings of a field (`method` and `type`,
/// `details` and `message`) resolve to the first name listed.
pub(crate) fn field<'a>(obj: &'a Object, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

/// Decode an array element by element. Elements `decode` rejects are
/// skipped with a warning; a missing or `null` list is empty.
pub(crate) fn list<T>(
    value: Option<&Value>,
    what: &'static str,
    decode: impl Fn(&Value) -> Option<T>,
) -> Vec<T> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let decoded = decode(item);
                if decoded.is_none() {
                    tracing::warn!(what, index, element = %item, "Skipping malformed element");
                }
                decoded
            })
            .collect(),
        Some(other) => {
            tracing::warn!(what, value = %other, "Expected a list, using empty list");
            Vec::new()
        }
    }
}

/// Integer from an integer, an integral float, or a numeric string.
pub(crate) fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Non-negative integer from an integer, a float, or a numeric string.
pub(crate) fn unsigned(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| *f >= 0.0)
            .map(|f| f.round() as u64),
        _ => None,
    }
}

pub(crate) fn float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// String content of a string, or the rendering of a number.
pub(crate) fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Epoch milliseconds (number or numeric string), an RFC 3339 string, or
/// a zone-less ISO date-time taken as UTC.
pub(crate) fn timestamp(value: &Value) -> Option<Timestamp> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .and_then(DateTime::from_timestamp_millis),
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    s.parse::<NaiveDateTime>()
                        .ok()
                        .map(|naive| naive.and_utc())
                })
                .or_else(|| s.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis))
        }
        _ => None,
    }
}

// ---- serde field adapters ----

/// Treat an explicit `null` the same as a missing field.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn opt_float<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(float))
}

/// Identifier that may arrive as either a string or a number.
pub(crate) fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_id_string(deserializer)?.unwrap_or_default())
}

pub(crate) fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(text))
}
