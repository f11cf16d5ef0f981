//! Field-level deserializers for loosely-typed model output.
//!
//! Models return `"confidence": "75"`, `"confidence": 82.5`, `null`, lists
//! where a sentence was asked for and vice versa. These helpers normalize
//! such values at the field so the record schema stays strict everywhere
//! else.
//!
//! Optional sub-objects, maps and lists go through [`object`],
//! [`map_entries`] and [`list_entries`]: a mis-shaped value is dropped with a
//! warning instead of failing the whole record. Only the required label of a
//! record is decoded strictly.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::warn;

/// Clamp any JSON number or numeric string into an integer in `[0, 100]`.
///
/// Anything unparseable (including `null` and a missing field via
/// `#[serde(default)]`) becomes 0.
pub fn confidence<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(clamp_confidence).unwrap_or(0))
}

pub fn clamp_confidence(value: &Value) -> u8 {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(f) if f.is_finite() => f.round().clamp(0.0, 100.0) as u8,
        _ => 0,
    }
}

/// Accept a string, a list of strings (joined with `"; "`), or `null`.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s,
        Some(Value::Array(items)) => items
            .iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => value_to_text(&other),
    })
}

/// Accept a list of strings, a single string (one element), or `null`.
pub fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(other) => {
            let s = value_to_text(&other);
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s]
            }
        }
    })
}

/// Optional category label: blank strings, `null` and `"N/A"` become `None`.
pub fn label<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .map(value_to_text)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("n/a") && !s.eq_ignore_ascii_case("none")))
}

/// Optional sub-object. `null` and a value of the wrong shape become `None`.
pub fn object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(value) => decode_or_drop(value),
    })
}

/// Like [`object`], falling back to `T::default()`.
pub fn object_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(object(deserializer)?.unwrap_or_default())
}

/// String-keyed map. A non-object value becomes an empty map; entries whose
/// value does not decode as `T` are dropped.
pub fn map_entries<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let entries = match value {
        None | Some(Value::Null) => return Ok(BTreeMap::new()),
        Some(Value::Object(entries)) => entries,
        Some(other) => {
            warn!(found = kind(&other), "expected a JSON object, ignoring field");
            return Ok(BTreeMap::new());
        }
    };
    Ok(entries
        .into_iter()
        .filter_map(|(key, value)| decode_or_drop(value).map(|v| (key, v)))
        .collect())
}

/// List of `T`. A lone element is accepted as a one-item list; elements that
/// do not decode are dropped.
pub fn list_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.into_iter().filter_map(decode_or_drop).collect(),
        Some(single) => decode_or_drop(single).into_iter().collect(),
    })
}

fn decode_or_drop<T: DeserializeOwned>(value: Value) -> Option<T> {
    let found = kind(&value);
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(
                expected = std::any::type_name::<T>(),
                found,
                error = %e,
                "dropping mis-shaped value"
            );
            None
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
