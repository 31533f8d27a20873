//! Typed value codec for the document REST API.
//!
//! The REST API wraps every value in a one-key object naming its type
//! (`{"stringValue": "hi"}`, `{"integerValue": "42"}`, ...). Models work with
//! plain JSON, so documents are converted at the store boundary.

use serde_json::{json, Map, Value};

use super::Fields;
use crate::error::{ServiceError, ServiceResult};

/// Encode plain JSON into a typed value.
pub fn encode(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else if let Some(u) = n.as_u64() {
                json!({ "integerValue": u.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64().unwrap_or(0.0) })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            json!({ "arrayValue": { "values": items.iter().map(encode).collect::<Vec<_>>() } })
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

/// Encode a field map into the REST `fields` object.
pub fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), encode(v)))
            .collect::<Map<_, _>>(),
    )
}

fn malformed(what: &str, value: &Value) -> ServiceError {
    ServiceError::Malformed(format!("{}: {}", what, value))
}

/// Decode a typed value into plain JSON.
///
/// Timestamps become epoch milliseconds, matching how models store time.
pub fn decode(value: &Value) -> ServiceResult<Value> {
    let obj = value
        .as_object()
        .ok_or_else(|| malformed("expected typed value", value))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| malformed("empty typed value", value))?;

    let decoded = match kind.as_str() {
        "nullValue" => Value::Null,
        "booleanValue" => Value::Bool(inner.as_bool().unwrap_or(false)),
        "integerValue" => {
            let n = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            }
            .ok_or_else(|| malformed("bad integerValue", inner))?;
            json!(n)
        }
        "doubleValue" => json!(inner.as_f64().unwrap_or(0.0)),
        "timestampValue" => {
            let ts = inner
                .as_str()
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .ok_or_else(|| malformed("bad timestampValue", inner))?;
            json!(ts.timestamp_millis())
        }
        "stringValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "geoPointValue" => inner.clone(),
        "arrayValue" => {
            let items = match inner.get("values").and_then(|v| v.as_array()) {
                Some(values) => values.iter().map(decode).collect::<ServiceResult<Vec<_>>>()?,
                None => Vec::new(),
            };
            Value::Array(items)
        }
        "mapValue" => Value::Object(decode_fields(inner.get("fields"))?),
        other => return Err(malformed(&format!("unknown value type {}", other), inner)),
    };
    Ok(decoded)
}

/// Decode a REST `fields` object (absent means no fields).
pub fn decode_fields(fields: Option<&Value>) -> ServiceResult<Fields> {
    let Some(Value::Object(map)) = fields else {
        return Ok(Fields::new());
    };
    map.iter()
        .map(|(k, v)| Ok((k.clone(), decode(v)?)))
        .collect()
}

/// Render a dotted path as a REST field path, backtick-quoting segments
/// that are not plain identifiers.
pub fn field_path(path: &str) -> String {
    path.split('.')
        .map(|segment| {
            let simple = segment
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if simple {
                segment.to_string()
            } else {
                format!("`{}`", segment.replace('\\', "\\\\").replace('`', "\\`"))
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Expand dotted keys into nested maps: `{"a.b": 1}` becomes `{"a": {"b": 1}}`.
pub fn expand_paths(fields: &Fields) -> Fields {
    let mut out = Fields::new();
    for (key, value) in fields {
        let mut segments = key.split('.').peekable();
        let mut cursor = &mut out;
        while let Some(segment) = segments.next() {
            if segments.peek().is_none() {
                cursor.insert(segment.to_string(), value.clone());
                break;
            }
            let entry = cursor
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            cursor = match entry {
                Value::Object(map) => map,
                _ => unreachable!("entry was just made an object"),
            };
        }
    }
    out
}
