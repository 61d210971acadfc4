use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};

// === Pure Formatting Functions ===

/// Serialize value to pretty-printed JSON string
pub fn to_string_pretty<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize json".to_string())))
}

/// Serialize value to a `serde_json::Value`
pub fn to_value<T: Serialize>(data: T) -> Result<Value> {
    serde_json::to_value(data)
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize response".to_string())))
}

// === Dotted Key Operations ===

/// Resolve a dotted key (`terraform.organization`) against nested objects.
///
/// Returns `None` for an empty key, a missing segment, or a segment that
/// would have to descend through a non-object value.
pub fn get_dotted<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    let segments = split_key(key)?;

    let mut current = root;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

/// Set a value at a dotted key, creating intermediate objects as needed.
pub fn set_dotted(root: &mut Value, key: &str, new_value: Value) -> Result<()> {
    let segments = split_key(key).ok_or_else(|| {
        Error::validation_invalid_argument("key", "Setting key must not be empty", None, None)
    })?;

    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| Error::internal_unexpected("empty key after validation"))?;

    let mut current = root;
    for segment in parents {
        current = ensure_object_child(current, segment, key)?;
    }

    match current {
        Value::Object(map) => {
            map.insert((*last).to_string(), new_value);
            Ok(())
        }
        Value::Null => {
            let mut map = Map::new();
            map.insert((*last).to_string(), new_value);
            *current = Value::Object(map);
            Ok(())
        }
        other => Err(Error::config_invalid_value(
            key,
            Some(value_type_name(other).to_string()),
            "Cannot set a key below a non-object value",
        )),
    }
}

fn split_key(key: &str) -> Option<Vec<&str>> {
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let segments: Vec<&str> = key.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }

    Some(segments)
}

fn ensure_object_child<'a>(current: &'a mut Value, segment: &str, key: &str) -> Result<&'a mut Value> {
    if current.is_null() {
        *current = Value::Object(Map::new());
    }

    match current {
        Value::Object(map) => Ok(map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()))),
        other => Err(Error::config_invalid_value(
            key,
            Some(value_type_name(other).to_string()),
            format!("Expected object at '{}'", segment),
        )),
    }
}

/// Parse a CLI-supplied value: JSON literal first, plain string otherwise.
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
