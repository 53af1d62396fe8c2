//! String escaping for Turtle rendering

use serde_json::{Map, Value};

/// Deep copy of `value` with every `.` in every string leaf written as `\.`.
///
/// Object keys, numbers and booleans are copied unchanged.
pub fn escape_dots(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.replace('.', "\\.")),
        Value::Array(items) => Value::Array(items.iter().map(escape_dots).collect()),
        Value::Object(map) => Value::Object(escape_map(map)),
        other => other.clone(),
    }
}

pub fn escape_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| (key.clone(), escape_dots(value)))
        .collect()
}

/// Inverse of [`escape_dots`] for a single string
pub fn unescape_dots(s: &str) -> String {
    s.replace("\\.", ".")
}
