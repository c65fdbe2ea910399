//! Record flattening
//!
//! Nested objects are collapsed into a single level by joining the path of
//! keys with a separator, so `{"a": {"b": 1}}` becomes `{"a__b": 1}`.

use serde_json::{Map, Value};

/// Separator used between parent and child keys
pub const SEPARATOR: &str = "__";

/// Flatten a record using the default `__` separator.
pub fn flatten(record: &Map<String, Value>) -> Map<String, Value> {
    flatten_with(record, SEPARATOR)
}

/// Flatten a record with a custom separator.
///
/// Objects recurse depth-first. Arrays are leaves and are stored as their
/// JSON text; every other value is copied as-is.
pub fn flatten_with(record: &Map<String, Value>, sep: &str) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(record, None, sep, &mut out);
    out
}

fn flatten_into(record: &Map<String, Value>, parent: Option<&str>, sep: &str, out: &mut Map<String, Value>) {
    for (key, value) in record {
        let new_key = match parent {
            Some(parent) => format!("{}{}{}", parent, sep, key),
            None => key.clone(),
        };

        match value {
            Value::Object(nested) => flatten_into(nested, Some(&new_key), sep, out),
            Value::Array(_) => {
                out.insert(new_key, Value::String(value.to_string()));
            }
            other => {
                out.insert(new_key, other.clone());
            }
        }
    }
}
