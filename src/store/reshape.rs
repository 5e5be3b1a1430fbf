// src/store/reshape.rs

use anyhow::{bail, Result};
use serde_json::{Map, Value};

use super::Record;

/// Turn a keyed document `{ "KR": {...}, "JP": {...} }` into
/// `[ { key_field: "KR", series_field: {...} }, ... ]`, keeping key order.
pub fn keyed_to_array(doc: Value, key_field: &str, series_field: &str) -> Result<Value> {
    let keyed = match doc {
        Value::Object(keyed) => keyed,
        other => bail!(
            "expected a JSON object keyed by {}, found {}",
            key_field,
            kind(&other)
        ),
    };

    let rows = keyed
        .into_iter()
        .map(|(key, series)| {
            let mut row = Map::new();
            row.insert(key_field.to_string(), Value::String(key));
            row.insert(series_field.to_string(), series);
            Value::Object(row)
        })
        .collect();

    Ok(Value::Array(rows))
}

/// The inverse view: `{ code: series, ... }` built from records carrying
/// `series_field`, one entry per distinct `key_field` in first-seen order.
/// Records without a code or without the series are left out.
pub fn keyed_by(records: &[Record], key_field: &str, series_field: &str) -> Value {
    let mut keyed = Map::new();
    for record in records {
        let (code, series) = match (record.identifier(key_field), record.get(series_field)) {
            (Some(code), Some(series)) => (code, series),
            _ => continue,
        };
        if !keyed.contains_key(code) {
            keyed.insert(code.to_string(), series.clone());
        }
    }
    Value::Object(keyed)
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
