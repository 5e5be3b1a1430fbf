// src/store/mod.rs

pub mod reshape;

use serde::{Deserialize, Serialize};
use serde_json::{ser::PrettyFormatter, Map, Serializer, Value};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::error::StoreError;

/// One city/country entry. Field order is whatever the source document had;
/// `serde_json` is built with `preserve_order` so it survives a round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

/// Latitude/longitude pair read from a record's `coordinates` object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

impl Record {
    pub fn new(fields: Map<String, Value>) -> Self {
        Record(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn fields_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Non-empty, trimmed string stored under `field`.
    pub fn identifier(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// `coordinates.lat` plus `coordinates.lng` (or `lon`). Numbers encoded as
    /// strings are accepted.
    pub fn coordinates(&self) -> Option<Coordinates> {
        let coords = self.0.get("coordinates")?.as_object()?;
        let lat = number(coords.get("lat")?)?;
        let lon = number(coords.get("lng").or_else(|| coords.get("lon"))?)?;
        Some(Coordinates { lat, lon })
    }
}

fn number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Ordered sequence of records loaded from, and written back to, one JSON file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Read a top-level JSON array of objects from `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: Value = serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_document(doc, path)?;
        debug!(path = %path.display(), records = store.len(), "loaded record store");
        Ok(store)
    }

    fn from_document(doc: Value, path: &Path) -> Result<Self, StoreError> {
        let entries = match doc {
            Value::Array(entries) => entries,
            _ => {
                return Err(StoreError::NotAnArray {
                    path: path.to_path_buf(),
                })
            }
        };

        let records = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| match entry {
                Value::Object(fields) => Ok(Record(fields)),
                _ => Err(StoreError::NotAnObject {
                    path: path.to_path_buf(),
                    index,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { records })
    }

    /// Serialise with a fixed indent and a trailing newline.
    pub fn to_json(&self, indent: usize) -> Result<String, serde_json::Error> {
        to_pretty_json(&self.records, indent)
    }

    /// Overwrite `path` with the whole store. The write is not atomic: a crash
    /// mid-write leaves a truncated file.
    pub fn save(&self, path: impl AsRef<Path>, indent: usize) -> Result<(), StoreError> {
        let path = path.as_ref();
        write_json(path, &self.records, indent)?;
        debug!(path = %path.display(), records = self.len(), "saved record store");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Record> {
        self.records.iter_mut()
    }
}

/// Pretty-print any serialisable value with `indent` spaces per level.
pub fn to_pretty_json<T: Serialize + ?Sized>(
    value: &T,
    indent: usize,
) -> Result<String, serde_json::Error> {
    let indent = vec![b' '; indent];
    let mut buf = Vec::new();
    let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(&indent));
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    // serde_json only ever emits UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Overwrite `path` with `value` pretty-printed by [`to_pretty_json`].
pub fn write_json<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    value: &T,
    indent: usize,
) -> Result<(), StoreError> {
    let path: PathBuf = path.as_ref().to_path_buf();
    let json = to_pretty_json(value, indent).map_err(|source| StoreError::Json {
        path: path.clone(),
        source,
    })?;
    fs::write(&path, json).map_err(|source| StoreError::Io { path, source })
}
