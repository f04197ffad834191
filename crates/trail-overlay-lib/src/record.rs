//! Raw trail records as delivered by the data-fetch layer
//!
//! Records are untyped JSON objects. Nothing is validated on the way in; field lookup
//! is tolerant of the naming variants the upstream API has used over time.

use crate::{OverlayError, Result};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Read;

/// An opaque trail record: a bag of named JSON fields
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct RawTrailRecord {
    fields: Map<String, Value>,
}

impl RawTrailRecord {
    /// Wrap an existing JSON object
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build a record from a JSON value, if it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// Raw access to a field by its exact name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// The first present field among the given aliases
    fn get_any(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().find_map(|k| self.get(k))
    }

    /// Pre-built geometry: a Feature, FeatureCollection or bare geometry object
    pub fn geometry(&self) -> Option<&Value> {
        self.get_any(&["geometry", "geojson"])
    }

    /// Coordinate path, expected as `[[lon, lat], ...]`
    pub fn path(&self) -> Option<&Vec<Value>> {
        self.get("path").and_then(Value::as_array)
    }

    /// Identifier, with numeric ids rendered to their string form
    pub fn id(&self) -> Option<String> {
        match self.get("id")? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<String> {
        self.get("name").and_then(scalar_to_string)
    }

    pub fn distance(&self) -> Option<&Value> {
        self.get("distance")
    }

    pub fn duration(&self) -> Option<&Value> {
        self.get("duration")
    }

    pub fn pace(&self) -> Option<&Value> {
        self.get("pace")
    }

    pub fn description(&self) -> Option<String> {
        self.get("description").and_then(scalar_to_string)
    }

    pub fn start_latitude(&self) -> Option<f64> {
        self.get_any(&["startLatitude", "start_latitude"])
            .and_then(Value::as_f64)
    }

    pub fn start_longitude(&self) -> Option<f64> {
        self.get_any(&["startLongitude", "start_longitude"])
            .and_then(Value::as_f64)
    }
}

impl From<Map<String, Value>> for RawTrailRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// Render a scalar JSON value as display text
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Parse a records document
///
/// Accepts either a bare JSON array of records or the admin API envelope
/// `{ "data": [ ... ] }`. Array entries that are not objects are skipped.
pub fn load_records<R: Read>(reader: R) -> Result<Vec<RawTrailRecord>> {
    profiling::scope!("load_records");

    let document: Value = serde_json::from_reader(reader)?;
    let entries = match document {
        Value::Array(entries) => entries,
        Value::Object(mut envelope) => match envelope.remove("data") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(OverlayError::InvalidDocument(
                    "object document has no `data` array".to_string(),
                ));
            }
        },
        other => {
            return Err(OverlayError::InvalidDocument(format!(
                "expected an array of records, found {}",
                json_type_name(&other)
            )));
        }
    };

    let total = entries.len();
    let records: Vec<RawTrailRecord> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            let record = RawTrailRecord::from_value(entry);
            if record.is_none() {
                tracing::warn!("Skipping record #{} (not a JSON object)", index);
            }
            record
        })
        .collect();

    tracing::debug!("Loaded {} of {} records", records.len(), total);
    Ok(records)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
