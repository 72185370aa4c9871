//! Filtering of generator attributes into a JSON-safe export record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::generator::AttributeValue;

/// Ordered attribute-name → value mapping holding only values that
/// round-trip exactly through JSON text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportRecord(Map<String, Value>);

impl ExportRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Attribute names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for ExportRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Build an [`ExportRecord`] from a generator's attributes.
///
/// Values that cannot be encoded, or whose decoded form differs from the
/// original encoding, are skipped. A skipped attribute never aborts the
/// extraction. A repeated name keeps its first position and its last value.
pub fn extract_state<I>(attributes: I) -> ExportRecord
where
    I: IntoIterator<Item = (String, AttributeValue)>,
{
    let mut record = Map::new();
    let mut skipped = 0usize;

    for (name, value) in attributes {
        match encode(&value) {
            Ok(json) => {
                record.insert(name, json);
            }
            Err(reason) => {
                tracing::debug!("Skipping attribute '{name}': {reason}");
                skipped += 1;
            }
        }
    }

    tracing::info!("Extracted {} attributes ({skipped} not serialisable)", record.len());
    ExportRecord(record)
}

fn encode(value: &AttributeValue) -> Result<Value, String> {
    let text = serde_json::to_string(value).map_err(|e| e.to_string())?;
    let decoded: Value = serde_json::from_str(&text).map_err(|e| e.to_string())?;
    let reencoded = serde_json::to_string(&decoded).map_err(|e| e.to_string())?;
    if reencoded != text {
        return Err("value does not round-trip".to_string());
    }
    Ok(decoded)
}
