//! Snapshot and payload file envelopes.
//!
//! Collector snapshots arrive in more than one nesting: a bare array,
//! `{"data": [...]}`, `{"data": {"count": N, "data": [...]}}`, or the
//! Target's `{"result": {"entityList": [...]}}`. The shape is resolved
//! exactly once here, at the file boundary; everything downstream works on
//! typed `Vec<T>`.
//!
//! Payload files produced by this engine always use the
//! `{"meta": {"generatedAt", "count"}, "data": [...]}` envelope, but are
//! read back tolerantly (a bare list is accepted too).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::error::{CoreError, Result};

/// Decode a raw snapshot JSON string into typed records.
///
/// Tries each known envelope shape in order and deserializes the first
/// record list found. An empty list is a valid result; an unrecognized
/// shape is an error.
pub fn decode_records<T: DeserializeOwned>(raw: &str) -> std::result::Result<Vec<T>, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;

    let records = unwrap_record_list(&value)
        .ok_or_else(|| "no record list found in any known envelope shape".to_string())?;

    records
        .iter()
        .cloned()
        .map(|v| serde_json::from_value(v).map_err(|e| format!("record decode failed: {e}")))
        .collect()
}

/// Locate the record array inside a decoded envelope.
fn unwrap_record_list(value: &Value) -> Option<&Vec<Value>> {
    if let Some(list) = value.as_array() {
        return Some(list);
    }

    if let Some(data) = value.get("data") {
        if let Some(list) = data.as_array() {
            return Some(list);
        }
        if let Some(list) = data.get("data").and_then(Value::as_array) {
            return Some(list);
        }
        if let Some(list) = data.get("entityList").and_then(Value::as_array) {
            return Some(list);
        }
    }

    value
        .get("result")
        .and_then(|r| r.get("entityList"))
        .and_then(Value::as_array)
}

/// Read and decode a snapshot file.
///
/// A missing file is [`CoreError::FileNotFound`]; an undecodable one is
/// [`CoreError::MalformedFile`].
pub fn read_snapshot<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.is_file() {
        return Err(CoreError::file_not_found(path));
    }
    let raw = std::fs::read_to_string(path)?;
    let records = decode_records(&raw).map_err(|message| CoreError::malformed(path, message))?;
    debug!(path = %path.display(), count = records.len(), "snapshot loaded");
    Ok(records)
}

/// Metadata stamped on generated payload files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMeta {
    /// When the file was generated.
    pub generated_at: DateTime<Utc>,
    /// Number of items in `data`.
    pub count: usize,
}

/// A generated payload file: `{meta, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadFile<T> {
    /// File metadata.
    pub meta: PayloadMeta,
    /// Payload items.
    pub data: Vec<T>,
}

impl<T: Serialize + DeserializeOwned> PayloadFile<T> {
    /// Wrap items with freshly stamped metadata.
    #[must_use]
    pub fn new(data: Vec<T>) -> Self {
        Self {
            meta: PayloadMeta {
                generated_at: Utc::now(),
                count: data.len(),
            },
            data,
        }
    }

    /// Write the envelope to `path`, creating parent directories as needed.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), count = self.meta.count, "payload file written");
        Ok(())
    }

    /// Read a payload file, accepting either the full envelope or a bare list.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CoreError::file_not_found(path));
        }
        let raw = std::fs::read_to_string(path)?;
        let value: Value =
            serde_json::from_str(&raw).map_err(|e| CoreError::malformed(path, e.to_string()))?;

        if value.is_array() {
            let data: Vec<T> = serde_json::from_value(value)
                .map_err(|e| CoreError::malformed(path, e.to_string()))?;
            return Ok(Self::new(data));
        }

        serde_json::from_value(value).map_err(|e| CoreError::malformed(path, e.to_string()))
    }
}
