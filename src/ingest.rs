//! Turning uploaded documents into record sequences

use crate::error::{MapperError, Result};
use serde_json::Value;
use tracing::debug;

/// Parse an uploaded document.
///
/// Tries the SIMD parser first and falls back to `serde_json`, whose error
/// message is the one reported.
pub fn parse_document(name: &str, bytes: &[u8]) -> Result<Value> {
    let mut buffer = bytes.to_vec();
    match simd_json::serde::from_slice::<Value>(&mut buffer) {
        Ok(value) => Ok(value),
        Err(simd_err) => {
            debug!(file = name, error = %simd_err, "SIMD parse failed, retrying with serde_json");
            serde_json::from_slice(bytes).map_err(|err| MapperError::Parse {
                file: name.to_string(),
                message: err.to_string(),
            })
        }
    }
}

/// Reduce a parsed document to its record sequence.
///
/// Arrays are used as-is. An object is replaced by its first property
/// holding a non-empty array; anything else becomes a single record.
pub fn normalize_records(document: Value) -> Vec<Value> {
    match document {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            let array_key = obj
                .iter()
                .find(|(_, value)| matches!(value, Value::Array(items) if !items.is_empty()))
                .map(|(key, _)| key.clone());

            if let Some(key) = array_key {
                if let Some(Value::Array(items)) = obj.remove(&key) {
                    debug!(property = %key, records = items.len(), "using first array property as records");
                    return items;
                }
            }
            vec![Value::Object(obj)]
        }
        other => vec![other],
    }
}
