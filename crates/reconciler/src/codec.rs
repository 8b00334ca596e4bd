//! YAML codec for the flat key-value file stored inside a document.

use std::collections::BTreeMap;

use serde_yaml::Value;
use tracing::debug;

use crate::error::{Error, Result};

/// Decode a YAML file into a flat string map.
///
/// Anything that is not a mapping of scalars decodes to an empty map.
/// Scalar numbers and booleans are kept as their textual form.
pub fn decode_file(text: &str) -> BTreeMap<String, String> {
    match serde_yaml::from_str::<Value>(text) {
        Ok(Value::Mapping(mapping)) => mapping
            .into_iter()
            .map(|(key, value)| Some((scalar_to_string(key)?, scalar_to_string(value)?)))
            .collect::<Option<BTreeMap<_, _>>>()
            .unwrap_or_else(|| {
                debug!("File contains non-scalar entries, treating as empty");
                BTreeMap::new()
            }),
        Ok(Value::Null) => BTreeMap::new(),
        Ok(_) => {
            debug!("File is not a mapping, treating as empty");
            BTreeMap::new()
        }
        Err(e) => {
            debug!(error = %e, "File is not valid YAML, treating as empty");
            BTreeMap::new()
        }
    }
}

/// Encode a flat string map as YAML.
///
/// # Errors
///
/// Returns `EncodeFailed` if serialization fails.
pub fn encode_file(file_name: &str, values: &BTreeMap<String, String>) -> Result<String> {
    serde_yaml::to_string(values).map_err(|e| Error::encode_failed(file_name, e.to_string()))
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        Value::Tagged(tagged) => scalar_to_string(tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}
