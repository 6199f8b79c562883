/// Versioned collection envelope
///
/// Collections are written as
///
/// ```json
/// {"schema_version": 1, "records": [ ... ]}
/// ```
///
/// Blobs written before versioning existed are bare JSON arrays; they are
/// read as version 0 and upgraded step by step on load. Writes always use
/// [`SCHEMA_VERSION`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Current schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Legacy camelCase keys renamed by the v0 → v1 step
const LEGACY_KEY_RENAMES: [(&str, &str); 5] = [
    ("userId", "user_id"),
    ("adminId", "admin_id"),
    ("organizationId", "organization_id"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

/// Reasons a stored blob could not be decoded
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Unsupported schema version {0} (newest known is {SCHEMA_VERSION})")]
    UnsupportedVersion(u32),

    #[error("Expected a JSON array of records")]
    NotAnArray,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    schema_version: u32,
    records: Value,
}

/// Decodes a stored collection into upgraded record values
pub fn decode_collection(text: &str) -> Result<Vec<Value>, SchemaError> {
    let raw: Value = serde_json::from_str(text)?;

    let (version, records) = match raw {
        Value::Array(records) => (0, records),
        Value::Object(_) => {
            let envelope: Envelope = serde_json::from_value(raw)?;
            match envelope.records {
                Value::Array(records) => (envelope.schema_version, records),
                _ => return Err(SchemaError::NotAnArray),
            }
        }
        _ => return Err(SchemaError::NotAnArray),
    };

    upgrade(version, records)
}

/// Encodes records into the current envelope
pub fn encode_collection(records: Vec<Value>) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope {
        schema_version: SCHEMA_VERSION,
        records: Value::Array(records),
    })
}

/// Decodes a single-object key (such as `user`)
///
/// Single objects are stored without an envelope; the legacy key rename
/// still applies.
pub fn decode_object(text: &str) -> Result<Value, SchemaError> {
    let mut value: Value = serde_json::from_str(text)?;
    if let Value::Object(map) = &mut value {
        rename_legacy_keys(map);
    }
    Ok(value)
}

/// Runs every upgrade step from `version` to [`SCHEMA_VERSION`]
pub fn upgrade(version: u32, mut records: Vec<Value>) -> Result<Vec<Value>, SchemaError> {
    if version > SCHEMA_VERSION {
        return Err(SchemaError::UnsupportedVersion(version));
    }

    if version < 1 {
        for record in records.iter_mut() {
            if let Value::Object(map) = record {
                rename_legacy_keys(map);
            }
        }
    }

    Ok(records)
}

/// Gives records stored without an `id` one derived from their content and
/// position, so every load of the same blob yields the same ids
pub fn assign_missing_ids(records: &mut [Value]) {
    for (index, record) in records.iter_mut().enumerate() {
        let Value::Object(map) = record else { continue };
        let missing = match map.get("id") {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if missing {
            map.remove("id");
            let id = derived_id(index, map);
            map.insert("id".to_string(), Value::String(id));
        }
    }
}

fn derived_id(index: usize, map: &Map<String, Value>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(index.to_le_bytes());
    hasher.update(Value::Object(map.clone()).to_string().as_bytes());
    format!("legacy-{}", &hex::encode(hasher.finalize())[..24])
}

fn rename_legacy_keys(map: &mut Map<String, Value>) {
    for (legacy, current) in LEGACY_KEY_RENAMES {
        if let Some(value) = map.remove(legacy) {
            // An explicit snake_case value wins over the legacy one
            map.entry(current.to_string()).or_insert(value);
        }
    }
}
