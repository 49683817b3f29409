//! Canonical content hashing.
//!
//! Stage processors hash their semantic inputs (a template or algorithm
//! version plus upstream data) and compare the result with the hash stored
//! on the existing artifact. Equal hashes mean nothing changed.
//!
//! The hash is computed over a canonical JSON rendering: object keys are
//! sorted at every depth, array order is preserved, and no whitespace is
//! emitted. Two values that differ only in key order hash identically.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use ts_rs::TS;

use crate::error::CoreError;

/// Lowercase hex SHA-256 digest of a canonical input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, used in object paths.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ContentHash {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Hash `data` under `version`.
///
/// Bumping `version` alone always yields a different hash, even when
/// `data` is unchanged.
pub fn canonical_hash<T: Serialize + ?Sized>(
    version: &str,
    data: &T,
) -> Result<ContentHash, CoreError> {
    let value = serde_json::to_value(data)?;
    Ok(hash_value(version, &value))
}

/// Hash an already-serialized JSON value under `version`.
pub fn hash_value(version: &str, value: &Value) -> ContentHash {
    let mut canonical = String::new();
    write_canonical(value, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(version.as_bytes());
    // Separator so ("ab", "c") and ("a", "bc") never collide.
    hasher.update([0u8]);
    hasher.update(canonical.as_bytes());
    ContentHash(format!("{:x}", hasher.finalize()))
}

/// Render `value` as canonical JSON (sorted keys, no whitespace).
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
