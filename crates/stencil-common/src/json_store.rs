//! JSON persistence utilities
//!
//! Loading and saving JSON files, including a loader that matches object keys
//! case-insensitively against a canonical key table before deserializing.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// JSON store errors
#[derive(Debug, Error)]
pub enum JsonStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("File not found: {path}")]
    NotFound { path: String },
}

/// Result type for JSON store operations
pub type JsonStoreResult<T> = Result<T, JsonStoreError>;

/// Canonical key table used for case-insensitive loading.
///
/// Lookups are by lowercase key. Aliases map a legacy spelling onto a
/// canonical key. Only the object level a map describes is rewritten; values
/// below it keep their keys unless a nested map is registered for them.
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    keys: HashMap<String, String>,
    nested: HashMap<String, KeyMap>,
}

impl KeyMap {
    /// Build a key map from canonical key names
    pub fn new<I, S>(canonical: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys = canonical
            .into_iter()
            .map(|k| (k.as_ref().to_lowercase(), k.as_ref().to_string()))
            .collect();
        Self {
            keys,
            nested: HashMap::new(),
        }
    }

    /// Register an alternate spelling for a canonical key
    pub fn with_alias(mut self, alias: &str, canonical: &str) -> Self {
        self.keys.insert(alias.to_lowercase(), canonical.to_string());
        self
    }

    /// Normalize the object (or array of objects) under `canonical` with `keys`
    pub fn with_nested(mut self, canonical: &str, keys: KeyMap) -> Self {
        self.nested.insert(canonical.to_string(), keys);
        self
    }

    /// Canonical spelling for a key, if known
    pub fn canonical(&self, key: &str) -> Option<&str> {
        self.keys.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Rewrite the keys of an object (or of each object in an array) to
    /// their canonical spelling.
    ///
    /// Unknown keys are kept as they are. When two spellings collapse onto the
    /// same canonical key, the canonical spelling wins.
    pub fn normalize(&self, value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut normalized = Map::with_capacity(map.len());
                for (key, inner) in map {
                    let Some(canonical) = self.canonical(&key) else {
                        normalized.insert(key, inner);
                        continue;
                    };
                    let inner = match self.nested.get(canonical) {
                        Some(nested) => nested.normalize(inner),
                        None => inner,
                    };
                    if canonical == key {
                        normalized.insert(key, inner);
                    } else if !normalized.contains_key(canonical) {
                        normalized.insert(canonical.to_string(), inner);
                    }
                }
                Value::Object(normalized)
            }
            Value::Array(items) => {
                Value::Array(items.into_iter().map(|v| self.normalize(v)).collect())
            }
            other => other,
        }
    }
}

/// Load JSON from a file path
pub fn load_json<T, P>(path: P) -> JsonStoreResult<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if !path.exists() {
        return Err(JsonStoreError::NotFound {
            path: path.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    let value = serde_json::from_str(&content)?;
    Ok(value)
}

/// Load JSON from a file path, matching object keys case-insensitively
pub fn load_json_with_keys<T, P>(path: P, keys: &KeyMap) -> JsonStoreResult<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let raw: Value = load_json(path)?;
    let value = serde_json::from_value(keys.normalize(raw))?;
    Ok(value)
}

/// Save value as JSON atomically (write to temp, then rename)
pub fn save_json_atomic<T, P>(path: P, value: &T) -> JsonStoreResult<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(value)?;

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = std::path::PathBuf::from(temp_name);
    std::fs::write(&temp_path, &content)?;
    std::fs::rename(&temp_path, path)?;

    Ok(())
}
