//! Host key/value persistence.
//!
//! Both the settings store and the cached geolocation fix persist through
//! this facility. Values are JSON documents addressed by a fixed string key.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::StorageError;

/// A persistent string-keyed store of JSON values.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Overwrite the value stored under `key`.
    fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// Typed helpers on top of [`KeyValueStore`].
pub trait KeyValueStoreExt {
    /// Read and deserialize the value under `key`.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError>;

    /// Serialize and store `value` under `key`.
    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStoreExt for S {
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        self.set(key, serde_json::to_value(value)?)
    }
}

/// File-backed store: one JSON object holding every key.
///
/// The whole document is rewritten on each `set` through a temporary file
/// and a rename, so a crash never leaves a half-written state file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, Value>>,
}

impl FileStore {
    /// Open the store at `path`, loading existing entries.
    ///
    /// A missing file is an empty store. A file that does not hold a JSON
    /// object is reported as [`StorageError::Corrupted`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| StorageError::Read {
                path: path.display().to_string(),
                source,
            })?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                match serde_json::from_str::<Value>(&contents)? {
                    Value::Object(map) => map.into_iter().collect(),
                    other => {
                        return Err(StorageError::Corrupted(format!(
                            "expected a JSON object in {}, found {}",
                            path.display(),
                            json_kind(&other)
                        )))
                    }
                }
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!("Opened state file {:?} with {} keys", path, entries.len());
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, Value>) -> Result<(), StorageError> {
        let write_err = |source| StorageError::Write {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }
}

/// In-memory store, used in tests and when no data directory is available.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Fix {
        latitude: f64,
        longitude: f64,
    }

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryStore::new();
        store.set("k", Value::from(1)).unwrap();
        store.set("k", Value::from(2)).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(Value::from(2)));
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_typed_helpers() {
        let store = MemoryStore::new();
        let fix = Fix {
            latitude: 52.37,
            longitude: 4.89,
        };
        store.set_json("fix", &fix).unwrap();
        let loaded: Option<Fix> = store.get_json("fix").unwrap();
        assert_eq!(loaded, Some(fix));
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::open(&path).unwrap();
        store.set("theme", Value::from(2)).unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("theme").unwrap(), Some(Value::from(2)));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("state.json")).unwrap();
        assert_eq!(store.get("anything").unwrap(), None);
    }

    #[test]
    fn test_file_store_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        let err = FileStore::open(&path).unwrap_err();
        assert!(matches!(err, StorageError::Corrupted(_)));
    }

    #[test]
    fn test_get_json_type_mismatch_is_error() {
        let store = MemoryStore::new();
        store.set("fix", Value::from("not a fix")).unwrap();
        let result: Result<Option<Fix>, _> = store.get_json("fix");
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }
}
