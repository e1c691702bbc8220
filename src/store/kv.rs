//! Embedded key-value persistence.
//!
//! A file-backed map of string keys to JSON values, read synchronously and
//! flushed atomically (write to a temp file, then rename). This is the
//! durable home of the place-list snapshot, per-place sky snapshots, night
//! settings, filter/sort modes and the device id.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{StoreError, StoreResult};

const DEVICE_ID_KEY: &str = "device_id";

pub struct KvStore {
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl KvStore {
    /// Open (or create) the store backing file.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            HashMap::new()
        };
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// Purely in-memory store for tests and throwaway sessions.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entries = self.entries.lock();
        let value = entries.get(key)?;
        serde_json::from_value(value.clone()).ok()
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let encoded = serde_json::to_value(value)?;
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), encoded);
        self.flush_locked(&entries)
    }

    pub fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.flush_locked(&entries)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Stable per-install identity, created on first use.
    pub fn device_id(&self) -> String {
        if let Some(id) = self.get::<String>(DEVICE_ID_KEY) {
            return id;
        }
        let id = uuid::Uuid::new_v4().to_string();
        if let Err(err) = self.put(DEVICE_ID_KEY, &id) {
            log::warn!("failed to persist device id: {}", err);
        }
        id
    }

    fn flush_locked(&self, entries: &HashMap<String, serde_json::Value>) -> StoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let encoded = serde_json::to_vec(entries)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, path).map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_and_remove() {
        let kv = KvStore::in_memory();
        kv.put("answer", &42_i64).unwrap();
        assert_eq!(kv.get::<i64>("answer"), Some(42));
        kv.remove("answer").unwrap();
        assert_eq!(kv.get::<i64>("answer"), None);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");
        {
            let kv = KvStore::open(&path).unwrap();
            kv.put("name", &"Pinnacles".to_string()).unwrap();
        }
        let kv = KvStore::open(&path).unwrap();
        assert_eq!(kv.get::<String>("name").as_deref(), Some("Pinnacles"));
    }

    #[test]
    fn test_device_id_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kv.json");
        let first = KvStore::open(&path).unwrap().device_id();
        let second = KvStore::open(&path).unwrap().device_id();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_missing_key_and_type_mismatch_are_none() {
        let kv = KvStore::in_memory();
        kv.put("text", &"hello".to_string()).unwrap();
        assert_eq!(kv.get::<i64>("text"), None);
        assert_eq!(kv.get::<String>("absent"), None);
    }
}
