//! Best effort key-value persistence for client state.
//!
//! Values are JSON. Failing to read or write is never an error for
//! the caller, the chat carries on without the cache.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde_json::Value;

pub const TRANSCRIPT_KEY: &str = "transcript";
pub const SYSTEM_PROMPT_KEY: &str = "system_prompt";
pub const API_KEY_KEY: &str = "api_key";
pub const MODEL_KEY: &str = "model";
pub const TEMPERATURE_KEY: &str = "temperature";
pub const BASE_URL_KEY: &str = "base_url";

pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: &Value);
    fn remove(&self, key: &str);
}

#[derive(Default)]
pub struct MemoryStore(Mutex<HashMap<String, Value>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.0.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &Value) {
        if let Ok(mut map) = self.0.lock() {
            map.insert(key.to_string(), value.clone());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut map) = self.0.lock() {
            map.remove(key);
        }
    }
}

/// Stores each key as `<dir>/<key>.json`. Writes are last-write-wins
/// and nothing coordinates two processes sharing a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.path(key);
        let contents = fs::read_to_string(&path).ok()?;
        serde_json::from_str(&contents)
            .inspect_err(|e| tracing::debug!("Ignoring unreadable {}: {}", path.display(), e))
            .ok()
    }

    fn set(&self, key: &str, value: &Value) {
        let path = self.path(key);
        let result =
            fs::create_dir_all(&self.dir).and_then(|_| fs::write(&path, value.to_string()));
        if let Err(e) = result {
            tracing::debug!("Failed to write {}: {}", path.display(), e);
        }
    }

    fn remove(&self, key: &str) {
        let _ = fs::remove_file(self.path(key));
    }
}
