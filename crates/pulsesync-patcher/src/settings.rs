//! Key-value settings shared with the host application.
//!
//! Keys are dotted paths into a nested JSON object: `music.hash` is stored as
//! `{"music": {"hash": ...}}`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to access settings file: {0}")]
    Fs(#[from] pulsesync_fs::Error),

    #[error("settings file '{path}' is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("settings key '{0}' crosses a non-object value")]
    NotAnObject(String),

    #[error("settings store is poisoned")]
    Poisoned,
}

pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, SettingsError>;
    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError>;
}

fn lookup<'a>(root: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(root, |node, part| node.get(part))
}

fn insert(root: &mut Value, key: &str, value: Value) -> Result<(), SettingsError> {
    let mut parts: Vec<&str> = key.split('.').collect();
    let last = parts.pop().unwrap_or(key);

    let mut node = root;
    for part in parts {
        let object = node
            .as_object_mut()
            .ok_or_else(|| SettingsError::NotAnObject(key.to_string()))?;
        node = object
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    node.as_object_mut()
        .ok_or_else(|| SettingsError::NotAnObject(key.to_string()))?
        .insert(last.to_string(), value);
    Ok(())
}

/// Settings persisted as a JSON document, rewritten atomically on every set.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Value, SettingsError> {
        if !self.path.exists() {
            return Ok(Value::Object(Map::new()));
        }
        let raw = pulsesync_fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        let _guard = self.lock.lock().map_err(|_| SettingsError::Poisoned)?;
        Ok(lookup(&self.load()?, key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let _guard = self.lock.lock().map_err(|_| SettingsError::Poisoned)?;
        let mut root = self.load()?;
        insert(&mut root, key, value)?;

        let content = serde_json::to_vec_pretty(&root).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })?;
        pulsesync_fs::atomic_write(&self.path, &content, pulsesync_fs::AtomicWriteOptions::new())?;
        tracing::debug!(path = %self.path.display(), key, "settings updated");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Result<Option<Value>, SettingsError> {
        let values = self.values.lock().map_err(|_| SettingsError::Poisoned)?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), SettingsError> {
        let mut values = self.values.lock().map_err(|_| SettingsError::Poisoned)?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}
