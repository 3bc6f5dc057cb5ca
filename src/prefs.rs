//! String key-value preference storage.
//!
//! The override registry persists itself as a single string value under one
//! key. Anything that can hold strings by key can back it: the UI layer can
//! plug in its platform preferences, tests use [`MemoryPrefs`], and the CLI
//! uses [`JsonFilePrefs`].
//!
//! Writes replace a value as a whole. [`JsonFilePrefs`] additionally writes
//! the backing file atomically (temp file, then rename), so a crash mid-save
//! leaves the previous contents intact.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A store of string values by key.
pub trait PreferenceStore: Send + Sync {
    /// Read a value. `Ok(None)` if the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError>;

    /// Replace the value stored under `key`.
    fn put(&self, key: &str, value: &str) -> Result<(), PrefsError>;
}

/// Preference store errors
#[derive(Debug, thiserror::Error)]
pub enum PrefsError {
    #[error("Failed to read preferences from {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Preferences file {0} is not a JSON string map: {1}")]
    Parse(PathBuf, serde_json::Error),

    #[error("Failed to write preferences to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to encode preferences: {0}")]
    Encode(serde_json::Error),
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryPrefs {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys written so far.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

impl PreferenceStore for MemoryPrefs {
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a single JSON object file (`{"key": "value", ...}`).
///
/// The whole map is cached in memory; every `put` rewrites the file.
#[derive(Debug)]
pub struct JsonFilePrefs {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFilePrefs {
    /// Open (or lazily create) the preference file at `path`.
    ///
    /// A missing file is an empty store. An unreadable or unparseable file is
    /// an error: it may hold data the caller does not want to overwrite.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PrefsError> {
        let path = path.into();
        let values = if path.exists() {
            let contents =
                std::fs::read_to_string(&path).map_err(|e| PrefsError::Read(path.clone(), e))?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents).map_err(|e| PrefsError::Parse(path.clone(), e))?
            }
        } else {
            tracing::debug!(target: "prefs", "No preferences at {:?}, starting empty", path);
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, values: &BTreeMap<String, String>) -> Result<(), PrefsError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| PrefsError::Write(dir.to_path_buf(), e))?;
        }

        let contents = serde_json::to_string_pretty(values).map_err(PrefsError::Encode)?;

        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, contents).map_err(|e| PrefsError::Write(temp_path.clone(), e))?;
        std::fs::rename(&temp_path, &self.path)
            .map_err(|e| PrefsError::Write(self.path.clone(), e))?;
        Ok(())
    }
}

impl PreferenceStore for JsonFilePrefs {
    fn get(&self, key: &str) -> Result<Option<String>, PrefsError> {
        Ok(self.values.lock().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), PrefsError> {
        // Held across the file write so two puts cannot interleave on disk.
        let mut values = self.values.lock();
        let previous = values.insert(key.to_string(), value.to_string());

        if let Err(e) = self.write_file(&values) {
            match previous {
                Some(old) => values.insert(key.to_string(), old),
                None => values.remove(key),
            };
            return Err(e);
        }

        tracing::trace!(target: "prefs", key, bytes = value.len(), "Wrote preference");
        Ok(())
    }
}
