//! Settings persistence over a small string key-value store.
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use aggregator_core::{Setting, Settings, SettingsError};
use engine_logging::{engine_debug, engine_warn};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};
use crate::pipeline::PipelineConfig;

pub const SETTINGS_KEY: &str = "novelbin_settings";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] io::Error),
    #[error("store file is not a JSON object of strings: {0}")]
    Format(#[from] serde_json::Error),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// A JSON object file (`{"key": "value", ...}`) rewritten atomically on
/// every `set`.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `settings.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SETTINGS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // An unreadable file is replaced rather than blocking every save.
        let mut values = self.read_all().unwrap_or_default();
        values.insert(key.to_string(), value.to_string());
        let text = serde_json::to_string_pretty(&values)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let filename = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(SETTINGS_FILE_NAME);
        AtomicFileWriter::new(dir).write(filename, &text)?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SettingsStoreError {
    #[error(transparent)]
    Invalid(#[from] SettingsError),
    #[error("failed to save settings: {0}")]
    Store(#[from] StoreError),
}

/// Current settings plus the store they persist to.
#[derive(Debug)]
pub struct SettingsStore<S> {
    store: S,
    settings: Settings,
}

impl<S: KeyValueStore> SettingsStore<S> {
    /// Read the persisted blob. Missing or unreadable data falls back to
    /// defaults; stored values are clamped into range.
    pub fn load(store: S) -> Self {
        let settings = match store.get(SETTINGS_KEY) {
            Ok(Some(blob)) => match serde_json::from_str::<Settings>(&blob) {
                Ok(settings) => settings.clamped(),
                Err(err) => {
                    engine_warn!("Failed to parse saved settings, using defaults: {err}");
                    Settings::default()
                }
            },
            Ok(None) => {
                engine_debug!("No saved settings, using defaults");
                Settings::default()
            }
            Err(err) => {
                engine_warn!("Failed to read saved settings, using defaults: {err}");
                Settings::default()
            }
        };
        Self { store, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig::from(&self.settings)
    }

    /// Validate, persist, then commit. A rejected or unsaved change leaves
    /// the current settings untouched.
    pub fn set(&mut self, setting: Setting) -> Result<&Settings, SettingsStoreError> {
        let mut next = self.settings.clone();
        next.apply(setting)?;
        self.persist(&next)?;
        self.settings = next;
        Ok(&self.settings)
    }

    pub fn reset(&mut self) -> Result<&Settings, SettingsStoreError> {
        let defaults = Settings::default();
        self.persist(&defaults)?;
        self.settings = defaults;
        Ok(&self.settings)
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    fn persist(&self, settings: &Settings) -> Result<(), StoreError> {
        let blob = serde_json::to_string(settings)?;
        self.store.set(SETTINGS_KEY, &blob)
    }
}
