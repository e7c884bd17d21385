//! Column visibility persistence.
//!
//! Settings are keyed by table identity (table name plus optional session id)
//! so each dataset remembers its own column layout.

use crate::model::columns::ColumnVisibility;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsError {
    IoError(String),
    ParseError(String),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "IO error: {msg}"),
            SettingsError::ParseError(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for SettingsError {}

pub trait ColumnSettingsStore: Send + Sync {
    /// `Ok(None)` when nothing was saved under `key`
    fn load(&self, key: &str) -> Result<Option<ColumnVisibility>, SettingsError>;

    fn save(&self, key: &str, visibility: &ColumnVisibility) -> Result<(), SettingsError>;
}

/// Process-local store, used by tests and when no settings file is wanted
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    entries: Mutex<HashMap<String, ColumnVisibility>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ColumnSettingsStore for MemorySettingsStore {
    fn load(&self, key: &str) -> Result<Option<ColumnVisibility>, SettingsError> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| SettingsError::IoError(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn save(&self, key: &str, visibility: &ColumnVisibility) -> Result<(), SettingsError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| SettingsError::IoError(e.to_string()))?;
        entries.insert(key.to_string(), visibility.clone());
        Ok(())
    }
}

/// All tables share one JSON file: `{ "<key>": { "<column>": bool, .. }, .. }`
#[derive(Debug)]
pub struct JsonFileSettingsStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

type SettingsFile = BTreeMap<String, ColumnVisibility>;

impl JsonFileSettingsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<SettingsFile, SettingsError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(SettingsFile::new()),
            Err(e) => return Err(SettingsError::IoError(e.to_string())),
        };
        if contents.trim().is_empty() {
            return Ok(SettingsFile::new());
        }
        serde_json::from_str(&contents).map_err(|e| SettingsError::ParseError(e.to_string()))
    }

    fn write_all(&self, settings: &SettingsFile) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::IoError(e.to_string()))?;
        }
        let contents = serde_json::to_string_pretty(settings)
            .map_err(|e| SettingsError::ParseError(e.to_string()))?;

        // Write to a sibling temp file and rename so readers never see a partial file
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, contents).map_err(|e| SettingsError::IoError(e.to_string()))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| SettingsError::IoError(e.to_string()))
    }
}

impl ColumnSettingsStore for JsonFileSettingsStore {
    fn load(&self, key: &str) -> Result<Option<ColumnVisibility>, SettingsError> {
        Ok(self.read_all()?.remove(key))
    }

    fn save(&self, key: &str, visibility: &ColumnVisibility) -> Result<(), SettingsError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| SettingsError::IoError(e.to_string()))?;
        let mut settings = match self.read_all() {
            Ok(settings) => settings,
            Err(SettingsError::ParseError(e)) => {
                tracing::warn!(
                    "Overwriting unreadable settings file {}: {}",
                    self.path.display(),
                    e
                );
                SettingsFile::new()
            }
            Err(e) => return Err(e),
        };
        settings.insert(key.to_string(), visibility.clone());
        self.write_all(&settings)?;
        tracing::debug!("Saved column settings for '{}'", key);
        Ok(())
    }
}
