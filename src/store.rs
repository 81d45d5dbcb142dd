use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{Result, StackForgeError};

/// Where raw project documents come from and go to. Operations only consume
/// the raw JSON value; parsing formats and locations is the adapter's job.
pub trait StorageAdapter {
    /// Reads the raw project document
    fn read(&self) -> Result<Value>;

    /// Persists the raw project document
    fn write(&self, raw: &Value) -> Result<()>;
}

/// Stores the project configuration as a YAML file on the local filesystem.
/// YAML is a superset of JSON, so JSON documents load unchanged.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageAdapter for FileStore {
    fn read(&self) -> Result<Value> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            StackForgeError::Config(format!(
                "Failed to read project file '{}': {}",
                self.path.display(),
                e
            ))
        })?;

        serde_yaml::from_str(&contents).map_err(|e| {
            StackForgeError::Config(format!(
                "Failed to parse project file '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write(&self, raw: &Value) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_yaml::to_string(raw).map_err(|e| {
            StackForgeError::Config(format!("Failed to serialize project: {}", e))
        })?;

        fs::write(&self.path, contents).map_err(StackForgeError::Io)
    }
}

/// Serves a fixed in-memory document; the write half is discarded. Useful for
/// programmatic callers and tests.
pub struct MemoryStore {
    raw: Value,
}

impl MemoryStore {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }
}

impl StorageAdapter for MemoryStore {
    fn read(&self) -> Result<Value> {
        Ok(self.raw.clone())
    }

    fn write(&self, _raw: &Value) -> Result<()> {
        Ok(())
    }
}
