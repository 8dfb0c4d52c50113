//! Durable key-value persistence backed by a JSON file.
//!
//! Used as the default [`KeyValueStore`] behind the grant store. Writes are
//! atomic: the store is serialized to a temp file and renamed over the
//! previous contents.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::KeyValueStore;

/// On-disk store layout.
#[derive(Debug, Serialize, Deserialize)]
struct StoreData {
    /// Version of the store format.
    version: u32,
    /// Key-value entries.
    entries: HashMap<String, String>,
}

impl Default for StoreData {
    fn default() -> Self {
        Self {
            version: 1,
            entries: HashMap::new(),
        }
    }
}

/// File-backed [`KeyValueStore`].
pub struct FileStore {
    /// Path to the backing file.
    path: PathBuf,
    /// In-memory entries.
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Creates an empty store backed by `path` without touching the disk.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a store backed by `path`, loading existing contents if any.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let store = Self::new(path);
        store.load()?;
        Ok(store)
    }

    /// Loads entries from the backing file.
    ///
    /// A missing file is not an error; the store starts empty.
    pub fn load(&self) -> Result<()> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "store file not found, starting empty");
            return Ok(());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read store file: {}", self.path.display()))?;
        let data: StoreData = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse store file: {}", self.path.display()))?;

        let mut entries = self
            .entries
            .write()
            .map_err(|_| anyhow::anyhow!("failed to acquire write lock on store"))?;
        *entries = data.entries;

        debug!(
            path = %self.path.display(),
            count = entries.len(),
            "loaded key-value store"
        );
        Ok(())
    }

    /// Saves entries to the backing file atomically.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create store directory: {}", parent.display())
            })?;
        }

        let entries = self
            .entries
            .read()
            .map_err(|_| anyhow::anyhow!("failed to acquire read lock on store"))?;
        let data = StoreData {
            version: 1,
            entries: entries.clone(),
        };
        let contents =
            serde_json::to_string_pretty(&data).context("failed to serialize store")?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &contents)
            .with_context(|| format!("failed to write temp store file: {}", temp_path.display()))?;
        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "failed to rename temp store file {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.read().ok()?.get(key).cloned()
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        {
            let mut entries = self
                .entries
                .write()
                .map_err(|_| anyhow::anyhow!("failed to acquire write lock on store"))?;
            entries.insert(key.to_string(), value.to_string());
        }
        self.save()
    }
}
