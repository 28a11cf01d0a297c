//! The script library: named sources kept by a game client.
//!
//! All files live in one JSON object (`name -> source`) stored under
//! [`STORAGE_KEY`]. Names are the keys, so writing an existing name
//! replaces it.

use crate::error::{StorageError, StorageResult};
use crate::kv::{JsonFileStore, KeyValueStore, MemoryStore};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Key under which the library is stored.
pub const STORAGE_KEY: &str = "scriptbridge.files";

/// File operations served to the UI surface.
pub trait FileStore: Send + Sync {
    /// File names, sorted case-insensitively.
    fn list_files(&self) -> StorageResult<Vec<String>>;
    fn read_file(&self, name: &str) -> StorageResult<Option<String>>;
    fn file_exists(&self, name: &str) -> StorageResult<bool>;
    /// Creates or replaces `name`.
    fn write_file(&self, name: &str, content: &str) -> StorageResult<()>;
    /// Returns whether the file existed.
    fn delete_file(&self, name: &str) -> StorageResult<bool>;
}

/// [`FileStore`] over any [`KeyValueStore`].
///
/// Writes and deletes rewrite the whole map, so they are serialized; clones
/// share the same lock.
#[derive(Clone)]
pub struct ScriptLibrary {
    store: Arc<dyn KeyValueStore>,
    writes: Arc<Mutex<()>>,
}

impl ScriptLibrary {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Library persisted in a JSON file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Ok(Self::new(Arc::new(JsonFileStore::open(path)?)))
    }

    /// Library kept in memory only.
    pub fn open_in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn load(&self) -> StorageResult<BTreeMap<String, String>> {
        match self.store.get(STORAGE_KEY)? {
            None => Ok(BTreeMap::new()),
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                StorageError::InvalidData(format!("script library under '{STORAGE_KEY}': {e}"))
            }),
        }
    }

    fn save(&self, files: &BTreeMap<String, String>) -> StorageResult<()> {
        self.store.set(STORAGE_KEY, &serde_json::to_string(files)?)
    }

    /// Held from load to save of every modification.
    fn write_lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FileStore for ScriptLibrary {
    fn list_files(&self) -> StorageResult<Vec<String>> {
        let mut names: Vec<String> = self.load()?.into_keys().collect();
        sort_names(&mut names);
        Ok(names)
    }

    fn read_file(&self, name: &str) -> StorageResult<Option<String>> {
        Ok(self.load()?.remove(name))
    }

    fn file_exists(&self, name: &str) -> StorageResult<bool> {
        Ok(self.load()?.contains_key(name))
    }

    fn write_file(&self, name: &str, content: &str) -> StorageResult<()> {
        let _guard = self.write_lock();
        let mut files = self.load()?;
        files.insert(name.to_string(), content.to_string());
        self.save(&files)?;
        debug!("Saved script '{}' ({} bytes)", name, content.len());
        Ok(())
    }

    fn delete_file(&self, name: &str) -> StorageResult<bool> {
        let _guard = self.write_lock();
        let mut files = self.load()?;
        if files.remove(name).is_none() {
            return Ok(false);
        }
        self.save(&files)?;
        debug!("Deleted script '{}'", name);
        Ok(true)
    }
}

/// Case-insensitive order; names differing only in case keep a stable,
/// case-sensitive tie-break.
pub fn sort_names(names: &mut [String]) {
    names.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_is_case_insensitive() {
        let mut names = vec!["b.lua".to_string(), "A.lua".to_string(), "c.lua".to_string()];
        sort_names(&mut names);
        assert_eq!(names, vec!["A.lua", "b.lua", "c.lua"]);
    }

    #[test]
    fn sort_breaks_case_ties_deterministically() {
        let mut names = vec!["a".to_string(), "A".to_string()];
        sort_names(&mut names);
        assert_eq!(names, vec!["A", "a"]);
    }
}
