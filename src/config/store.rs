//! Key/value stores for persisted settings.
//!
//! Stream formats are persisted as flat ordered string lists under a string
//! key. The store is always passed in explicitly; there is no process-wide
//! settings object.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Storage for ordered string lists keyed by name.
pub trait ConfigStore {
    /// Returns the list stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get_list(&self, key: &str) -> Result<Option<Vec<String>>>;

    /// Stores `values` under `key`, replacing any previous list.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set_list(&mut self, key: &str, values: Vec<String>) -> Result<()>;

    /// Removes `key`. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn remove(&mut self, key: &str) -> Result<bool>;

    /// Returns every stored key in sorted order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn keys(&self) -> Result<Vec<String>>;
}

/// In-memory store, used by tests and embedders that manage persistence themselves.
#[derive(Debug, Default, Clone)]
pub struct MemoryConfigStore {
    entries: BTreeMap<String, Vec<String>>,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set_list(&mut self, key: &str, values: Vec<String>) -> Result<()> {
        self.entries.insert(key.to_string(), values);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

/// On-disk layout of a [`TomlConfigStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    entries: BTreeMap<String, Vec<String>>,
}

/// TOML file backed store.
///
/// The whole file is rewritten on every mutation through a sibling temp
/// file followed by a rename.
#[derive(Debug)]
pub struct TomlConfigStore {
    path: PathBuf,
    file: StoreFile,
}

impl TomlConfigStore {
    /// Opens the store at `path`, starting empty when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::operation("read_format_store", e))?;
            toml::from_str(&contents).map_err(|e| Error::operation("parse_format_store", e))?
        } else {
            StoreFile::default()
        };
        Ok(Self { path, file })
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::operation("create_format_store_dir", e))?;
            }
        }
        let contents = toml::to_string_pretty(&self.file)
            .map_err(|e| Error::operation("serialize_format_store", e))?;
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, contents).map_err(|e| Error::operation("write_format_store", e))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::operation("replace_format_store", e))?;
        Ok(())
    }
}

impl ConfigStore for TomlConfigStore {
    fn get_list(&self, key: &str) -> Result<Option<Vec<String>>> {
        Ok(self.file.entries.get(key).cloned())
    }

    fn set_list(&mut self, key: &str, values: Vec<String>) -> Result<()> {
        self.file.entries.insert(key.to_string(), values);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        let existed = self.file.entries.remove(key).is_some();
        if existed {
            self.flush()?;
        }
        Ok(existed)
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.file.entries.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryConfigStore::new();
        assert!(store.get_list("a").unwrap().is_none());

        store
            .set_list("a", vec!["1".to_string(), "x".to_string()])
            .unwrap();
        assert_eq!(
            store.get_list("a").unwrap(),
            Some(vec!["1".to_string(), "x".to_string()])
        );
        assert_eq!(store.keys().unwrap(), vec!["a".to_string()]);
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
    }

    #[test]
    fn test_toml_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("formats.toml");

        let mut store = TomlConfigStore::open(&path).unwrap();
        store
            .set_list(
                "Bank-Import-format",
                vec!["16".to_string(), String::new(), "59".to_string()],
            )
            .unwrap();
        drop(store);

        let reopened = TomlConfigStore::open(&path).unwrap();
        assert_eq!(
            reopened.get_list("Bank-Import-format").unwrap(),
            Some(vec!["16".to_string(), String::new(), "59".to_string()])
        );
        assert!(!path.with_extension("toml.tmp").exists());
    }

    #[test]
    fn test_toml_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("formats.toml");
        std::fs::write(&path, "entries = 12").unwrap();
        assert!(TomlConfigStore::open(&path).is_err());
    }
}
