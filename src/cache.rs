use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Flat key-value cache for derived data.
///
/// Owners call [`CachePort::invalidate`] next to every write the cached value
/// depends on. Nothing expires on its own.
pub trait CachePort {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), CacheError>;
    fn invalidate(&mut self, key: &str) -> Result<(), CacheError>;

    /// Decodes a cached JSON value. Undecodable entries count as misses.
    fn get_json<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T>
    where
        Self: Sized,
    {
        let raw = self.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("ignoring undecodable cache entry {}: {}", key, e);
                None
            }
        }
    }

    fn set_json<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), CacheError>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw)
    }
}

impl<T: CachePort + ?Sized> CachePort for Box<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), CacheError> {
        (**self).set(key, value)
    }

    fn invalidate(&mut self, key: &str) -> Result<(), CacheError> {
        (**self).invalidate(key)
    }
}

/// Process-local cache.
#[derive(Debug, Default, Clone)]
pub struct MemoryCache {
    entries: HashMap<String, String>,
}

impl MemoryCache {
    pub fn new() -> Self {
        MemoryCache::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CachePort for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn invalidate(&mut self, key: &str) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Cache persisted as one JSON object on disk, rewritten on every change.
///
/// Survives restarts the way per-user properties do.
#[derive(Debug)]
pub struct JsonFileCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileCache {
    /// Opens the cache file, creating an empty one if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            BTreeMap::new()
        };
        let cache = JsonFileCache { path, entries };
        cache.flush()?;
        Ok(cache)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        let mut file = File::create(&self.path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

impl CachePort for JsonFileCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn invalidate(&mut self, key: &str) -> Result<(), CacheError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_removes_entry() {
        let mut cache = MemoryCache::new();
        cache.set_json("CACHED_CATEGORIES", &vec!["Food", "Rent"]).unwrap();
        let cached: Vec<String> = cache.get_json("CACHED_CATEGORIES").unwrap();
        assert_eq!(cached, vec!["Food", "Rent"]);
        cache.invalidate("CACHED_CATEGORIES").unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn undecodable_entries_are_misses() {
        let mut cache = MemoryCache::new();
        cache.set("k", "not json".to_string()).unwrap();
        assert_eq!(cache.get_json::<Vec<String>>("k"), None);
    }

    #[test]
    fn file_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("props").join("cache.json");
        {
            let mut cache = JsonFileCache::open(&path).unwrap();
            cache.set("ACTIVE_CATEGORIES", "[\"Food\"]".to_string()).unwrap();
        }
        let reopened = JsonFileCache::open(&path).unwrap();
        assert_eq!(reopened.get("ACTIVE_CATEGORIES").as_deref(), Some("[\"Food\"]"));
    }
}
