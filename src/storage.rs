// Durable key-value storage used by the recent-search history.
//
// Values are opaque strings (the history serializes itself as JSON).
// Writes are synchronous so a mutation is on disk before the call returns.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{DiscoveryError, DiscoveryResult};

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> DiscoveryResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> DiscoveryResult<()>;
    fn remove(&self, key: &str) -> DiscoveryResult<()>;
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }
}

// Percent-escapes everything outside [A-Za-z0-9_-] so distinct keys never
// share a file
fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("%{:02X}", byte));
        }
    }
    stem
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> DiscoveryResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> DiscoveryResult<()> {
        fs::create_dir_all(&self.dir)?;
        // Write to a sibling temp file first so a crash never leaves half a file
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> DiscoveryResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> DiscoveryResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| DiscoveryError::Storage("memory store poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> DiscoveryResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DiscoveryError::Storage("memory store poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> DiscoveryResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| DiscoveryError::Storage("memory store poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}
