// Bounded, de-duplicated history of successful searches, scoped per category.
// Loaded once at session start; every mutation writes through to storage.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::DiscoveryError;
use crate::models::RecentSearchEntry;
use crate::storage::KeyValueStore;

pub const DEFAULT_CAPACITY: usize = 5;

pub fn storage_key(category_id: &str) -> String {
    format!("recent_searches:{}", category_id)
}

pub struct RecentSearchStore {
    storage: Arc<dyn KeyValueStore>,
    category_id: String,
    capacity: usize,
    // Most recent first
    entries: Vec<RecentSearchEntry>,
}

impl RecentSearchStore {
    /// Reads the persisted list for `category_id`. Missing or unreadable data
    /// starts an empty history.
    pub fn load(storage: Arc<dyn KeyValueStore>, category_id: &str, capacity: usize) -> Self {
        let key = storage_key(category_id);
        let mut entries = match storage.get(&key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<RecentSearchEntry>>(&raw) {
                Ok(list) => list,
                Err(e) => {
                    warn!(category_id, error = %e, "Discarding malformed recent search history");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(category_id, error = %e, "Failed to read recent search history");
                Vec::new()
            }
        };
        // Older builds may have stored entries for another scope under this key
        entries.retain(|e| e.scope_category_id == category_id);
        entries.truncate(capacity);
        debug!(category_id, count = entries.len(), "Loaded recent searches");

        Self {
            storage,
            category_id: category_id.to_string(),
            capacity,
            entries,
        }
    }

    pub fn entries(&self) -> &[RecentSearchEntry] {
        &self.entries
    }

    pub fn texts(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.text.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Moves `text` to the front, replacing any case-insensitive duplicate.
    /// Blank input is ignored.
    pub fn record(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let lowered = text.to_lowercase();
        self.entries.retain(|e| e.text.to_lowercase() != lowered);
        self.entries.insert(
            0,
            RecentSearchEntry {
                text: text.to_string(),
                scope_category_id: self.category_id.clone(),
            },
        );
        self.entries.truncate(self.capacity);
        self.persist();
    }

    /// Returns whether an entry was removed.
    pub fn remove(&mut self, text: &str) -> bool {
        let lowered = text.trim().to_lowercase();
        let before = self.entries.len();
        if let Some(pos) = self.entries.iter().position(|e| e.text.to_lowercase() == lowered) {
            self.entries.remove(pos);
        }
        let removed = self.entries.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        if let Err(e) = self.storage.remove(&storage_key(&self.category_id)) {
            warn!(category_id = %self.category_id, error = %e, "Failed to clear persisted recent searches");
        }
    }

    // Storage failures only cost durability; the in-memory list stays authoritative
    fn persist(&self) {
        let key = storage_key(&self.category_id);
        let result = serde_json::to_string(&self.entries)
            .map_err(DiscoveryError::from)
            .and_then(|raw| self.storage.set(&key, &raw));
        if let Err(e) = result {
            warn!(category_id = %self.category_id, error = %e, "Failed to persist recent searches");
        }
    }
}
