// Autocomplete and trending-search lookups.
// Both are advisory: any failure degrades to an empty list and is only logged.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::api::CatalogApi;
use crate::models::{PopularSearches, SuggestionEntry};

pub const DEFAULT_SUGGESTION_LIMIT: usize = 5;

#[derive(Clone)]
pub struct SuggestionFetcher {
    api: Arc<dyn CatalogApi>,
    limit: usize,
}

impl SuggestionFetcher {
    pub fn new(api: Arc<dyn CatalogApi>, limit: usize) -> Self {
        Self { api, limit }
    }

    /// Server ordering is trusted; the client only enforces the cap.
    pub async fn fetch(&self, query: &str, category_id: &str) -> Vec<SuggestionEntry> {
        match self.api.suggest(query, category_id, self.limit).await {
            Ok(mut entries) => {
                entries.truncate(self.limit);
                debug!(query, category_id, count = entries.len(), "Fetched suggestions");
                entries
            }
            Err(e) => {
                warn!(query, category_id, error = %e, "Suggestion lookup failed");
                Vec::new()
            }
        }
    }
}

/// Trending queries, fetched at most once per session.
pub struct PopularSearchFetcher {
    api: Arc<dyn CatalogApi>,
    limit: usize,
    cache: OnceCell<PopularSearches>,
}

impl PopularSearchFetcher {
    pub fn new(api: Arc<dyn CatalogApi>, limit: usize) -> Self {
        Self {
            api,
            limit,
            cache: OnceCell::new(),
        }
    }

    // A failed fetch caches the empty value too, so the session never asks twice
    pub async fn get(&self, category_id: &str) -> PopularSearches {
        self.cache
            .get_or_init(|| async {
                match self.api.popular(category_id, self.limit).await {
                    Ok(popular) => popular,
                    Err(e) => {
                        warn!(category_id, error = %e, "Popular searches unavailable");
                        PopularSearches::default()
                    }
                }
            })
            .await
            .clone()
    }

    pub fn cached(&self) -> Option<&PopularSearches> {
        self.cache.get()
    }
}
