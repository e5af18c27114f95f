// Remote collaborators of the discovery session.
//
// The session only ever talks to the backend through `CatalogApi`, so
// tests and alternative transports can stand in for the HTTP adapter.

use async_trait::async_trait;

use crate::error::DiscoveryResult;
use crate::models::{
    Category, ListingPage, NewFilterPreset, PopularSearches, SavedFilterPreset, SearchRequest,
    SuggestionEntry,
};

pub mod http;

pub use http::HttpCatalogApi;

#[async_trait]
pub trait CatalogApi: Send + Sync + 'static {
    /// Authoritative listing query.
    async fn search(&self, request: &SearchRequest) -> DiscoveryResult<ListingPage>;

    async fn list_categories(&self) -> DiscoveryResult<Vec<Category>>;

    async fn suggest(
        &self,
        query: &str,
        category_id: &str,
        limit: usize,
    ) -> DiscoveryResult<Vec<SuggestionEntry>>;

    async fn popular(&self, category_id: &str, limit: usize) -> DiscoveryResult<PopularSearches>;

    /// Fire-and-forget analytics of a settled search; the response is ignored.
    async fn track_search(&self, query: &str, category_id: &str) -> DiscoveryResult<()>;

    /// Whether calls needing a signed-in user can succeed.
    fn is_authenticated(&self) -> bool;

    async fn list_presets(&self, category_id: &str) -> DiscoveryResult<Vec<SavedFilterPreset>>;

    async fn create_preset(&self, preset: &NewFilterPreset) -> DiscoveryResult<SavedFilterPreset>;

    async fn delete_preset(&self, preset_id: &str) -> DiscoveryResult<()>;

    async fn list_favorites(&self) -> DiscoveryResult<Vec<String>>;

    async fn add_favorite(&self, listing_id: &str) -> DiscoveryResult<()>;

    async fn remove_favorite(&self, listing_id: &str) -> DiscoveryResult<()>;
}
