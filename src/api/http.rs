// reqwest adapter for the marketplace REST API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio::time::{sleep, Duration};

use super::CatalogApi;
use crate::config::Settings;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{
    Category, Listing, ListingPage, NewFilterPreset, PopularSearches, SavedFilterPreset,
    SearchRequest, SuggestionEntry,
};

const USER_AGENT: &str = concat!("catalog-discovery/", env!("CARGO_PKG_VERSION"));

// Wire shape of the listing endpoint
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Listing>,
    #[serde(default)]
    total: u64,
    page: u32,
    #[serde(default)]
    pages: u32,
}

impl From<SearchResponse> for ListingPage {
    fn from(response: SearchResponse) -> Self {
        ListingPage {
            items: response.items,
            page_number: response.page,
            total_count: response.total,
            total_pages: response.pages,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteRecord {
    listing_id: String,
}

pub struct HttpCatalogApi {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
    retries: u32,
    retry_delay: Duration,
}

impl HttpCatalogApi {
    pub fn new(client: Client, settings: &Settings) -> Self {
        Self {
            client,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            auth_token: settings.auth_token.clone().filter(|t| !t.is_empty()),
            retries: settings.request_retries.max(1),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
        }
    }

    // Shared client with a consistent user agent
    pub fn build_client() -> DiscoveryResult<Client> {
        Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(DiscoveryError::from)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // GET with retries and exponential backoff; only transport errors and 5xx retry
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> DiscoveryResult<T> {
        let url = self.url(path);
        let mut retry_delay = self.retry_delay;
        let mut last_error = DiscoveryError::Network(format!("no attempt made for {}", url));

        for attempt in 0..self.retries {
            tracing::debug!(url = %url, attempt, "GET attempt {}/{}", attempt + 1, self.retries);
            let request = self.authorized(self.client.get(&url).query(query));

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if let Some(err) = status_error(status, &url) {
                        if !status.is_server_error() {
                            return Err(err);
                        }
                        tracing::warn!(url = %url, attempt, status = %status, "Server error. Retrying...");
                        last_error = err;
                    } else {
                        let bytes = response.bytes().await?;
                        return serde_json::from_slice::<T>(&bytes).map_err(DiscoveryError::from);
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %url, attempt, error = %e, "Network error during request. Retrying...");
                    last_error = e.into();
                }
            }

            if attempt + 1 < self.retries {
                sleep(retry_delay).await;
                retry_delay *= 2;
            }
        }

        Err(last_error)
    }

    // Mutations are attempted once
    async fn send_once(&self, builder: RequestBuilder, url: &str) -> DiscoveryResult<reqwest::Response> {
        let response = self.authorized(builder).send().await?;
        match status_error(response.status(), url) {
            Some(err) => Err(err),
            None => Ok(response),
        }
    }

    fn require_auth(&self) -> DiscoveryResult<()> {
        if self.auth_token.is_some() {
            Ok(())
        } else {
            Err(DiscoveryError::Unauthenticated)
        }
    }
}

fn status_error(status: StatusCode, url: &str) -> Option<DiscoveryError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DiscoveryError::Unauthenticated,
        StatusCode::NOT_FOUND => DiscoveryError::NotFound(url.to_string()),
        _ => DiscoveryError::Network(format!("{} returned {}", url, status)),
    })
}

/// Query string for the listing endpoint. Facets go out as `filters[key]=value`.
pub fn search_query_pairs(request: &SearchRequest) -> Vec<(String, String)> {
    let mut pairs = vec![
        ("category".to_string(), request.category_id.clone()),
        ("page".to_string(), request.page.to_string()),
        ("pageSize".to_string(), request.page_size.to_string()),
        ("sort".to_string(), request.sort.to_string()),
    ];
    if let Some(sub) = &request.subcategory_id {
        pairs.push(("subcategory".to_string(), sub.clone()));
    }
    if let Some(q) = &request.query {
        pairs.push(("q".to_string(), q.clone()));
    }
    if let Some(min) = request.price_min {
        pairs.push(("priceMin".to_string(), min.to_string()));
    }
    if let Some(max) = request.price_max {
        pairs.push(("priceMax".to_string(), max.to_string()));
    }
    if let Some(condition) = &request.condition {
        pairs.push(("condition".to_string(), condition.clone()));
    }
    for (key, value) in &request.filters {
        pairs.push((format!("filters[{}]", key), value.clone()));
    }
    pairs
}

#[async_trait]
impl CatalogApi for HttpCatalogApi {
    async fn search(&self, request: &SearchRequest) -> DiscoveryResult<ListingPage> {
        let response: SearchResponse = self
            .get_json("listings/search", &search_query_pairs(request))
            .await?;
        Ok(response.into())
    }

    async fn list_categories(&self) -> DiscoveryResult<Vec<Category>> {
        self.get_json("categories", &[]).await
    }

    async fn suggest(
        &self,
        query: &str,
        category_id: &str,
        limit: usize,
    ) -> DiscoveryResult<Vec<SuggestionEntry>> {
        let params = [
            ("q".to_string(), query.to_string()),
            ("category".to_string(), category_id.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        self.get_json("search/suggestions", &params).await
    }

    async fn popular(&self, category_id: &str, limit: usize) -> DiscoveryResult<PopularSearches> {
        let params = [
            ("category".to_string(), category_id.to_string()),
            ("limit".to_string(), limit.to_string()),
        ];
        self.get_json("search/popular", &params).await
    }

    async fn track_search(&self, query: &str, category_id: &str) -> DiscoveryResult<()> {
        let url = self.url("search/track");
        let body = json!({ "query": query, "categoryId": category_id });
        self.send_once(self.client.post(&url).json(&body), &url).await?;
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.auth_token.is_some()
    }

    async fn list_presets(&self, category_id: &str) -> DiscoveryResult<Vec<SavedFilterPreset>> {
        self.require_auth()?;
        let params = [("category".to_string(), category_id.to_string())];
        self.get_json("saved-filters", &params).await
    }

    async fn create_preset(&self, preset: &NewFilterPreset) -> DiscoveryResult<SavedFilterPreset> {
        self.require_auth()?;
        let url = self.url("saved-filters");
        let response = self.send_once(self.client.post(&url).json(preset), &url).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(DiscoveryError::from)
    }

    async fn delete_preset(&self, preset_id: &str) -> DiscoveryResult<()> {
        self.require_auth()?;
        let url = self.url(&format!("saved-filters/{}", preset_id));
        self.send_once(self.client.delete(&url), &url).await?;
        Ok(())
    }

    async fn list_favorites(&self) -> DiscoveryResult<Vec<String>> {
        self.require_auth()?;
        let records: Vec<FavoriteRecord> = self.get_json("favorites", &[]).await?;
        Ok(records.into_iter().map(|r| r.listing_id).collect())
    }

    async fn add_favorite(&self, listing_id: &str) -> DiscoveryResult<()> {
        self.require_auth()?;
        let url = self.url(&format!("favorites/{}", listing_id));
        self.send_once(self.client.post(&url), &url).await?;
        Ok(())
    }

    async fn remove_favorite(&self, listing_id: &str) -> DiscoveryResult<()> {
        self.require_auth()?;
        let url = self.url(&format!("favorites/{}", listing_id));
        self.send_once(self.client.delete(&url), &url).await?;
        Ok(())
    }
}
