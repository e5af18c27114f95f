// Scripted in-memory `CatalogApi` for unit and session tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::{Duration, sleep};

use crate::api::CatalogApi;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::models::{
    Category, Listing, ListingPage, NewFilterPreset, PopularSearches, SavedFilterPreset,
    SearchRequest, Subcategory, SuggestionEntry,
};

pub struct FakeApi {
    pub total_count: u64,
    pub authenticated: bool,
    pub searches: Mutex<Vec<SearchRequest>>,
    pub suggest_calls: Mutex<Vec<String>>,
    pub tracked: Mutex<Vec<String>>,
    pub popular_calls: AtomicUsize,
    pub preset_list_calls: AtomicUsize,
    pub presets: Mutex<Vec<SavedFilterPreset>>,
    pub favorites: Mutex<HashSet<String>>,
    /// Per-query latency for the listing endpoint, keyed by trimmed query.
    pub search_delays: Mutex<HashMap<String, Duration>>,
    /// Per-page latency for the listing endpoint.
    pub page_delays: Mutex<HashMap<u32, Duration>>,
    pub failing_searches: AtomicUsize,
    /// Every search answers 401 while set.
    pub unauthorized_searches: AtomicBool,
    pub favorites_delay: Mutex<Option<Duration>>,
    pub preset_list_delay: Mutex<Option<Duration>>,
    pub fail_suggest: AtomicBool,
    pub fail_popular: AtomicBool,
    pub fail_favorites: AtomicBool,
    pub fail_track: AtomicBool,
    next_preset_id: AtomicUsize,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            total_count: 45,
            authenticated: true,
            searches: Mutex::new(Vec::new()),
            suggest_calls: Mutex::new(Vec::new()),
            tracked: Mutex::new(Vec::new()),
            popular_calls: AtomicUsize::new(0),
            preset_list_calls: AtomicUsize::new(0),
            presets: Mutex::new(Vec::new()),
            favorites: Mutex::new(HashSet::new()),
            search_delays: Mutex::new(HashMap::new()),
            page_delays: Mutex::new(HashMap::new()),
            failing_searches: AtomicUsize::new(0),
            unauthorized_searches: AtomicBool::new(false),
            favorites_delay: Mutex::new(None),
            preset_list_delay: Mutex::new(None),
            fail_suggest: AtomicBool::new(false),
            fail_popular: AtomicBool::new(false),
            fail_favorites: AtomicBool::new(false),
            fail_track: AtomicBool::new(false),
            next_preset_id: AtomicUsize::new(1),
        }
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            ..Self::default()
        }
    }

    pub fn with_presets(presets: Vec<SavedFilterPreset>) -> Self {
        let api = Self::default();
        *api.presets.lock().unwrap() = presets;
        api
    }

    pub fn delay_query(&self, query: &str, delay: Duration) {
        self.search_delays
            .lock()
            .unwrap()
            .insert(query.to_string(), delay);
    }

    pub fn delay_page(&self, page: u32, delay: Duration) {
        self.page_delays.lock().unwrap().insert(page, delay);
    }

    pub fn delay_favorites(&self, delay: Duration) {
        *self.favorites_delay.lock().unwrap() = Some(delay);
    }

    pub fn delay_preset_list(&self, delay: Duration) {
        *self.preset_list_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_next_searches(&self, count: usize) {
        self.failing_searches.store(count, Ordering::SeqCst);
    }

    pub fn search_log(&self) -> Vec<SearchRequest> {
        self.searches.lock().unwrap().clone()
    }

    pub fn suggest_log(&self) -> Vec<String> {
        self.suggest_calls.lock().unwrap().clone()
    }

    pub fn tracked_log(&self) -> Vec<String> {
        self.tracked.lock().unwrap().clone()
    }

    pub fn page_for(&self, request: &SearchRequest) -> ListingPage {
        let pages = self.total_count.div_ceil(request.page_size as u64) as u32;
        let start = (request.page as u64 - 1) * request.page_size as u64;
        let end = (start + request.page_size as u64).min(self.total_count);
        let tag = request.query.clone().unwrap_or_else(|| "all".to_string());
        let items = (start..end)
            .map(|i| listing(&format!("{}-{}", tag, i)))
            .collect();
        ListingPage {
            items,
            page_number: request.page,
            total_count: self.total_count,
            total_pages: pages,
        }
    }
}

pub fn listing(id: &str) -> Listing {
    Listing {
        id: id.to_string(),
        title: format!("Listing {}", id),
        price: Some(1000.0),
        currency: Some("EUR".to_string()),
        location: None,
        image_url: None,
        created_at: None,
    }
}

pub fn page(number: u32, ids: &[&str], total_count: u64, total_pages: u32) -> ListingPage {
    ListingPage {
        items: ids.iter().map(|id| listing(id)).collect(),
        page_number: number,
        total_count,
        total_pages,
    }
}

#[async_trait]
impl CatalogApi for FakeApi {
    async fn search(&self, request: &SearchRequest) -> DiscoveryResult<ListingPage> {
        self.searches.lock().unwrap().push(request.clone());
        let query = request.query.clone().unwrap_or_default();
        let delay = self.search_delays.lock().unwrap().get(&query).copied();
        let page_delay = self.page_delays.lock().unwrap().get(&request.page).copied();
        if let Some(d) = delay.or(page_delay) {
            sleep(d).await;
        }
        if self.unauthorized_searches.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Unauthenticated);
        }
        let failing = self.failing_searches.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_searches.store(failing - 1, Ordering::SeqCst);
            return Err(DiscoveryError::Network("connection reset".into()));
        }
        Ok(self.page_for(request))
    }

    async fn list_categories(&self) -> DiscoveryResult<Vec<Category>> {
        Ok(vec![Category {
            id: "auto".to_string(),
            name: "Cars".to_string(),
            subcategories: vec![Subcategory {
                id: "sedans".to_string(),
                name: "Sedans".to_string(),
            }],
        }])
    }

    async fn suggest(
        &self,
        query: &str,
        _category_id: &str,
        limit: usize,
    ) -> DiscoveryResult<Vec<SuggestionEntry>> {
        self.suggest_calls.lock().unwrap().push(query.to_string());
        if self.fail_suggest.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Network("suggest down".into()));
        }
        Ok((0..limit + 2)
            .map(|i| SuggestionEntry {
                query: format!("{} {}", query, i),
                count: 100 - i as u64,
            })
            .collect())
    }

    async fn popular(&self, _category_id: &str, _limit: usize) -> DiscoveryResult<PopularSearches> {
        self.popular_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_popular.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Network("popular down".into()));
        }
        Ok(PopularSearches {
            global: vec!["iphone".to_string()],
            category: vec!["golf".to_string(), "corolla".to_string()],
        })
    }

    async fn track_search(&self, query: &str, _category_id: &str) -> DiscoveryResult<()> {
        self.tracked.lock().unwrap().push(query.to_string());
        if self.fail_track.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Network("tracking down".into()));
        }
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    async fn list_presets(&self, category_id: &str) -> DiscoveryResult<Vec<SavedFilterPreset>> {
        self.preset_list_calls.fetch_add(1, Ordering::SeqCst);
        if !self.authenticated {
            return Err(DiscoveryError::Unauthenticated);
        }
        let presets: Vec<SavedFilterPreset> = self
            .presets
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.category_id == category_id)
            .cloned()
            .collect();
        let delay = *self.preset_list_delay.lock().unwrap();
        if let Some(d) = delay {
            sleep(d).await;
        }
        Ok(presets)
    }

    async fn create_preset(&self, preset: &NewFilterPreset) -> DiscoveryResult<SavedFilterPreset> {
        if !self.authenticated {
            return Err(DiscoveryError::Unauthenticated);
        }
        let id = self.next_preset_id.fetch_add(1, Ordering::SeqCst);
        let saved = SavedFilterPreset {
            id: format!("p{}", id),
            name: preset.name.clone(),
            category_id: preset.category_id.clone(),
            filters: preset.filters.clone(),
            is_default: preset.is_default,
            created_at: None,
        };
        let mut presets = self.presets.lock().unwrap();
        if saved.is_default {
            for p in presets.iter_mut().filter(|p| p.category_id == saved.category_id) {
                p.is_default = false;
            }
        }
        presets.push(saved.clone());
        Ok(saved)
    }

    async fn delete_preset(&self, preset_id: &str) -> DiscoveryResult<()> {
        let mut presets = self.presets.lock().unwrap();
        let before = presets.len();
        presets.retain(|p| p.id != preset_id);
        if presets.len() == before {
            return Err(DiscoveryError::NotFound(preset_id.to_string()));
        }
        Ok(())
    }

    async fn list_favorites(&self) -> DiscoveryResult<Vec<String>> {
        // Snapshot first, so a slow answer can be older than later toggles
        let mut ids: Vec<String> = self.favorites.lock().unwrap().iter().cloned().collect();
        ids.sort();
        let delay = *self.favorites_delay.lock().unwrap();
        if let Some(d) = delay {
            sleep(d).await;
        }
        Ok(ids)
    }

    async fn add_favorite(&self, listing_id: &str) -> DiscoveryResult<()> {
        if self.fail_favorites.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Network("favorites down".into()));
        }
        self.favorites.lock().unwrap().insert(listing_id.to_string());
        Ok(())
    }

    async fn remove_favorite(&self, listing_id: &str) -> DiscoveryResult<()> {
        if self.fail_favorites.load(Ordering::SeqCst) {
            return Err(DiscoveryError::Network("favorites down".into()));
        }
        self.favorites.lock().unwrap().remove(listing_id);
        Ok(())
    }
}
