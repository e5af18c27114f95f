// The catalog screen's discovery session.
//
// One tokio task owns every piece of session state (filters, pagination,
// history, presets, favorites) and processes inputs, debounce deadlines,
// and finished network calls one at a time. Network calls run on spawned
// tasks and report back through a channel, tagged with the generation they
// were issued under; nothing else ever writes session state.
//
// The latest `RenderModel` is published on a `watch` channel after each
// step.

use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::api::CatalogApi;
use crate::config::Settings;
use crate::error::DiscoveryResult;
use crate::favorites::{FavoriteChange, Favorites};
use crate::models::{
    Category, LayoutMode, ListingPage, PopularSearches, SavedFilterPreset, SortKey,
    SuggestionEntry,
};
use crate::orchestrator::{Command, SearchOrchestrator, SearchOutcome, Timings};
use crate::presets::{self, SavedFilterPresetManager};
use crate::recent::RecentSearchStore;
use crate::storage::KeyValueStore;
use crate::suggest::{PopularSearchFetcher, SuggestionFetcher};
use crate::view::{self, ComposeInput, RenderModel};

#[cfg(test)]
mod tests;

/// Everything the screen can ask the session to do.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    QueryEdited(String),
    QueryFocus(bool),
    SetAttribute { key: String, value: Option<String> },
    SetPriceRange { min: Option<u64>, max: Option<u64> },
    SetCondition(Option<String>),
    SetSubcategory(Option<String>),
    SetSort(SortKey),
    ClearFilters,
    LoadMore,
    Retry,
    ApplyPreset(String),
    SavePreset { name: String, is_default: bool },
    DeletePreset(String),
    ToggleFavorite(String),
    RemoveRecent(String),
    ClearRecent,
    SetLayout { wide: bool },
    Shutdown,
}

// Results of spawned calls, fed back into the session loop
enum Completion {
    Search {
        generation: u64,
        page: u32,
        result: DiscoveryResult<ListingPage>,
    },
    Suggestions {
        generation: u64,
        entries: Vec<SuggestionEntry>,
    },
    Popular(PopularSearches),
    Categories(DiscoveryResult<Vec<Category>>),
    Favorites(DiscoveryResult<Vec<String>>),
    InitialPresets(DiscoveryResult<Vec<SavedFilterPreset>>),
    PresetsChanged(DiscoveryResult<Vec<SavedFilterPreset>>),
    FavoriteFailed(FavoriteChange),
}

pub struct SessionHandle {
    inputs: mpsc::UnboundedSender<SessionInput>,
    view: watch::Receiver<RenderModel>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Returns false once the session has stopped.
    pub fn send(&self, input: SessionInput) -> bool {
        self.inputs.send(input).is_ok()
    }

    pub fn view(&self) -> watch::Receiver<RenderModel> {
        self.view.clone()
    }

    pub fn current(&self) -> RenderModel {
        self.view.borrow().clone()
    }

    pub async fn shutdown(self) {
        let _ = self.inputs.send(SessionInput::Shutdown);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Session task ended abnormally");
        }
    }
}

pub struct Session {
    api: Arc<dyn CatalogApi>,
    category_id: String,
    timings: Timings,
    orchestrator: SearchOrchestrator,
    recent: RecentSearchStore,
    suggestions: SuggestionFetcher,
    popular_fetcher: Arc<PopularSearchFetcher>,
    popular: Option<PopularSearches>,
    preset_manager: SavedFilterPresetManager,
    presets: Vec<SavedFilterPreset>,
    default_preset_checked: bool,
    favorites: Favorites,
    categories: Vec<Category>,
    layout: LayoutMode,
    query_focused: bool,
    notice: Option<String>,
    completions: mpsc::UnboundedSender<Completion>,
    view: watch::Sender<RenderModel>,
}

impl Session {
    /// Loads history, spawns the session loop, and returns its handle.
    pub fn start(
        api: Arc<dyn CatalogApi>,
        storage: Arc<dyn KeyValueStore>,
        settings: &Settings,
    ) -> SessionHandle {
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(RenderModel::default());

        let category_id = settings.category_id.clone();
        let timings = settings.timings();
        let session = Session {
            orchestrator: SearchOrchestrator::new(&category_id, timings),
            recent: RecentSearchStore::load(storage, &category_id, settings.recent_capacity),
            suggestions: SuggestionFetcher::new(api.clone(), settings.suggestion_limit),
            popular_fetcher: Arc::new(PopularSearchFetcher::new(api.clone(), settings.popular_limit)),
            popular: None,
            preset_manager: SavedFilterPresetManager::new(api.clone(), &category_id),
            presets: Vec::new(),
            default_preset_checked: false,
            favorites: Favorites::new(),
            categories: Vec::new(),
            layout: LayoutMode::default(),
            query_focused: false,
            notice: None,
            completions: completion_tx,
            view: view_tx,
            api,
            category_id,
            timings,
        };

        let task = tokio::spawn(session.run(input_rx, completion_rx));
        SessionHandle {
            inputs: input_tx,
            view: view_rx,
            task,
        }
    }

    async fn run(
        mut self,
        mut inputs: mpsc::UnboundedReceiver<SessionInput>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
    ) {
        info!(category_id = %self.category_id, "Discovery session started");
        self.bootstrap();
        self.step();

        loop {
            let deadline = self.orchestrator.next_deadline();
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(SessionInput::Shutdown) | None => break,
                    Some(input) => self.handle_input(input),
                },
                Some(done) = completions.recv() => self.handle_completion(done),
                _ = wait_until(deadline) => {}
            }
            self.step();
        }

        info!(category_id = %self.category_id, "Discovery session closed");
    }

    // Session-entry fetches plus the initial search for the empty filter state
    fn bootstrap(&mut self) {
        let tx = self.completions.clone();
        let api = self.api.clone();
        let popular = self.popular_fetcher.clone();
        let category_id = self.category_id.clone();
        // Each result is delivered as soon as it resolves
        tokio::spawn(async move {
            futures::join!(
                async {
                    let popular = popular.get(&category_id).await;
                    let _ = tx.send(Completion::Popular(popular));
                },
                async {
                    let categories = api.list_categories().await;
                    let _ = tx.send(Completion::Categories(categories));
                },
                async {
                    let favorites = if api.is_authenticated() {
                        api.list_favorites().await
                    } else {
                        Ok(Vec::new())
                    };
                    let _ = tx.send(Completion::Favorites(favorites));
                }
            );
        });

        let tx = self.completions.clone();
        let manager = self.preset_manager.clone();
        tokio::spawn(async move {
            let _ = tx.send(Completion::InitialPresets(manager.list().await));
        });

        let initial = self.orchestrator.filters().clone();
        self.orchestrator.replace_filters(initial, Instant::now());
    }

    // Fire elapsed debounce windows, then publish
    fn step(&mut self) {
        let commands = self.orchestrator.poll(Instant::now());
        for command in commands {
            self.dispatch(command);
        }
        self.publish();
    }

    fn dispatch(&self, command: Command) {
        let tx = self.completions.clone();
        match command {
            Command::Search(ticket) => {
                let api = self.api.clone();
                tokio::spawn(async move {
                    let result = api.search(&ticket.request).await;
                    let _ = tx.send(Completion::Search {
                        generation: ticket.generation,
                        page: ticket.request.page,
                        result,
                    });
                });
            }
            Command::Suggest(ticket) => {
                let fetcher = self.suggestions.clone();
                let category_id = self.category_id.clone();
                tokio::spawn(async move {
                    let entries = fetcher.fetch(&ticket.query, &category_id).await;
                    let _ = tx.send(Completion::Suggestions {
                        generation: ticket.generation,
                        entries,
                    });
                });
            }
        }
    }

    fn handle_input(&mut self, input: SessionInput) {
        debug!(?input, "Session input");
        let now = Instant::now();
        self.notice = None;

        match input {
            SessionInput::QueryEdited(text) => self.orchestrator.edit_query(&text, now),
            SessionInput::QueryFocus(focused) => self.query_focused = focused,
            SessionInput::SetAttribute { key, value } => {
                self.orchestrator
                    .edit_filters(|f| f.set_attribute(&key, value.as_deref()), now);
            }
            SessionInput::SetPriceRange { min, max } => {
                self.orchestrator
                    .edit_filters(|f| f.set_price_range(min, max), now);
            }
            SessionInput::SetCondition(condition) => {
                self.orchestrator
                    .edit_filters(|f| f.set_condition(condition.as_deref()), now);
            }
            SessionInput::SetSubcategory(subcategory) => {
                self.orchestrator
                    .edit_filters(|f| f.set_subcategory(subcategory.as_deref()), now);
            }
            SessionInput::SetSort(sort) => {
                self.orchestrator.edit_filters(|f| f.sort_key = sort, now);
            }
            SessionInput::ClearFilters => {
                self.orchestrator.edit_filters(|f| f.clear_filters(), now);
            }
            SessionInput::LoadMore => {
                if let Some(command) = self.orchestrator.load_more() {
                    self.dispatch(command);
                }
            }
            SessionInput::Retry => {
                if let Some(command) = self.orchestrator.retry(now) {
                    self.dispatch(command);
                }
            }
            SessionInput::ApplyPreset(id) => self.apply_preset(&id, now),
            SessionInput::SavePreset { name, is_default } => self.save_preset(&name, is_default),
            SessionInput::DeletePreset(id) => {
                let tx = self.completions.clone();
                let manager = self.preset_manager.clone();
                tokio::spawn(async move {
                    let _ = tx.send(Completion::PresetsChanged(manager.delete(&id).await));
                });
            }
            SessionInput::ToggleFavorite(listing_id) => {
                let change = self.favorites.toggle(&listing_id);
                let tx = self.completions.clone();
                let api = self.api.clone();
                tokio::spawn(async move {
                    if let Err(e) = change.send(api.as_ref()).await {
                        warn!(listing_id = %change.listing_id, error = %e, "Favorite toggle failed");
                        let _ = tx.send(Completion::FavoriteFailed(change));
                    }
                });
            }
            SessionInput::RemoveRecent(text) => {
                self.recent.remove(&text);
            }
            SessionInput::ClearRecent => self.recent.clear(),
            SessionInput::SetLayout { wide } => self.layout = LayoutMode::from_viewport(wide),
            // Handled by the loop
            SessionInput::Shutdown => {}
        }
    }

    fn handle_completion(&mut self, done: Completion) {
        match done {
            Completion::Search {
                generation,
                page,
                result,
            } => {
                let outcome = self.orchestrator.apply_search(generation, page, result);
                if let SearchOutcome::Applied {
                    settled_query: Some(query),
                } = outcome
                {
                    self.recent.record(&query);
                    self.track(query);
                }
            }
            Completion::Suggestions {
                generation,
                entries,
            } => {
                self.orchestrator.apply_suggestions(generation, entries);
            }
            Completion::Popular(popular) => self.popular = Some(popular),
            Completion::Categories(Ok(categories)) => self.categories = categories,
            Completion::Categories(Err(e)) => {
                warn!(error = %e, "Category metadata unavailable; showing raw ids");
            }
            Completion::Favorites(Ok(ids)) => self.favorites.replace(ids),
            Completion::Favorites(Err(e)) => {
                warn!(error = %e, "Failed to load favorites");
                // Keep whatever was toggled locally and stop queueing
                self.favorites.replace(Vec::new());
            }
            Completion::InitialPresets(result) => {
                self.set_presets(result);
                self.apply_default_preset();
            }
            Completion::PresetsChanged(result) => self.set_presets(result),
            Completion::FavoriteFailed(change) => self.favorites.revert(&change),
        }
    }

    fn set_presets(&mut self, result: DiscoveryResult<Vec<SavedFilterPreset>>) {
        match result {
            Ok(presets) => self.presets = presets,
            Err(e) => {
                warn!(error = %e, "Filter preset request failed");
                self.notice = Some(format!("Could not update saved filters: {}", e));
            }
        }
    }

    // Only ever considered once, and only while nothing has been chosen yet
    fn apply_default_preset(&mut self) {
        if self.default_preset_checked {
            return;
        }
        self.default_preset_checked = true;
        if !self.orchestrator.filters().is_initial() {
            return;
        }
        if let Some(preset) = presets::default_preset(&self.presets) {
            info!(preset_id = %preset.id, "Applying default filter preset");
            let filters = preset.filters.clone();
            self.orchestrator.replace_filters(filters, Instant::now());
        }
    }

    fn apply_preset(&mut self, id: &str, now: Instant) {
        match self.presets.iter().find(|p| p.id == id) {
            Some(preset) => {
                let filters = preset.filters.clone();
                self.orchestrator.replace_filters(filters, now);
            }
            None => self.notice = Some(format!("Saved filter '{}' not found", id)),
        }
    }

    fn save_preset(&mut self, name: &str, is_default: bool) {
        if let Err(e) = presets::validate_name(name) {
            self.notice = Some(e.to_string());
            return;
        }
        let tx = self.completions.clone();
        let manager = self.preset_manager.clone();
        let name = name.to_string();
        let filters = self.orchestrator.filters().clone();
        tokio::spawn(async move {
            let result = manager.save(&name, &filters, is_default).await;
            let _ = tx.send(Completion::PresetsChanged(result));
        });
    }

    // Fire-and-forget; failures are only logged
    fn track(&self, query: String) {
        let api = self.api.clone();
        let category_id = self.category_id.clone();
        tokio::spawn(async move {
            if let Err(e) = api.track_search(&query, &category_id).await {
                warn!(query = %query, error = %e, "Search tracking failed");
            }
        });
    }

    fn publish(&self) {
        let model = view::compose(&ComposeInput {
            category_id: &self.category_id,
            categories: &self.categories,
            filters: self.orchestrator.filters(),
            pagination: self.orchestrator.pagination(),
            favorites: &self.favorites,
            layout: self.layout,
            query_focused: self.query_focused,
            min_query_len: self.timings.min_query_len,
            suggestions: self.orchestrator.suggestions(),
            recent: self.recent.entries(),
            popular: self.popular.as_ref(),
            presets: &self.presets,
            error: self.orchestrator.error(),
            retryable: self.orchestrator.can_retry(),
            notice: self.notice.as_deref(),
        });
        self.view.send_if_modified(|current| {
            if *current == model {
                false
            } else {
                *current = model;
                true
            }
        });
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
