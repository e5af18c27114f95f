// Turns filter and query edits into debounced, generation-tagged requests.
//
// The orchestrator is a plain state machine driven by an explicit clock:
// callers feed it edits with the time they happened, ask for the next
// deadline, and `poll` it once that deadline passes. It never performs
// I/O itself; it hands out `Command`s and later receives their results
// back together with the generation they were issued under.
//
// Two independent channels share this discipline:
//
// - the authoritative listing search, settled after `search_debounce` of
//   silence on any field;
// - the suggestion side-channel, settled after `suggest_debounce` of
//   silence on the query field, and only for queries of at least
//   `min_query_len` characters.
//
// Every settle bumps the channel's generation. A result whose generation
// is no longer current is discarded, so out-of-order completions can never
// overwrite a newer view.

use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::DiscoveryError;
use crate::models::{FilterState, ListingPage, SearchRequest, SuggestionEntry};
use crate::pagination::PaginationController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub search_debounce: Duration,
    pub suggest_debounce: Duration,
    pub min_query_len: usize,
    pub page_size: u32,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            search_debounce: Duration::from_millis(500),
            suggest_debounce: Duration::from_millis(200),
            min_query_len: 2,
            page_size: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub generation: u64,
    pub request: SearchRequest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestTicket {
    pub generation: u64,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Search(SearchTicket),
    Suggest(SuggestTicket),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// Page accepted. `settled_query` is set for a fresh page 1 whose query
    /// should go into history and search tracking.
    Applied { settled_query: Option<String> },
    /// Right generation, wrong page number.
    Rejected,
    /// Superseded by a newer settle; ignored.
    Stale,
    Failed,
}

pub struct SearchOrchestrator {
    category_id: String,
    timings: Timings,
    filters: FilterState,
    pagination: PaginationController,
    suggestions: Vec<SuggestionEntry>,
    search_deadline: Option<Instant>,
    suggest_deadline: Option<Instant>,
    search_generation: u64,
    suggest_generation: u64,
    // Page-1 request of the current generation; load-more derives from it
    current_request: Option<SearchRequest>,
    // Settled but page 1 not yet applied; previous pages stay visible meanwhile
    awaiting_first_page: bool,
    error: Option<SearchFailure>,
}

// Last failure of the authoritative channel
#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchFailure {
    message: String,
    retryable: bool,
}

impl From<&DiscoveryError> for SearchFailure {
    fn from(error: &DiscoveryError) -> Self {
        SearchFailure {
            message: error.to_string(),
            retryable: error.is_retryable(),
        }
    }
}

impl SearchOrchestrator {
    pub fn new(category_id: &str, timings: Timings) -> Self {
        Self {
            category_id: category_id.to_string(),
            timings,
            filters: FilterState::default(),
            pagination: PaginationController::new(),
            suggestions: Vec::new(),
            search_deadline: None,
            suggest_deadline: None,
            search_generation: 0,
            suggest_generation: 0,
            current_request: None,
            awaiting_first_page: false,
            error: None,
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn pagination(&self) -> &PaginationController {
        &self.pagination
    }

    pub fn suggestions(&self) -> &[SuggestionEntry] {
        &self.suggestions
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_ref().map(|f| f.message.as_str())
    }

    /// Whether the current error is transient and `retry` will act on it.
    pub fn can_retry(&self) -> bool {
        self.error.as_ref().is_some_and(|f| f.retryable)
    }

    pub fn search_generation(&self) -> u64 {
        self.search_generation
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.search_deadline, self.suggest_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Free-text edit. Restarts both debounce windows; a query shorter than
    /// `min_query_len` clears suggestions right away and cancels any lookup
    /// still in flight.
    pub fn edit_query(&mut self, text: &str, now: Instant) {
        let previous = self.filters.normalized_query().to_string();
        self.filters.query = text.to_string();
        let query = self.filters.normalized_query();
        if query == previous {
            return;
        }

        self.search_deadline = Some(now + self.timings.search_debounce);
        if query.chars().count() >= self.timings.min_query_len {
            self.suggest_deadline = Some(now + self.timings.suggest_debounce);
        } else {
            self.clear_suggestions();
        }
    }

    /// Mutates filter fields other than the query. Returns whether anything
    /// changed; unchanged edits do not restart the debounce window.
    pub fn edit_filters<F>(&mut self, edit: F, now: Instant) -> bool
    where
        F: FnOnce(&mut FilterState),
    {
        let before = self.filters.clone();
        edit(&mut self.filters);
        let changed = self.filters != before;
        if changed {
            self.search_deadline = Some(now + self.timings.search_debounce);
        }
        changed
    }

    /// Wholesale replacement (applying a preset). Settles on the next poll
    /// without waiting for the debounce window.
    pub fn replace_filters(&mut self, filters: FilterState, now: Instant) {
        self.filters = filters;
        self.search_deadline = Some(now);
        self.clear_suggestions();
    }

    /// Re-issues the failed request. A failed page 1 settles again under a
    /// fresh generation; a failed later page is requested again. Permanent
    /// failures (auth, missing resource) are left alone.
    pub fn retry(&mut self, now: Instant) -> Option<Command> {
        if !self.can_retry() {
            return None;
        }
        if self.awaiting_first_page || self.current_request.is_none() {
            self.search_deadline = Some(now);
            None
        } else {
            self.load_more()
        }
    }

    /// Next page of the current generation, if one can be fetched now.
    pub fn load_more(&mut self) -> Option<Command> {
        if self.awaiting_first_page {
            return None;
        }
        let request = self.current_request.as_ref()?;
        let page = self.pagination.begin_load_more()?;
        self.error = None;
        debug!(generation = self.search_generation, page, "Loading more");
        Some(Command::Search(SearchTicket {
            generation: self.search_generation,
            request: request.for_page(page),
        }))
    }

    /// Fires every debounce window that has elapsed by `now`.
    pub fn poll(&mut self, now: Instant) -> Vec<Command> {
        let mut commands = Vec::new();

        if self.suggest_deadline.is_some_and(|d| d <= now) {
            self.suggest_deadline = None;
            let query = self.filters.normalized_query().to_string();
            if query.chars().count() >= self.timings.min_query_len {
                self.suggest_generation += 1;
                debug!(generation = self.suggest_generation, query = %query, "Suggestion lookup settled");
                commands.push(Command::Suggest(SuggestTicket {
                    generation: self.suggest_generation,
                    query,
                }));
            }
        }

        if self.search_deadline.is_some_and(|d| d <= now) {
            self.search_deadline = None;
            self.search_generation += 1;
            let request = self
                .filters
                .to_request(&self.category_id, 1, self.timings.page_size);
            info!(generation = self.search_generation, query = ?request.query, "Search settled");
            self.current_request = Some(request.clone());
            self.awaiting_first_page = true;
            self.error = None;
            self.pagination.expect_first_page();
            commands.push(Command::Search(SearchTicket {
                generation: self.search_generation,
                request,
            }));
        }

        commands
    }

    /// Applies the result of a search ticket.
    pub fn apply_search(
        &mut self,
        generation: u64,
        requested_page: u32,
        result: Result<ListingPage, DiscoveryError>,
    ) -> SearchOutcome {
        if generation != self.search_generation {
            debug!(generation, current = self.search_generation, "Discarding stale search response");
            return SearchOutcome::Stale;
        }

        let page = match result {
            Ok(page) => page,
            Err(e) => {
                warn!(generation, page = requested_page, error = %e, "Search request failed");
                self.pagination.fail_load_more();
                self.error = Some(SearchFailure::from(&e));
                return SearchOutcome::Failed;
            }
        };

        if requested_page == 1 && self.awaiting_first_page {
            if page.page_number != 1 {
                warn!(generation, received = page.page_number, "First page response carried another page number");
                self.pagination.fail_load_more();
                self.error = Some(SearchFailure::from(&DiscoveryError::Decode(format!(
                    "unexpected page {}",
                    page.page_number
                ))));
                return SearchOutcome::Failed;
            }
            // Previous pages are only dropped once their replacement is here
            self.pagination.reset();
            self.pagination.append_page(page);
            self.awaiting_first_page = false;
            self.error = None;
            let min_len = self.timings.min_query_len;
            let settled_query = self
                .current_request
                .as_ref()
                .and_then(|r| r.query.clone())
                .filter(|q| q.chars().count() >= min_len);
            return SearchOutcome::Applied { settled_query };
        }

        if self.pagination.append_page(page) {
            SearchOutcome::Applied { settled_query: None }
        } else {
            self.pagination.fail_load_more();
            SearchOutcome::Rejected
        }
    }

    /// Returns whether the entries were current and applied.
    pub fn apply_suggestions(&mut self, generation: u64, entries: Vec<SuggestionEntry>) -> bool {
        if generation != self.suggest_generation {
            debug!(generation, current = self.suggest_generation, "Discarding stale suggestions");
            return false;
        }
        self.suggestions = entries;
        true
    }

    fn clear_suggestions(&mut self) {
        self.suggest_deadline = None;
        // Invalidates any lookup still in flight
        self.suggest_generation += 1;
        self.suggestions.clear();
    }
}
