// Render model composition.
//
// `compose` is a pure function of the session state. Both layouts read
// the same inputs, so switching layout can neither lose nor duplicate
// filters or loaded pages.

use crate::favorites::Favorites;
use crate::models::{
    Category, FilterState, LayoutMode, Listing, PopularSearches, RecentSearchEntry,
    SavedFilterPreset, SortKey, SuggestionEntry,
};
use crate::pagination::PaginationController;

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub listing: Listing,
    pub is_favorite: bool,
}

/// The single advisory list under the search box.
#[derive(Debug, Clone, PartialEq)]
pub enum Dropdown {
    None,
    Suggestions(Vec<SuggestionEntry>),
    Recent(Vec<String>),
    Popular(PopularSearches),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChip {
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetSummary {
    pub id: String,
    pub name: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderModel {
    pub layout: LayoutMode,
    pub columns: usize,
    // Wide layout shows filters in a sidebar, compact behind a button
    pub filters_inline: bool,
    pub category_name: String,
    pub subcategory_name: Option<String>,
    pub filters: FilterState,
    pub chips: Vec<FilterChip>,
    pub filter_count: usize,
    pub sort: SortKey,
    pub cards: Vec<Card>,
    pub total_count: u64,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<String>,
    // Only transient failures offer a retry
    pub retryable: bool,
    pub notice: Option<String>,
    pub dropdown: Dropdown,
    pub presets: Vec<PresetSummary>,
}

impl RenderModel {
    /// Cards grouped by row for the current column count.
    pub fn rows(&self) -> Vec<&[Card]> {
        self.cards.chunks(self.columns.max(1)).collect()
    }
}

impl Default for RenderModel {
    fn default() -> Self {
        let filters = FilterState::default();
        let pagination = PaginationController::new();
        let favorites = Favorites::new();
        compose(&ComposeInput {
            category_id: "",
            categories: &[],
            filters: &filters,
            pagination: &pagination,
            favorites: &favorites,
            layout: LayoutMode::Compact,
            query_focused: false,
            min_query_len: 2,
            suggestions: &[],
            recent: &[],
            popular: None,
            presets: &[],
            error: None,
            retryable: false,
            notice: None,
        })
    }
}

pub struct ComposeInput<'a> {
    pub category_id: &'a str,
    pub categories: &'a [Category],
    pub filters: &'a FilterState,
    pub pagination: &'a PaginationController,
    pub favorites: &'a Favorites,
    pub layout: LayoutMode,
    pub query_focused: bool,
    pub min_query_len: usize,
    pub suggestions: &'a [SuggestionEntry],
    pub recent: &'a [RecentSearchEntry],
    pub popular: Option<&'a PopularSearches>,
    pub presets: &'a [SavedFilterPreset],
    pub error: Option<&'a str>,
    pub retryable: bool,
    pub notice: Option<&'a str>,
}

pub fn compose(input: &ComposeInput<'_>) -> RenderModel {
    let filters = input.filters;
    let category = input.categories.iter().find(|c| c.id == input.category_id);
    let category_name = category
        .map(|c| c.name.clone())
        .unwrap_or_else(|| input.category_id.to_string());
    let subcategory_name = filters.subcategory_id.as_ref().map(|sub_id| {
        category
            .and_then(|c| c.subcategories.iter().find(|s| &s.id == sub_id))
            .map(|s| s.name.clone())
            .unwrap_or_else(|| sub_id.clone())
    });

    let cards = input
        .pagination
        .items()
        .map(|listing| Card {
            listing: listing.clone(),
            is_favorite: input.favorites.contains(&listing.id),
        })
        .collect();

    RenderModel {
        layout: input.layout,
        columns: input.layout.columns(),
        filters_inline: input.layout == LayoutMode::Wide,
        category_name,
        chips: chips(filters, subcategory_name.as_deref()),
        subcategory_name,
        filters: filters.clone(),
        filter_count: filters.active_filter_count(),
        sort: filters.sort_key,
        cards,
        total_count: input.pagination.total_count(),
        has_more: input.pagination.has_more(),
        loading: input.pagination.is_loading(),
        error: input.error.map(str::to_string),
        retryable: input.error.is_some() && input.retryable,
        notice: input.notice.map(str::to_string),
        dropdown: dropdown(input),
        presets: input
            .presets
            .iter()
            .map(|p| PresetSummary {
                id: p.id.clone(),
                name: p.name.clone(),
                is_default: p.is_default,
            })
            .collect(),
    }
}

fn chips(filters: &FilterState, subcategory_name: Option<&str>) -> Vec<FilterChip> {
    let mut chips = Vec::new();
    if let Some(name) = subcategory_name {
        chips.push(FilterChip {
            key: "subcategory".to_string(),
            label: name.to_string(),
        });
    }
    let price = match (filters.price_min, filters.price_max) {
        (Some(lo), Some(hi)) => Some(format!("{} - {}", lo, hi)),
        (Some(lo), None) => Some(format!("from {}", lo)),
        (None, Some(hi)) => Some(format!("up to {}", hi)),
        (None, None) => None,
    };
    if let Some(label) = price {
        chips.push(FilterChip {
            key: "price".to_string(),
            label,
        });
    }
    if let Some(condition) = &filters.condition {
        chips.push(FilterChip {
            key: "condition".to_string(),
            label: condition.clone(),
        });
    }
    for (key, value) in &filters.attributes {
        chips.push(FilterChip {
            key: key.clone(),
            label: format!("{}: {}", key, value),
        });
    }
    chips
}

fn dropdown(input: &ComposeInput<'_>) -> Dropdown {
    if !input.query_focused {
        return Dropdown::None;
    }
    let query = input.filters.normalized_query();
    if query.is_empty() {
        if !input.recent.is_empty() {
            return Dropdown::Recent(input.recent.iter().map(|e| e.text.clone()).collect());
        }
        return match input.popular {
            Some(popular) if !popular.is_empty() => Dropdown::Popular(popular.clone()),
            _ => Dropdown::None,
        };
    }
    if query.chars().count() >= input.min_query_len && !input.suggestions.is_empty() {
        return Dropdown::Suggestions(input.suggestions.to_vec());
    }
    Dropdown::None
}
