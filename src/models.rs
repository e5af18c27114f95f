// Data structures shared across the discovery session:
// filter state, requests, listing pages, history, suggestions, presets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::DiscoveryError;

// Result ordering understood by the listing endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Newest => "newest",
            SortKey::Oldest => "oldest",
            SortKey::PriceAsc => "price_asc",
            SortKey::PriceDesc => "price_desc",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortKey {
    type Err = DiscoveryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "newest" => Ok(SortKey::Newest),
            "oldest" => Ok(SortKey::Oldest),
            "price_asc" => Ok(SortKey::PriceAsc),
            "price_desc" => Ok(SortKey::PriceDesc),
            other => Err(DiscoveryError::Validation(format!("unknown sort key '{}'", other))),
        }
    }
}

/// Everything the user has chosen on the catalog screen.
///
/// Facets live in `attributes`; unsetting a facet removes its key, so the
/// map never carries an "unset" marker. Two states compare equal when they
/// differ only by surrounding whitespace in `query`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory_id: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_min: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_max: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub sort_key: SortKey,
    #[serde(default)]
    pub query: String,
}

impl PartialEq for FilterState {
    fn eq(&self, other: &Self) -> bool {
        self.subcategory_id == other.subcategory_id
            && self.attributes == other.attributes
            && self.price_min == other.price_min
            && self.price_max == other.price_max
            && self.condition == other.condition
            && self.sort_key == other.sort_key
            && self.normalized_query() == other.normalized_query()
    }
}

impl Eq for FilterState {}

impl FilterState {
    pub fn normalized_query(&self) -> &str {
        self.query.trim()
    }

    /// True while nothing has been chosen yet (the screen's entry state).
    pub fn is_initial(&self) -> bool {
        *self == FilterState::default()
    }

    /// Sets or removes a facet. `None` or a blank value removes the key.
    pub fn set_attribute(&mut self, key: &str, value: Option<&str>) {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => {
                self.attributes.insert(key.to_string(), v.to_string());
            }
            None => {
                self.attributes.remove(key);
            }
        }
    }

    /// Stores the bounds in ascending order when both are given.
    pub fn set_price_range(&mut self, min: Option<u64>, max: Option<u64>) {
        match (min, max) {
            (Some(lo), Some(hi)) if lo > hi => {
                self.price_min = Some(hi);
                self.price_max = Some(lo);
            }
            _ => {
                self.price_min = min;
                self.price_max = max;
            }
        }
    }

    pub fn set_condition(&mut self, condition: Option<&str>) {
        self.condition = condition
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
    }

    pub fn set_subcategory(&mut self, subcategory_id: Option<&str>) {
        self.subcategory_id = subcategory_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
    }

    /// Drops every facet but keeps the free-text query and sort order.
    pub fn clear_filters(&mut self) {
        self.subcategory_id = None;
        self.attributes.clear();
        self.price_min = None;
        self.price_max = None;
        self.condition = None;
    }

    pub fn active_filter_count(&self) -> usize {
        self.attributes.len()
            + usize::from(self.subcategory_id.is_some())
            + usize::from(self.price_min.is_some() || self.price_max.is_some())
            + usize::from(self.condition.is_some())
    }

    pub fn to_request(&self, category_id: &str, page: u32, page_size: u32) -> SearchRequest {
        let query = self.normalized_query();
        SearchRequest {
            category_id: category_id.to_string(),
            subcategory_id: self.subcategory_id.clone(),
            query: (!query.is_empty()).then(|| query.to_string()),
            page: page.max(1),
            page_size,
            price_min: self.price_min,
            price_max: self.price_max,
            condition: self.condition.clone(),
            sort: self.sort_key,
            filters: self.attributes.clone(),
        }
    }
}

/// Point-in-time serialization of a `FilterState` plus the page cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub category_id: String,
    pub subcategory_id: Option<String>,
    pub query: Option<String>,
    pub page: u32,
    pub page_size: u32,
    pub price_min: Option<u64>,
    pub price_max: Option<u64>,
    pub condition: Option<String>,
    pub sort: SortKey,
    pub filters: BTreeMap<String, String>,
}

impl SearchRequest {
    /// Same filters, different page.
    pub fn for_page(&self, page: u32) -> SearchRequest {
        SearchRequest {
            page,
            ..self.clone()
        }
    }
}

// Represents a single listing card returned by the listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPage {
    pub items: Vec<Listing>,
    pub page_number: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSearchEntry {
    pub text: String,
    pub scope_category_id: String,
}

// Autocomplete candidate; never persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionEntry {
    pub query: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularSearches {
    #[serde(default)]
    pub global: Vec<String>,
    #[serde(default)]
    pub category: Vec<String>,
}

impl PopularSearches {
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.category.is_empty()
    }
}

// Named snapshot of a FilterState owned by the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedFilterPreset {
    pub id: String,
    pub name: String,
    pub category_id: String,
    pub filters: FilterState,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// Payload for creating a preset; the server assigns id and timestamp
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFilterPreset {
    pub name: String,
    pub category_id: String,
    pub filters: FilterState,
    pub is_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
}

/// Compact (single column) vs. wide (grid with side filters).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LayoutMode {
    #[default]
    Compact,
    Wide,
}

impl LayoutMode {
    pub fn from_viewport(is_wide: bool) -> Self {
        if is_wide { LayoutMode::Wide } else { LayoutMode::Compact }
    }

    pub fn columns(&self) -> usize {
        match self {
            LayoutMode::Compact => 1,
            LayoutMode::Wide => 3,
        }
    }
}
