// Settings for a discovery session.
// Layered with the 'config' crate: defaults, then catalog.toml, then CATALOG_* env vars.

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::orchestrator::Timings;
use crate::{recent, suggest};

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api";
const DEFAULT_CATEGORY_ID: &str = "auto";
const DEFAULT_PAGE_SIZE: u32 = 20;
const DEFAULT_SEARCH_DEBOUNCE_MS: u64 = 500;
const DEFAULT_SUGGEST_DEBOUNCE_MS: u64 = 200;
const DEFAULT_MIN_QUERY_LEN: usize = 2;
const DEFAULT_POPULAR_LIMIT: usize = 10;
const DEFAULT_STORAGE_DIR: &str = ".catalog";
const DEFAULT_REQUEST_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 250;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    // Bearer token of the signed-in user; presets and favorites need it
    pub auth_token: Option<String>,
    pub category_id: String,
    pub page_size: u32,
    pub search_debounce_ms: u64,
    pub suggest_debounce_ms: u64,
    pub min_query_len: usize,
    pub recent_capacity: usize,
    pub suggestion_limit: usize,
    pub popular_limit: usize,
    pub storage_dir: PathBuf,
    pub request_retries: u32,
    pub retry_delay_ms: u64,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Self::with_defaults(Config::builder())?
            // Load from a configuration file (e.g., catalog.toml)
            .add_source(File::with_name("catalog").required(false))
            // Load from environment variables (e.g., CATALOG_API_BASE_URL)
            .add_source(Environment::with_prefix("CATALOG").try_parsing(true));

        builder.build()?.try_deserialize()
    }

    // Same values as `Default`; config has no usize conversion, hence the casts
    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        builder
            .set_default("api_base_url", DEFAULT_API_BASE_URL)?
            .set_default("category_id", DEFAULT_CATEGORY_ID)?
            .set_default("page_size", DEFAULT_PAGE_SIZE)?
            .set_default("search_debounce_ms", DEFAULT_SEARCH_DEBOUNCE_MS)?
            .set_default("suggest_debounce_ms", DEFAULT_SUGGEST_DEBOUNCE_MS)?
            .set_default("min_query_len", DEFAULT_MIN_QUERY_LEN as u64)?
            .set_default("recent_capacity", recent::DEFAULT_CAPACITY as u64)?
            .set_default("suggestion_limit", suggest::DEFAULT_SUGGESTION_LIMIT as u64)?
            .set_default("popular_limit", DEFAULT_POPULAR_LIMIT as u64)?
            .set_default("storage_dir", DEFAULT_STORAGE_DIR)?
            .set_default("request_retries", DEFAULT_REQUEST_RETRIES)?
            .set_default("retry_delay_ms", DEFAULT_RETRY_DELAY_MS)
    }

    /// Timing and sizing knobs consumed by the orchestrator.
    pub fn timings(&self) -> Timings {
        Timings {
            search_debounce: Duration::from_millis(self.search_debounce_ms),
            suggest_debounce: Duration::from_millis(self.suggest_debounce_ms),
            min_query_len: self.min_query_len,
            page_size: self.page_size,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            auth_token: None,
            category_id: DEFAULT_CATEGORY_ID.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            search_debounce_ms: DEFAULT_SEARCH_DEBOUNCE_MS,
            suggest_debounce_ms: DEFAULT_SUGGEST_DEBOUNCE_MS,
            min_query_len: DEFAULT_MIN_QUERY_LEN,
            recent_capacity: recent::DEFAULT_CAPACITY,
            suggestion_limit: suggest::DEFAULT_SUGGESTION_LIMIT,
            popular_limit: DEFAULT_POPULAR_LIMIT,
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            request_retries: DEFAULT_REQUEST_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}
