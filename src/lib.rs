// Search-and-filter discovery for a marketplace catalog screen.
//
// A `session::Session` owns one screen's state: the filter set, debounced
// authoritative searches, type-ahead suggestions, recent and popular
// searches, saved filter presets, favorites, and paged results. The outer
// surface feeds it `session::SessionInput`s and renders the published
// `view::RenderModel`.

pub mod api;
pub mod config;
pub mod error;
pub mod favorites;
pub mod models;
pub mod orchestrator;
pub mod pagination;
pub mod presets;
pub mod recent;
pub mod session;
pub mod storage;
pub mod suggest;
pub mod view;

#[cfg(test)]
mod test_utils;
