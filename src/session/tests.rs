use super::*;
use crate::models::FilterState;
use crate::recent::RecentSearchStore;
use crate::storage::MemoryStore;
use crate::test_utils::FakeApi;
use crate::view::Dropdown;
use std::sync::atomic::Ordering;
use tokio::time::{Duration, sleep};

fn start(api: Arc<FakeApi>) -> (SessionHandle, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let handle = Session::start(api, store.clone(), &Settings::default());
    (handle, store)
}

async fn wait(ms: u64) {
    sleep(Duration::from_millis(ms)).await;
}

fn budget_sedans(id: &str, is_default: bool) -> SavedFilterPreset {
    SavedFilterPreset {
        id: id.to_string(),
        name: "Budget sedans".to_string(),
        category_id: "auto".to_string(),
        filters: FilterState {
            subcategory_id: Some("sedans".to_string()),
            price_max: Some(20000),
            ..Default::default()
        },
        is_default,
        created_at: None,
    }
}

fn first_card(model: &RenderModel) -> &str {
    model.cards.first().map(|c| c.listing.id.as_str()).unwrap_or("")
}

#[tokio::test(start_paused = true)]
async fn session_opens_with_one_unfiltered_search() {
    let api = Arc::new(FakeApi::new());
    let (handle, _) = start(api.clone());
    wait(50).await;

    let searches = api.search_log();
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0].query, None);
    assert_eq!(searches[0].page, 1);

    let model = handle.current();
    assert_eq!(model.cards.len(), 20);
    assert_eq!(model.total_count, 45);
    assert!(model.has_more);
    assert_eq!(model.category_name, "Cars");
    assert_eq!(api.popular_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn typing_burst_issues_a_single_search() {
    let api = Arc::new(FakeApi::new());
    let (handle, _) = start(api.clone());
    wait(50).await;

    for text in ["g", "go", "gol", "golf"] {
        handle.send(SessionInput::QueryEdited(text.to_string()));
        wait(100).await;
    }
    wait(1000).await;

    let searches = api.search_log();
    assert_eq!(searches.len(), 2);
    assert_eq!(searches[1].query.as_deref(), Some("golf"));
    assert_eq!(first_card(&handle.current()), "golf-0");
}

#[tokio::test(start_paused = true)]
async fn late_response_for_older_query_is_discarded() {
    let api = Arc::new(FakeApi::new());
    api.delay_query("golf", Duration::from_secs(2));
    let (handle, _) = start(api.clone());
    wait(50).await;

    handle.send(SessionInput::QueryEdited("golf".into()));
    wait(600).await;
    handle.send(SessionInput::QueryEdited("polo".into()));
    wait(600).await;
    assert_eq!(first_card(&handle.current()), "polo-0");

    // golf answers long after polo
    wait(2000).await;
    let model = handle.current();
    assert_eq!(first_card(&model), "polo-0");
    assert_eq!(model.cards.len(), 20);
    assert_eq!(api.search_log().len(), 3);
    assert_eq!(api.tracked_log(), vec!["polo".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn fast_typing_issues_one_suggestion_lookup() {
    let api = Arc::new(FakeApi::new());
    let (handle, _) = start(api.clone());
    handle.send(SessionInput::QueryFocus(true));

    for text in ["c", "ca", "car"] {
        handle.send(SessionInput::QueryEdited(text.to_string()));
        wait(150).await;
    }
    wait(1000).await;

    assert_eq!(api.suggest_log(), vec!["car".to_string()]);
    match handle.current().dropdown {
        Dropdown::Suggestions(entries) => assert_eq!(entries.len(), 5),
        other => panic!("expected suggestions, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn suggestion_failure_shows_nothing() {
    let api = Arc::new(FakeApi::new());
    api.fail_suggest.store(true, Ordering::SeqCst);
    let (handle, _) = start(api.clone());
    handle.send(SessionInput::QueryFocus(true));
    handle.send(SessionInput::QueryEdited("golf".into()));
    wait(1000).await;

    let model = handle.current();
    assert_eq!(model.dropdown, Dropdown::None);
    assert_eq!(model.error, None);
    assert_eq!(first_card(&model), "golf-0");
}

#[tokio::test(start_paused = true)]
async fn settled_queries_are_recorded_and_tracked() {
    let api = Arc::new(FakeApi::new());
    let (handle, store) = start(api.clone());
    wait(50).await;

    handle.send(SessionInput::QueryEdited("Toyota".into()));
    wait(1000).await;
    handle.send(SessionInput::QueryEdited("toyota".into()));
    wait(1000).await;
    // Below the minimum length: searched, not remembered
    handle.send(SessionInput::QueryEdited("t".into()));
    wait(1000).await;

    let recent = RecentSearchStore::load(store, "auto", 5);
    assert_eq!(recent.texts(), vec!["toyota".to_string()]);
    assert_eq!(api.tracked_log(), vec!["Toyota".to_string(), "toyota".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn tracking_failure_is_invisible() {
    let api = Arc::new(FakeApi::new());
    api.fail_track.store(true, Ordering::SeqCst);
    let (handle, store) = start(api.clone());

    handle.send(SessionInput::QueryEdited("golf".into()));
    wait(1000).await;

    assert_eq!(handle.current().error, None);
    assert_eq!(api.tracked_log(), vec!["golf".to_string()]);
    assert_eq!(RecentSearchStore::load(store, "auto", 5).texts(), vec!["golf".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn recent_history_drives_the_empty_query_dropdown() {
    let api = Arc::new(FakeApi::new());
    let (handle, _) = start(api.clone());

    handle.send(SessionInput::QueryEdited("golf".into()));
    wait(1000).await;
    handle.send(SessionInput::QueryEdited(String::new()));
    handle.send(SessionInput::QueryFocus(true));
    wait(1000).await;
    assert_eq!(handle.current().dropdown, Dropdown::Recent(vec!["golf".into()]));

    handle.send(SessionInput::RemoveRecent("GOLF".into()));
    wait(10).await;
    assert!(matches!(handle.current().dropdown, Dropdown::Popular(_)));
}

#[tokio::test(start_paused = true)]
async fn failed_search_keeps_results_until_retry() {
    let api = Arc::new(FakeApi::new());
    let (handle, _) = start(api.clone());
    wait(50).await;

    api.fail_next_searches(1);
    handle.send(SessionInput::QueryEdited("golf".into()));
    wait(1000).await;

    let model = handle.current();
    assert!(model.error.is_some());
    assert!(model.retryable);
    assert_eq!(first_card(&model), "all-0");
    assert_eq!(model.total_count, 45);

    handle.send(SessionInput::Retry);
    wait(100).await;
    let model = handle.current();
    assert_eq!(model.error, None);
    assert_eq!(first_card(&model), "golf-0");
    assert_eq!(api.search_log().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn unauthorized_search_offers_no_retry() {
    let api = Arc::new(FakeApi::new());
    let (handle, _) = start(api.clone());
    wait(50).await;

    api.unauthorized_searches.store(true, Ordering::SeqCst);
    handle.send(SessionInput::QueryEdited("golf".into()));
    wait(1000).await;

    let model = handle.current();
    assert_eq!(model.error.as_deref(), Some("not authenticated"));
    assert!(!model.retryable);
    assert_eq!(first_card(&model), "all-0");

    handle.send(SessionInput::Retry);
    wait(1000).await;
    assert_eq!(api.search_log().len(), 2);
    assert!(handle.current().error.is_some());
}

#[tokio::test(start_paused = true)]
async fn load_more_is_single_flight() {
    let api = Arc::new(FakeApi::new());
    api.delay_page(2, Duration::from_millis(300));
    let (handle, _) = start(api.clone());
    wait(50).await;

    handle.send(SessionInput::LoadMore);
    handle.send(SessionInput::LoadMore);
    wait(50).await;
    let pages: Vec<u32> = api.search_log().iter().map(|r| r.page).collect();
    assert_eq!(pages, vec![1, 2]);
    assert!(handle.current().loading);

    wait(500).await;
    let model = handle.current();
    assert_eq!(model.cards.len(), 40);
    assert!(model.has_more);

    handle.send(SessionInput::LoadMore);
    wait(50).await;
    let model = handle.current();
    assert_eq!(model.cards.len(), 45);
    assert!(!model.has_more);

    handle.send(SessionInput::LoadMore);
    wait(50).await;
    assert_eq!(api.search_log().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn applying_a_preset_replaces_filters_with_one_request() {
    let api = Arc::new(FakeApi::with_presets(vec![budget_sedans("p-budget", false)]));
    let (handle, _) = start(api.clone());
    wait(50).await;
    assert_eq!(api.search_log().len(), 1);

    handle.send(SessionInput::QueryEdited("golf".into()));
    handle.send(SessionInput::ApplyPreset("p-budget".into()));
    wait(1000).await;

    let searches = api.search_log();
    assert_eq!(searches.len(), 2);
    assert_eq!(searches[1].subcategory_id.as_deref(), Some("sedans"));
    assert_eq!(searches[1].price_max, Some(20000));
    assert_eq!(searches[1].query, None);

    let model = handle.current();
    assert_eq!(model.filters, budget_sedans("p-budget", false).filters);
    assert_eq!(model.subcategory_name.as_deref(), Some("Sedans"));
}

#[tokio::test(start_paused = true)]
async fn unknown_preset_sets_a_notice() {
    let api = Arc::new(FakeApi::new());
    let (handle, _) = start(api.clone());
    wait(50).await;

    handle.send(SessionInput::ApplyPreset("missing".into()));
    wait(10).await;
    assert!(handle.current().notice.is_some());
    assert_eq!(api.search_log().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn default_preset_is_applied_once() {
    let api = Arc::new(FakeApi::with_presets(vec![budget_sedans("p-default", true)]));
    let (handle, _) = start(api.clone());
    wait(100).await;

    let last = api.search_log().pop().unwrap();
    assert_eq!(last.price_max, Some(20000));
    assert_eq!(handle.current().filters.price_max, Some(20000));

    handle.send(SessionInput::ClearFilters);
    wait(1000).await;
    handle.send(SessionInput::SavePreset {
        name: "Everything".into(),
        is_default: false,
    });
    wait(100).await;

    let model = handle.current();
    assert_eq!(model.presets.len(), 2);
    assert_eq!(model.filters.price_max, None);
    assert_eq!(model.filters.subcategory_id, None);
}

#[tokio::test(start_paused = true)]
async fn default_preset_is_skipped_once_filters_were_edited() {
    let api = Arc::new(FakeApi::with_presets(vec![budget_sedans("p-default", true)]));
    api.delay_preset_list(Duration::from_millis(300));
    let (handle, _) = start(api.clone());
    wait(50).await;

    handle.send(SessionInput::SetCondition(Some("used".into())));
    wait(1000).await;

    let searches = api.search_log();
    assert_eq!(searches.len(), 2);
    assert!(searches.iter().all(|r| r.price_max.is_none() && r.subcategory_id.is_none()));
    assert_eq!(searches[1].condition.as_deref(), Some("used"));

    let model = handle.current();
    assert_eq!(model.filters.condition.as_deref(), Some("used"));
    assert_eq!(model.filters.price_max, None);
    assert_eq!(model.presets.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_preset_name_never_reaches_the_api() {
    let api = Arc::new(FakeApi::new());
    let (handle, _) = start(api.clone());
    wait(50).await;

    handle.send(SessionInput::SavePreset {
        name: "   ".into(),
        is_default: false,
    });
    wait(10).await;

    assert!(handle.current().notice.is_some());
    assert!(api.presets.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn favorite_toggle_reverts_on_failure() {
    let api = Arc::new(FakeApi::new());
    let (handle, _) = start(api.clone());
    wait(50).await;

    handle.send(SessionInput::ToggleFavorite("all-1".into()));
    wait(50).await;
    assert!(handle.current().cards[1].is_favorite);
    assert!(api.favorites.lock().unwrap().contains("all-1"));

    api.fail_favorites.store(true, Ordering::SeqCst);
    handle.send(SessionInput::ToggleFavorite("all-0".into()));
    wait(50).await;
    assert!(!handle.current().cards[0].is_favorite);
}

#[tokio::test(start_paused = true)]
async fn toggle_before_favorites_load_is_kept() {
    let api = Arc::new(FakeApi::new());
    api.delay_favorites(Duration::from_millis(300));
    let (handle, _) = start(api.clone());
    wait(50).await;

    handle.send(SessionInput::ToggleFavorite("all-1".into()));
    wait(50).await;
    assert!(handle.current().cards[1].is_favorite);
    assert!(api.favorites.lock().unwrap().contains("all-1"));

    // The list was snapshotted before the toggle reached the server
    wait(400).await;
    assert!(handle.current().cards[1].is_favorite);
}

#[tokio::test(start_paused = true)]
async fn layout_switch_preserves_state() {
    let api = Arc::new(FakeApi::new());
    let (handle, _) = start(api.clone());
    handle.send(SessionInput::SetPriceRange {
        min: Some(500),
        max: None,
    });
    wait(1000).await;
    let before = handle.current();

    handle.send(SessionInput::SetLayout { wide: true });
    wait(10).await;
    let wide = handle.current();
    assert_eq!(wide.columns, 3);
    assert_eq!(wide.cards, before.cards);
    assert_eq!(wide.filters, before.filters);

    handle.send(SessionInput::SetLayout { wide: false });
    wait(10).await;
    assert_eq!(handle.current(), before);
    assert_eq!(api.search_log().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_stops_the_loop() {
    let api = Arc::new(FakeApi::new());
    let (handle, _) = start(api);
    let view = handle.view();
    handle.shutdown().await;
    assert!(view.has_changed().is_err());
}
