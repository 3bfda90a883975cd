use super::*;
use crate::{
    filter_state::FilterDimension,
    navigator::{MemoryNavigator, Navigator},
    tests_support::{sample_result, FixedClock, ScriptedBackend},
    url_sync::UrlSynchronizer,
};
use shared::{
    domain::LogLevel,
    protocol::{DocFilter, MatchType, OneOrMany},
};

const NOW: i64 = 1_700_000_000_000;

fn project() -> ProjectId {
    ProjectId::new("proj-1")
}

fn orchestrator_with(
    backend: Arc<ScriptedBackend>,
    clock: Arc<FixedClock>,
) -> Arc<SearchOrchestrator> {
    SearchOrchestrator::new(backend, clock, SearchTimings::default())
}

fn setup() -> (Arc<ScriptedBackend>, Arc<FixedClock>, Arc<SearchOrchestrator>) {
    let backend = Arc::new(ScriptedBackend::default());
    let clock = Arc::new(FixedClock::at_millis(NOW));
    let orchestrator = orchestrator_with(backend.clone(), clock.clone());
    (backend, clock, orchestrator)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

fn drain(rx: &mut broadcast::Receiver<SearchEvent>) -> Vec<SearchEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Runs an initial load so later triggers are soft refreshes.
async fn loaded(
    backend: &ScriptedBackend,
    orchestrator: &Arc<SearchOrchestrator>,
    query: &str,
) {
    backend.respond_after(Duration::ZERO, Ok(sample_result(1, 3, 4)));
    assert!(orchestrator.sync(&project(), query).await);
    settle().await;
    assert_eq!(orchestrator.snapshot().await.logs.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn first_search_is_a_blocking_load_that_scrolls_to_top() {
    let (backend, _clock, orchestrator) = setup();
    let mut rx = orchestrator.subscribe_events();
    backend.respond_after(Duration::from_millis(50), Ok(sample_result(1, 2, 1)));

    assert!(orchestrator.sync(&project(), "").await);
    let view = orchestrator.snapshot().await;
    assert!(view.initial_loading);
    assert!(!view.refreshing);
    assert_eq!(view.display(), LogsDisplay::Loading);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let view = orchestrator.snapshot().await;
    assert!(!view.initial_loading);
    assert_eq!(view.logs.len(), 2);
    assert_eq!(view.display(), LogsDisplay::Results);

    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&SearchEvent::InitialLoadingChanged(true)));
    assert!(events.contains(&SearchEvent::ScrollToTop));
    assert!(!events.contains(&SearchEvent::RefreshingChanged(true)));
    assert_eq!(events.last(), Some(&SearchEvent::InitialLoadingChanged(false)));
}

#[tokio::test(start_paused = true)]
async fn unchanged_inputs_do_not_refetch() {
    let (backend, _clock, orchestrator) = setup();
    loaded(&backend, &orchestrator, "level=ERROR&level=WARNING&page=2").await;

    assert!(!orchestrator.sync(&project(), "level=ERROR&level=WARNING&page=2").await);
    assert!(!orchestrator.sync(&project(), "?page=2&level=WARNING&level=ERROR").await);
    settle().await;
    assert_eq!(backend.search_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_token_and_project_changes_force_a_refetch() {
    let (backend, _clock, orchestrator) = setup();
    loaded(&backend, &orchestrator, "level=ERROR").await;

    assert!(orchestrator.sync(&project(), "level=ERROR&_refresh=1").await);
    settle().await;
    assert!(orchestrator.sync(&ProjectId::new("proj-2"), "level=ERROR&_refresh=1").await);
    settle().await;

    let calls = backend.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2].0, ProjectId::new("proj-2"));
}

#[tokio::test(start_paused = true)]
async fn fast_refresh_never_shows_the_indicator() {
    let (backend, _clock, orchestrator) = setup();
    loaded(&backend, &orchestrator, "page=1").await;
    let mut rx = orchestrator.subscribe_events();

    backend.respond_after(Duration::from_millis(100), Ok(sample_result(2, 3, 4)));
    assert!(orchestrator.sync(&project(), "page=2").await);
    assert!(!orchestrator.snapshot().await.initial_loading);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let events = drain(&mut rx);
    assert!(!events.contains(&SearchEvent::RefreshingChanged(true)));
    assert!(!events.contains(&SearchEvent::ScrollToTop));
    assert!(matches!(
        events.as_slice(),
        [SearchEvent::ResultsReplaced { page: 2, .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn slow_refresh_shows_the_indicator_after_the_delay() {
    let (backend, _clock, orchestrator) = setup();
    loaded(&backend, &orchestrator, "page=1").await;

    backend.respond_after(Duration::from_millis(500), Ok(sample_result(2, 5, 4)));
    assert!(orchestrator.sync(&project(), "page=2").await);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!orchestrator.snapshot().await.refreshing);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let view = orchestrator.snapshot().await;
    assert!(view.refreshing);
    assert_eq!(view.logs.len(), 3, "old logs stay visible under the overlay");
    assert_eq!(view.display(), LogsDisplay::Results);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let view = orchestrator.snapshot().await;
    assert!(!view.refreshing);
    assert_eq!(view.logs.len(), 5);
    assert_eq!(view.pagination.map(|p| p.page), Some(2));
}

#[tokio::test(start_paused = true)]
async fn latest_trigger_wins_over_slower_earlier_response() {
    let (backend, _clock, orchestrator) = setup();
    loaded(&backend, &orchestrator, "page=1").await;

    backend.respond_after(Duration::from_millis(400), Ok(sample_result(2, 7, 4)));
    backend.respond_after(Duration::from_millis(50), Ok(sample_result(3, 2, 4)));
    assert!(orchestrator.sync(&project(), "page=2").await);
    settle().await;
    assert!(orchestrator.sync(&project(), "page=3").await);

    tokio::time::sleep(Duration::from_secs(1)).await;
    let view = orchestrator.snapshot().await;
    assert_eq!(view.pagination.map(|p| p.page), Some(3));
    assert_eq!(view.logs.len(), 2);
    assert!(!view.refreshing);
    assert_eq!(backend.search_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn responses_from_superseded_generations_are_discarded() {
    let (backend, _clock, orchestrator) = setup();
    loaded(&backend, &orchestrator, "page=1").await;

    backend.respond_after(Duration::from_secs(5), Ok(sample_result(2, 4, 4)));
    assert!(orchestrator.sync(&project(), "page=2").await);
    let mut rx = orchestrator.subscribe_events();
    let stale = orchestrator.current_generation().await - 1;

    orchestrator
        .complete(stale, false, Ok(sample_result(9, 9, 9)))
        .await;

    let view = orchestrator.snapshot().await;
    assert_eq!(view.logs.len(), 3);
    assert_eq!(view.pagination.map(|p| p.page), Some(1));
    assert_eq!(
        drain(&mut rx),
        vec![SearchEvent::StaleResponseDiscarded { generation: stale }]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_previous_logs() {
    let (backend, _clock, orchestrator) = setup();
    loaded(&backend, &orchestrator, "page=1").await;

    backend.respond_after(
        Duration::from_millis(400),
        Err(SearchError::Status { status: 502 }),
    );
    assert!(orchestrator.sync(&project(), "page=2").await);
    tokio::time::sleep(Duration::from_secs(1)).await;

    let view = orchestrator.snapshot().await;
    assert_eq!(view.logs.len(), 3);
    assert_eq!(view.pagination.map(|p| p.page), Some(1));
    assert!(view.error.as_deref().is_some_and(|m| m.contains("reloading")));
    assert!(!view.refreshing);
    assert!(!view.initial_loading);
    assert_eq!(view.display(), LogsDisplay::Results);

    assert!(orchestrator.sync(&project(), "page=2&_refresh=1").await);
    settle().await;
    let view = orchestrator.snapshot().await;
    assert_eq!(view.error, None);
    assert_eq!(view.pagination.map(|p| p.page), Some(2));
}

#[tokio::test(start_paused = true)]
async fn failed_initial_load_shows_only_the_error() {
    let (backend, _clock, orchestrator) = setup();
    let mut rx = orchestrator.subscribe_events();
    backend.respond_after(Duration::ZERO, Err(SearchError::Unavailable));

    assert!(orchestrator.sync(&project(), "").await);
    settle().await;

    let view = orchestrator.snapshot().await;
    assert!(!view.initial_loading);
    assert!(view.logs.is_empty());
    assert!(view.error.is_some());
    assert_eq!(view.display(), LogsDisplay::Error);
    assert!(!drain(&mut rx).contains(&SearchEvent::ScrollToTop));
}

#[tokio::test(start_paused = true)]
async fn zero_matches_is_an_empty_state_not_an_error() {
    let (backend, _clock, orchestrator) = setup();
    backend.respond_after(Duration::ZERO, Ok(sample_result(1, 0, 0)));

    orchestrator.sync(&project(), "search=nothing-matches").await;
    settle().await;

    let view = orchestrator.snapshot().await;
    assert_eq!(view.error, None);
    assert_eq!(view.display(), LogsDisplay::Empty);
}

#[tokio::test(start_paused = true)]
async fn relative_range_rolls_forward_on_manual_refresh() {
    let (backend, clock, orchestrator) = setup();
    loaded(&backend, &orchestrator, "timeRange=1h").await;

    clock.advance_millis(60_000);
    assert!(orchestrator.sync(&project(), "timeRange=1h&_refresh=2").await);
    settle().await;

    let calls = backend.calls();
    assert_eq!(calls[0].1.start_time, Some(NOW - 3_600_000));
    assert_eq!(calls[0].1.end_time, Some(NOW));
    assert_eq!(calls[1].1.start_time, Some(NOW + 60_000 - 3_600_000));
    assert_eq!(calls[1].1.end_time, Some(NOW + 60_000));
}

#[tokio::test(start_paused = true)]
async fn toggling_off_a_level_on_page_three_returns_to_page_one() {
    let (backend, clock, orchestrator) = setup();
    let navigator = Arc::new(MemoryNavigator::new("page=3&level=ERROR&level=WARNING"));
    let sync = UrlSynchronizer::new(navigator.clone(), clock, Duration::from_millis(500));
    let follower = orchestrator.follow(project(), navigator.subscribe());
    settle().await;
    assert_eq!(backend.calls()[0].1.page, 3);

    sync.toggle(FilterDimension::Level, "ERROR");
    settle().await;

    assert_eq!(navigator.current_query(), "page=1&level=WARNING");
    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].1.page, 1);
    assert_eq!(calls[1].1.level, Some(OneOrMany::One(LogLevel::Warning)));
    follower.abort();
}

#[tokio::test(start_paused = true)]
async fn typing_burst_issues_one_search_with_the_final_text() {
    let (backend, clock, orchestrator) = setup();
    let navigator = Arc::new(MemoryNavigator::new(""));
    let sync = UrlSynchronizer::new(navigator.clone(), clock, Duration::from_millis(500));
    let follower = orchestrator.follow(project(), navigator.subscribe());
    settle().await;

    for text in ["a", "ab", "abc"] {
        sync.set_search_text(text).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    tokio::time::sleep(Duration::from_secs(1)).await;

    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(
        calls[1].1.doc_filter,
        Some(DocFilter {
            phrase: "abc".to_string(),
            match_type: MatchType::Contains,
        })
    );
    follower.abort();
}

#[tokio::test(start_paused = true)]
async fn back_navigation_refetches_the_previous_page() {
    let (backend, clock, orchestrator) = setup();
    let navigator = Arc::new(MemoryNavigator::new("page=1"));
    let sync = UrlSynchronizer::new(navigator.clone(), clock, Duration::from_millis(500));
    let follower = orchestrator.follow(project(), navigator.subscribe());
    settle().await;

    sync.set_page(2);
    settle().await;
    assert!(navigator.back());
    settle().await;

    let pages: Vec<u32> = backend.calls().iter().map(|(_, r)| r.page).collect();
    assert_eq!(pages, vec![1, 2, 1]);
    follower.abort();
}

#[test]
fn trigger_key_ignores_selection_order_but_not_membership() {
    let a = FilterState::from_query("environment=prod&environment=staging");
    let b = FilterState::from_query("environment=staging&environment=prod");
    let c = FilterState::from_query("environment=prod");

    assert_eq!(
        TriggerKey::new(&project(), &a, None),
        TriggerKey::new(&project(), &b, None)
    );
    assert_ne!(
        TriggerKey::new(&project(), &a, None),
        TriggerKey::new(&project(), &c, None)
    );
    assert_ne!(
        TriggerKey::new(&project(), &a, None),
        TriggerKey::new(&project(), &a, Some("1".into()))
    );
}
