//! Search orchestration for the application-logs view.
//!
//! Every location change is reduced to a [`TriggerKey`]; a new search is
//! issued only when that key differs from the last one. Responses carry the
//! generation they were issued under and are dropped unless they belong to
//! the most recent trigger.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{ProjectId, TimeRange},
    protocol::{LogRecord, Pagination, SearchResult},
};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    error::{describe_search_failure, SearchError},
    filter_state::{refresh_token, FilterState},
    navigator::Location,
    query_builder::build_search_request,
    timer::SingleSlotTimer,
    Clock, LogSearchBackend,
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTimings {
    /// Quiet period before typed search text is written to the URL.
    pub search_debounce: Duration,
    /// How long a soft refresh may run before the refresh indicator shows.
    pub refresh_indicator_delay: Duration,
}

impl Default for SearchTimings {
    fn default() -> Self {
        Self {
            search_debounce: Duration::from_millis(500),
            refresh_indicator_delay: Duration::from_millis(300),
        }
    }
}

/// Inputs whose change triggers a refetch. Multi-value filters are kept
/// sorted so selection order never causes a spurious search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerKey {
    project_id: ProjectId,
    page: u32,
    levels: Vec<String>,
    environments: Vec<String>,
    hostnames: Vec<String>,
    search_text: String,
    time_range: TimeRange,
    custom_start: Option<i64>,
    custom_end: Option<i64>,
    refresh_token: Option<String>,
}

impl TriggerKey {
    pub fn new(project_id: &ProjectId, state: &FilterState, refresh_token: Option<String>) -> Self {
        Self {
            project_id: project_id.clone(),
            page: state.page,
            levels: sorted(state.levels.iter().map(|level| level.as_str().to_string())),
            environments: sorted(state.environments.iter().cloned()),
            hostnames: sorted(state.hostnames.iter().cloned()),
            search_text: state.search_text.clone(),
            time_range: state.time_range,
            custom_start: state.custom_start,
            custom_end: state.custom_end,
            refresh_token,
        }
    }
}

fn sorted(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut values: Vec<String> = values.collect();
    values.sort();
    values
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    pub logs: Vec<LogRecord>,
    pub pagination: Option<Pagination>,
    pub error: Option<String>,
    pub initial_loading: bool,
    pub refreshing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogsDisplay {
    /// Blocking load with nothing to show yet.
    Loading,
    /// The search failed and there are no logs to keep on screen.
    Error,
    /// The search succeeded with zero matches.
    Empty,
    /// Logs are on screen, possibly under a refresh overlay or error banner.
    Results,
}

impl ViewState {
    pub fn display(&self) -> LogsDisplay {
        if self.initial_loading {
            return LogsDisplay::Loading;
        }
        if !self.logs.is_empty() {
            return LogsDisplay::Results;
        }
        match (&self.error, &self.pagination) {
            (Some(_), _) => LogsDisplay::Error,
            (None, Some(_)) => LogsDisplay::Empty,
            (None, None) => LogsDisplay::Loading,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchEvent {
    InitialLoadingChanged(bool),
    RefreshingChanged(bool),
    ResultsReplaced {
        generation: u64,
        total: u64,
        page: u32,
    },
    Failed {
        generation: u64,
        message: String,
    },
    ScrollToTop,
    StaleResponseDiscarded {
        generation: u64,
    },
}

struct OrchestratorState {
    last_trigger: Option<TriggerKey>,
    generation: u64,
    view: ViewState,
    indicator_timer: SingleSlotTimer,
    in_flight: Option<JoinHandle<()>>,
}

pub struct SearchOrchestrator {
    backend: Arc<dyn LogSearchBackend>,
    clock: Arc<dyn Clock>,
    timings: SearchTimings,
    inner: Mutex<OrchestratorState>,
    events: broadcast::Sender<SearchEvent>,
}

impl SearchOrchestrator {
    pub fn new(
        backend: Arc<dyn LogSearchBackend>,
        clock: Arc<dyn Clock>,
        timings: SearchTimings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            backend,
            clock,
            timings,
            inner: Mutex::new(OrchestratorState {
                last_trigger: None,
                generation: 0,
                view: ViewState::default(),
                indicator_timer: SingleSlotTimer::new(),
                in_flight: None,
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SearchEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ViewState {
        self.inner.lock().await.view.clone()
    }

    /// Generation of the most recently issued search; 0 before the first.
    pub async fn current_generation(&self) -> u64 {
        self.inner.lock().await.generation
    }

    /// Reconcile with the current location. Returns whether a search was
    /// issued.
    pub async fn sync(self: &Arc<Self>, project_id: &ProjectId, query: &str) -> bool {
        let filters = FilterState::from_query(query);
        let key = TriggerKey::new(project_id, &filters, refresh_token(query));

        let mut guard = self.inner.lock().await;
        if guard.last_trigger.as_ref() == Some(&key) {
            debug!(%project_id, "search inputs unchanged, skipping fetch");
            return false;
        }
        guard.last_trigger = Some(key);
        guard.generation += 1;
        let generation = guard.generation;
        let initial = guard.view.logs.is_empty();

        if initial {
            guard.indicator_timer.cancel();
            self.set_initial_loading(&mut guard.view, true);
        } else {
            let this = Arc::clone(self);
            guard
                .indicator_timer
                .arm(self.timings.refresh_indicator_delay, async move {
                    this.show_refresh_indicator(generation).await;
                });
        }

        let request = build_search_request(&filters, self.clock.now());
        info!(
            generation,
            %project_id,
            page = request.page,
            initial,
            "issuing log search"
        );

        if let Some(previous) = guard.in_flight.take() {
            previous.abort();
        }
        let this = Arc::clone(self);
        let project_id = project_id.clone();
        guard.in_flight = Some(tokio::spawn(async move {
            let outcome = this.backend.search(&project_id, &request).await;
            this.complete(generation, initial, outcome).await;
        }));
        true
    }

    /// Re-sync on every location change until the navigator goes away.
    pub fn follow(
        self: &Arc<Self>,
        project_id: ProjectId,
        mut location: watch::Receiver<Location>,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let query = location.borrow_and_update().query().to_string();
                this.sync(&project_id, &query).await;
                if location.changed().await.is_err() {
                    debug!(%project_id, "location closed, stopping log search follower");
                    break;
                }
            }
        })
    }

    async fn show_refresh_indicator(&self, generation: u64) {
        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            return;
        }
        self.set_refreshing(&mut guard.view, true);
    }

    async fn complete(
        &self,
        generation: u64,
        initial: bool,
        outcome: Result<SearchResult, SearchError>,
    ) {
        let mut guard = self.inner.lock().await;
        if guard.generation != generation {
            debug!(
                generation,
                latest = guard.generation,
                "discarding stale log search response"
            );
            let _ = self
                .events
                .send(SearchEvent::StaleResponseDiscarded { generation });
            return;
        }

        guard.in_flight = None;
        guard.indicator_timer.cancel();

        match outcome {
            Ok(result) => {
                let pagination = result.pagination;
                guard.view.logs = result.logs;
                guard.view.pagination = Some(pagination);
                guard.view.error = None;
                info!(
                    generation,
                    total = pagination.total,
                    page = pagination.page,
                    "log search completed"
                );
                let _ = self.events.send(SearchEvent::ResultsReplaced {
                    generation,
                    total: pagination.total,
                    page: pagination.page,
                });
                if initial {
                    let _ = self.events.send(SearchEvent::ScrollToTop);
                }
            }
            Err(err) => {
                let message = describe_search_failure(&err);
                warn!(generation, error = %err, "log search failed");
                guard.view.error = Some(message.clone());
                let _ = self
                    .events
                    .send(SearchEvent::Failed { generation, message });
            }
        }

        self.set_initial_loading(&mut guard.view, false);
        self.set_refreshing(&mut guard.view, false);
    }

    fn set_initial_loading(&self, view: &mut ViewState, value: bool) {
        if view.initial_loading != value {
            view.initial_loading = value;
            let _ = self.events.send(SearchEvent::InitialLoadingChanged(value));
        }
    }

    fn set_refreshing(&self, view: &mut ViewState, value: bool) {
        if view.refreshing != value {
            view.refreshing = value;
            let _ = self.events.send(SearchEvent::RefreshingChanged(value));
        }
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
