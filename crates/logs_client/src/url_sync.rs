//! Filter intents rewritten into query strings.
//!
//! Every mutation goes through the navigator; the resulting location is then
//! re-read by the orchestrator, so the URL stays the single source of truth.

use std::{sync::Arc, time::Duration};

use shared::domain::{LogLevel, TimeRange};
use tokio::sync::Mutex;
use tracing::debug;
use url::form_urlencoded;

use crate::{
    filter_state::{
        parse_pairs, FilterDimension, FilterState, END_TIME_PARAM, FILTER_PARAMS, PAGE_PARAM,
        REFRESH_PARAM, SEARCH_PARAM, START_TIME_PARAM, TIME_RANGE_PARAM,
    },
    navigator::{HistoryMode, Navigator},
    timer::SingleSlotTimer,
    Clock,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterIntent {
    Toggle {
        dimension: FilterDimension,
        value: String,
    },
    SetTimeRange(TimeRange),
    SetCustomRange {
        start: Option<i64>,
        end: Option<i64>,
    },
    SetSearchText(String),
    ClearAll,
    SetPage(u32),
    /// Cache-busting token, normally the current epoch millis.
    ManualRefresh {
        token: i64,
    },
}

impl FilterIntent {
    pub fn history_mode(&self) -> HistoryMode {
        match self {
            FilterIntent::SetPage(_) => HistoryMode::Push,
            _ => HistoryMode::Replace,
        }
    }
}

/// Apply `intent` to `query`, returning the new query string without `?`.
pub fn apply_intent(query: &str, intent: &FilterIntent) -> String {
    let mut pairs = parse_pairs(query);

    match intent {
        FilterIntent::Toggle { dimension, value } => {
            toggle_value(&mut pairs, *dimension, value);
            reset_page(&mut pairs);
        }
        FilterIntent::SetTimeRange(range) => {
            upsert(&mut pairs, TIME_RANGE_PARAM, range.as_str());
            if *range != TimeRange::Custom {
                remove_key(&mut pairs, START_TIME_PARAM);
                remove_key(&mut pairs, END_TIME_PARAM);
            }
            reset_page(&mut pairs);
        }
        FilterIntent::SetCustomRange { start, end } => {
            upsert(&mut pairs, TIME_RANGE_PARAM, TimeRange::Custom.as_str());
            set_or_remove(&mut pairs, START_TIME_PARAM, *start);
            set_or_remove(&mut pairs, END_TIME_PARAM, *end);
            reset_page(&mut pairs);
        }
        FilterIntent::SetSearchText(text) => {
            if text.is_empty() {
                remove_key(&mut pairs, SEARCH_PARAM);
            } else {
                upsert(&mut pairs, SEARCH_PARAM, text);
            }
            reset_page(&mut pairs);
        }
        FilterIntent::ClearAll => {
            pairs.retain(|(key, _)| !FILTER_PARAMS.contains(&key.as_str()));
            reset_page(&mut pairs);
        }
        FilterIntent::SetPage(page) => {
            upsert(&mut pairs, PAGE_PARAM, &(*page).max(1).to_string());
        }
        FilterIntent::ManualRefresh { token } => {
            upsert(&mut pairs, REFRESH_PARAM, &token.to_string());
        }
    }

    serialize(&pairs)
}

/// Set a single parameter in place, keeping everything else.
pub fn set_param(query: &str, key: &str, value: &str) -> String {
    let mut pairs = parse_pairs(query);
    upsert(&mut pairs, key, value);
    serialize(&pairs)
}

/// Canonical query string for a state; parses back to an equal state.
pub fn encode_filter_state(state: &FilterState) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    serializer.append_pair(PAGE_PARAM, &state.page.max(1).to_string());
    for dimension in [
        FilterDimension::Level,
        FilterDimension::Environment,
        FilterDimension::Hostname,
    ] {
        for value in state.values(dimension) {
            serializer.append_pair(dimension.param(), &value);
        }
    }
    if !state.search_text.is_empty() {
        serializer.append_pair(SEARCH_PARAM, &state.search_text);
    }
    if state.time_range != TimeRange::All {
        serializer.append_pair(TIME_RANGE_PARAM, state.time_range.as_str());
    }
    if state.time_range == TimeRange::Custom {
        if let Some(start) = state.custom_start {
            serializer.append_pair(START_TIME_PARAM, &start.to_string());
        }
        if let Some(end) = state.custom_end {
            serializer.append_pair(END_TIME_PARAM, &end.to_string());
        }
    }
    serializer.finish()
}

fn toggle_value(pairs: &mut Vec<(String, String)>, dimension: FilterDimension, value: &str) {
    let param = dimension.param();
    let level = match dimension {
        FilterDimension::Level => LogLevel::parse(value),
        _ => None,
    };
    let is_match = |existing: &str| match level {
        Some(level) => LogLevel::parse(existing) == Some(level),
        None => existing == value,
    };

    let before = pairs.len();
    pairs.retain(|(key, existing)| !(key == param && is_match(existing)));
    if pairs.len() == before {
        let canonical = level.map_or_else(|| value.to_string(), |level| level.as_str().to_string());
        pairs.push((param.to_string(), canonical));
    }
}

fn reset_page(pairs: &mut Vec<(String, String)>) {
    upsert(pairs, PAGE_PARAM, "1");
}

fn upsert(pairs: &mut Vec<(String, String)>, key: &str, value: &str) {
    match pairs.iter().position(|(k, _)| k == key) {
        Some(index) => {
            pairs[index].1 = value.to_string();
            let mut seen = false;
            pairs.retain(|(k, _)| {
                if k != key {
                    return true;
                }
                let keep = !seen;
                seen = true;
                keep
            });
        }
        None => pairs.push((key.to_string(), value.to_string())),
    }
}

fn remove_key(pairs: &mut Vec<(String, String)>, key: &str) {
    pairs.retain(|(k, _)| k != key);
}

fn set_or_remove(pairs: &mut Vec<(String, String)>, key: &str, value: Option<i64>) {
    match value {
        Some(value) => upsert(pairs, key, &value.to_string()),
        None => remove_key(pairs, key),
    }
}

fn serialize(pairs: &[(String, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}

/// Turns user intents into navigations. Search text is debounced so a burst
/// of keystrokes produces one URL update.
pub struct UrlSynchronizer {
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    search_debounce: Duration,
    search_timer: Mutex<SingleSlotTimer>,
}

impl UrlSynchronizer {
    pub fn new(
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
        search_debounce: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            navigator,
            clock,
            search_debounce,
            search_timer: Mutex::new(SingleSlotTimer::new()),
        })
    }

    /// Apply an intent immediately.
    pub fn dispatch(&self, intent: FilterIntent) {
        let current = self.navigator.current_query();
        let next = apply_intent(&current, &intent);
        if next == current {
            debug!(?intent, "intent left the query unchanged");
        }
        self.navigator.navigate(next, intent.history_mode());
    }

    pub fn toggle(&self, dimension: FilterDimension, value: impl Into<String>) {
        self.dispatch(FilterIntent::Toggle {
            dimension,
            value: value.into(),
        });
    }

    pub fn set_time_range(&self, range: TimeRange) {
        self.dispatch(FilterIntent::SetTimeRange(range));
    }

    pub fn set_custom_range(&self, start: Option<i64>, end: Option<i64>) {
        self.dispatch(FilterIntent::SetCustomRange { start, end });
    }

    pub fn set_page(&self, page: u32) {
        self.dispatch(FilterIntent::SetPage(page));
    }

    pub async fn clear_all(&self) {
        self.search_timer.lock().await.cancel();
        self.dispatch(FilterIntent::ClearAll);
    }

    pub fn manual_refresh(&self) {
        self.dispatch(FilterIntent::ManualRefresh {
            token: self.clock.now().timestamp_millis(),
        });
    }

    /// Record a keystroke; the URL is only rewritten once typing pauses.
    pub async fn set_search_text(self: &Arc<Self>, text: impl Into<String>) {
        let text = text.into();
        let this = Arc::clone(self);
        let mut timer = self.search_timer.lock().await;
        timer.arm(self.search_debounce, async move {
            debug!(search = %text, "search debounce elapsed");
            this.dispatch(FilterIntent::SetSearchText(text));
        });
    }

    pub async fn has_pending_search(&self) -> bool {
        self.search_timer.lock().await.is_pending()
    }
}

#[cfg(test)]
#[path = "tests/url_sync_tests.rs"]
mod tests;
