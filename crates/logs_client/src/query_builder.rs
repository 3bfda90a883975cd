use chrono::{DateTime, Utc};
use shared::{
    domain::{LogType, TimeRange},
    protocol::{DocFilter, MatchType, OneOrMany, SearchRequest, SEARCH_PAGE_SIZE},
};

use crate::filter_state::FilterState;

/// Translate a filter state into a search request.
///
/// Relative ranges are resolved against `now` on every call, so repeated
/// fetches of the same state see a rolling window.
pub fn build_search_request(state: &FilterState, now: DateTime<Utc>) -> SearchRequest {
    let (start_time, end_time) = resolve_time_window(state, now);

    let doc_filter = (!state.search_text.is_empty()).then(|| DocFilter {
        phrase: state.search_text.clone(),
        match_type: MatchType::Contains,
    });

    SearchRequest {
        page: state.page.max(1),
        page_size: SEARCH_PAGE_SIZE,
        log_type: LogType::Application,
        level: OneOrMany::from_slice(&state.levels),
        environment: OneOrMany::from_slice(&state.environments),
        hostname: OneOrMany::from_slice(&state.hostnames),
        doc_filter,
        start_time,
        end_time,
    }
}

fn resolve_time_window(state: &FilterState, now: DateTime<Utc>) -> (Option<i64>, Option<i64>) {
    match state.time_range {
        TimeRange::All => (None, None),
        TimeRange::Custom => (state.custom_start, state.custom_end),
        relative => {
            let end = now.timestamp_millis();
            let span = relative
                .rolling_duration()
                .map(|duration| i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
                .unwrap_or_default();
            (Some(end.saturating_sub(span)), Some(end))
        }
    }
}

#[cfg(test)]
#[path = "tests/query_builder_tests.rs"]
mod tests;
