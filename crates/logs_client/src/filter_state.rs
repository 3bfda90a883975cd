//! Canonical filter state derived from the logs view query string.
//!
//! The URL is the only long-lived store of filter intent; a [`FilterState`]
//! is recomputed from it whenever the location changes.

use shared::domain::{LogLevel, TimeRange};
use tracing::debug;
use url::form_urlencoded;

pub const PAGE_PARAM: &str = "page";
pub const LEVEL_PARAM: &str = "level";
pub const ENVIRONMENT_PARAM: &str = "environment";
pub const HOSTNAME_PARAM: &str = "hostname";
pub const SEARCH_PARAM: &str = "search";
pub const TIME_RANGE_PARAM: &str = "timeRange";
pub const START_TIME_PARAM: &str = "startTime";
pub const END_TIME_PARAM: &str = "endTime";
pub const REFRESH_PARAM: &str = "_refresh";

/// Parameters removed by "clear all".
pub const FILTER_PARAMS: [&str; 7] = [
    LEVEL_PARAM,
    ENVIRONMENT_PARAM,
    HOSTNAME_PARAM,
    SEARCH_PARAM,
    TIME_RANGE_PARAM,
    START_TIME_PARAM,
    END_TIME_PARAM,
];

/// Which multi-value filter an intent targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterDimension {
    Level,
    Environment,
    Hostname,
}

impl FilterDimension {
    pub fn param(self) -> &'static str {
        match self {
            FilterDimension::Level => LEVEL_PARAM,
            FilterDimension::Environment => ENVIRONMENT_PARAM,
            FilterDimension::Hostname => HOSTNAME_PARAM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub page: u32,
    /// Selection order is kept; membership is unique.
    pub levels: Vec<LogLevel>,
    pub environments: Vec<String>,
    pub hostnames: Vec<String>,
    pub search_text: String,
    pub time_range: TimeRange,
    pub custom_start: Option<i64>,
    pub custom_end: Option<i64>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            page: 1,
            levels: Vec::new(),
            environments: Vec::new(),
            hostnames: Vec::new(),
            search_text: String::new(),
            time_range: TimeRange::All,
            custom_start: None,
            custom_end: None,
        }
    }
}

impl FilterState {
    /// Derive the state from a raw query string (with or without a leading `?`).
    pub fn from_query(query: &str) -> Self {
        let pairs = parse_pairs(query);
        let mut state = FilterState::default();

        if let Some(raw) = first_value(&pairs, PAGE_PARAM) {
            state.page = parse_page(raw);
        }

        for (key, value) in &pairs {
            match key.as_str() {
                LEVEL_PARAM => match LogLevel::parse(value) {
                    Some(level) => push_unique(&mut state.levels, level),
                    None => debug!(value = %value, "ignoring unknown level in query"),
                },
                ENVIRONMENT_PARAM => push_unique(&mut state.environments, value.clone()),
                HOSTNAME_PARAM => push_unique(&mut state.hostnames, value.clone()),
                _ => {}
            }
        }

        if let Some(search) = first_value(&pairs, SEARCH_PARAM) {
            state.search_text = search.to_string();
        }

        if let Some(raw) = first_value(&pairs, TIME_RANGE_PARAM) {
            state.time_range = TimeRange::parse(raw).unwrap_or_else(|| {
                debug!(value = %raw, "unknown time range in query, using all");
                TimeRange::All
            });
        }

        if state.time_range == TimeRange::Custom {
            state.custom_start = first_value(&pairs, START_TIME_PARAM).and_then(parse_epoch_millis);
            state.custom_end = first_value(&pairs, END_TIME_PARAM).and_then(parse_epoch_millis);
        }

        state
    }

    pub fn values(&self, dimension: FilterDimension) -> Vec<String> {
        match dimension {
            FilterDimension::Level => self.levels.iter().map(|l| l.as_str().to_string()).collect(),
            FilterDimension::Environment => self.environments.clone(),
            FilterDimension::Hostname => self.hostnames.clone(),
        }
    }

    /// Number of active filter groups, pagination excluded.
    pub fn active_filter_count(&self) -> usize {
        [
            !self.levels.is_empty(),
            !self.environments.is_empty(),
            !self.hostnames.is_empty(),
            !self.search_text.is_empty(),
            self.time_range != TimeRange::All,
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }

    pub fn has_active_filters(&self) -> bool {
        self.active_filter_count() > 0
    }
}

/// Opaque cache-busting token written by a manual refresh.
pub fn refresh_token(query: &str) -> Option<String> {
    let pairs = parse_pairs(query);
    first_value(&pairs, REFRESH_PARAM).map(str::to_string)
}

pub(crate) fn parse_pairs(query: &str) -> Vec<(String, String)> {
    let query = query.strip_prefix('?').unwrap_or(query);
    form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

fn first_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, value)| value.as_str())
}

fn parse_page(raw: &str) -> u32 {
    match raw.trim().parse::<i64>() {
        Ok(page) if page >= 1 => u32::try_from(page).unwrap_or(u32::MAX),
        _ => 1,
    }
}

fn parse_epoch_millis(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

fn push_unique<T: PartialEq>(values: &mut Vec<T>, value: T) {
    if !values.contains(&value) {
        values.push(value);
    }
}

#[cfg(test)]
#[path = "tests/filter_state_tests.rs"]
mod tests;
