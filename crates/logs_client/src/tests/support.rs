use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicI64, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use shared::{
    domain::{LogLevel, LogType, ProjectId},
    protocol::{EnvironmentOption, LogRecord, Pagination, SearchRequest, SearchResult},
};

use crate::{error::SearchError, Clock, LogSearchBackend};

pub(crate) struct FixedClock {
    millis: AtomicI64,
}

impl FixedClock {
    pub(crate) fn at_millis(millis: i64) -> Self {
        Self {
            millis: AtomicI64::new(millis),
        }
    }

    pub(crate) fn advance_millis(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .expect("valid test timestamp")
    }
}

pub(crate) fn sample_log(id: usize) -> LogRecord {
    LogRecord {
        id: format!("log-{id}"),
        timestamp: 1_700_000_000_000 + id as i64,
        level: LogLevel::Error,
        message: format!("request {id} failed"),
        environment: Some("prod".to_string()),
        hostname: Some("web-1".to_string()),
        stack_trace: None,
        details: None,
    }
}

pub(crate) fn sample_result(page: u32, count: usize, total_pages: u32) -> SearchResult {
    SearchResult {
        logs: (0..count).map(sample_log).collect(),
        pagination: Pagination {
            page,
            page_size: 50,
            total: u64::from(total_pages) * 50,
            total_pages,
        },
    }
}

struct ScriptedSearch {
    delay: Duration,
    outcome: Result<SearchResult, SearchError>,
}

/// Backend whose responses (and their latency) are queued by the test.
/// Unscripted searches answer immediately with one log for the page.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    searches: Mutex<VecDeque<ScriptedSearch>>,
    environments: Mutex<VecDeque<Result<Vec<EnvironmentOption>, SearchError>>>,
    calls: Mutex<Vec<(ProjectId, SearchRequest)>>,
    environment_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub(crate) fn respond_after(&self, delay: Duration, outcome: Result<SearchResult, SearchError>) {
        self.searches
            .lock()
            .expect("searches lock")
            .push_back(ScriptedSearch { delay, outcome });
    }

    pub(crate) fn respond_environments(
        &self,
        outcome: Result<Vec<EnvironmentOption>, SearchError>,
    ) {
        self.environments
            .lock()
            .expect("environments lock")
            .push_back(outcome);
    }

    pub(crate) fn calls(&self) -> Vec<(ProjectId, SearchRequest)> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn search_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    pub(crate) fn environment_calls(&self) -> usize {
        self.environment_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogSearchBackend for ScriptedBackend {
    async fn search(
        &self,
        project_id: &ProjectId,
        request: &SearchRequest,
    ) -> Result<SearchResult, SearchError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((project_id.clone(), request.clone()));
        let scripted = self.searches.lock().expect("searches lock").pop_front();
        match scripted {
            Some(ScriptedSearch { delay, outcome }) => {
                tokio::time::sleep(delay).await;
                outcome
            }
            None => Ok(sample_result(request.page, 1, request.page.max(1))),
        }
    }

    async fn list_environments(
        &self,
        _project_id: &ProjectId,
        _log_type: LogType,
    ) -> Result<Vec<EnvironmentOption>, SearchError> {
        self.environment_calls.fetch_add(1, Ordering::SeqCst);
        self.environments
            .lock()
            .expect("environments lock")
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
