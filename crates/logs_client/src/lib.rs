use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{LogType, ProjectId},
    error::ApiError,
    protocol::{
        EnvironmentOption, EnvironmentsQuery, EnvironmentsResponse, SearchRequest, SearchResult,
    },
};
use tracing::debug;
use url::Url;

pub mod environments;
pub mod error;
pub mod filter_state;
pub mod navigator;
pub mod orchestrator;
pub mod pagination;
pub mod query_builder;
pub mod timer;
pub mod url_sync;

pub use environments::{EnvironmentFilter, EnvironmentFilterState};
pub use error::{describe_search_failure, SearchError};
pub use filter_state::{FilterDimension, FilterState};
pub use navigator::{HistoryMode, Location, MemoryNavigator, Navigator};
pub use orchestrator::{
    LogsDisplay, SearchEvent, SearchOrchestrator, SearchTimings, TriggerKey, ViewState,
};
pub use pagination::{page_href, page_items, PageItem};
pub use query_builder::build_search_request;
pub use url_sync::{apply_intent, encode_filter_state, FilterIntent, UrlSynchronizer};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Outbound interface to the log search service.
#[async_trait]
pub trait LogSearchBackend: Send + Sync {
    async fn search(
        &self,
        project_id: &ProjectId,
        request: &SearchRequest,
    ) -> Result<SearchResult, SearchError>;

    async fn list_environments(
        &self,
        project_id: &ProjectId,
        log_type: LogType,
    ) -> Result<Vec<EnvironmentOption>, SearchError>;
}

pub struct MissingLogSearchBackend;

#[async_trait]
impl LogSearchBackend for MissingLogSearchBackend {
    async fn search(
        &self,
        _project_id: &ProjectId,
        _request: &SearchRequest,
    ) -> Result<SearchResult, SearchError> {
        Err(SearchError::Unavailable)
    }

    async fn list_environments(
        &self,
        _project_id: &ProjectId,
        _log_type: LogType,
    ) -> Result<Vec<EnvironmentOption>, SearchError> {
        Err(SearchError::Unavailable)
    }
}

/// Bearer-authenticated HTTP client for the log search service.
pub struct HttpLogSearchClient {
    http: Client,
    api_url: Url,
    auth_token: String,
}

impl HttpLogSearchClient {
    pub fn new(api_url: &str, auth_token: impl Into<String>) -> Result<Self, SearchError> {
        let api_url =
            Url::parse(api_url).map_err(|err| SearchError::InvalidApiUrl(err.to_string()))?;
        if api_url.cannot_be_a_base() {
            return Err(SearchError::InvalidApiUrl(format!(
                "{api_url} cannot be used as a base url"
            )));
        }
        Ok(Self {
            http: Client::new(),
            api_url,
            auth_token: auth_token.into(),
        })
    }

    fn project_endpoint(&self, project_id: &ProjectId, tail: &[&str]) -> Result<Url, SearchError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| SearchError::InvalidApiUrl(self.api_url.to_string()))?
            .pop_if_empty()
            .extend(["projects", project_id.as_str(), "logs"])
            .extend(tail);
        Ok(url)
    }
}

#[async_trait]
impl LogSearchBackend for HttpLogSearchClient {
    async fn search(
        &self,
        project_id: &ProjectId,
        request: &SearchRequest,
    ) -> Result<SearchResult, SearchError> {
        let url = self.project_endpoint(project_id, &["search"])?;
        debug!(%project_id, page = request.page, "posting log search");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.auth_token)
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }

    async fn list_environments(
        &self,
        project_id: &ProjectId,
        log_type: LogType,
    ) -> Result<Vec<EnvironmentOption>, SearchError> {
        let url = self.project_endpoint(project_id, &["environments"])?;
        debug!(%project_id, log_type = log_type.as_str(), "listing log environments");
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.auth_token)
            .query(&EnvironmentsQuery { log_type })
            .send()
            .await?;
        let body: EnvironmentsResponse = read_json(response).await?;
        Ok(body.environments)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, SearchError> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        let status = status.as_u16();
        return Err(match serde_json::from_slice::<ApiError>(&body) {
            Ok(api_error) => SearchError::Api {
                status,
                source: api_error.into(),
            },
            Err(_) => SearchError::Status { status },
        });
    }
    serde_json::from_slice(&body).map_err(|err| SearchError::Decode(err.to_string()))
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod tests_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
