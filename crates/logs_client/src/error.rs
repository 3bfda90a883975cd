use shared::error::{ApiException, ErrorCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to reach log search backend: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("log search backend returned status {status}: {source}")]
    Api {
        status: u16,
        #[source]
        source: ApiException,
    },
    #[error("log search backend returned status {status}")]
    Status { status: u16 },
    #[error("invalid response from log search backend: {0}")]
    Decode(String),
    #[error("log search backend is unavailable")]
    Unavailable,
    #[error("invalid log search api url: {0}")]
    InvalidApiUrl(String),
}

impl SearchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            SearchError::Api { status, .. } | SearchError::Status { status } => Some(*status),
            SearchError::Transport(err) => err.status().map(|status| status.as_u16()),
            SearchError::Decode(_) | SearchError::Unavailable | SearchError::InvalidApiUrl(_) => {
                None
            }
        }
    }

    fn is_unauthorized(&self) -> bool {
        if let SearchError::Api { source, .. } = self {
            if matches!(source.code, ErrorCode::Unauthorized | ErrorCode::Forbidden) {
                return true;
            }
        }
        matches!(self.status(), Some(401 | 403))
    }
}

/// Human-readable message shown in place of (or above) the log list.
pub fn describe_search_failure(err: &SearchError) -> String {
    if err.is_unauthorized() {
        return "Your session is not authorized to view these logs. Sign in again and retry."
            .to_string();
    }

    match err {
        SearchError::Transport(inner) if inner.is_timeout() || inner.is_connect() => {
            "Log service unreachable; check your connection and reload logs.".to_string()
        }
        SearchError::Api { source, .. } if matches!(source.code, ErrorCode::Validation) => {
            format!("The search was rejected: {}", source.message)
        }
        SearchError::Api { source, .. } if matches!(source.code, ErrorCode::RateLimited) => {
            "Too many searches in a short time; wait a moment and reload logs.".to_string()
        }
        SearchError::Unavailable => "Log search is not available for this project.".to_string(),
        other => match other.status() {
            Some(status) if status >= 500 => {
                "The log service failed to complete the search. Try reloading logs.".to_string()
            }
            _ => format!("Failed to load logs: {other}"),
        },
    }
}
