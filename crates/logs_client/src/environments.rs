use std::sync::Arc;

use shared::{
    domain::{LogType, ProjectId},
    protocol::EnvironmentOption,
};
use tokio::sync::{Mutex, OnceCell};
use tracing::{info, warn};

use crate::LogSearchBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentFilterState {
    NotLoaded,
    Loaded(Vec<EnvironmentOption>),
    /// Only this dropdown is degraded; the log search is unaffected.
    Failed(String),
}

/// Environment dropdown options, fetched the first time the control opens
/// and cached for the lifetime of the view. A failed load is retried on the
/// next open.
pub struct EnvironmentFilter {
    backend: Arc<dyn LogSearchBackend>,
    project_id: ProjectId,
    options: OnceCell<Vec<EnvironmentOption>>,
    last_error: Mutex<Option<String>>,
}

impl EnvironmentFilter {
    pub fn new(backend: Arc<dyn LogSearchBackend>, project_id: ProjectId) -> Self {
        Self {
            backend,
            project_id,
            options: OnceCell::new(),
            last_error: Mutex::new(None),
        }
    }

    pub async fn open(&self) -> EnvironmentFilterState {
        let loaded = self
            .options
            .get_or_try_init(|| async {
                self.backend
                    .list_environments(&self.project_id, LogType::Application)
                    .await
            })
            .await;

        match loaded {
            Ok(options) => {
                *self.last_error.lock().await = None;
                info!(
                    project_id = %self.project_id,
                    count = options.len(),
                    "environment options ready"
                );
                EnvironmentFilterState::Loaded(options.clone())
            }
            Err(err) => {
                warn!(project_id = %self.project_id, error = %err, "failed to load environments");
                let message = format!("Could not load environments: {err}");
                *self.last_error.lock().await = Some(message.clone());
                EnvironmentFilterState::Failed(message)
            }
        }
    }

    pub async fn state(&self) -> EnvironmentFilterState {
        if let Some(options) = self.options.get() {
            return EnvironmentFilterState::Loaded(options.clone());
        }
        match self.last_error.lock().await.clone() {
            Some(message) => EnvironmentFilterState::Failed(message),
            None => EnvironmentFilterState::NotLoaded,
        }
    }
}
