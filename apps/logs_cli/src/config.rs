use std::{fs, path::Path, time::Duration};

use anyhow::Context;
use logs_client::SearchTimings;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "logs.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub project_id: Option<String>,
    pub search_debounce_ms: u64,
    pub refresh_indicator_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8080/api".into(),
            auth_token: None,
            project_id: None,
            search_debounce_ms: 500,
            refresh_indicator_delay_ms: 300,
        }
    }
}

impl Settings {
    pub fn timings(&self) -> SearchTimings {
        SearchTimings {
            search_debounce: Duration::from_millis(self.search_debounce_ms),
            refresh_indicator_delay: Duration::from_millis(self.refresh_indicator_delay_ms),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_url: Option<String>,
    auth_token: Option<String>,
    project_id: Option<String>,
    search_debounce_ms: Option<u64>,
    refresh_indicator_delay_ms: Option<u64>,
}

/// Defaults, then the config file (if present), then environment variables.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if path.exists() {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        apply_file(&mut settings, &raw)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: FileSettings = toml::from_str(raw)?;
    if let Some(v) = file_cfg.api_url {
        settings.api_url = v;
    }
    if file_cfg.auth_token.is_some() {
        settings.auth_token = file_cfg.auth_token;
    }
    if file_cfg.project_id.is_some() {
        settings.project_id = file_cfg.project_id;
    }
    if let Some(v) = file_cfg.search_debounce_ms {
        settings.search_debounce_ms = v;
    }
    if let Some(v) = file_cfg.refresh_indicator_delay_ms {
        settings.refresh_indicator_delay_ms = v;
    }
    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("LOGS_API_URL") {
        settings.api_url = v;
    }
    if let Some(v) = var("APP__API_URL") {
        settings.api_url = v;
    }

    if let Some(v) = var("LOGS_AUTH_TOKEN") {
        settings.auth_token = Some(v);
    }
    if let Some(v) = var("APP__AUTH_TOKEN") {
        settings.auth_token = Some(v);
    }

    if let Some(v) = var("APP__PROJECT_ID") {
        settings.project_id = Some(v);
    }

    if let Some(v) = var("APP__SEARCH_DEBOUNCE_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.search_debounce_ms = parsed;
        }
    }
    if let Some(v) = var("APP__REFRESH_INDICATOR_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.refresh_indicator_delay_ms = parsed;
        }
    }
}
