//! Address-bar model for the logs view.

use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    /// Add a history entry (page links).
    Push,
    /// Overwrite the current entry (filter refinements).
    Replace,
}

/// Current location: the query string without a leading `?`, plus history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    entries: Vec<String>,
    index: usize,
}

impl Location {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            entries: vec![normalize(query.into())],
            index: 0,
        }
    }

    pub fn query(&self) -> &str {
        self.entries.get(self.index).map(String::as_str).unwrap_or("")
    }

    pub fn history_len(&self) -> usize {
        self.entries.len()
    }

    pub fn can_go_back(&self) -> bool {
        self.index > 0
    }

    pub fn can_go_forward(&self) -> bool {
        self.index + 1 < self.entries.len()
    }

    fn apply(&mut self, query: String, mode: HistoryMode) {
        if self.entries.is_empty() {
            self.entries.push(query);
            self.index = 0;
            return;
        }
        match mode {
            HistoryMode::Replace => self.entries[self.index] = query,
            HistoryMode::Push => {
                self.entries.truncate(self.index + 1);
                self.entries.push(query);
                self.index += 1;
            }
        }
    }
}

pub trait Navigator: Send + Sync {
    fn current_query(&self) -> String;
    fn navigate(&self, query: String, mode: HistoryMode);
}

/// In-process navigator; subscribers are woken on every location change.
pub struct MemoryNavigator {
    location: watch::Sender<Location>,
}

impl MemoryNavigator {
    pub fn new(initial_query: impl Into<String>) -> Self {
        let (location, _) = watch::channel(Location::new(initial_query));
        Self { location }
    }

    pub fn subscribe(&self) -> watch::Receiver<Location> {
        self.location.subscribe()
    }

    pub fn location(&self) -> Location {
        self.location.borrow().clone()
    }

    pub fn back(&self) -> bool {
        self.location.send_if_modified(|location| {
            if !location.can_go_back() {
                return false;
            }
            location.index -= 1;
            true
        })
    }

    pub fn forward(&self) -> bool {
        self.location.send_if_modified(|location| {
            if !location.can_go_forward() {
                return false;
            }
            location.index += 1;
            true
        })
    }
}

impl Navigator for MemoryNavigator {
    fn current_query(&self) -> String {
        self.location.borrow().query().to_string()
    }

    fn navigate(&self, query: String, mode: HistoryMode) {
        let query = normalize(query);
        debug!(query = %query, ?mode, "navigating logs view");
        self.location.send_modify(|location| location.apply(query, mode));
    }
}

fn normalize(query: String) -> String {
    match query.strip_prefix('?') {
        Some(stripped) => stripped.to_string(),
        None => query,
    }
}
