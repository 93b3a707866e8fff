//! Bounded context chain carried across sub-goals.
//!
//! After each executed sub-goal an entry is appended; later sub-goals see
//! the trailing window as inherited context. The chain is a sliding window
//! — once it exceeds the configured size the oldest entries are dropped.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

/// Default number of entries kept in the chain.
pub const DEFAULT_CHAIN_WINDOW: usize = 5;

/// Outcome of one executed sub-goal, as carried forward.
#[derive(Debug, Clone)]
pub struct ContextChainEntry {
    pub timestamp: DateTime<Utc>,
    pub sub_goal_id: String,
    pub description: String,
    /// Result summary, or the error text for a failed sub-goal.
    pub result: String,
    pub files_changed: Vec<String>,
    /// The context that sub-goal itself inherited, for traceability.
    pub inherited_context: Option<String>,
}

/// Sliding window of prior sub-goal outcomes.
#[derive(Debug)]
pub struct ContextChain {
    entries: VecDeque<ContextChainEntry>,
    window: usize,
}

impl Default for ContextChain {
    fn default() -> Self {
        Self::new(DEFAULT_CHAIN_WINDOW)
    }
}

impl ContextChain {
    pub fn new(window: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            window: window.max(1),
        }
    }

    /// Append an entry, dropping the oldest once the window is exceeded.
    pub fn push(&mut self, entry: ContextChainEntry) {
        self.entries.push_back(entry);
        while self.entries.len() > self.window {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Entries oldest-first.
    pub fn entries(&self) -> impl Iterator<Item = &ContextChainEntry> {
        self.entries.iter()
    }

    /// Render the chain as inherited-context text for a model call.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|e| {
                let files = if e.files_changed.is_empty() {
                    String::new()
                } else {
                    format!(" (files: {})", e.files_changed.join(", "))
                };
                format!("[{}] {} — {}{files}", e.sub_goal_id, e.description, e.result)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
