//! Caller-owned session state threaded through the pipeline.
//!
//! Nothing here is ambient or static: the caller constructs one [`Session`]
//! and passes it (mutably) into each pipeline call. Components receive
//! exactly the state they need and write their effects back through
//! [`Session::record`], so the data flow stays visible at every call site.
//!
//! The operation log is append-only. Entries are never mutated or deleted;
//! budget trimming prunes at read time only.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::intent::{Intent, IntentClassifier};
use crate::{DEFAULT_MAX_CONTEXT_TOKENS, Message};

/// Kind of a logged operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    UserRequest,
    ModelResponse,
    TaskUpdate,
    Commit,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::UserRequest => write!(f, "user_request"),
            OperationKind::ModelResponse => write!(f, "model_response"),
            OperationKind::TaskUpdate => write!(f, "task_update"),
            OperationKind::Commit => write!(f, "commit"),
        }
    }
}

/// One append-only log entry. Created on every user request, model
/// response, task update, or commit; never mutated afterwards.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// Approximate size of the operation's payload in characters.
    pub size_estimate: usize,
}

/// Append-only operation log, monotonically increasing in timestamp.
#[derive(Debug, Default)]
pub struct OperationLog {
    records: Vec<OperationRecord>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Timestamps are clamped to never run backwards even
    /// if the clock does, keeping the log ordered.
    pub fn append(&mut self, kind: OperationKind, description: impl Into<String>, size: usize) {
        let now = Utc::now();
        let timestamp = match self.records.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };
        self.records.push(OperationRecord {
            kind,
            description: description.into(),
            timestamp,
            size_estimate: size,
        });
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The last `k` records, oldest first.
    pub fn recent(&self, k: usize) -> &[OperationRecord] {
        let start = self.records.len().saturating_sub(k);
        &self.records[start..]
    }

    /// Total characters across all record descriptions.
    pub fn total_chars(&self) -> usize {
        self.records.iter().map(|r| r.size_estimate).sum()
    }
}

/// The task currently in flight, updated on each new user instruction.
#[derive(Debug, Default)]
pub struct TaskContext {
    pub current_task_label: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub files_modified: BTreeSet<String>,
    pub is_continuation: bool,
}

impl TaskContext {
    /// Fold a new instruction into the task context.
    ///
    /// A continuation (per the classifier) extends the existing label with
    /// `" → "`; anything else starts a fresh label.
    pub fn apply_instruction(&mut self, instruction: &str, classifier: &dyn IntentClassifier) {
        let continuation = self.current_task_label.is_some()
            && classifier.classify(instruction) == Intent::Continuation;

        self.current_task_label = match (&self.current_task_label, continuation) {
            (Some(previous), true) => Some(format!("{previous} → {instruction}")),
            _ => Some(instruction.to_string()),
        };
        self.is_continuation = continuation;
        self.start_time = Some(Utc::now());
    }

    /// Record files touched while working on this task.
    pub fn record_files(&mut self, paths: impl IntoIterator<Item = impl Into<String>>) {
        for path in paths {
            self.files_modified.insert(path.into());
        }
    }
}

/// Monotonic session counters plus the derived context-utilization figure.
#[derive(Debug, Default)]
pub struct SessionState {
    pub total_operations: usize,
    pub files_accessed: BTreeSet<String>,
    pub models_used: BTreeSet<String>,
    pub context_utilization_pct: f64,
}

/// All caller-owned pipeline state for one interactive session.
#[derive(Debug)]
pub struct Session {
    /// Conversation history, oldest first.
    pub history: Vec<Message>,
    pub log: OperationLog,
    pub task: TaskContext,
    pub state: SessionState,
    /// Context window budget used for the utilization figure.
    pub max_context_tokens: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONTEXT_TOKENS)
    }
}

impl Session {
    pub fn new(max_context_tokens: usize) -> Self {
        Self {
            history: Vec::new(),
            log: OperationLog::new(),
            task: TaskContext::default(),
            state: SessionState::default(),
            max_context_tokens,
        }
    }

    /// Append an operation and refresh the derived counters.
    ///
    /// Utilization is recomputed after every append using the 4-chars-per-
    /// token estimate shared with the context budget.
    pub fn record(&mut self, kind: OperationKind, description: impl Into<String>) {
        let description = description.into();
        let size = description.len();
        self.log.append(kind, description, size);
        self.state.total_operations += 1;
        self.refresh_utilization();
    }

    /// Note a model used this session.
    pub fn record_model(&mut self, model: &str) {
        self.state.models_used.insert(model.to_string());
    }

    /// Note a file read or written this session.
    pub fn record_file_access(&mut self, path: &str) {
        self.state.files_accessed.insert(path.to_string());
    }

    /// Push a conversation exchange (user request + assistant reply).
    pub fn push_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.history.push(Message::user(user));
        self.history.push(Message::assistant(assistant));
    }

    fn refresh_utilization(&mut self) {
        let estimated_tokens = self.log.total_chars() / crate::context::CHARS_PER_TOKEN;
        self.state.context_utilization_pct = if self.max_context_tokens > 0 {
            estimated_tokens as f64 / self.max_context_tokens as f64 * 100.0
        } else {
            100.0
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::KeywordClassifier;

    #[test]
    fn log_is_append_only_and_ordered() {
        let mut log = OperationLog::new();
        log.append(OperationKind::UserRequest, "first", 5);
        log.append(OperationKind::ModelResponse, "second", 6);
        log.append(OperationKind::Commit, "third", 5);

        assert_eq!(log.len(), 3);
        let timestamps: Vec<_> = log.recent(3).iter().map(|r| r.timestamp).collect();
        assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn recent_returns_trailing_window() {
        let mut log = OperationLog::new();
        for i in 0..10 {
            log.append(OperationKind::UserRequest, format!("op {i}"), 4);
        }
        let recent = log.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].description, "op 7");
        assert_eq!(recent[2].description, "op 9");
    }

    #[test]
    fn recent_handles_short_logs() {
        let mut log = OperationLog::new();
        log.append(OperationKind::Commit, "only", 4);
        assert_eq!(log.recent(15).len(), 1);
    }

    #[test]
    fn continuation_extends_task_label() {
        let classifier = KeywordClassifier::default();
        let mut task = TaskContext::default();

        task.apply_instruction("build a website for schools", &classifier);
        assert_eq!(
            task.current_task_label.as_deref(),
            Some("build a website for schools")
        );
        assert!(!task.is_continuation);

        task.apply_instruction("change it to a dark theme", &classifier);
        assert_eq!(
            task.current_task_label.as_deref(),
            Some("build a website for schools → change it to a dark theme")
        );
        assert!(task.is_continuation);
    }

    #[test]
    fn new_topic_resets_task_label() {
        let classifier = KeywordClassifier::default();
        let mut task = TaskContext::default();

        task.apply_instruction("build a website", &classifier);
        task.apply_instruction("write a log parser in python", &classifier);
        assert_eq!(
            task.current_task_label.as_deref(),
            Some("write a log parser in python")
        );
        assert!(!task.is_continuation);
    }

    #[test]
    fn record_updates_counters_and_utilization() {
        let mut session = Session::new(100);
        assert_eq!(session.state.context_utilization_pct, 0.0);

        session.record(OperationKind::UserRequest, "x".repeat(400));
        assert_eq!(session.state.total_operations, 1);
        // 400 chars ≈ 100 tokens = 100% of a 100-token window.
        assert!((session.state.context_utilization_pct - 100.0).abs() < f64::EPSILON);

        session.record(OperationKind::ModelResponse, "x".repeat(400));
        assert_eq!(session.state.total_operations, 2);
        assert!(session.state.context_utilization_pct > 100.0);
    }

    #[test]
    fn model_and_file_tracking_deduplicates() {
        let mut session = Session::default();
        session.record_model("model-a");
        session.record_model("model-a");
        session.record_file_access("src/main.rs");
        session.record_file_access("src/main.rs");
        assert_eq!(session.state.models_used.len(), 1);
        assert_eq!(session.state.files_accessed.len(), 1);
    }

    #[test]
    fn push_exchange_appends_pairs() {
        let mut session = Session::default();
        session.push_exchange("question", "answer");
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].content, "question");
        assert_eq!(session.history[1].content, "answer");
    }
}
