//! Priority-ordered context assembly.
//!
//! [`build_context`] produces the full context string sent with each model
//! call: named sections wrapped in `=== NAME ===` / `=== END NAME ===`
//! markers, emitted in the same fixed priority order that
//! [`fit_to_budget`](super::budget::fit_to_budget) walks when trimming.
//! Empty sections are omitted entirely.

use chrono::{DateTime, Utc};

use crate::context::facts::{FactSources, extract_essential_facts};
use crate::session::{OperationLog, OperationRecord, SessionState, TaskContext};
use crate::workspace::ProjectType;
use crate::{Message, MessageRole};

/// How many trailing conversation messages appear in the history section.
const HISTORY_MESSAGES: usize = 10;

/// How many trailing operations appear in the recent-operations section.
const RECENT_OPERATIONS: usize = 15;

/// Section names, in priority order (highest first). Budget fitting keeps a
/// prefix of this list; everything below the first overflow is dropped.
pub const SECTION_PRIORITY: &[&str] = &[
    "ESSENTIAL CONTEXT",
    "CONVERSATION HISTORY",
    "CURRENT USER REQUEST",
    "CURRENT TASK CONTEXT",
    "CONTEXT INSTRUCTIONS",
    "RECENT OPERATIONS",
    "PROJECT CONTEXT",
    "SESSION STATE",
];

/// Standing behavioral instructions included with every call.
const STANDING_INSTRUCTIONS: &str = "\
Maintain continuity with the previous conversation and task. When the user \
refers to earlier work (\"change it\", \"make it\", \"that file\"), resolve \
the reference against the history and task context above. Preserve existing \
content when modifying files; never discard work that was not explicitly \
asked to be removed. Always honor the essential context facts above.";

/// Workspace metadata for the project-context section.
#[derive(Debug, Clone)]
pub struct WorkspaceInfo {
    pub root: String,
    pub file_count: usize,
    pub project_type: ProjectType,
}

/// Everything [`build_context`] reads. All references point into
/// caller-owned state; nothing here is ambient.
pub struct ContextInputs<'a> {
    pub user_input: &'a str,
    pub conversation: &'a [Message],
    pub task: &'a TaskContext,
    pub log: &'a OperationLog,
    pub state: &'a SessionState,
    pub workspace: Option<&'a WorkspaceInfo>,
    pub model: &'a str,
}

/// Assemble the full context string in priority order.
///
/// The output is the input to [`fit_to_budget`](super::budget::fit_to_budget);
/// token estimation uses the shared 4-chars-per-token approximation.
pub fn build_context(inputs: &ContextInputs<'_>) -> String {
    let mut sections: Vec<(&str, String)> = Vec::new();

    let facts = extract_essential_facts(&FactSources {
        conversation: inputs.conversation,
        task_label: inputs.task.current_task_label.as_deref(),
        operations: inputs.log.recent(RECENT_OPERATIONS),
        project_type: inputs.workspace.map(|w| w.project_type),
    });
    if !facts.is_empty() {
        let mut body = String::from("The following facts MUST be preserved in all operations:\n");
        body.push_str(&facts.join("\n"));
        sections.push(("ESSENTIAL CONTEXT", body));
    }

    if !inputs.conversation.is_empty() {
        let tail = inputs.conversation.len().saturating_sub(HISTORY_MESSAGES);
        let body = inputs.conversation[tail..]
            .iter()
            .map(|m| match m.role {
                MessageRole::User => format!("USER: {}", m.content),
                MessageRole::Assistant => format!("ASSISTANT: {}", m.content),
                MessageRole::System => format!("SYSTEM: {}", m.content),
            })
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(("CONVERSATION HISTORY", body));
    }

    sections.push((
        "CURRENT USER REQUEST",
        format!("User input: {}", inputs.user_input),
    ));

    if let Some(label) = inputs.task.current_task_label.as_deref() {
        let mut body = format!("Current task: {label}");
        if let Some(start) = inputs.task.start_time {
            body.push_str(&format!("\nStarted: {}", format_time(start)));
        }
        if !inputs.task.files_modified.is_empty() {
            let files: Vec<&str> = inputs.task.files_modified.iter().map(String::as_str).collect();
            body.push_str(&format!("\nFiles modified: {}", files.join(", ")));
        }
        if inputs.task.is_continuation {
            body.push_str("\nThis request continues the task above.");
        }
        sections.push(("CURRENT TASK CONTEXT", body));
    }

    sections.push(("CONTEXT INSTRUCTIONS", STANDING_INSTRUCTIONS.to_string()));

    let recent = inputs.log.recent(RECENT_OPERATIONS);
    if !recent.is_empty() {
        let body = recent
            .iter()
            .map(format_operation)
            .collect::<Vec<_>>()
            .join("\n");
        sections.push(("RECENT OPERATIONS", body));
    }

    if let Some(ws) = inputs.workspace {
        let body = format!(
            "Workspace: {}\nAccessible files: {}\nProject type: {}",
            ws.root, ws.file_count, ws.project_type,
        );
        sections.push(("PROJECT CONTEXT", body));
    }

    let body = format!(
        "Total operations: {}\nFiles accessed: {}\nContext utilization: {:.1}%\nCurrent model: {}",
        inputs.state.total_operations,
        inputs.state.files_accessed.len(),
        inputs.state.context_utilization_pct,
        inputs.model,
    );
    sections.push(("SESSION STATE", body));

    sections
        .iter()
        .map(|(name, body)| format!("=== {name} ===\n{body}\n=== END {name} ==="))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_operation(record: &OperationRecord) -> String {
    format!(
        "- [{}] {}: {}",
        format_time(record.timestamp),
        record.kind,
        record.description,
    )
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{OperationKind, Session};

    fn build(session: &Session, input: &str, workspace: Option<&WorkspaceInfo>) -> String {
        build_context(&ContextInputs {
            user_input: input,
            conversation: &session.history,
            task: &session.task,
            log: &session.log,
            state: &session.state,
            workspace,
            model: "test-model",
        })
    }

    #[test]
    fn minimal_session_has_request_instructions_and_state() {
        let session = Session::default();
        let context = build(&session, "add a parser", None);

        assert!(context.contains("=== CURRENT USER REQUEST ===\nUser input: add a parser"));
        assert!(context.contains("=== CONTEXT INSTRUCTIONS ==="));
        assert!(context.contains("=== SESSION STATE ==="));
        assert!(context.contains("Current model: test-model"));
        // Empty sections are omitted.
        assert!(!context.contains("=== CONVERSATION HISTORY ==="));
        assert!(!context.contains("=== CURRENT TASK CONTEXT ==="));
    }

    #[test]
    fn sections_appear_in_priority_order() {
        let mut session = Session::default();
        session.push_exchange("build a website for schools", "done");
        session.record(OperationKind::Commit, "wrote index.html");

        let ws = WorkspaceInfo {
            root: "/work".into(),
            file_count: 3,
            project_type: ProjectType::Unknown,
        };
        let context = build(&session, "change it", Some(&ws));

        let positions: Vec<usize> = SECTION_PRIORITY
            .iter()
            .filter_map(|name| context.find(&format!("=== {name} ===")))
            .collect();
        assert!(positions.len() >= 5, "expected most sections present");
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn essential_facts_lead_when_present() {
        let mut session = Session::default();
        session.push_exchange("build an html site", "created index.html");
        let context = build(&session, "make it blue", None);

        assert!(context.starts_with("=== ESSENTIAL CONTEXT ==="));
        assert!(context.contains("PROJECT TYPE: Website/HTML"));
    }

    #[test]
    fn conversation_history_is_windowed() {
        let mut session = Session::default();
        for i in 0..12 {
            session.push_exchange(format!("request {i}"), format!("reply {i}"));
        }
        let context = build(&session, "next", None);
        // 24 messages, window of 10 — the early ones are gone.
        assert!(!context.contains("request 0"));
        assert!(context.contains("reply 11"));
    }

    #[test]
    fn task_context_reflects_continuation() {
        let mut session = Session::default();
        session.task.current_task_label = Some("build site → change it".into());
        session.task.is_continuation = true;
        session.task.record_files(["index.html"]);

        let context = build(&session, "more", None);
        assert!(context.contains("Current task: build site → change it"));
        assert!(context.contains("Files modified: index.html"));
        assert!(context.contains("continues the task above"));
    }

    #[test]
    fn project_context_includes_type() {
        let session = Session::default();
        let ws = WorkspaceInfo {
            root: "/work".into(),
            file_count: 42,
            project_type: ProjectType::Rust,
        };
        let context = build(&session, "x", Some(&ws));
        assert!(context.contains("Project type: rust"));
        assert!(context.contains("Accessible files: 42"));
    }
}
