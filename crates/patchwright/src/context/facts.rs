//! Essential-fact extraction.
//!
//! Scans recent conversation, task, and operation text for a small fixed
//! vocabulary and emits short `KEY: VALUE` lines. These facts anchor the
//! highest-priority context section, so an inferred project type or
//! location survives even the tightest budget trim.

use regex::Regex;

use crate::session::OperationRecord;
use crate::workspace::ProjectType;
use crate::Message;

/// How many trailing conversation messages to scan.
const SCAN_MESSAGES: usize = 6;

/// How many trailing operation records to scan.
const SCAN_OPERATIONS: usize = 5;

/// Keyword → fact table. Matching is substring on lowercased text.
const KEYWORD_FACTS: &[(&str, &str)] = &[
    ("website", "PROJECT TYPE: Website/HTML"),
    ("html", "PROJECT TYPE: Website/HTML"),
    ("json", "FILE TYPE: JSON data"),
    ("yaml", "FILE TYPE: YAML data"),
    ("school", "CONTENT TYPE: Schools"),
    ("college", "CONTENT TYPE: Colleges"),
    ("university", "CONTENT TYPE: Universities"),
];

/// Text sources the extractor scans, most authoritative first.
pub struct FactSources<'a> {
    /// Conversation history, oldest first; only the tail is scanned.
    pub conversation: &'a [Message],
    /// Current task label, if a task is in flight.
    pub task_label: Option<&'a str>,
    /// Operation log records, oldest first; only the tail is scanned.
    pub operations: &'a [OperationRecord],
    /// Project type inferred from workspace markers.
    pub project_type: Option<ProjectType>,
}

/// Extract `KEY: VALUE` facts, deduplicated in first-seen order.
pub fn extract_essential_facts(sources: &FactSources<'_>) -> Vec<String> {
    let mut facts: Vec<String> = Vec::new();

    // Workspace-inferred project type is ground truth and goes first.
    if let Some(kind) = sources.project_type
        && kind != ProjectType::Unknown
    {
        push_unique(&mut facts, format!("PROJECT TYPE: {kind} project"));
    }

    let location_re = Regex::new(r"\b(?:in|of|for)\s+([A-Z][a-z]{2,})").expect("valid regex");

    let mut scan = |text: &str| {
        let lower = text.to_lowercase();
        for (keyword, fact) in KEYWORD_FACTS {
            if lower.contains(keyword) {
                push_unique(&mut facts, (*fact).to_string());
            }
        }
        if let Some(caps) = location_re.captures(text)
            && let Some(m) = caps.get(1)
        {
            push_unique(&mut facts, format!("LOCATION: {}", m.as_str()));
        }
    };

    let tail = sources
        .conversation
        .len()
        .saturating_sub(SCAN_MESSAGES);
    for message in &sources.conversation[tail..] {
        scan(&message.content);
    }
    if let Some(label) = sources.task_label {
        scan(label);
    }
    let tail = sources.operations.len().saturating_sub(SCAN_OPERATIONS);
    for record in &sources.operations[tail..] {
        scan(&record.description);
    }

    facts
}

fn push_unique(facts: &mut Vec<String>, fact: String) {
    if !facts.contains(&fact) {
        facts.push(fact);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{OperationKind, OperationLog};

    fn sources<'a>(conversation: &'a [Message], task: Option<&'a str>) -> FactSources<'a> {
        FactSources {
            conversation,
            task_label: task,
            operations: &[],
            project_type: None,
        }
    }

    #[test]
    fn extracts_project_and_content_type() {
        let messages = vec![Message::user("build a website listing schools of Delhi")];
        let facts = extract_essential_facts(&sources(&messages, None));
        assert!(facts.contains(&"PROJECT TYPE: Website/HTML".to_string()));
        assert!(facts.contains(&"CONTENT TYPE: Schools".to_string()));
        assert!(facts.contains(&"LOCATION: Delhi".to_string()));
    }

    #[test]
    fn deduplicates_preserving_first_seen_order() {
        let messages = vec![
            Message::user("make an html page"),
            Message::assistant("created an HTML page with a JSON config"),
            Message::user("the website needs a footer"),
        ];
        let facts = extract_essential_facts(&sources(&messages, None));
        let html_count = facts
            .iter()
            .filter(|f| f.as_str() == "PROJECT TYPE: Website/HTML")
            .count();
        assert_eq!(html_count, 1);
        assert_eq!(facts[0], "PROJECT TYPE: Website/HTML");
        assert!(facts.contains(&"FILE TYPE: JSON data".to_string()));
    }

    #[test]
    fn workspace_project_type_comes_first() {
        let messages = vec![Message::user("add a website landing page")];
        let src = FactSources {
            conversation: &messages,
            task_label: None,
            operations: &[],
            project_type: Some(ProjectType::Rust),
        };
        let facts = extract_essential_facts(&src);
        assert_eq!(facts[0], "PROJECT TYPE: rust project");
    }

    #[test]
    fn scans_task_label_and_operations() {
        let mut log = OperationLog::new();
        log.append(OperationKind::Commit, "wrote schools.json", 18);
        let src = FactSources {
            conversation: &[],
            task_label: Some("build the college directory"),
            operations: log.recent(5),
            project_type: None,
        };
        let facts = extract_essential_facts(&src);
        assert!(facts.contains(&"CONTENT TYPE: Colleges".to_string()));
        assert!(facts.contains(&"FILE TYPE: JSON data".to_string()));
    }

    #[test]
    fn only_recent_messages_are_scanned() {
        let mut messages = vec![Message::user("this mentions a website early on")];
        for i in 0..10 {
            messages.push(Message::user(format!("padding message {i}")));
        }
        let facts = extract_essential_facts(&sources(&messages, None));
        assert!(facts.is_empty());
    }

    #[test]
    fn no_matches_yields_empty() {
        let messages = vec![Message::user("hello there")];
        assert!(extract_essential_facts(&sources(&messages, None)).is_empty());
    }
}
