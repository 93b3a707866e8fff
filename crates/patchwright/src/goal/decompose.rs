//! Goal breakdown: one model call, schema-validated JSON out.
//!
//! The model is asked for 3–5 ordered sub-goals as JSON. The response is
//! validated against the generated schema before parsing; anything
//! malformed — bad JSON, schema mismatch, empty list, total call failure —
//! degrades to a single catch-all sub-goal covering the whole request.
//! The degraded path still counts as a successful decomposition, but it is
//! surfaced as [`DecompositionMode::Fallback`] so callers and tests can
//! observe it.

use std::collections::BTreeMap;
use std::time::Duration;

use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::{ModelClient, RetryConfig, call_with_retry};
use crate::goal::{Goal, SubGoal};
use crate::{ChatRequest, Message, json_schema_for};

/// How a goal's breakdown was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompositionMode {
    /// The model supplied a valid breakdown.
    Planned,
    /// The breakdown degraded to the single catch-all sub-goal.
    Fallback,
}

/// System prompt for the breakdown call.
const BREAKDOWN_SYSTEM_PROMPT: &str = "\
You are a goal breakdown specialist. Break the user's goal into 3-5 \
specific, actionable sub-goals that can be executed in sequence, each \
building on the context from the previous ones and focused on specific \
files. Respond with JSON only, in this shape:

{
  \"sub_goals\": [
    {
      \"description\": \"what this step does\",
      \"files_to_modify\": [\"path/to/file\"],
      \"expected_changes\": {\"path/to/file\": \"what changes to make\"},
      \"dependencies\": []
    }
  ]
}

Dependencies are zero-based indices of earlier sub-goals in the list.";

/// Build the breakdown request for a goal.
pub fn breakdown_request(goal: &Goal, context: &str, model: &str, max_tokens: u32) -> ChatRequest {
    let user = format!(
        "{context}\n\nGoal: {}\nOriginal request: {}",
        goal.description, goal.original_request,
    );
    ChatRequest {
        model: model.to_string(),
        messages: vec![Message::system(BREAKDOWN_SYSTEM_PROMPT), Message::user(user)],
        max_tokens,
        temperature: 0.3,
    }
}

// ── Response shape ─────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct BreakdownResponse {
    sub_goals: Vec<BreakdownSubGoal>,
}

#[derive(Deserialize, JsonSchema)]
struct BreakdownSubGoal {
    description: String,
    #[serde(default)]
    files_to_modify: Vec<String>,
    #[serde(default)]
    expected_changes: BTreeMap<String, String>,
    #[serde(default)]
    dependencies: Vec<usize>,
}

/// The single catch-all sub-goal used when no valid breakdown exists.
pub fn fallback_sub_goal(goal_id: &str, request: &str) -> SubGoal {
    let mut sub = SubGoal::new(
        format!("{goal_id}_sub_0"),
        format!("Execute the full request: {request}"),
    );
    sub.dependencies = Vec::new();
    sub
}

/// Parse a breakdown response into sub-goals.
///
/// Returns `None` on any malformation — the caller falls back rather than
/// failing the goal.
pub fn parse_breakdown(goal_id: &str, response: &str, max_sub_goals: usize) -> Option<Vec<SubGoal>> {
    let payload = extract_json(response)?;
    let value: serde_json::Value = serde_json::from_str(&payload).ok()?;

    // Schema-validate before parsing so a shape mismatch is rejected
    // instead of half-deserialized.
    let schema = json_schema_for::<BreakdownResponse>();
    let validator = jsonschema::validator_for(&schema).ok()?;
    if !validator.is_valid(&value) {
        warn!("breakdown response failed schema validation");
        return None;
    }

    let parsed: BreakdownResponse = serde_json::from_value(value).ok()?;
    if parsed.sub_goals.is_empty() {
        return None;
    }

    let sub_goals = parsed
        .sub_goals
        .into_iter()
        .take(max_sub_goals)
        .enumerate()
        .map(|(i, raw)| {
            let mut sub = SubGoal::new(format!("{goal_id}_sub_{i}"), raw.description);
            sub.dependencies = raw.dependencies;
            sub.files_to_modify = raw.files_to_modify;
            sub.expected_changes = raw.expected_changes;
            sub
        })
        .collect();
    Some(sub_goals)
}

/// Pull the JSON payload out of a response that may wrap it in a code
/// fence or surrounding prose.
fn extract_json(response: &str) -> Option<String> {
    let trimmed = response.trim();
    if trimmed.starts_with('{') {
        return Some(trimmed.to_string());
    }

    // Fenced block first, then the outermost brace span.
    if let Some(fence_start) = trimmed.find("```") {
        let after = trimmed.get(fence_start + 3..)?;
        let body_start = after.find('\n')? + 1;
        let body = after.get(body_start..)?;
        if let Some(fence_end) = body.find("```") {
            let inner = body.get(..fence_end)?.trim();
            if inner.starts_with('{') {
                return Some(inner.to_string());
            }
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    trimmed.get(start..=end).map(str::to_string)
}

/// Decompose a goal via one model call, installing the sub-goals.
///
/// Never fails the goal: every failure path installs the catch-all
/// fallback and reports [`DecompositionMode::Fallback`].
pub async fn decompose(
    client: &dyn ModelClient,
    request: &ChatRequest,
    deadline: Duration,
    retry: &RetryConfig,
    goal: &mut Goal,
    max_sub_goals: usize,
) -> DecompositionMode {
    let mode = match call_with_retry(client, request, deadline, retry).await {
        Ok(completion) => match parse_breakdown(&goal.id, &completion.content, max_sub_goals) {
            Some(sub_goals) => {
                debug!("decomposed '{}' into {} sub-goal(s)", goal.id, sub_goals.len());
                goal.sub_goals = sub_goals;
                DecompositionMode::Planned
            }
            None => {
                warn!("breakdown unusable for '{}' — using catch-all sub-goal", goal.id);
                DecompositionMode::Fallback
            }
        },
        Err(e) => {
            warn!("breakdown call failed for '{}': {e} — using catch-all sub-goal", goal.id);
            DecompositionMode::Fallback
        }
    };

    if mode == DecompositionMode::Fallback {
        goal.sub_goals = vec![fallback_sub_goal(&goal.id, &goal.original_request)];
    }
    goal.decomposition = mode;
    mode
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChatCompletion;
    use crate::api::CompletionFuture;

    fn valid_breakdown() -> String {
        serde_json::json!({
            "sub_goals": [
                {
                    "description": "analyze the codebase",
                    "files_to_modify": [],
                    "expected_changes": {},
                    "dependencies": []
                },
                {
                    "description": "implement the change",
                    "files_to_modify": ["src/app.py"],
                    "expected_changes": {"src/app.py": "add validation"},
                    "dependencies": [0]
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn parses_valid_breakdown() {
        let subs = parse_breakdown("g1", &valid_breakdown(), 10).unwrap();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].id, "g1_sub_0");
        assert_eq!(subs[1].dependencies, vec![0]);
        assert_eq!(
            subs[1].expected_changes.get("src/app.py").map(String::as_str),
            Some("add validation")
        );
    }

    #[test]
    fn parses_fenced_breakdown() {
        let fenced = format!("Here is the plan:\n```json\n{}\n```\n", valid_breakdown());
        let subs = parse_breakdown("g1", &fenced, 10).unwrap();
        assert_eq!(subs.len(), 2);
    }

    #[test]
    fn prose_wrapped_json_is_recovered() {
        let wrapped = format!("Sure thing. {} Hope that helps!", valid_breakdown());
        assert!(parse_breakdown("g1", &wrapped, 10).is_some());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(parse_breakdown("g1", "not json at all", 10).is_none());
        assert!(parse_breakdown("g1", "{\"sub_goals\": \"oops\"}", 10).is_none());
        assert!(parse_breakdown("g1", "{\"sub_goals\": []}", 10).is_none());
    }

    #[test]
    fn schema_rejects_wrong_field_types() {
        let bad = serde_json::json!({
            "sub_goals": [{"description": 42}]
        })
        .to_string();
        assert!(parse_breakdown("g1", &bad, 10).is_none());
    }

    #[test]
    fn sub_goal_count_is_capped() {
        let many: Vec<_> = (0..20)
            .map(|i| serde_json::json!({"description": format!("step {i}")}))
            .collect();
        let response = serde_json::json!({"sub_goals": many}).to_string();
        let subs = parse_breakdown("g1", &response, 10).unwrap();
        assert_eq!(subs.len(), 10);
    }

    #[test]
    fn fallback_covers_whole_request() {
        let sub = fallback_sub_goal("g9", "add input validation to parse.py");
        assert_eq!(sub.id, "g9_sub_0");
        assert!(sub.description.contains("add input validation to parse.py"));
        assert!(sub.dependencies.is_empty());
    }

    struct CannedClient {
        response: Result<String, crate::api::CallError>,
    }

    impl ModelClient for CannedClient {
        fn complete(&self, _request: &ChatRequest) -> CompletionFuture<'_> {
            let response = self.response.clone();
            Box::pin(async move {
                response.map(|content| ChatCompletion {
                    content,
                    usage: None,
                })
            })
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "test-model".into(),
            messages: vec![Message::user("break this down")],
            max_tokens: 256,
            temperature: 0.3,
        }
    }

    #[tokio::test]
    async fn decompose_installs_planned_sub_goals() {
        let client = CannedClient {
            response: Ok(valid_breakdown()),
        };
        let mut goal = Goal::new("g1", "add validation", "add validation to parse.py");
        let mode = decompose(
            &client,
            &request(),
            Duration::from_secs(1),
            &RetryConfig::with_retries(0),
            &mut goal,
            10,
        )
        .await;
        assert_eq!(mode, DecompositionMode::Planned);
        assert_eq!(goal.sub_goals.len(), 2);
        assert_eq!(goal.decomposition, DecompositionMode::Planned);
    }

    #[tokio::test]
    async fn decompose_falls_back_on_prose_response() {
        let client = CannedClient {
            response: Ok("I could not produce a breakdown, sorry.".into()),
        };
        let mut goal = Goal::new("g1", "add validation", "add validation to parse.py");
        let mode = decompose(
            &client,
            &request(),
            Duration::from_secs(1),
            &RetryConfig::with_retries(0),
            &mut goal,
            10,
        )
        .await;
        assert_eq!(mode, DecompositionMode::Fallback);
        assert_eq!(goal.sub_goals.len(), 1);
        assert!(goal.sub_goals[0].description.contains("parse.py"));
    }

    #[tokio::test]
    async fn decompose_falls_back_on_call_failure() {
        let client = CannedClient {
            response: Err(crate::api::CallError::EmptyResponse),
        };
        let mut goal = Goal::new("g1", "desc", "request text");
        let mode = decompose(
            &client,
            &request(),
            Duration::from_millis(100),
            &RetryConfig::with_retries(0),
            &mut goal,
            10,
        )
        .await;
        assert_eq!(mode, DecompositionMode::Fallback);
        assert_eq!(goal.decomposition, DecompositionMode::Fallback);
    }
}
