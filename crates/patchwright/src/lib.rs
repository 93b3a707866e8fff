//! Interactive coding-assistant pipeline: natural-language requests in,
//! reviewed and applied workspace changes out.
//!
//! `patchwright` turns a user goal into an ordered chain of sub-goals and
//! executes them sequentially against a chat-completion model. Each sub-goal
//! assembles a token-budgeted context from caller-owned session state, sends
//! one model call, extracts a structured change set from the response text,
//! and walks every proposed file change through an interactive diff review
//! before anything touches the workspace.
//!
//! # Pipeline
//!
//! ```text
//! user goal
//!    │ decompose (one model call, schema-validated JSON)
//!    ▼
//! [SubGoal, SubGoal, ...]   executed in order, dependency-gated
//!    │ per sub-goal: build_context → fit_to_budget → model call
//!    ▼
//! response text ── extract ──► Vec<Modification>
//!    │ per modification: unified diff → accept / edit / cancel
//!    ▼
//! commit (sole workspace writer) ──► operation log + context chain
//! ```
//!
//! # Where to find things
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | [`ModelClient`](api::ModelClient) seam, HTTP client, typed [`CallError`](api::CallError), deadline + retry |
//! | [`session`] | Caller-owned state: operation log, task context, session counters, conversation history |
//! | [`context`] | Priority-ordered context sections, essential facts, token-budget fitting |
//! | [`extract`] | [`Extractor`](extract::Extractor) seam and the delimiter-block change-set matcher |
//! | [`review`] | Unified diff, [`ReviewUi`](review::ReviewUi) seam, per-unit review state machine, commit with backup |
//! | [`goal`] | Goal decomposition, dependency-gated execution, context chain, goal history |
//! | [`intent`] | Pluggable continuation/intent classifier |
//! | [`workspace`] | Workspace scanning, project-type inference, guarded file I/O |
//!
//! # Design principles
//!
//! 1. **State is passed, never ambient.** Every component receives exactly
//!    the state it needs as arguments; the caller owns the [`session::Session`]
//!    and threads it through each pipeline call.
//!
//! 2. **Nothing is written without an explicit decision.** All workspace
//!    writes go through the review engine's commit, and every committed file
//!    had its own accepted review — batch "accept all" counts as one
//!    decision per file.
//!
//! 3. **Failures stay local.** A failed sub-goal is recorded and execution
//!    moves on; a failed commit is reported per file and siblings proceed;
//!    a malformed breakdown degrades to a single catch-all sub-goal.
//!
//! 4. **Seams are traits.** The model client, the change-set extractor, the
//!    review UI, and the intent classifier are all swappable behind small
//!    traits so the crude defaults can be replaced without touching the
//!    pipeline's control flow.

pub mod api;
pub mod context;
pub mod extract;
pub mod goal;
pub mod intent;
pub mod prelude;
pub mod review;
pub mod session;
pub mod workspace;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

/// Default model for all LLM calls.
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

/// Default context window budget in tokens for assembled context strings.
pub const DEFAULT_MAX_CONTEXT_TOKENS: usize = 64_000;

/// Default per-response token limit.
pub const DEFAULT_MAX_TOKENS: u32 = 8192;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. Bridges strong Rust types to the
/// `serde_json::Value` schemas used for validating model output.
///
/// # Example
///
/// ```
/// use patchwright::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct Breakdown {
///     steps: Vec<String>,
/// }
///
/// let schema = json_schema_for::<Breakdown>();
/// assert_eq!(schema["type"], "object");
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// ── Request / response types ───────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Clone, Debug, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "is_zero_f32")]
    pub temperature: f32,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}
fn is_zero_f32(v: &f32) -> bool {
    *v == 0.0
}

/// Clean return type from a model call.
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub usage: Option<UsageInfo>,
}

/// Token usage statistics reported by the API.
#[derive(Deserialize, Debug, Clone)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content, "hello");

        let user = Message::user("world");
        assert_eq!(user.role, MessageRole::User);

        let assist = Message::assistant("reply");
        assert_eq!(assist.role, MessageRole::Assistant);
        assert_eq!(assist.content, "reply");
    }

    #[test]
    fn chat_request_skips_zero_fields() {
        let req = ChatRequest {
            model: "test-model".into(),
            messages: vec![Message::user("hi")],
            max_tokens: 0,
            temperature: 0.0,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert!(json.get("temperature").is_none());
        assert_eq!(json["model"], "test-model");
    }

    #[test]
    fn message_role_display() {
        assert_eq!(MessageRole::System.to_string(), "system");
        assert_eq!(MessageRole::Assistant.to_string(), "assistant");
    }
}
