//! Model client seam and HTTP implementation.
//!
//! [`ModelClient`] is the single point through which the pipeline reaches a
//! text-generation service. [`HttpModelClient`] talks to an OpenRouter-style
//! chat completions endpoint; tests substitute scripted clients. Every call
//! should go through [`complete_with_deadline`], which converts an overlong
//! call into a typed, retryable [`CallError::DeadlineExceeded`] rather than
//! hanging the pipeline.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, trace};

use crate::{ChatCompletion, ChatRequest, UsageInfo};

/// Default chat completions endpoint.
pub const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

// ── Error taxonomy ─────────────────────────────────────────────────

/// Typed failure of a model call.
///
/// The retryable variants ([`is_transient`](CallError::is_transient)) map to
/// the pipeline's "re-issue the same step" policy; permanent variants are
/// surfaced to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The call did not complete within its deadline. Retryable.
    DeadlineExceeded(Duration),
    /// The API answered but produced no usable content. Retryable.
    EmptyResponse,
    /// HTTP-level failure with the status code and response body.
    Http { status: u16, body: String },
    /// Network/transport failure before an HTTP status was obtained. Retryable.
    Transport(String),
    /// The response body could not be parsed.
    Malformed(String),
}

impl CallError {
    /// Whether re-issuing the same request may succeed.
    ///
    /// Rate limiting and server-side errors (429, 5xx) are transient;
    /// 400/401/403-class errors are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            CallError::DeadlineExceeded(_) | CallError::EmptyResponse | CallError::Transport(_) => {
                true
            }
            CallError::Http { status, .. } => *status == 429 || *status >= 500,
            CallError::Malformed(_) => false,
        }
    }
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::DeadlineExceeded(d) => {
                write!(f, "model call exceeded its {:.1}s deadline", d.as_secs_f64())
            }
            CallError::EmptyResponse => write!(f, "model returned an empty response"),
            CallError::Http { status, body } => write!(f, "API HTTP {status}: {body}"),
            CallError::Transport(msg) => write!(f, "request failed: {msg}"),
            CallError::Malformed(msg) => write!(f, "failed to parse response: {msg}"),
        }
    }
}

// ── ModelClient seam ───────────────────────────────────────────────

/// Boxed future returned by [`ModelClient::complete`].
pub type CompletionFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ChatCompletion, CallError>> + Send + 'a>>;

/// The pipeline's view of a text-generation service.
///
/// One blocking request/response exchange per call; no streaming. The HTTP
/// implementation is [`HttpModelClient`]; tests use scripted fakes.
pub trait ModelClient: Send + Sync {
    fn complete(&self, request: &ChatRequest) -> CompletionFuture<'_>;
}

/// Bound a model call with an explicit deadline.
///
/// On expiry the in-flight call is dropped and a typed
/// [`CallError::DeadlineExceeded`] is returned, which classifies as
/// transient. The deadline applies per call, not per goal — a multi-sub-goal
/// goal legitimately runs many sequential calls.
pub async fn complete_with_deadline(
    client: &dyn ModelClient,
    request: &ChatRequest,
    deadline: Duration,
) -> Result<ChatCompletion, CallError> {
    match tokio::time::timeout(deadline, client.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(CallError::DeadlineExceeded(deadline)),
    }
}

// ── Raw response types ─────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

// ── HTTP client ────────────────────────────────────────────────────

/// Async HTTP client for an OpenRouter-style chat completions API.
pub struct HttpModelClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
    referer: String,
    title: String,
}

impl HttpModelClient {
    /// Create a new client with the given API key and default headers.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_headers(api_key, "https://github.com/patchwright/patchwright", "patchwright")
    }

    /// Create a new client with custom Referer and X-Title headers.
    pub fn with_headers(
        api_key: impl Into<String>,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("patchwright/0.1")
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            url: DEFAULT_API_URL.to_string(),
            referer: referer.into(),
            title: title.into(),
        })
    }

    /// Override the endpoint URL (e.g. for a local proxy).
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, CallError> {
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={}",
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(body)
            .send()
            .await
            .map_err(|e| CallError::Transport(e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| CallError::Transport(format!("failed to read response: {e}")))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(CallError::Http {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: RawChatResponse =
            serde_json::from_str(&text).map_err(|e| CallError::Malformed(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(CallError::Http {
                status: status.as_u16(),
                body: err.message,
            });
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }

        let content = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.message.content);

        // An empty or missing body is a retryable failure, not a crash —
        // OpenRouter occasionally returns HTTP 200 with no content.
        match content {
            Some(text) if !text.is_empty() => Ok(ChatCompletion {
                content: text,
                usage: parsed.usage,
            }),
            _ => Err(CallError::EmptyResponse),
        }
    }
}

impl ModelClient for HttpModelClient {
    fn complete(&self, request: &ChatRequest) -> CompletionFuture<'_> {
        let request = request.clone();
        Box::pin(async move { self.chat(&request).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    /// Scripted client that returns a fixed completion after a delay.
    struct SlowClient {
        delay: Duration,
    }

    impl ModelClient for SlowClient {
        fn complete(&self, _request: &ChatRequest) -> CompletionFuture<'_> {
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                Ok(ChatCompletion {
                    content: "done".into(),
                    usage: None,
                })
            })
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "test-model".into(),
            messages: vec![Message::user("hi")],
            max_tokens: 64,
            temperature: 0.0,
        }
    }

    #[tokio::test]
    async fn deadline_allows_fast_calls() {
        let client = SlowClient {
            delay: Duration::from_millis(10),
        };
        let result = complete_with_deadline(&client, &request(), Duration::from_secs(5)).await;
        assert_eq!(result.unwrap().content, "done");
    }

    #[tokio::test]
    async fn deadline_cancels_slow_calls() {
        let client = SlowClient {
            delay: Duration::from_secs(60),
        };
        let result = complete_with_deadline(&client, &request(), Duration::from_millis(20)).await;
        match result {
            Err(CallError::DeadlineExceeded(d)) => assert_eq!(d, Duration::from_millis(20)),
            other => panic!("expected DeadlineExceeded, got {other:?}"),
        }
    }

    #[test]
    fn deadline_and_empty_are_transient() {
        assert!(CallError::DeadlineExceeded(Duration::from_secs(1)).is_transient());
        assert!(CallError::EmptyResponse.is_transient());
        assert!(CallError::Transport("connection reset".into()).is_transient());
    }

    #[test]
    fn server_errors_transient_client_errors_not() {
        assert!(
            CallError::Http {
                status: 429,
                body: "rate limited".into()
            }
            .is_transient()
        );
        assert!(
            CallError::Http {
                status: 503,
                body: "unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !CallError::Http {
                status: 401,
                body: "unauthorized".into()
            }
            .is_transient()
        );
        assert!(!CallError::Malformed("bad json".into()).is_transient());
    }

    #[test]
    fn display_is_informative() {
        let err = CallError::DeadlineExceeded(Duration::from_secs(30));
        assert!(err.to_string().contains("30.0s"));
        let err = CallError::Http {
            status: 500,
            body: "oops".into(),
        };
        assert!(err.to_string().contains("HTTP 500"));
    }
}
