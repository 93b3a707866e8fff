//! Model-call layer: the [`ModelClient`] seam, an HTTP implementation,
//! typed call errors, per-call deadlines, and retry with backoff.
//!
//! The pipeline treats the model as an opaque blocking collaborator: one
//! request in, one completion out. Everything between the pipeline and the
//! chat-completions API lives here:
//!
//! - [`client`] — [`ModelClient`] trait, [`HttpModelClient`] against an
//!   OpenRouter-style endpoint, the typed [`CallError`] taxonomy, and
//!   [`complete_with_deadline`] which bounds any call with an explicit
//!   deadline instead of relying on OS-level interrupts.
//! - [`retry`] — transient error detection with configurable exponential
//!   backoff and deterministic jitter. Deadline expiries and empty
//!   responses are retryable; auth and bad-request errors are not.

pub mod client;
pub mod retry;

// Re-export commonly used items at the module level.
pub use client::{CallError, CompletionFuture, HttpModelClient, ModelClient, complete_with_deadline};
pub use retry::{RetryConfig, call_with_retry};
