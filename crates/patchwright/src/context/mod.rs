//! Context assembly and token budgeting for model calls.
//!
//! Every model call gets a context string assembled from caller-owned
//! session state, then trimmed to a token budget:
//!
//! 1. **[`facts`]** — scans recent conversation, task, and operation text
//!    for a small fixed vocabulary and emits `KEY: VALUE` facts the model
//!    must never lose (inferred project type, file type, location).
//! 2. **[`builder`]** — assembles named `=== SECTION ===` blocks in fixed
//!    priority order: essential facts first, session metadata last.
//! 3. **[`budget`]** — estimates tokens at a fixed 4-chars-per-token ratio
//!    and fits the assembled string to a budget by truncating the first
//!    overflowing section and dropping everything below it.
//!
//! The priority walk guarantees that when the budget is tight the
//! highest-priority information — the essential facts — is always present.
//! Everything here is a pure function over supplied state; the caller logs
//! the resulting size back into its session.

pub mod budget;
pub mod builder;
pub mod facts;

// Re-export commonly used items at the module level.
pub use budget::{CHARS_PER_TOKEN, TRUNCATION_MARKER, estimate_tokens, fit_to_budget};
pub use builder::{ContextInputs, WorkspaceInfo, build_context};
pub use facts::{FactSources, extract_essential_facts};
