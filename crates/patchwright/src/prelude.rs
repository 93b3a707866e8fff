//! One-import surface for the common pipeline types.
//!
//! ```ignore
//! use patchwright::prelude::*;
//! ```

pub use crate::api::{
    CallError, HttpModelClient, ModelClient, RetryConfig, call_with_retry, complete_with_deadline,
};
pub use crate::context::{build_context, estimate_tokens, fit_to_budget};
pub use crate::extract::{BlockExtractor, Extractor, Modification, ModificationKind};
pub use crate::goal::{
    ContextChain, DecompositionMode, Goal, GoalRunner, GoalStatus, RunnerConfig, SubGoal,
};
pub use crate::intent::{Intent, IntentClassifier, KeywordClassifier};
pub use crate::review::{BatchReport, ReviewEngine, ReviewUi, TerminalUi, UnitDecision};
pub use crate::session::{OperationKind, Session};
pub use crate::workspace::{ProjectType, Workspace};
pub use crate::{ChatCompletion, ChatRequest, Message, MessageRole};
