//! Goal decomposition and dependency-gated execution.
//!
//! A [`Goal`] is one top-level user request. [`decompose`](decompose::decompose)
//! asks the model for a small ordered list of [`SubGoal`]s; the
//! [`GoalRunner`](execute::GoalRunner) then executes them strictly in list
//! order, gating each on its declared dependencies and threading a bounded
//! [`ContextChain`](chain::ContextChain) of prior outcomes into each call.
//!
//! State machines:
//!
//! ```text
//! Goal:    Pending ──► InProgress ──► Completed | Failed
//! SubGoal: Pending ──► Blocked | InProgress ──► Completed | Failed
//! ```
//!
//! Transitions are one-directional, except Blocked → Pending on a
//! dependency re-check. A failed sub-goal never aborts the goal; a blocked
//! sub-goal is skipped, not failed.

pub mod chain;
pub mod decompose;
pub mod execute;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

// Re-export commonly used items at the module level.
pub use chain::{ContextChain, ContextChainEntry};
pub use decompose::{DecompositionMode, decompose, fallback_sub_goal};
pub use execute::{GoalRunner, RunnerConfig};

/// Status shared by goals and sub-goals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Blocked,
}

impl GoalStatus {
    /// Whether this status is terminal for a sub-goal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GoalStatus::Completed | GoalStatus::Failed | GoalStatus::Blocked
        )
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            GoalStatus::Pending => "pending",
            GoalStatus::InProgress => "in_progress",
            GoalStatus::Completed => "completed",
            GoalStatus::Failed => "failed",
            GoalStatus::Blocked => "blocked",
        };
        write!(f, "{label}")
    }
}

/// What one completed sub-goal produced.
#[derive(Debug, Clone)]
pub struct SubGoalResult {
    /// One-paragraph summary of what happened, fed into later sub-goals.
    pub summary: String,
    /// Files actually written.
    pub files_changed: Vec<String>,
    /// Human-readable change descriptions.
    pub changes_made: Vec<String>,
}

/// One ordered, dependency-gated unit of work within a goal.
///
/// Owned exclusively by its parent [`Goal`]. Dependencies are indices into
/// the parent's sub-goal list and must point at earlier entries — list
/// order is assumed to respect dependency order from decomposition.
#[derive(Debug, Clone)]
pub struct SubGoal {
    pub id: String,
    pub description: String,
    pub status: GoalStatus,
    pub dependencies: Vec<usize>,
    pub files_to_modify: Vec<String>,
    pub expected_changes: BTreeMap<String, String>,
    /// Context inherited from dependencies and the chain, assembled at
    /// execution time.
    pub inherited_context: Option<String>,
    pub result: Option<SubGoalResult>,
    pub error: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl SubGoal {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: GoalStatus::Pending,
            dependencies: Vec::new(),
            files_to_modify: Vec::new(),
            expected_changes: BTreeMap::new(),
            inherited_context: None,
            result: None,
            error: None,
            start_time: None,
            end_time: None,
        }
    }
}

/// A top-level request tracked through decomposition and execution.
///
/// Finalized and archived into goal history exactly once; never resumed
/// after reaching Completed or Failed.
#[derive(Debug, Clone)]
pub struct Goal {
    pub id: String,
    pub description: String,
    pub original_request: String,
    pub status: GoalStatus,
    pub sub_goals: Vec<SubGoal>,
    pub files_changed: Vec<String>,
    pub changes_made: Vec<String>,
    /// Whether the breakdown came from the model or the catch-all fallback.
    pub decomposition: DecompositionMode,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Goal {
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        original_request: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            original_request: original_request.into(),
            status: GoalStatus::Pending,
            sub_goals: Vec::new(),
            files_changed: Vec::new(),
            changes_made: Vec::new(),
            decomposition: DecompositionMode::Planned,
            start_time: None,
            end_time: None,
        }
    }

    /// Count of sub-goals in a given status.
    pub fn count_with_status(&self, status: GoalStatus) -> usize {
        self.sub_goals.iter().filter(|s| s.status == status).count()
    }
}
