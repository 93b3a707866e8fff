//! Sequential, dependency-gated goal execution.
//!
//! [`GoalRunner`] owns the context chain and the goal history and drives
//! one goal at a time: decompose, execute sub-goals in list order, finalize,
//! archive. Sub-goals run strictly one at a time — later sub-goals depend
//! on the textual and file-state results of earlier ones — and a failure is
//! contained to the failing sub-goal's status.

use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::api::{ModelClient, RetryConfig, call_with_retry};
use crate::context::{ContextInputs, WorkspaceInfo, build_context, fit_to_budget};
use crate::extract::{Extractor, ModificationKind};
use crate::goal::chain::{ContextChain, ContextChainEntry, DEFAULT_CHAIN_WINDOW};
use crate::goal::decompose::{breakdown_request, decompose};
use crate::goal::{Goal, GoalStatus, SubGoal, SubGoalResult};
use crate::intent::IntentClassifier;
use crate::review::{ReviewEngine, ReviewUi, UnitReport};
use crate::session::{OperationKind, Session};
use crate::workspace::{Workspace, relevant_files};
use crate::{ChatRequest, DEFAULT_MAX_CONTEXT_TOKENS, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, Message};

/// Hard cap on sub-goals per goal, matching the breakdown prompt's ask.
pub const MAX_SUB_GOALS: usize = 10;

/// How many existing files get their content included in an execution call.
const MAX_CONTEXT_FILES: usize = 3;

/// Per-file character cap for included file content.
const MAX_FILE_SNIPPET_CHARS: usize = 2000;

/// System prompt for sub-goal execution calls. Teaches the change-block
/// wire format the extractor understands.
const EXECUTION_SYSTEM_PROMPT: &str = "\
You are a coding assistant working inside the user's workspace. When a \
sub-goal requires changing files, respond with complete file bodies inside \
delimiter blocks:

=== MODIFY: path/to/existing_file ===
<full replacement content>
=== END MODIFY ===

=== CREATE: path/to/new_file ===
<full file content>
=== END CREATE ===

Use MODIFY only for files that already exist and CREATE for new ones. Keep \
changes minimal and focused on the sub-goal. If no file changes are needed, \
answer in prose without any blocks.";

/// Tunables for a [`GoalRunner`].
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Model identifier for all calls.
    pub model: String,
    /// Token budget for assembled context strings.
    pub max_context_tokens: usize,
    /// Per-response token limit.
    pub max_tokens: u32,
    /// Sampling temperature for execution calls.
    pub temperature: f32,
    /// Deadline per model call (not per goal).
    pub call_timeout: Duration,
    /// Retry policy for transient call failures.
    pub retry: RetryConfig,
    /// Context chain window size.
    pub chain_window: usize,
    /// Whether commits keep a `.bak` sibling of overwritten files.
    pub backup: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_context_tokens: DEFAULT_MAX_CONTEXT_TOKENS,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.2,
            call_timeout: Duration::from_secs(120),
            retry: RetryConfig::default(),
            chain_window: DEFAULT_CHAIN_WINDOW,
            backup: true,
        }
    }
}

/// Executes goals and keeps their history.
pub struct GoalRunner<'a> {
    client: &'a dyn ModelClient,
    ui: &'a dyn ReviewUi,
    workspace: &'a Workspace,
    extractor: &'a dyn Extractor,
    classifier: &'a dyn IntentClassifier,
    config: RunnerConfig,
    chain: ContextChain,
    history: Vec<Goal>,
    goal_counter: u64,
}

impl<'a> GoalRunner<'a> {
    pub fn new(
        client: &'a dyn ModelClient,
        ui: &'a dyn ReviewUi,
        workspace: &'a Workspace,
        extractor: &'a dyn Extractor,
        classifier: &'a dyn IntentClassifier,
        config: RunnerConfig,
    ) -> Self {
        let chain = ContextChain::new(config.chain_window);
        Self {
            client,
            ui,
            workspace,
            extractor,
            classifier,
            config,
            chain,
            history: Vec::new(),
            goal_counter: 0,
        }
    }

    /// Run one goal end to end: decompose, execute, finalize, archive.
    ///
    /// Returns the archived goal. The only hard failure is a request with
    /// no usable text; everything else degrades per the partial-failure
    /// rules and still produces a finalized goal.
    pub async fn run_goal(&mut self, session: &mut Session, request: &str) -> Result<&Goal, String> {
        let request = request.trim();
        if request.is_empty() {
            return Err("empty goal request".to_string());
        }

        self.goal_counter += 1;
        let mut goal = Goal::new(format!("goal_{}", self.goal_counter), request, request);
        goal.start_time = Some(Utc::now());

        session.task.apply_instruction(request, self.classifier);
        session.record(OperationKind::UserRequest, request);
        session.record(
            OperationKind::TaskUpdate,
            format!(
                "task: {}",
                session.task.current_task_label.as_deref().unwrap_or(request)
            ),
        );
        session.record_model(&self.config.model);

        let files = self.workspace.scan();
        let workspace_info = self.workspace_info(&files);
        info!("goal {} started: {request}", goal.id);

        // Decompose — one model call; any failure degrades to the
        // catch-all sub-goal and the goal proceeds.
        let context = self.assemble_context(session, request, &workspace_info);
        let breakdown =
            breakdown_request(&goal, &context, &self.config.model, self.config.max_tokens);
        decompose(
            self.client,
            &breakdown,
            self.config.call_timeout,
            &self.config.retry,
            &mut goal,
            MAX_SUB_GOALS,
        )
        .await;
        goal.status = GoalStatus::InProgress;

        self.execute_all(session, &mut goal, &workspace_info, &files).await;
        self.finalize(&mut goal);

        self.history.push(goal);
        match self.history.last() {
            Some(archived) => Ok(archived),
            None => Err("goal history unexpectedly empty".to_string()),
        }
    }

    /// Execute sub-goals in list order, gating each on its dependencies.
    ///
    /// List order is assumed to respect dependency order from
    /// decomposition; execution never reorders. A sub-goal whose
    /// dependencies are not all Completed is marked Blocked and skipped.
    async fn execute_all(
        &mut self,
        session: &mut Session,
        goal: &mut Goal,
        workspace_info: &WorkspaceInfo,
        files: &[String],
    ) {
        for index in 0..goal.sub_goals.len() {
            if !dependencies_satisfied(goal, index) {
                let sub = &mut goal.sub_goals[index];
                sub.status = GoalStatus::Blocked;
                warn!("sub-goal {} blocked on unmet dependencies", sub.id);
                self.ui
                    .notify(&format!("skipping {}: dependencies not completed", sub.id));
                continue;
            }

            self.execute_one(session, goal, index, workspace_info, files)
                .await;

            let sub = &goal.sub_goals[index];
            self.chain.push(ContextChainEntry {
                timestamp: Utc::now(),
                sub_goal_id: sub.id.clone(),
                description: sub.description.clone(),
                result: match (&sub.result, &sub.error) {
                    (Some(result), _) => result.summary.clone(),
                    (None, Some(error)) => format!("failed: {error}"),
                    (None, None) => "no result recorded".to_string(),
                },
                files_changed: sub
                    .result
                    .as_ref()
                    .map(|r| r.files_changed.clone())
                    .unwrap_or_default(),
                inherited_context: sub.inherited_context.clone(),
            });
        }
    }

    /// Execute a single sub-goal: model call, extraction, review, result.
    ///
    /// A call failure sets Failed with the error captured and returns —
    /// execution continues with the next sub-goal. An empty change set is
    /// a normal completion ("no changes proposed").
    async fn execute_one(
        &mut self,
        session: &mut Session,
        goal: &mut Goal,
        index: usize,
        workspace_info: &WorkspaceInfo,
        files: &[String],
    ) {
        let inherited = self.inherited_context(goal, index);
        let (sub_id, description, request) = {
            let sub = &mut goal.sub_goals[index];
            sub.status = GoalStatus::InProgress;
            sub.start_time = Some(Utc::now());
            sub.inherited_context = if inherited.is_empty() {
                None
            } else {
                Some(inherited.clone())
            };
            (
                sub.id.clone(),
                sub.description.clone(),
                self.execution_request(sub, session, workspace_info, files),
            )
        };

        info!("executing sub-goal {sub_id}: {description}");

        let completion = match call_with_retry(
            self.client,
            &request,
            self.config.call_timeout,
            &self.config.retry,
        )
        .await
        {
            Ok(completion) => completion,
            Err(e) => {
                warn!("sub-goal {sub_id} failed: {e}");
                let sub = &mut goal.sub_goals[index];
                sub.status = GoalStatus::Failed;
                sub.error = Some(e.to_string());
                sub.end_time = Some(Utc::now());
                session.record(
                    OperationKind::ModelResponse,
                    format!("call failed for {sub_id}: {e}"),
                );
                return;
            }
        };

        session.push_exchange(description.clone(), completion.content.clone());
        session.record(
            OperationKind::ModelResponse,
            format!("response for {sub_id} ({} chars)", completion.content.len()),
        );

        let modifications = self.extractor.extract(&completion.content);
        let result = if modifications.is_empty() {
            self.ui.notify("no modification detected in the response");
            SubGoalResult {
                summary: "no changes proposed".to_string(),
                files_changed: Vec::new(),
                changes_made: Vec::new(),
            }
        } else {
            let engine = ReviewEngine::new(self.ui, self.workspace).with_backup(self.config.backup);
            let report = engine.review_batch(&modifications);

            let files_changed = report.applied_paths();
            let changes_made: Vec<String> = report
                .units
                .iter()
                .filter(|u| u.applied())
                .map(describe_unit)
                .collect();

            for path in &files_changed {
                session.record(OperationKind::Commit, format!("wrote {path}"));
                session.record_file_access(path);
            }
            session.task.record_files(files_changed.iter().cloned());

            SubGoalResult {
                summary: format!(
                    "{} of {} proposed change(s) applied",
                    files_changed.len(),
                    modifications.len(),
                ),
                files_changed,
                changes_made,
            }
        };

        let sub = &mut goal.sub_goals[index];
        sub.result = Some(result);
        sub.status = GoalStatus::Completed;
        sub.end_time = Some(Utc::now());
    }

    /// Finalize and archive a goal: aggregate the sub-goal results and set
    /// the terminal status. Never re-entered.
    fn finalize(&mut self, goal: &mut Goal) {
        for sub in &goal.sub_goals {
            if let Some(result) = &sub.result {
                for file in &result.files_changed {
                    if !goal.files_changed.contains(file) {
                        goal.files_changed.push(file.clone());
                    }
                }
                goal.changes_made.extend(result.changes_made.iter().cloned());
            }
        }
        goal.status = GoalStatus::Completed;
        goal.end_time = Some(Utc::now());
        info!(
            "goal {} completed: {}/{} sub-goal(s) done, {} file(s) changed",
            goal.id,
            goal.count_with_status(GoalStatus::Completed),
            goal.sub_goals.len(),
            goal.files_changed.len(),
        );
    }

    /// Inherited context for one sub-goal: results of its declared
    /// dependencies plus the trailing window of the context chain.
    fn inherited_context(&self, goal: &Goal, index: usize) -> String {
        let mut parts: Vec<String> = Vec::new();

        let dependency_results: Vec<String> = goal.sub_goals[index]
            .dependencies
            .iter()
            .filter_map(|&dep| goal.sub_goals.get(dep))
            .filter_map(|dep_sub| {
                dep_sub
                    .result
                    .as_ref()
                    .map(|r| format!("Result of {} ({}): {}", dep_sub.id, dep_sub.description, r.summary))
            })
            .collect();
        if !dependency_results.is_empty() {
            parts.push(format!(
                "Results from dependencies:\n{}",
                dependency_results.join("\n")
            ));
        }

        if !self.chain.is_empty() {
            parts.push(format!("Recent sub-goal history:\n{}", self.chain.render()));
        }

        parts.join("\n\n")
    }

    /// Build the execution request for a sub-goal.
    ///
    /// Includes the current content of the sub-goal's target files (or of
    /// files relevant to its description when none were named) so the model
    /// replaces real content instead of guessing.
    fn execution_request(
        &self,
        sub: &SubGoal,
        session: &Session,
        workspace_info: &WorkspaceInfo,
        files: &[String],
    ) -> ChatRequest {
        let context = self.assemble_context(session, &sub.description, workspace_info);

        let mut user = format!("{context}\n\nExecute this sub-goal: {}", sub.description);
        if !sub.files_to_modify.is_empty() {
            user.push_str(&format!(
                "\nFiles to modify: {}",
                sub.files_to_modify.join(", ")
            ));
        }
        if !sub.expected_changes.is_empty() {
            user.push_str("\nExpected changes:");
            for (path, change) in &sub.expected_changes {
                user.push_str(&format!("\n- {path}: {change}"));
            }
        }

        let mut sources: Vec<String> = sub
            .files_to_modify
            .iter()
            .filter(|p| self.workspace.exists(p.as_str()))
            .cloned()
            .collect();
        if sources.is_empty() {
            sources = relevant_files(files, &sub.description);
        }
        for path in sources.iter().take(MAX_CONTEXT_FILES) {
            if let Ok(content) = self.workspace.read(path) {
                user.push_str(&format!(
                    "\n\nCurrent content of {path}:\n{}",
                    clip(&content, MAX_FILE_SNIPPET_CHARS)
                ));
            }
        }

        if let Some(inherited) = &sub.inherited_context {
            user.push_str(&format!("\n\n{inherited}"));
        }

        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![Message::system(EXECUTION_SYSTEM_PROMPT), Message::user(user)],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        }
    }

    /// Assemble and budget-fit the session context for a call.
    fn assemble_context(
        &self,
        session: &Session,
        user_input: &str,
        workspace_info: &WorkspaceInfo,
    ) -> String {
        let context = build_context(&ContextInputs {
            user_input,
            conversation: &session.history,
            task: &session.task,
            log: &session.log,
            state: &session.state,
            workspace: Some(workspace_info),
            model: &self.config.model,
        });
        fit_to_budget(&context, self.config.max_context_tokens)
    }

    fn workspace_info(&self, files: &[String]) -> WorkspaceInfo {
        WorkspaceInfo {
            root: self.workspace.root().display().to_string(),
            file_count: files.len(),
            project_type: self.workspace.project_type(),
        }
    }

    // ── History queries ────────────────────────────────────────────

    /// Look up an archived goal by id.
    pub fn goal_status(&self, goal_id: &str) -> Option<&Goal> {
        self.history.iter().find(|g| g.id == goal_id)
    }

    /// The most recent `limit` goals, oldest first.
    pub fn recent_goals(&self, limit: usize) -> &[Goal] {
        let start = self.history.len().saturating_sub(limit);
        self.history.get(start..).unwrap_or_default()
    }

    /// The context chain carried across sub-goals.
    pub fn chain(&self) -> &ContextChain {
        &self.chain
    }
}

/// Every dependency index must point at a Completed sub-goal. Out-of-range
/// indices can never be satisfied.
fn dependencies_satisfied(goal: &Goal, index: usize) -> bool {
    goal.sub_goals[index].dependencies.iter().all(|&dep| {
        goal.sub_goals
            .get(dep)
            .is_some_and(|s| s.status == GoalStatus::Completed)
    })
}

fn describe_unit(unit: &UnitReport) -> String {
    match unit.kind {
        ModificationKind::Create => format!("created {}", unit.path),
        ModificationKind::Modify => format!("modified {}", unit.path),
    }
}

/// Clip file content for prompt inclusion, backing up to a char boundary.
fn clip(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", text.get(..end).unwrap_or(""))
}
