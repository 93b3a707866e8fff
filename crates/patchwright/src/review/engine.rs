//! The per-unit review state machine and batch driver.
//!
//! A unit is one [`Modification`]. The engine presents its diff, collects
//! the decision, optionally runs one edit round, and commits on accept.
//! Batches add a single upfront accept-all / edit-all / cancel-all /
//! per-file choice, but the guarantee is identical either way: no file is
//! written without an explicit accepted decision for that file — an
//! accept-all over N files counts as N decisions, one per file.
//!
//! Failures never cascade. A missing modify target or a failed write marks
//! that unit [`UnitDecision::Failed`] and the batch moves on to siblings.

use tracing::{debug, info};

use crate::extract::{Modification, ModificationKind};
use crate::review::commit::commit;
use crate::review::diff::unified_diff;
use crate::review::ui::{BatchChoice, ReviewChoice, ReviewUi};
use crate::workspace::Workspace;

/// Why a unit ended without being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Proposed content is identical to what exists — nothing to review.
    NoChanges,
    /// The user declined the unit.
    Declined,
    /// The edit round was aborted (editor failed or was abandoned).
    EditAborted,
}

/// Terminal state of one reviewed unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitDecision {
    /// Content was written. `edited` marks a manual-edit round.
    Applied {
        edited: bool,
        backup_path: Option<String>,
    },
    /// The unit ended without a write; a normal outcome, not an error.
    Cancelled(CancelReason),
    /// The unit could not be completed (missing target, write failure).
    Failed(String),
}

/// Report for one reviewed unit.
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub path: String,
    pub kind: ModificationKind,
    pub decision: UnitDecision,
}

impl UnitReport {
    pub fn applied(&self) -> bool {
        matches!(self.decision, UnitDecision::Applied { .. })
    }
}

/// Reports for a reviewed batch, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub units: Vec<UnitReport>,
}

impl BatchReport {
    /// Paths that were actually written.
    pub fn applied_paths(&self) -> Vec<String> {
        self.units
            .iter()
            .filter(|u| u.applied())
            .map(|u| u.path.clone())
            .collect()
    }

    pub fn any_applied(&self) -> bool {
        self.units.iter().any(UnitReport::applied)
    }
}

/// Internal result of the interactive part of a unit review.
enum Verdict {
    Accept { content: String, edited: bool },
    Cancel(CancelReason),
}

/// Drives review for single units, batches, and generated-file sets.
pub struct ReviewEngine<'a> {
    ui: &'a dyn ReviewUi,
    workspace: &'a Workspace,
    backup: bool,
}

impl<'a> ReviewEngine<'a> {
    pub fn new(ui: &'a dyn ReviewUi, workspace: &'a Workspace) -> Self {
        Self {
            ui,
            workspace,
            backup: true,
        }
    }

    /// Disable the pre-overwrite backup copy.
    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    /// Review one modification end to end: baseline, diff, decision,
    /// optional edit round, commit.
    pub fn review_modification(&self, modification: &Modification) -> UnitReport {
        let path = &modification.target_path;

        let original = match self.baseline(modification) {
            Ok(content) => content,
            Err(message) => {
                self.ui.notify(&format!("skipping {path}: {message}"));
                return report(modification, UnitDecision::Failed(message));
            }
        };

        match self.decide_interactive(path, &original, &modification.proposed_content) {
            Verdict::Accept { content, edited } => {
                self.apply(modification, &content, edited)
            }
            Verdict::Cancel(reason) => report(modification, UnitDecision::Cancelled(reason)),
        }
    }

    /// Review a change set. A single unit skips the batch prompt; larger
    /// sets take one upfront choice and then run per the chosen mode.
    ///
    /// Units are processed in input order, so a second modification for the
    /// same path diffs against the outcome of the first.
    pub fn review_batch(&self, modifications: &[Modification]) -> BatchReport {
        if modifications.len() <= 1 {
            return BatchReport {
                units: modifications
                    .iter()
                    .map(|m| self.review_modification(m))
                    .collect(),
            };
        }

        let paths: Vec<String> = modifications
            .iter()
            .map(|m| m.target_path.clone())
            .collect();
        let choice = self.ui.batch_choice(&paths);
        debug!("batch of {} file(s): {choice:?}", modifications.len());

        let units = modifications
            .iter()
            .map(|m| match choice {
                BatchChoice::CancelAll => {
                    report(m, UnitDecision::Cancelled(CancelReason::Declined))
                }
                BatchChoice::AcceptAll => self.accept_without_prompt(m),
                BatchChoice::EditAll => self.edit_then_apply(m),
                BatchChoice::PerFile => self.review_modification(m),
            })
            .collect();

        BatchReport { units }
    }

    /// Baseline content the proposal is diffed against.
    ///
    /// A modify block requires an existing target; a create block uses the
    /// existing content when the file is already there (so re-creation
    /// reviews as a change) and an empty baseline otherwise.
    fn baseline(&self, modification: &Modification) -> Result<String, String> {
        match modification.kind {
            ModificationKind::Modify => self.workspace.read(&modification.target_path),
            ModificationKind::Create => {
                if self.workspace.exists(&modification.target_path) {
                    self.workspace.read(&modification.target_path)
                } else {
                    Ok(String::new())
                }
            }
        }
    }

    /// Presented → Accepted | EditRequested | Cancelled, with the edit
    /// round folded in (EditRequested → Accepted | Cancelled).
    fn decide_interactive(&self, path: &str, original: &str, proposed: &str) -> Verdict {
        let diff = unified_diff(original, proposed, Some(path));
        if diff.is_empty() {
            self.ui.notify(&format!("no changes for {path}"));
            return Verdict::Cancel(CancelReason::NoChanges);
        }

        match self.ui.present_diff(path, &diff) {
            ReviewChoice::Accept => Verdict::Accept {
                content: proposed.to_string(),
                edited: false,
            },
            ReviewChoice::Cancel => Verdict::Cancel(CancelReason::Declined),
            ReviewChoice::Edit => self.edit_round(path, proposed),
        }
    }

    /// One manual edit round. An edit that changes the proposal must be
    /// re-confirmed before it counts as accepted.
    fn edit_round(&self, path: &str, proposed: &str) -> Verdict {
        let Some(edited) = self.ui.edit(path, proposed) else {
            return Verdict::Cancel(CancelReason::EditAborted);
        };

        if edited == proposed {
            self.ui.notify("no changes made in editor; applying the proposal");
            return Verdict::Accept {
                content: edited,
                edited: false,
            };
        }

        let edit_diff = unified_diff(proposed, &edited, Some(path));
        for line in &edit_diff {
            self.ui.notify(line);
        }
        if self.ui.confirm("Apply these edited changes?") {
            Verdict::Accept {
                content: edited,
                edited: true,
            }
        } else {
            Verdict::Cancel(CancelReason::Declined)
        }
    }

    /// Accept-all path: the upfront batch choice already covered this file,
    /// so no per-file prompt — but empty diffs still short-circuit and the
    /// baseline rules still apply.
    fn accept_without_prompt(&self, modification: &Modification) -> UnitReport {
        let path = &modification.target_path;
        let original = match self.baseline(modification) {
            Ok(content) => content,
            Err(message) => {
                self.ui.notify(&format!("skipping {path}: {message}"));
                return report(modification, UnitDecision::Failed(message));
            }
        };
        if original == modification.proposed_content {
            self.ui.notify(&format!("no changes for {path}"));
            return report(modification, UnitDecision::Cancelled(CancelReason::NoChanges));
        }
        self.apply(modification, &modification.proposed_content, false)
    }

    /// Edit-all path: go straight to the edit round for each file.
    fn edit_then_apply(&self, modification: &Modification) -> UnitReport {
        let path = &modification.target_path;
        match self.baseline(modification) {
            Ok(_) => match self.edit_round(path, &modification.proposed_content) {
                Verdict::Accept { content, edited } => self.apply(modification, &content, edited),
                Verdict::Cancel(reason) => {
                    report(modification, UnitDecision::Cancelled(reason))
                }
            },
            Err(message) => {
                self.ui.notify(&format!("skipping {path}: {message}"));
                report(modification, UnitDecision::Failed(message))
            }
        }
    }

    fn apply(&self, modification: &Modification, content: &str, edited: bool) -> UnitReport {
        let commit_report = commit(self.workspace, &modification.target_path, content, self.backup);
        match commit_report.result {
            Ok(()) => {
                info!("applied {}", modification.target_path);
                self.ui.notify(&format!("applied {}", modification.target_path));
                report(
                    modification,
                    UnitDecision::Applied {
                        edited,
                        backup_path: commit_report.backup_path,
                    },
                )
            }
            Err(e) => {
                self.ui
                    .notify(&format!("failed to write {}: {e}", modification.target_path));
                report(modification, UnitDecision::Failed(e))
            }
        }
    }
}

fn report(modification: &Modification, decision: UnitDecision) -> UnitReport {
    UnitReport {
        path: modification.target_path.clone(),
        kind: modification.kind,
        decision,
    }
}
