//! The sole workspace writer.
//!
//! [`commit`] is called exactly once per accepted review decision. When a
//! file already exists at the target path and backup is requested, the
//! original is preserved as a sibling `<name>.bak` copy before the
//! overwrite. Failures are reported per file so a batch can keep committing
//! its remaining members.

use tracing::{info, warn};

use crate::workspace::Workspace;

/// Suffix appended to the sibling backup copy.
const BACKUP_SUFFIX: &str = ".bak";

/// Outcome of one commit attempt.
#[derive(Debug, Clone)]
pub struct CommitReport {
    pub path: String,
    /// Where the pre-overwrite original was preserved, if a backup was made.
    pub backup_path: Option<String>,
    pub result: Result<(), String>,
}

impl CommitReport {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Write `content` to a workspace-relative `path`.
///
/// With `backup` set and an existing file at `path`, the original is copied
/// to `<path>.bak` first; a backup failure aborts the write so the original
/// is never lost.
pub fn commit(workspace: &Workspace, path: &str, content: &str, backup: bool) -> CommitReport {
    let mut backup_path = None;

    if backup && workspace.exists(path) {
        let sibling = format!("{path}{BACKUP_SUFFIX}");
        if let Err(e) = workspace.copy(path, &sibling) {
            warn!("backup failed for '{path}': {e}");
            return CommitReport {
                path: path.to_string(),
                backup_path: None,
                result: Err(format!("backup failed, write aborted: {e}")),
            };
        }
        backup_path = Some(sibling);
    }

    let result = workspace.write(path, content);
    match &result {
        Ok(()) => info!("committed {} bytes to '{path}'", content.len()),
        Err(e) => warn!("commit failed for '{path}': {e}"),
    }

    CommitReport {
        path: path.to_string(),
        backup_path,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, Workspace) {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        (dir, ws)
    }

    #[test]
    fn commit_writes_new_file_without_backup() {
        let (_dir, ws) = workspace();
        let report = commit(&ws, "fresh.py", "print('hi')", true);
        assert!(report.succeeded());
        assert!(report.backup_path.is_none());
        assert_eq!(ws.read("fresh.py").unwrap(), "print('hi')");
    }

    #[test]
    fn commit_backs_up_existing_file() {
        let (_dir, ws) = workspace();
        ws.write("app.py", "original").unwrap();

        let report = commit(&ws, "app.py", "replacement", true);
        assert!(report.succeeded());
        assert_eq!(report.backup_path.as_deref(), Some("app.py.bak"));
        assert_eq!(ws.read("app.py").unwrap(), "replacement");
        assert_eq!(ws.read("app.py.bak").unwrap(), "original");
    }

    #[test]
    fn commit_without_backup_flag_skips_backup() {
        let (_dir, ws) = workspace();
        ws.write("app.py", "original").unwrap();

        let report = commit(&ws, "app.py", "replacement", false);
        assert!(report.succeeded());
        assert!(report.backup_path.is_none());
        assert!(!ws.exists("app.py.bak"));
    }

    #[test]
    fn commit_reports_failure_for_bad_path() {
        let (_dir, ws) = workspace();
        let report = commit(&ws, "../outside.txt", "x", true);
        assert!(!report.succeeded());
    }
}
