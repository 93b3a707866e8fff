//! The interactive seam of the review workflow.
//!
//! [`ReviewUi`] is everything the engine needs from a human: a choice per
//! presented diff, an upfront batch choice, a confirm prompt, and an edit
//! round. [`TerminalUi`] implements it over stdin/stdout with the manual
//! edit handled through `$EDITOR` on a temp file; tests use scripted fakes.
//!
//! Prompts block by design — the workflow must not apply changes while
//! waiting — and every prompt defaults to the safe answer on empty input
//! or EOF: cancel, or "no".

use std::io::{BufRead, Write as _};
use std::process::Command;

use tracing::{debug, warn};

/// Choice for a single presented diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewChoice {
    Accept,
    Edit,
    Cancel,
}

/// Upfront choice for a multi-file batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchChoice {
    AcceptAll,
    EditAll,
    CancelAll,
    PerFile,
}

/// Blocking user interaction for the review engine.
pub trait ReviewUi {
    /// Present a diff for one file and take a choice. Implementations must
    /// default to [`ReviewChoice::Cancel`] when no input is given.
    fn present_diff(&self, path: &str, diff: &[String]) -> ReviewChoice;

    /// One upfront choice for a batch of files. Implementations must
    /// default to [`BatchChoice::CancelAll`] when no input is given.
    fn batch_choice(&self, paths: &[String]) -> BatchChoice;

    /// Yes/no confirmation; must default to `false`.
    fn confirm(&self, prompt: &str) -> bool;

    /// Open the proposed content for manual editing. Returns the edited
    /// text, or `None` if editing was aborted.
    fn edit(&self, path: &str, proposed: &str) -> Option<String>;

    /// Informational message (progress, skip notices, failures).
    fn notify(&self, message: &str);
}

/// stdin/stdout implementation with `$EDITOR` integration.
///
/// With `assume_yes` set, batches resolve to accept-all and every diff is
/// accepted after being printed — the flag is itself the user's explicit
/// upfront decision, for scripted runs.
pub struct TerminalUi {
    assume_yes: bool,
}

impl Default for TerminalUi {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalUi {
    pub fn new() -> Self {
        Self { assume_yes: false }
    }

    /// Accept everything without prompting (diffs are still printed).
    pub fn with_assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    /// Read one trimmed lowercase line; `None` on EOF or error.
    fn read_line(&self) -> Option<String> {
        let mut line = String::new();
        let stdin = std::io::stdin();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_lowercase()),
            Err(_) => None,
        }
    }

    fn print_diff(&self, path: &str, diff: &[String]) {
        println!("\nChanges for {path}:");
        for line in diff {
            println!("{line}");
        }
    }

    fn editor_command() -> String {
        std::env::var("EDITOR")
            .or_else(|_| std::env::var("VISUAL"))
            .unwrap_or_else(|_| "vi".to_string())
    }
}

impl ReviewUi for TerminalUi {
    fn present_diff(&self, path: &str, diff: &[String]) -> ReviewChoice {
        self.print_diff(path, diff);
        if self.assume_yes {
            return ReviewChoice::Accept;
        }

        print!("[a]ccept / [e]dit / [c]ancel (default: cancel): ");
        let _ = std::io::stdout().flush();

        match self.read_line().as_deref() {
            Some("a") | Some("accept") => ReviewChoice::Accept,
            Some("e") | Some("edit") => ReviewChoice::Edit,
            // Empty input, EOF, and anything unrecognized all cancel.
            _ => ReviewChoice::Cancel,
        }
    }

    fn batch_choice(&self, paths: &[String]) -> BatchChoice {
        if self.assume_yes {
            return BatchChoice::AcceptAll;
        }

        println!("\n{} file(s) proposed:", paths.len());
        for path in paths {
            println!("  - {path}");
        }
        print!("[a]ccept all / [e]dit all / [c]ancel all / [p]er file (default: cancel all): ");
        let _ = std::io::stdout().flush();

        match self.read_line().as_deref() {
            Some("a") | Some("accept") => BatchChoice::AcceptAll,
            Some("e") | Some("edit") => BatchChoice::EditAll,
            Some("p") | Some("per") => BatchChoice::PerFile,
            _ => BatchChoice::CancelAll,
        }
    }

    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        print!("{prompt} [y/N]: ");
        let _ = std::io::stdout().flush();
        matches!(self.read_line().as_deref(), Some("y") | Some("yes"))
    }

    fn edit(&self, path: &str, proposed: &str) -> Option<String> {
        let suffix = std::path::Path::new(path)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_else(|| ".txt".to_string());

        let file = match tempfile::Builder::new()
            .prefix("patchwright-")
            .suffix(&suffix)
            .tempfile()
        {
            Ok(f) => f,
            Err(e) => {
                warn!("could not create temp file for editing: {e}");
                return None;
            }
        };

        if std::fs::write(file.path(), proposed).is_err() {
            warn!("could not stage proposed content for editing");
            return None;
        }

        let editor = Self::editor_command();
        debug!("opening {} in {editor}", file.path().display());
        println!("Opening suggestion in {editor}; save and close to continue.");

        let status = Command::new(&editor).arg(file.path()).status();
        match status {
            Ok(s) if s.success() => std::fs::read_to_string(file.path()).ok(),
            Ok(_) => {
                self.notify("editor exited with an error; edit aborted");
                None
            }
            Err(e) => {
                self.notify(&format!("could not launch '{editor}': {e}"));
                None
            }
        }
    }

    fn notify(&self, message: &str) {
        println!("{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assume_yes_accepts_without_input() {
        let ui = TerminalUi::new().with_assume_yes(true);
        assert_eq!(ui.present_diff("a.py", &["+x".into()]), ReviewChoice::Accept);
        assert_eq!(ui.batch_choice(&["a.py".into()]), BatchChoice::AcceptAll);
        assert!(ui.confirm("apply?"));
    }

    #[test]
    fn editor_command_defaults_to_vi() {
        // Only meaningful when neither env var leaks in from the test
        // environment; both set and unset cases are valid outcomes.
        let editor = TerminalUi::editor_command();
        assert!(!editor.is_empty());
    }
}
