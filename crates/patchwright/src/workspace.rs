//! Workspace file access: scanning, project-type inference, and guarded I/O.
//!
//! A [`Workspace`] wraps the root directory the assistant is allowed to
//! touch. Scanning is gitignore-aware and skips the usual build/cache
//! directories; reads and writes resolve workspace-relative paths and block
//! traversal outside the root. All pipeline writes go through the review
//! engine's commit, which delegates here — this module is the only place
//! that touches the filesystem.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Directories never included in a scan even when not gitignored.
const IGNORED_DIRS: &[&str] = &[
    ".git",
    "target",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
    ".idea",
    ".vscode",
];

/// Cap on relevant-file results for a single request.
const MAX_RELEVANT_FILES: usize = 10;

/// Project type inferred from marker files at the workspace root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectType {
    Rust,
    Node,
    Python,
    Java,
    Unknown,
}

impl ProjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Rust => "rust",
            ProjectType::Node => "node",
            ProjectType::Python => "python",
            ProjectType::Java => "java",
            ProjectType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Handle on the directory tree the assistant may read and write.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative path, rejecting traversal and absolute
    /// paths.
    fn resolve(&self, relative: &str) -> Result<PathBuf, String> {
        if relative.split('/').any(|seg| seg == "..") {
            return Err(format!("path traversal not allowed: '{relative}'"));
        }
        if Path::new(relative).is_absolute() {
            return Err(format!("absolute paths not allowed: '{relative}'"));
        }
        Ok(self.root.join(relative))
    }

    /// Whether a workspace-relative path exists.
    pub fn exists(&self, relative: &str) -> bool {
        self.resolve(relative).map(|p| p.exists()).unwrap_or(false)
    }

    /// Read a UTF-8 text file.
    pub fn read(&self, relative: &str) -> Result<String, String> {
        let path = self.resolve(relative)?;
        if !path.exists() {
            return Err(format!("file not found: '{relative}'"));
        }
        std::fs::read_to_string(&path).map_err(|e| format!("failed to read '{relative}': {e}"))
    }

    /// Write a UTF-8 text file, creating parent directories as needed.
    pub fn write(&self, relative: &str, content: &str) -> Result<(), String> {
        let path = self.resolve(relative)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create parent dirs for '{relative}': {e}"))?;
        }
        std::fs::write(&path, content).map_err(|e| format!("failed to write '{relative}': {e}"))
    }

    /// Delete a file.
    pub fn delete(&self, relative: &str) -> Result<(), String> {
        let path = self.resolve(relative)?;
        if !path.exists() {
            return Err(format!("file not found: '{relative}'"));
        }
        std::fs::remove_file(&path).map_err(|e| format!("failed to delete '{relative}': {e}"))
    }

    /// Copy a file to a sibling path (used for pre-overwrite backups).
    pub fn copy(&self, from: &str, to: &str) -> Result<(), String> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        std::fs::copy(&src, &dst)
            .map(|_| ())
            .map_err(|e| format!("failed to copy '{from}' to '{to}': {e}"))
    }

    /// Scan the workspace for accessible files.
    ///
    /// Gitignore-aware; hidden files and the [`IGNORED_DIRS`] list are
    /// skipped. Returns workspace-relative paths, sorted.
    pub fn scan(&self) -> Vec<String> {
        let walker = ignore::WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                !IGNORED_DIRS.contains(&name.as_ref())
            })
            .build();

        let mut files = BTreeSet::new();
        for entry in walker.flatten() {
            if entry.file_type().is_some_and(|t| t.is_file())
                && let Ok(relative) = entry.path().strip_prefix(&self.root)
            {
                files.insert(relative.to_string_lossy().replace('\\', "/"));
            }
        }
        let files: Vec<String> = files.into_iter().collect();
        debug!("workspace scan: {} accessible files", files.len());
        files
    }

    /// Infer the project type from marker files at the root.
    pub fn project_type(&self) -> ProjectType {
        let markers: &[(&str, ProjectType)] = &[
            ("Cargo.toml", ProjectType::Rust),
            ("package.json", ProjectType::Node),
            ("pyproject.toml", ProjectType::Python),
            ("requirements.txt", ProjectType::Python),
            ("pom.xml", ProjectType::Java),
        ];
        for (marker, kind) in markers {
            if self.root.join(marker).exists() {
                return *kind;
            }
        }
        ProjectType::Unknown
    }
}

/// Rank accessible files by relevance to a request.
///
/// A file is relevant when a word from the request appears in its path
/// (filename matches rank above directory matches). Capped at
/// [`MAX_RELEVANT_FILES`] results.
pub fn relevant_files(files: &[String], request: &str) -> Vec<String> {
    let words: Vec<String> = request
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3)
        .map(str::to_string)
        .collect();

    let mut scored: Vec<(u32, &String)> = files
        .iter()
        .filter_map(|file| {
            let lower = file.to_lowercase();
            let name = lower.rsplit('/').next().unwrap_or(&lower).to_string();
            let score: u32 = words
                .iter()
                .map(|w| {
                    if name.contains(w.as_str()) {
                        2
                    } else if lower.contains(w.as_str()) {
                        1
                    } else {
                        0
                    }
                })
                .sum();
            (score > 0).then_some((score, file))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(MAX_RELEVANT_FILES)
        .map(|(_, f)| f.clone())
        .collect()
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
    fn write_read_roundtrip() {
        let (_dir, ws) = workspace();
        ws.write("src/app.py", "print('hi')\n").unwrap();
        assert_eq!(ws.read("src/app.py").unwrap(), "print('hi')\n");
    }

    #[test]
    fn read_missing_file_is_typed_error() {
        let (_dir, ws) = workspace();
        let err = ws.read("nope.txt").unwrap_err();
        assert!(err.contains("file not found"));
    }

    #[test]
    fn traversal_and_absolute_paths_rejected() {
        let (_dir, ws) = workspace();
        assert!(ws.read("../etc/passwd").is_err());
        assert!(ws.write("/tmp/abs.txt", "x").is_err());
        // ".." as a path segment, not merely a substring.
        ws.write("notes..md", "fine").unwrap();
    }

    #[test]
    fn delete_removes_file() {
        let (_dir, ws) = workspace();
        ws.write("gone.txt", "bye").unwrap();
        ws.delete("gone.txt").unwrap();
        assert!(!ws.exists("gone.txt"));
        assert!(ws.delete("gone.txt").is_err());
    }

    #[test]
    fn scan_skips_ignored_dirs() {
        let (_dir, ws) = workspace();
        ws.write("src/main.rs", "fn main() {}").unwrap();
        ws.write("target/debug/junk.d", "x").unwrap();
        ws.write("node_modules/pkg/index.js", "x").unwrap();

        let files = ws.scan();
        assert!(files.contains(&"src/main.rs".to_string()));
        assert!(!files.iter().any(|f| f.starts_with("target/")));
        assert!(!files.iter().any(|f| f.starts_with("node_modules/")));
    }

    #[test]
    fn project_type_from_markers() {
        let (_dir, ws) = workspace();
        assert_eq!(ws.project_type(), ProjectType::Unknown);
        ws.write("Cargo.toml", "[package]").unwrap();
        assert_eq!(ws.project_type(), ProjectType::Rust);
    }

    #[test]
    fn relevant_files_ranks_filename_matches_first() {
        let files = vec![
            "src/parser/mod.rs".to_string(),
            "src/parse.py".to_string(),
            "docs/readme.md".to_string(),
        ];
        let relevant = relevant_files(&files, "add input validation to parse.py");
        assert_eq!(relevant.first().map(String::as_str), Some("src/parse.py"));
        assert!(!relevant.contains(&"docs/readme.md".to_string()));
    }

    #[test]
    fn relevant_files_empty_for_unrelated_request() {
        let files = vec!["src/main.rs".to_string()];
        assert!(relevant_files(&files, "completely unrelated words").is_empty());
    }
}
