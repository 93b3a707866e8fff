//! Change-set extraction from model response text.
//!
//! The model proposes file changes as delimiter-bounded blocks:
//!
//! ```text
//! === MODIFY: src/app.py ===
//! <full replacement body>
//! === END MODIFY ===
//!
//! === CREATE: src/new.py ===
//! <full file body>
//! === END CREATE ===
//! ```
//!
//! Extraction is pattern matching over the whole response, not streaming.
//! Malformed, nested, or unmatched blocks are skipped rather than raised,
//! and a response with no blocks yields an empty change set — "no
//! modification detected" is a signal, not an error. Bodies come back
//! verbatim.
//!
//! The matcher sits behind the [`Extractor`] trait so a stricter grammar
//! (e.g. a small recursive-descent parser for the delimiter format) can
//! replace it without touching callers.

use regex::Regex;
use tracing::{debug, warn};

/// Whether a change creates a new file or replaces an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModificationKind {
    Create,
    Modify,
}

/// One proposed file change. Immutable once extracted; consumed exactly
/// once by the review engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    pub kind: ModificationKind,
    /// Workspace-relative path.
    pub target_path: String,
    /// Full replacement body, verbatim from the response.
    pub proposed_content: String,
}

/// Extracts a change set from model response text.
pub trait Extractor: Send + Sync {
    fn extract(&self, response: &str) -> Vec<Modification>;
}

/// Regex-based block matcher for the `=== MODIFY/CREATE ===` wire format.
///
/// Blocks are returned in document order; multiple blocks for the same path
/// stay separate records — the review engine sequences them. A block whose
/// body contains another start marker is treated as nested and dropped.
pub struct BlockExtractor {
    modify_re: Regex,
    create_re: Regex,
}

impl Default for BlockExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockExtractor {
    pub fn new() -> Self {
        // (?s) lets `.` cross lines inside the body; the lazy body match
        // stops at the first end marker.
        let modify_re = Regex::new(r"(?s)=== MODIFY: (.+?) ===\n(.*?)\n=== END MODIFY ===")
            .expect("valid modify pattern");
        let create_re = Regex::new(r"(?s)=== CREATE: (.+?) ===\n(.*?)\n=== END CREATE ===")
            .expect("valid create pattern");
        Self {
            modify_re,
            create_re,
        }
    }

    fn collect(
        &self,
        response: &str,
        re: &Regex,
        kind: ModificationKind,
        out: &mut Vec<(usize, Modification)>,
    ) {
        for captures in re.captures_iter(response) {
            let (Some(whole), Some(path), Some(body)) =
                (captures.get(0), captures.get(1), captures.get(2))
            else {
                continue;
            };

            let body_text = body.as_str();
            if body_text.contains("=== MODIFY: ") || body_text.contains("=== CREATE: ") {
                warn!("skipping nested change block at offset {}", whole.start());
                continue;
            }

            let Some(target_path) = normalize_path(path.as_str()) else {
                warn!("skipping change block with unusable path '{}'", path.as_str());
                continue;
            };

            out.push((
                whole.start(),
                Modification {
                    kind,
                    target_path,
                    proposed_content: body_text.to_string(),
                },
            ));
        }
    }
}

impl Extractor for BlockExtractor {
    fn extract(&self, response: &str) -> Vec<Modification> {
        let mut found: Vec<(usize, Modification)> = Vec::new();
        self.collect(response, &self.modify_re, ModificationKind::Modify, &mut found);
        self.collect(response, &self.create_re, ModificationKind::Create, &mut found);

        // Interleave modify and create blocks back into document order.
        found.sort_by_key(|(offset, _)| *offset);

        let modifications: Vec<Modification> = found.into_iter().map(|(_, m)| m).collect();
        debug!("extracted {} change block(s)", modifications.len());
        modifications
    }
}

/// Trim a block path and require it to be workspace-relative.
///
/// Absolute paths and traversal segments make the block unusable; leading
/// `./` is dropped.
fn normalize_path(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    if trimmed.is_empty()
        || trimmed.starts_with('/')
        || trimmed.split('/').any(|seg| seg == "..")
    {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> Vec<Modification> {
        BlockExtractor::new().extract(text)
    }

    #[test]
    fn extracts_modify_block_verbatim() {
        let body = "def parse(data):\n    return data  # trailing spaces  ";
        let text = format!("Here you go:\n=== MODIFY: src/parse.py ===\n{body}\n=== END MODIFY ===\n");
        let mods = extract(&text);
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].kind, ModificationKind::Modify);
        assert_eq!(mods[0].target_path, "src/parse.py");
        assert_eq!(mods[0].proposed_content, body);
    }

    #[test]
    fn extracts_create_block() {
        let text = "=== CREATE: parse.py ===\nprint('new')\n=== END CREATE ===";
        let mods = extract(text);
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].kind, ModificationKind::Create);
        assert_eq!(mods[0].proposed_content, "print('new')");
    }

    #[test]
    fn round_trip_re_embedding() {
        let body = "fn main() {\n    println!(\"hi\");\n}";
        let text = format!("=== MODIFY: src/main.rs ===\n{body}\n=== END MODIFY ===");
        let first = extract(&text);

        let re_embedded = format!(
            "=== MODIFY: {} ===\n{}\n=== END MODIFY ===",
            first[0].target_path, first[0].proposed_content,
        );
        let second = extract(&re_embedded);
        assert_eq!(first, second);
    }

    #[test]
    fn no_delimiters_yields_empty_set() {
        assert!(extract("Just prose, no change blocks here.").is_empty());
        assert!(extract("").is_empty());
    }

    #[test]
    fn unmatched_start_marker_yields_nothing() {
        let text = "=== MODIFY: a.py ===\nbody with no end marker";
        assert!(extract(text).is_empty());
    }

    #[test]
    fn nested_blocks_are_dropped() {
        let text = "\
=== MODIFY: outer.py ===
=== MODIFY: inner.py ===
body
=== END MODIFY ===";
        assert!(extract(text).is_empty());
    }

    #[test]
    fn mixed_blocks_come_back_in_document_order() {
        let text = "\
=== CREATE: b.py ===
b
=== END CREATE ===
=== MODIFY: a.py ===
a
=== END MODIFY ===
=== CREATE: c.py ===
c
=== END CREATE ===";
        let mods = extract(text);
        let paths: Vec<&str> = mods.iter().map(|m| m.target_path.as_str()).collect();
        assert_eq!(paths, vec!["b.py", "a.py", "c.py"]);
    }

    #[test]
    fn same_path_twice_stays_separate() {
        let text = "\
=== MODIFY: app.py ===
first
=== END MODIFY ===
=== MODIFY: app.py ===
second
=== END MODIFY ===";
        let mods = extract(text);
        assert_eq!(mods.len(), 2);
        assert_eq!(mods[0].proposed_content, "first");
        assert_eq!(mods[1].proposed_content, "second");
    }

    #[test]
    fn empty_body_is_preserved() {
        let text = "=== CREATE: empty.txt ===\n\n=== END CREATE ===";
        let mods = extract(text);
        assert_eq!(mods.len(), 1);
        assert_eq!(mods[0].proposed_content, "");
    }

    #[test]
    fn unsafe_paths_are_skipped() {
        let abs = "=== CREATE: /etc/passwd ===\nx\n=== END CREATE ===";
        assert!(extract(abs).is_empty());
        let traversal = "=== CREATE: ../outside.txt ===\nx\n=== END CREATE ===";
        assert!(extract(traversal).is_empty());
        let dotted = "=== CREATE: ./inside.txt ===\nx\n=== END CREATE ===";
        assert_eq!(extract(dotted)[0].target_path, "inside.txt");
    }
}
