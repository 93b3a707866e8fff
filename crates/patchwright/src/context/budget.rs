//! Token estimation and budget fitting.
//!
//! Token counts are estimated at a fixed 4-characters-per-token ratio.
//! This is an approximation, not exact tokenization — real tokenizers vary
//! between roughly 3 and 5 chars per token for English and code — but it is
//! cheap, deterministic, and errs conservative enough for budget trimming.
//!
//! [`fit_to_budget`] walks the assembled sections in priority order,
//! keeping whole sections while they fit. The first section that would
//! overflow is truncated to the remaining budget with a marker appended,
//! and every lower-priority section is dropped. The essential-facts section
//! sits at the top of the priority order, so it survives any reasonable
//! budget.

use crate::context::builder::SECTION_PRIORITY;

/// Fixed chars-per-token ratio used everywhere a budget is estimated.
pub const CHARS_PER_TOKEN: usize = 4;

/// Marker appended to a section cut short by budget fitting.
pub const TRUNCATION_MARKER: &str = "\n[context truncated to fit budget]";

/// Separator between sections in the fitted output.
const SECTION_SEPARATOR: &str = "\n\n";

/// Estimate the token count of a text at the fixed ratio.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / CHARS_PER_TOKEN
}

/// Trim an assembled context string to `max_tokens`.
///
/// The input is parsed back into its `=== NAME ===` sections, which are
/// then re-accumulated in [`SECTION_PRIORITY`] order until the character
/// budget (`max_tokens * 4`) runs out. The output length in characters is
/// always ≤ `max_tokens * 4`.
pub fn fit_to_budget(context: &str, max_tokens: usize) -> String {
    let budget_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    if context.len() <= budget_chars {
        return context.to_string();
    }

    let sections = parse_sections(context);
    let mut kept: Vec<String> = Vec::new();
    let mut used: usize = 0;

    for name in SECTION_PRIORITY {
        let Some(text) = sections
            .iter()
            .find(|(n, _)| n.as_str() == *name)
            .map(|(_, t)| *t)
        else {
            continue;
        };

        let separator = if kept.is_empty() { 0 } else { SECTION_SEPARATOR.len() };
        let remaining = budget_chars.saturating_sub(used + separator);

        if text.len() <= remaining {
            kept.push(text.to_string());
            used += separator + text.len();
            continue;
        }

        // Truncate this section to what is left and stop the walk — every
        // lower-priority section is dropped entirely.
        let cut = remaining.saturating_sub(TRUNCATION_MARKER.len());
        if cut > 0 {
            let truncated = truncate_on_boundary(text, cut);
            kept.push(format!("{truncated}{TRUNCATION_MARKER}"));
            used += separator + truncated.len() + TRUNCATION_MARKER.len();
        }
        break;
    }

    kept.join(SECTION_SEPARATOR)
}

/// Split a context string into `(name, full section text)` pairs in
/// document order. Text outside any section is ignored.
fn parse_sections(context: &str) -> Vec<(String, &str)> {
    let mut sections = Vec::new();
    let mut cursor = 0;

    while let Some(rel_start) = context.get(cursor..).and_then(find_section_start) {
        let start = cursor + rel_start.offset;
        let name = rel_start.name;
        let end_marker = format!("=== END {name} ===");
        let Some(rel_end) = context.get(start..).and_then(|t| t.find(&end_marker)) else {
            break;
        };
        let end = start + rel_end + end_marker.len();
        if let Some(text) = context.get(start..end) {
            sections.push((name, text));
        }
        cursor = end;
    }

    sections
}

struct SectionStart {
    offset: usize,
    name: String,
}

/// Find the next `=== NAME ===` start marker (skipping END markers).
fn find_section_start(text: &str) -> Option<SectionStart> {
    let mut search = 0;
    while let Some(rel) = text.get(search..)?.find("=== ") {
        let offset = search + rel;
        let line_end = text.get(offset..)?.find('\n').map(|i| offset + i)?;
        let line = text.get(offset..line_end)?;
        if let Some(name) = line
            .strip_prefix("=== ")
            .and_then(|r| r.strip_suffix(" ==="))
            && !name.starts_with("END ")
        {
            return Some(SectionStart {
                offset,
                name: name.to_string(),
            });
        }
        search = line_end;
    }
    None
}

/// Truncate to at most `max` bytes, backing up to a char boundary.
fn truncate_on_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text.get(..end).unwrap_or("")
}
