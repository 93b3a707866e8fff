//! Line-level unified diff between existing and proposed content.

use similar::TextDiff;

/// Compute a unified diff, one output line per element.
///
/// Identical inputs yield an empty vec — callers short-circuit that case to
/// a "no changes" outcome without presenting anything. New-file creation
/// passes `""` as the original, so it reviews through the identical diff
/// path as a modification.
pub fn unified_diff(original: &str, proposed: &str, path: Option<&str>) -> Vec<String> {
    if original == proposed {
        return Vec::new();
    }

    let label = path.unwrap_or("content");
    let diff = TextDiff::from_lines(original, proposed);
    let formatted = diff
        .unified_diff()
        .context_radius(3)
        .header(&format!("Original {label}"), &format!("Modified {label}"))
        .to_string();

    formatted.lines().map(str::to_string).collect()
}
