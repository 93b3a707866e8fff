//! Pluggable intent classification for user instructions.
//!
//! The pipeline needs one small judgement call per instruction: does this
//! text continue the task already in flight ("change it to blue", "now add
//! tests"), or does it start a fresh one? The judgement sits behind
//! [`IntentClassifier`] so the default keyword heuristic can be swapped for
//! a better classifier without changing the pipeline's control flow.

/// How an instruction relates to the task in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// A fresh request that starts a new task.
    NewTask,
    /// Refers back to prior work — modification verbs or anaphoric pronouns.
    Continuation,
}

/// Classifies an instruction's intent.
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Intent;
}

/// Modification verbs and pronouns that signal a follow-up to prior work.
const CONTINUATION_VOCABULARY: &[&str] = &[
    "change", "modify", "update", "make", "add", "remove", "fix", "it", "this", "that",
];

/// Keyword-match classifier.
///
/// An instruction containing any word from the continuation vocabulary is
/// treated as a continuation of the current task. Matching is on whole
/// lowercase words, so "italic" does not match "it".
pub struct KeywordClassifier {
    vocabulary: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self {
            vocabulary: CONTINUATION_VOCABULARY
                .iter()
                .map(|w| (*w).to_string())
                .collect(),
        }
    }
}

impl KeywordClassifier {
    /// Replace the default vocabulary.
    pub fn with_vocabulary(words: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            vocabulary: words.into_iter().map(Into::into).collect(),
        }
    }
}

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> Intent {
        let lower = text.to_lowercase();
        let matched = lower
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| self.vocabulary.iter().any(|v| v == word));
        if matched {
            Intent::Continuation
        } else {
            Intent::NewTask
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modification_verbs_are_continuations() {
        let c = KeywordClassifier::default();
        assert_eq!(c.classify("change the header color"), Intent::Continuation);
        assert_eq!(c.classify("now add a footer"), Intent::Continuation);
        assert_eq!(c.classify("Fix the parse error"), Intent::Continuation);
    }

    #[test]
    fn pronouns_are_continuations() {
        let c = KeywordClassifier::default();
        assert_eq!(c.classify("make it responsive"), Intent::Continuation);
        assert_eq!(c.classify("do that again but smaller"), Intent::Continuation);
    }

    #[test]
    fn fresh_requests_are_new_tasks() {
        let c = KeywordClassifier::default();
        assert_eq!(c.classify("build a website for schools"), Intent::NewTask);
        assert_eq!(c.classify("write a JSON parser"), Intent::NewTask);
    }

    #[test]
    fn matches_whole_words_only() {
        let c = KeywordClassifier::default();
        // "italic" contains "it" as a substring but not as a word.
        assert_eq!(c.classify("render headings in italic"), Intent::NewTask);
    }

    #[test]
    fn custom_vocabulary_replaces_default() {
        let c = KeywordClassifier::with_vocabulary(["tweak"]);
        assert_eq!(c.classify("tweak the layout"), Intent::Continuation);
        assert_eq!(c.classify("change the layout"), Intent::NewTask);
    }
}
