use regex::Regex;

/// Decides whether finalized assistant text concludes the conversation.
///
/// The matching strategy is deliberately pluggable: the default phrase
/// list is a product heuristic, and a backend-driven flag can replace it
/// without touching the transcript state machine.
pub trait CompletionPredicate: Send + Sync {
    fn is_complete(&self, content: &str) -> bool;
}

/// Closed phrase list matched case-insensitively against finalized text.
pub const DEFAULT_COMPLETION_PHRASES: [&str; 5] = [
    "this conversation is complete",
    "your request has been completed",
    "is there anything else i can help you with",
    "glad i could help",
    "ready for your review",
];

/// Default [`CompletionPredicate`]: case-insensitive phrase matching.
#[derive(Debug)]
pub struct PhraseCompletion {
    matcher: Option<Regex>,
}

impl Default for PhraseCompletion {
    fn default() -> Self {
        Self::new()
    }
}

impl PhraseCompletion {
    #[must_use]
    pub fn new() -> Self {
        Self::with_phrases(DEFAULT_COMPLETION_PHRASES.iter().map(ToString::to_string))
    }

    /// Build a matcher from a custom phrase list. An empty list never
    /// matches.
    #[must_use]
    pub fn with_phrases(phrases: impl IntoIterator<Item = String>) -> Self {
        let alternation = phrases
            .into_iter()
            .map(|phrase| regex::escape(phrase.trim()))
            .filter(|escaped| !escaped.is_empty())
            .collect::<Vec<_>>()
            .join("|");

        let matcher = if alternation.is_empty() {
            None
        } else {
            Some(
                Regex::new(&format!("(?i){alternation}")).expect("completion regex must compile"),
            )
        };

        Self { matcher }
    }
}

impl CompletionPredicate for PhraseCompletion {
    fn is_complete(&self, content: &str) -> bool {
        self.matcher
            .as_ref()
            .is_some_and(|matcher| matcher.is_match(content))
    }
}

/// Predicate that never completes, for clients gating on an explicit
/// backend signal instead of text heuristics.
#[derive(Debug, Default)]
pub struct NeverComplete;

impl CompletionPredicate for NeverComplete {
    fn is_complete(&self, _content: &str) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::{CompletionPredicate, NeverComplete, PhraseCompletion};

    #[test]
    fn default_phrases_match_case_insensitively() {
        let predicate = PhraseCompletion::new();

        assert!(predicate.is_complete("All done here. GLAD I COULD HELP!"));
        assert!(predicate.is_complete("The draft is ready for your review."));
        assert!(!predicate.is_complete("Let me look into that."));
    }

    #[test]
    fn custom_phrase_list_replaces_defaults() {
        let predicate = PhraseCompletion::with_phrases(vec!["handoff complete".to_string()]);

        assert!(predicate.is_complete("Handoff COMPLETE, closing out."));
        assert!(!predicate.is_complete("glad i could help"));
    }

    #[test]
    fn empty_phrase_list_never_matches() {
        let predicate = PhraseCompletion::with_phrases(Vec::new());
        assert!(!predicate.is_complete("glad i could help"));
        assert!(!predicate.is_complete(""));
    }

    #[test]
    fn never_complete_ignores_all_content() {
        assert!(!NeverComplete.is_complete("this conversation is complete"));
    }
}
