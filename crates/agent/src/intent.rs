//! Turn intent classification.
//!
//! The shipped classifier is deliberately simple: two fixed phrase lists
//! matched case-insensitively as substrings. It sits behind a trait so the
//! conversation engine does not care how classification happens, and a
//! smarter strategy can replace it without touching the state machine.

/// What a user turn asks the engine to do with the current candidate list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnIntent {
    /// Expand on the currently presented candidate.
    MoreInfo,
    /// Advance the cursor and present the next candidate.
    MoreOptions,
    /// No list navigation; let the dialogue flow handle the turn.
    NoOp,
}

pub trait IntentClassifier: Send + Sync {
    fn classify(&self, message: &str) -> TurnIntent;
}

const MORE_INFO_PHRASES: &[&str] = &[
    "tell me more",
    "more info",
    "more information",
    "more details",
    "details",
    "nutritional",
    "nutrition",
    "describe",
    "what's in it",
    "whats in it",
    "ingredients",
];

const MORE_OPTIONS_PHRASES: &[&str] = &[
    "more options",
    "other options",
    "something else",
    "show me more",
    "next",
    "another",
    "what else",
    "different",
];

/// Case-insensitive substring matching against fixed phrase lists.
/// More-info is checked first: "tell me more" must not read as a request
/// for the next candidate. At most one intent fires per turn.
#[derive(Clone, Copy, Debug, Default)]
pub struct PhraseIntentClassifier;

impl IntentClassifier for PhraseIntentClassifier {
    fn classify(&self, message: &str) -> TurnIntent {
        let lowered = message.to_lowercase();
        if MORE_INFO_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
            TurnIntent::MoreInfo
        } else if MORE_OPTIONS_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
            TurnIntent::MoreOptions
        } else {
            TurnIntent::NoOp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IntentClassifier, PhraseIntentClassifier, TurnIntent};

    #[test]
    fn classifies_more_options_phrases() {
        let classifier = PhraseIntentClassifier;
        for message in ["Show me more options", "NEXT", "got another one?", "what else is there"] {
            assert_eq!(classifier.classify(message), TurnIntent::MoreOptions, "{message}");
        }
    }

    #[test]
    fn classifies_more_info_phrases() {
        let classifier = PhraseIntentClassifier;
        for message in ["Can you describe it?", "nutritional info please", "What's in it?"] {
            assert_eq!(classifier.classify(message), TurnIntent::MoreInfo, "{message}");
        }
    }

    #[test]
    fn more_info_wins_when_both_lists_match() {
        // "tell me more" contains no more-options phrase, but a mixed turn
        // mentioning both must resolve to the higher-priority intent.
        let classifier = PhraseIntentClassifier;
        assert_eq!(classifier.classify("Tell me more, or show me more options"), TurnIntent::MoreInfo);
        assert_eq!(classifier.classify("tell me more"), TurnIntent::MoreInfo);
    }

    #[test]
    fn unrelated_turns_are_noop() {
        let classifier = PhraseIntentClassifier;
        assert_eq!(classifier.classify("I love spicy food"), TurnIntent::NoOp);
        assert_eq!(classifier.classify(""), TurnIntent::NoOp);
    }
}
