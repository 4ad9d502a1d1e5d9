//! Text classifier: pure heuristics over user input and generated replies.
//!
//! Nothing here is a sentiment model. The rules are deliberately simple
//! keyword and pattern checks; false positives and negatives are expected.

use std::sync::LazyLock;

use regex::Regex;

use super::phase::Phase;

/// How a free-text reply to "shall we move on?" is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationIntent {
    /// The user wants the next question.
    Advance,
    /// The user is adding more detail.
    Elaborate,
}

/// Words that signal the user wants to advance.
const ADVANCE_WORDS: &[&str] = &["next", "move", "continue", "yes"];

/// Phrases in generated text that imply a phase transition.
pub(crate) static NAVIGATION_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(moving on to the next question|move on to the next question|(let['’]s|let us|shall we|ready to|we can) move on|next question|continue (to|with)|now let['’]s (talk|move))",
    )
    .unwrap()
});

/// Language a reply uses when it invites the user to say more.
static FOLLOW_UP_LANGUAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(tell me more|could you (share|tell)|can you (share|tell)|would you (like to share|mind sharing)|what (do you think|would|might) (would )?(help|make)|is there anything (specific|that))",
    )
    .unwrap()
});

/// Keywords in user text that suggest something is wrong.
static DISSATISFACTION_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(no|not|difficult\w*|problem\w*|issue\w*|concern\w*|worr\w*|stress\w*|struggl\w*|challeng\w*)\b",
    )
    .unwrap()
});

/// Classify a reply given while awaiting confirmation.
pub fn confirmation_intent(text: &str) -> ConfirmationIntent {
    let lower = text.trim().to_lowercase();
    if lower == "ok" || ADVANCE_WORDS.iter().any(|w| lower.contains(w)) {
        ConfirmationIntent::Advance
    } else {
        ConfirmationIntent::Elaborate
    }
}

/// Whether generated text contains a navigation cue.
pub fn has_navigation_cue(text: &str) -> bool {
    NAVIGATION_CUE.is_match(text)
}

/// Whether text asks something.
pub fn contains_question(text: &str) -> bool {
    text.contains('?')
}

/// Whether generated text invites the user to elaborate.
pub fn has_follow_up_language(text: &str) -> bool {
    FOLLOW_UP_LANGUAGE.is_match(text)
}

/// Whether user text contains any dissatisfaction keyword.
pub fn has_dissatisfaction_keywords(text: &str) -> bool {
    DISSATISFACTION_KEYWORDS.is_match(text)
}

/// Decide whether the user seems unsatisfied with the topic of `phase`.
///
/// The structured `answer` is checked against the per-question rule first.
/// Only when that rule does not fire is the user's own free text (never the
/// generated reply) scanned for keywords.
pub fn is_unsatisfied(phase: Phase, answer: &str, user_text: Option<&str>) -> bool {
    let answer = answer.trim().to_lowercase();
    let by_rule = match phase {
        Phase::Question1 | Phase::Question3 | Phase::Question5 => {
            answer.parse::<u8>().is_ok_and(|n| n <= 2)
        }
        Phase::Question2 => answer.starts_with('y'),
        Phase::Question4 => answer.starts_with('n'),
        _ => false,
    };

    by_rule || user_text.is_some_and(has_dissatisfaction_keywords)
}
