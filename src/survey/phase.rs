//! Survey phases: the fixed script the conversation walks through.

use serde::{Deserialize, Serialize};

use super::assessment::{AnswerKind, AssessmentKey};

/// The phases of the wellness conversation.
///
/// Progresses linearly: Welcome → Consent → Question1 … Question5 →
/// AdditionalFeedback → Complete. Consent may short-circuit to Complete, and
/// Question5 goes straight to Complete when no wrap-up round is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "welcome")]
    Welcome,
    #[serde(rename = "consent")]
    Consent,
    #[serde(rename = "question_1")]
    Question1,
    #[serde(rename = "question_2")]
    Question2,
    #[serde(rename = "question_3")]
    Question3,
    #[serde(rename = "question_4")]
    Question4,
    #[serde(rename = "question_5")]
    Question5,
    #[serde(rename = "additional_feedback")]
    AdditionalFeedback,
    #[serde(rename = "complete")]
    Complete,
}

impl Phase {
    /// All question phases in script order.
    pub const QUESTIONS: [Phase; 5] = [
        Phase::Question1,
        Phase::Question2,
        Phase::Question3,
        Phase::Question4,
        Phase::Question5,
    ];

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Phase) -> bool {
        use Phase::*;
        matches!(
            (self, target),
            (Welcome, Consent)
                | (Consent, Question1)
                | (Consent, Complete)
                | (Question1, Question2)
                | (Question2, Question3)
                | (Question3, Question4)
                | (Question4, Question5)
                | (Question5, AdditionalFeedback)
                | (Question5, Complete)
                | (AdditionalFeedback, Complete)
        )
    }

    /// Whether this phase is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// The question that follows this one, if any.
    pub fn next_question(&self) -> Option<Phase> {
        use Phase::*;
        match self {
            Consent => Some(Question1),
            Question1 => Some(Question2),
            Question2 => Some(Question3),
            Question3 => Some(Question4),
            Question4 => Some(Question5),
            _ => None,
        }
    }

    /// 1-based question number for question phases.
    pub fn question_number(&self) -> Option<u8> {
        match self {
            Self::Question1 => Some(1),
            Self::Question2 => Some(2),
            Self::Question3 => Some(3),
            Self::Question4 => Some(4),
            Self::Question5 => Some(5),
            _ => None,
        }
    }

    pub fn is_question(&self) -> bool {
        self.question_number().is_some()
    }

    /// Whether this is the last question of the script.
    pub fn is_final_question(&self) -> bool {
        matches!(self, Self::Question5)
    }

    /// The assessment key answered in this phase.
    pub fn assessment_key(&self) -> Option<AssessmentKey> {
        match self {
            Self::Question1 => Some(AssessmentKey::WorkSatisfaction),
            Self::Question2 => Some(AssessmentKey::PersonalConcerns),
            Self::Question3 => Some(AssessmentKey::GrowthSupport),
            Self::Question4 => Some(AssessmentKey::OneOnOneFrequency),
            Self::Question5 => Some(AssessmentKey::OneOnOneHelpfulness),
            _ => None,
        }
    }

    /// The kind of structured answer this phase's question takes.
    pub fn answer_kind(&self) -> Option<AnswerKind> {
        self.assessment_key().map(|key| key.answer_kind())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Consent => "consent",
            Self::Question1 => "question_1",
            Self::Question2 => "question_2",
            Self::Question3 => "question_3",
            Self::Question4 => "question_4",
            Self::Question5 => "question_5",
            Self::AdditionalFeedback => "additional_feedback",
            Self::Complete => "complete",
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::Welcome
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
