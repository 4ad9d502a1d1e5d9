//! Assessment accumulator and consent model.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SurveyError;

use super::phase::Phase;

/// The fixed set of answers collected by the survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentKey {
    WorkSatisfaction,
    PersonalConcerns,
    GrowthSupport,
    OneOnOneFrequency,
    OneOnOneHelpfulness,
}

impl AssessmentKey {
    pub const ALL: [AssessmentKey; 5] = [
        AssessmentKey::WorkSatisfaction,
        AssessmentKey::PersonalConcerns,
        AssessmentKey::GrowthSupport,
        AssessmentKey::OneOnOneFrequency,
        AssessmentKey::OneOnOneHelpfulness,
    ];

    /// The question phase that answers this key.
    pub fn phase(&self) -> Phase {
        match self {
            Self::WorkSatisfaction => Phase::Question1,
            Self::PersonalConcerns => Phase::Question2,
            Self::GrowthSupport => Phase::Question3,
            Self::OneOnOneFrequency => Phase::Question4,
            Self::OneOnOneHelpfulness => Phase::Question5,
        }
    }

    pub fn answer_kind(&self) -> AnswerKind {
        match self {
            Self::PersonalConcerns | Self::OneOnOneFrequency => AnswerKind::YesNo,
            _ => AnswerKind::Scale,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkSatisfaction => "work_satisfaction",
            Self::PersonalConcerns => "personal_concerns",
            Self::GrowthSupport => "growth_support",
            Self::OneOnOneFrequency => "one_on_one_frequency",
            Self::OneOnOneHelpfulness => "one_on_one_helpfulness",
        }
    }
}

impl std::fmt::Display for AssessmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a structured answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKind {
    /// Integer 1–5.
    Scale,
    /// "yes" or "no".
    YesNo,
}

impl AnswerKind {
    /// Normalize a raw answer, or `None` if it is not acceptable.
    ///
    /// Scale answers are trimmed digits 1–5; yes/no answers are matched
    /// case-insensitively and returned lowercased.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        match self {
            Self::Scale => match trimmed.parse::<u8>() {
                Ok(n @ 1..=5) => Some(n.to_string()),
                _ => None,
            },
            Self::YesNo => {
                let lower = trimmed.to_lowercase();
                matches!(lower.as_str(), "yes" | "no").then_some(lower)
            }
        }
    }
}

/// The user's consent choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentDecision {
    #[default]
    Pending,
    Full,
    Anonymous,
    Declined,
}

impl ConsentDecision {
    /// Parse one of the three accepted consent tokens.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "full" => Some(Self::Full),
            "anonymous" => Some(Self::Anonymous),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Full => "full",
            Self::Anonymous => "anonymous",
            Self::Declined => "declined",
        }
    }

    /// Whether the user agreed to take part (in either mode).
    pub fn is_participating(&self) -> bool {
        matches!(self, Self::Full | Self::Anonymous)
    }
}

impl std::fmt::Display for ConsentDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answers collected so far, keyed by question.
///
/// Append-only: a key is written once, while its phase is current, and the
/// whole map is frozen when the session ends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Assessment {
    answers: BTreeMap<AssessmentKey, String>,
    #[serde(default)]
    frozen: bool,
}

impl Assessment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the answer for the question asked in `phase`.
    ///
    /// Re-recording the same value is an idempotent retry; any other
    /// overwrite is refused.
    pub fn record(&mut self, phase: Phase, value: &str) -> Result<AssessmentKey, SurveyError> {
        let key = phase
            .assessment_key()
            .ok_or(SurveyError::InvalidPhase { phase })?;

        if self.frozen {
            return Err(SurveyError::InvalidTransition {
                phase,
                reason: "assessment is frozen".to_string(),
            });
        }

        match self.answers.get(&key) {
            Some(existing) if existing == value => Ok(key),
            Some(_) => Err(SurveyError::AnswerLocked { key }),
            None => {
                self.answers.insert(key, value.to_string());
                Ok(key)
            }
        }
    }

    pub fn get(&self, key: AssessmentKey) -> Option<&str> {
        self.answers.get(&key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Whether all five questions are answered.
    pub fn is_complete(&self) -> bool {
        AssessmentKey::ALL.iter().all(|k| self.answers.contains_key(k))
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn iter(&self) -> impl Iterator<Item = (AssessmentKey, &str)> {
        self.answers.iter().map(|(k, v)| (*k, v.as_str()))
    }
}
