//! Conversation transcript: append-only list of turns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    System,
    User,
}

/// What a turn is, for surfaces that style them differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnTag {
    /// A scripted survey question.
    Question,
    /// A user's answer to a question.
    Response,
    /// Anything else.
    Plain,
}

/// One message in the transcript. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub speaker: Speaker,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<TurnTag>,
}

impl Turn {
    pub fn new(speaker: Speaker, text: impl Into<String>, tag: Option<TurnTag>) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker,
            text: text.into(),
            created_at: Utc::now(),
            tag,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Speaker::System, text, None)
    }

    pub fn question(text: impl Into<String>) -> Self {
        Self::new(Speaker::System, text, Some(TurnTag::Question))
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, text, None)
    }

    pub fn response(text: impl Into<String>) -> Self {
        Self::new(Speaker::User, text, Some(TurnTag::Response))
    }
}

/// Ordered, append-only sequence of turns.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return a reference to it.
    pub fn push(&mut self, turn: Turn) -> &Turn {
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Untagged user turns since the most recent question was asked.
    pub fn free_text_since_last_question(&self) -> impl Iterator<Item = &Turn> {
        let start = self
            .turns
            .iter()
            .rposition(|t| t.tag == Some(TurnTag::Question))
            .map(|i| i + 1)
            .unwrap_or(0);
        self.turns[start..]
            .iter()
            .filter(|t| t.speaker == Speaker::User && t.tag != Some(TurnTag::Response))
    }
}
