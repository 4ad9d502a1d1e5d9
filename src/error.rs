//! Error types for the wellness chat.

use std::time::Duration;

use uuid::Uuid;

use crate::survey::assessment::AssessmentKey;
use crate::survey::phase::Phase;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Survey error: {0}")]
    Survey(#[from] SurveyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of the response generator. Always recovered by fallback text.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Generator reported failure: {0}")]
    Rejected(String),

    #[error("Generator timed out after {0:?}")]
    Timeout(Duration),

    #[error("Generator returned an empty response")]
    EmptyResponse,

    #[error("No generator configured")]
    Unavailable,
}

/// Conversation flow errors.
///
/// Everything except `SessionNotFound` and `SessionClosed` is turned into a
/// no-op reaction by the state machine rather than surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurveyError {
    #[error("Phase {phase} has no assessment key")]
    InvalidPhase { phase: Phase },

    #[error("Cannot handle this input in phase {phase}: {reason}")]
    InvalidTransition { phase: Phase, reason: String },

    #[error("Answer {answer:?} is not valid for phase {phase}")]
    InvalidAnswer { phase: Phase, answer: String },

    #[error("Assessment key {key} is already recorded")]
    AnswerLocked { key: AssessmentKey },

    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Session was closed while the request was pending")]
    SessionClosed,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
