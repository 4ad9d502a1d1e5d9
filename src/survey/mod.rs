//! Wellness survey: a scripted five-question check-in.
//!
//! The survey greets the user, asks for consent, then walks through a fixed
//! set of questions. Each structured answer gets an empathetic reply from a
//! `ResponseGenerator`; the reply is sanitized so it can never steer the
//! flow, and simple heuristics decide whether to ask a follow-up or offer
//! to move on.

pub mod assessment;
pub mod classifier;
pub mod generator;
pub mod machine;
pub mod manager;
pub mod phase;
pub mod prompts;
pub mod routes;
pub mod sanitizer;
pub mod transcript;

pub use assessment::{AnswerKind, Assessment, AssessmentKey, ConsentDecision};
pub use generator::{
    GenerationContext, GenerationRequest, GenerationSettings, HttpResponseGenerator,
    LlmResponseGenerator, OfflineGenerator, ResponseGenerator, create_generator,
};
pub use machine::{
    ConversationStateMachine, ExpectedInput, SessionFlags, SessionSnapshot, SystemReaction,
};
pub use manager::{SessionManager, StartedSession};
pub use phase::Phase;
pub use routes::{SurveyRouteState, survey_routes};
pub use transcript::{Speaker, Transcript, Turn, TurnTag};
