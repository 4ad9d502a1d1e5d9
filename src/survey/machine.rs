//! Conversation state machine: drives one survey session.
//!
//! The machine owns the phase, transcript, assessment and session flags.
//! Every entry point returns a `SystemReaction`: the system turns to show,
//! in order, plus the resulting state. Inputs that do not fit the current
//! state produce an empty reaction carrying the rejection instead of an error.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::SurveyConfig;
use crate::error::SurveyError;

use super::assessment::{AnswerKind, Assessment, ConsentDecision};
use super::classifier::{
    self, ConfirmationIntent, contains_question, has_follow_up_language, has_navigation_cue,
};
use super::generator::{GenerationContext, GenerationRequest, ResponseGenerator};
use super::phase::Phase;
use super::prompts;
use super::sanitizer::{strip_navigation_cues, strip_questions};
use super::transcript::{Speaker, Transcript, Turn};

/// Transient flags gating how the next free-text turn is read.
///
/// `awaiting_confirmation` and `awaiting_follow_up` are never both set;
/// the setters below are the only way to change them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFlags {
    awaiting_confirmation: bool,
    awaiting_follow_up: bool,
    close_after_follow_up: bool,
}

impl SessionFlags {
    pub fn awaiting_confirmation(&self) -> bool {
        self.awaiting_confirmation
    }

    pub fn awaiting_follow_up(&self) -> bool {
        self.awaiting_follow_up
    }

    /// The pending follow-up belongs to the final question.
    pub fn close_after_follow_up(&self) -> bool {
        self.close_after_follow_up
    }

    /// Neither confirmation nor follow-up is pending.
    pub fn is_idle(&self) -> bool {
        !self.awaiting_confirmation && !self.awaiting_follow_up
    }

    fn await_confirmation(&mut self) {
        *self = Self {
            awaiting_confirmation: true,
            ..Self::default()
        };
    }

    fn await_follow_up(&mut self, close_after: bool) {
        *self = Self {
            awaiting_follow_up: true,
            close_after_follow_up: close_after,
            ..Self::default()
        };
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// What kind of input the session wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedInput {
    /// One of `full`, `anonymous`, `declined`.
    Consent,
    /// A primary answer from 1 to 5.
    Scale,
    /// A primary answer of yes or no.
    YesNo,
    /// Free text (follow-up, confirmation or chat).
    FreeText,
    /// Optional closing feedback.
    AdditionalFeedback,
    /// Nothing; the session is over.
    None,
}

/// The outcome of one entry-point call.
#[derive(Debug, Clone, Serialize)]
pub struct SystemReaction {
    /// System turns to present, in order.
    pub turns: Vec<Turn>,
    pub phase: Phase,
    pub flags: SessionFlags,
    pub expects: ExpectedInput,
    /// Why the input was ignored, for no-op reactions.
    #[serde(
        serialize_with = "serialize_rejection",
        skip_serializing_if = "Option::is_none"
    )]
    pub rejection: Option<SurveyError>,
}

/// Rejections go over the wire as their message.
fn serialize_rejection<S>(rejection: &Option<SurveyError>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match rejection {
        Some(reason) => serializer.collect_str(reason),
        None => serializer.serialize_none(),
    }
}

impl SystemReaction {
    /// Whether the call changed nothing.
    pub fn is_noop(&self) -> bool {
        self.rejection.is_some()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.turns.iter().map(|t| t.text.as_str()).collect()
    }
}

/// Full session state for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub user_name: String,
    pub phase: Phase,
    pub consent: ConsentDecision,
    pub flags: SessionFlags,
    pub expects: ExpectedInput,
    pub assessment: Assessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_feedback: Option<String>,
    pub transcript: Vec<Turn>,
}

/// One survey session.
pub struct ConversationStateMachine {
    session_id: Uuid,
    user_name: String,
    config: Arc<SurveyConfig>,
    generator: Arc<dyn ResponseGenerator>,
    phase: Phase,
    consent: ConsentDecision,
    transcript: Transcript,
    assessment: Assessment,
    flags: SessionFlags,
    additional_feedback: Option<String>,
    /// Elaborations given since the current question was asked.
    elaboration_rounds: u32,
}

impl ConversationStateMachine {
    pub fn new(
        user_name: impl Into<String>,
        generator: Arc<dyn ResponseGenerator>,
        config: Arc<SurveyConfig>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_name: user_name.into(),
            config,
            generator,
            phase: Phase::Welcome,
            consent: ConsentDecision::Pending,
            transcript: Transcript::new(),
            assessment: Assessment::new(),
            flags: SessionFlags::default(),
            additional_feedback: None,
            elaboration_rounds: 0,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn flags(&self) -> SessionFlags {
        self.flags
    }

    pub fn consent(&self) -> ConsentDecision {
        self.consent
    }

    pub fn assessment(&self) -> &Assessment {
        &self.assessment
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn additional_feedback(&self) -> Option<&str> {
        self.additional_feedback.as_deref()
    }

    pub fn expected_input(&self) -> ExpectedInput {
        match self.phase {
            Phase::Consent => ExpectedInput::Consent,
            Phase::AdditionalFeedback => ExpectedInput::AdditionalFeedback,
            phase if phase.is_question() => {
                if !self.flags.is_idle() {
                    ExpectedInput::FreeText
                } else {
                    match phase.answer_kind() {
                        Some(AnswerKind::YesNo) => ExpectedInput::YesNo,
                        _ => ExpectedInput::Scale,
                    }
                }
            }
            _ => ExpectedInput::None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            user_name: self.user_name.clone(),
            phase: self.phase,
            consent: self.consent,
            flags: self.flags,
            expects: self.expected_input(),
            assessment: self.assessment.clone(),
            additional_feedback: self.additional_feedback.clone(),
            transcript: self.transcript.turns().to_vec(),
        }
    }

    /// Greet the user, show the privacy notice and ask for consent.
    pub fn start(&mut self) -> SystemReaction {
        if self.phase != Phase::Welcome {
            return self.reject(SurveyError::InvalidTransition {
                phase: self.phase,
                reason: "session already started".to_string(),
            });
        }

        let mark = self.transcript.len();
        self.say(Turn::system(prompts::greeting(&self.user_name)));
        self.say(Turn::system(prompts::PRIVACY_NOTICE));
        self.say(Turn::question(prompts::CONSENT_PROMPT));
        self.advance_to(Phase::Consent);
        self.reaction_since(mark)
    }

    /// Submit a structured answer: a consent token or a question answer.
    pub async fn submit_primary_answer(&mut self, raw_answer: &str) -> SystemReaction {
        match self.phase {
            Phase::Consent => self.handle_consent(raw_answer),
            phase if phase.is_question() => {
                if !self.flags.is_idle() {
                    return self.reject(SurveyError::InvalidTransition {
                        phase,
                        reason: "free text is expected".to_string(),
                    });
                }
                self.handle_answer(raw_answer).await
            }
            phase => self.reject(SurveyError::InvalidTransition {
                phase,
                reason: "no question is pending".to_string(),
            }),
        }
    }

    /// Submit free text; its meaning depends on the session flags.
    pub async fn submit_free_text(&mut self, text: &str) -> SystemReaction {
        let text = text.trim();
        if text.is_empty() {
            return self.reject(SurveyError::InvalidAnswer {
                phase: self.phase,
                answer: String::new(),
            });
        }

        match self.phase {
            Phase::AdditionalFeedback => self.submit_additional_feedback(Some(text)),
            phase if phase.is_question() => {
                if self.flags.awaiting_follow_up() {
                    self.handle_follow_up(text).await
                } else if self.flags.awaiting_confirmation() {
                    self.handle_confirmation(text).await
                } else {
                    self.handle_chat_message(text).await
                }
            }
            phase => self.reject(SurveyError::InvalidTransition {
                phase,
                reason: "free text is not accepted now".to_string(),
            }),
        }
    }

    /// Record (or skip, with `None`) the closing feedback and finish.
    pub fn submit_additional_feedback(&mut self, feedback: Option<&str>) -> SystemReaction {
        if self.phase != Phase::AdditionalFeedback {
            return self.reject(SurveyError::InvalidTransition {
                phase: self.phase,
                reason: "additional feedback is not being collected".to_string(),
            });
        }

        let mark = self.transcript.len();
        if let Some(feedback) = feedback.map(str::trim).filter(|f| !f.is_empty()) {
            self.transcript.push(Turn::user(feedback));
            self.additional_feedback = Some(feedback.to_string());
        }
        info!(
            session_id = %self.session_id,
            provided = self.additional_feedback.is_some(),
            "Additional feedback submitted"
        );
        self.say(Turn::system(prompts::FEEDBACK_THANKS));
        self.finish();
        self.reaction_since(mark)
    }

    fn handle_consent(&mut self, raw: &str) -> SystemReaction {
        let Some(decision) = ConsentDecision::parse(raw) else {
            return self.reject(SurveyError::InvalidAnswer {
                phase: self.phase,
                answer: raw.to_string(),
            });
        };

        let mark = self.transcript.len();
        self.transcript.push(Turn::response(decision.as_str()));
        self.consent = decision;
        info!(session_id = %self.session_id, consent = %decision, "Consent recorded");

        self.say(Turn::system(prompts::consent_acknowledgment(
            decision,
            &self.user_name,
            &self.config.contact_email,
        )));
        if decision.is_participating() {
            self.ask(Phase::Question1);
        } else {
            self.finish();
        }
        self.reaction_since(mark)
    }

    async fn handle_answer(&mut self, raw: &str) -> SystemReaction {
        let phase = self.phase;
        let Some(answer) = phase.answer_kind().and_then(|kind| kind.normalize(raw)) else {
            return self.reject(SurveyError::InvalidAnswer {
                phase,
                answer: raw.to_string(),
            });
        };

        if let Err(e) = self.assessment.record(phase, &answer) {
            error!(session_id = %self.session_id, %phase, error = %e, "Assessment write refused");
            return self.reject(e);
        }

        let user_text = self.free_text_for_current_question();
        let mark = self.transcript.len();
        self.transcript.push(Turn::response(&answer));

        let unsatisfied = classifier::is_unsatisfied(phase, &answer, user_text.as_deref());
        let generated = self.generate(phase.as_str()).await;
        let had_cue = has_navigation_cue(&generated);
        let reply = strip_navigation_cues(&generated);
        let asks_question = contains_question(&reply);
        let invites_more = asks_question || has_follow_up_language(&reply);
        self.say(Turn::system(reply));

        let branch = if phase.is_final_question() {
            if asks_question {
                self.flags.await_follow_up(true);
                "follow_up_then_close"
            } else {
                self.close();
                "close"
            }
        } else if had_cue {
            self.say(Turn::system(prompts::CONFIRMATION_PROMPT));
            self.flags.await_confirmation();
            "confirmation"
        } else if invites_more {
            self.flags.await_follow_up(false);
            "follow_up"
        } else if unsatisfied {
            self.say(Turn::system(prompts::canned_follow_up(phase)));
            self.flags.await_follow_up(false);
            "canned_follow_up"
        } else {
            self.say(Turn::system(prompts::CONFIRMATION_PROMPT));
            self.flags.await_confirmation();
            "canned_confirmation"
        };

        info!(
            session_id = %self.session_id,
            %phase,
            answer = %answer,
            unsatisfied,
            branch,
            "Answer recorded"
        );
        self.reaction_since(mark)
    }

    async fn handle_follow_up(&mut self, text: &str) -> SystemReaction {
        let phase = self.phase;
        let mark = self.transcript.len();
        self.transcript.push(Turn::user(text));

        let close = self.flags.close_after_follow_up() || phase.is_final_question();
        self.flags.clear();

        let reply = self.acknowledge(&prompts::follow_up_tag(phase)).await;
        self.say(Turn::system(reply));

        if close {
            self.close();
        } else {
            self.say(Turn::system(prompts::REPEAT_CONFIRMATION_PROMPT));
            self.flags.await_confirmation();
        }
        debug!(session_id = %self.session_id, %phase, close, "Follow-up handled");
        self.reaction_since(mark)
    }

    async fn handle_confirmation(&mut self, text: &str) -> SystemReaction {
        let phase = self.phase;
        let mark = self.transcript.len();
        self.transcript.push(Turn::user(text));
        self.flags.clear();

        match classifier::confirmation_intent(text) {
            ConfirmationIntent::Advance => {
                self.say(Turn::system(prompts::TRANSITION_MESSAGE));
                self.advance_from_question();
            }
            ConfirmationIntent::Elaborate => {
                self.elaboration_rounds += 1;
                let reply = self.acknowledge(&prompts::follow_up_tag(phase)).await;
                self.say(Turn::system(reply));

                let rounds = self.elaboration_rounds;
                if self
                    .config
                    .max_elaboration_rounds
                    .is_some_and(|max| rounds >= max)
                {
                    info!(
                        session_id = %self.session_id,
                        %phase,
                        rounds,
                        "Elaboration limit reached, advancing"
                    );
                    self.say(Turn::system(prompts::TRANSITION_MESSAGE));
                    self.advance_from_question();
                } else {
                    self.say(Turn::system(prompts::REPEAT_CONFIRMATION_PROMPT));
                    self.flags.await_confirmation();
                }
            }
        }
        self.reaction_since(mark)
    }

    /// Free text with no flag pending: acknowledge and move straight on.
    async fn handle_chat_message(&mut self, text: &str) -> SystemReaction {
        let phase = self.phase;
        let mark = self.transcript.len();
        self.transcript.push(Turn::user(text));

        let reply = self.acknowledge(phase.as_str()).await;
        self.say(Turn::system(reply));
        self.advance_from_question();
        self.reaction_since(mark)
    }

    /// Generate a reply that may neither steer the flow nor ask anything.
    async fn acknowledge(&self, phase_tag: &str) -> String {
        let generated = self.generate(phase_tag).await;
        strip_questions(&strip_navigation_cues(&generated))
    }

    /// Call the generator, substituting the phase fallback on failure.
    async fn generate(&self, phase_tag: &str) -> String {
        let request = GenerationRequest::new(
            self.transcript.turns(),
            GenerationContext::new(
                self.user_name.clone(),
                &self.assessment,
                self.phase,
                self.consent,
                self.additional_feedback.clone(),
            ),
            phase_tag,
        );

        match self.generator.generate(&request).await {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    phase = phase_tag,
                    error = %e,
                    "Response generation failed, using fallback"
                );
                prompts::fallback_response(phase_tag).to_string()
            }
        }
    }

    /// User free text given since the current question was asked.
    ///
    /// The keyword scan in `is_unsatisfied` sees only this text. A primary
    /// answer normally arrives straight after the question prompt, and free
    /// text with no flag pending moves on to the next question, so within a
    /// live session this is usually `None` and the per-question answer rule
    /// decides alone. Text given for earlier questions never counts.
    fn free_text_for_current_question(&self) -> Option<String> {
        let joined = self
            .transcript
            .free_text_since_last_question()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        (!joined.is_empty()).then_some(joined)
    }

    fn advance_from_question(&mut self) {
        match self.phase.next_question() {
            Some(next) => self.ask(next),
            None => self.close(),
        }
    }

    fn ask(&mut self, phase: Phase) {
        self.advance_to(phase);
        self.say(Turn::question(prompts::question_text(phase)));
    }

    /// Say goodbye, then either collect closing feedback or finish.
    fn close(&mut self) {
        self.flags.clear();
        self.say(Turn::system(prompts::closing_message(&self.user_name)));
        if self.config.collect_additional_feedback {
            self.advance_to(Phase::AdditionalFeedback);
            self.say(Turn::question(prompts::WRAP_UP_PROMPT));
        } else {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.flags.clear();
        self.assessment.freeze();
        self.advance_to(Phase::Complete);
        info!(
            session_id = %self.session_id,
            consent = %self.consent,
            answers = self.assessment.len(),
            "Session complete"
        );
    }

    fn advance_to(&mut self, target: Phase) {
        if !self.phase.can_transition_to(target) {
            error!(
                session_id = %self.session_id,
                from = %self.phase,
                to = %target,
                "Refusing invalid phase transition"
            );
            return;
        }
        debug!(session_id = %self.session_id, from = %self.phase, to = %target, "Phase transition");
        self.phase = target;
        self.elaboration_rounds = 0;
    }

    fn say(&mut self, turn: Turn) {
        debug_assert_eq!(turn.speaker, Speaker::System);
        self.transcript.push(turn);
    }

    fn reaction_since(&self, mark: usize) -> SystemReaction {
        SystemReaction {
            turns: self.transcript.turns()[mark..]
                .iter()
                .filter(|t| t.speaker == Speaker::System)
                .cloned()
                .collect(),
            phase: self.phase,
            flags: self.flags,
            expects: self.expected_input(),
            rejection: None,
        }
    }

    fn reject(&self, reason: SurveyError) -> SystemReaction {
        debug!(session_id = %self.session_id, phase = %self.phase, %reason, "Input ignored");
        SystemReaction {
            turns: Vec::new(),
            phase: self.phase,
            flags: self.flags,
            expects: self.expected_input(),
            rejection: Some(reason),
        }
    }
}
