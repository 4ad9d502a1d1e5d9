//! Session manager: owns live sessions and serializes access to each one.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::info;
use uuid::Uuid;

use crate::config::SurveyConfig;
use crate::error::SurveyError;

use super::generator::ResponseGenerator;
use super::machine::{ConversationStateMachine, SessionSnapshot, SystemReaction};

type Operation<'m> = Pin<Box<dyn Future<Output = SystemReaction> + Send + 'm>>;

/// A newly started session and its opening turns.
#[derive(Debug, Clone, Serialize)]
pub struct StartedSession {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub reaction: SystemReaction,
}

struct SessionHandle {
    machine: Arc<Mutex<ConversationStateMachine>>,
    /// Flipped to `true` when the session is torn down.
    closed: watch::Sender<bool>,
}

/// Coordinates all live survey sessions.
///
/// Submissions to one session queue on its mutex in arrival order; sessions
/// never share state.
pub struct SessionManager {
    generator: Arc<dyn ResponseGenerator>,
    config: Arc<SurveyConfig>,
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl SessionManager {
    pub fn new(generator: Arc<dyn ResponseGenerator>, config: SurveyConfig) -> Self {
        Self {
            generator,
            config: Arc::new(config),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session for `user_name` and run its welcome step.
    pub async fn start_session(&self, user_name: &str) -> StartedSession {
        let mut machine = ConversationStateMachine::new(
            user_name,
            Arc::clone(&self.generator),
            Arc::clone(&self.config),
        );
        let session_id = machine.session_id();
        let reaction = machine.start();

        let (closed, _) = watch::channel(false);
        self.sessions.write().await.insert(
            session_id,
            SessionHandle {
                machine: Arc::new(Mutex::new(machine)),
                closed,
            },
        );
        info!(%session_id, "Session started");

        StartedSession {
            session_id,
            reaction,
        }
    }

    pub async fn submit_primary_answer(
        &self,
        session_id: Uuid,
        answer: &str,
    ) -> Result<SystemReaction, SurveyError> {
        let answer = answer.to_string();
        self.run(session_id, move |machine| {
            Box::pin(async move { machine.submit_primary_answer(&answer).await })
        })
        .await
    }

    pub async fn submit_free_text(
        &self,
        session_id: Uuid,
        text: &str,
    ) -> Result<SystemReaction, SurveyError> {
        let text = text.to_string();
        self.run(session_id, move |machine| {
            Box::pin(async move { machine.submit_free_text(&text).await })
        })
        .await
    }

    pub async fn submit_additional_feedback(
        &self,
        session_id: Uuid,
        feedback: Option<String>,
    ) -> Result<SystemReaction, SurveyError> {
        self.run(session_id, move |machine| {
            Box::pin(async move { machine.submit_additional_feedback(feedback.as_deref()) })
        })
        .await
    }

    /// Current state of a session.
    ///
    /// Waits behind any in-flight submission.
    pub async fn snapshot(&self, session_id: Uuid) -> Result<SessionSnapshot, SurveyError> {
        let (machine, _) = self.handle(session_id).await?;
        let machine = machine.lock().await;
        Ok(machine.snapshot())
    }

    /// Tear down a session. Pending submissions resolve to `SessionClosed`.
    pub async fn end_session(&self, session_id: Uuid) -> Result<(), SurveyError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(&session_id)
            .ok_or(SurveyError::SessionNotFound(session_id))?;
        handle.closed.send_replace(true);
        info!(%session_id, "Session ended");
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    async fn handle(
        &self,
        session_id: Uuid,
    ) -> Result<(Arc<Mutex<ConversationStateMachine>>, watch::Receiver<bool>), SurveyError> {
        let sessions = self.sessions.read().await;
        let handle = sessions
            .get(&session_id)
            .ok_or(SurveyError::SessionNotFound(session_id))?;
        Ok((Arc::clone(&handle.machine), handle.closed.subscribe()))
    }

    /// Queue `op` on the session's lock, abandoning it if the session closes
    /// first.
    async fn run<F>(&self, session_id: Uuid, op: F) -> Result<SystemReaction, SurveyError>
    where
        F: for<'m> FnOnce(&'m mut ConversationStateMachine) -> Operation<'m> + Send,
    {
        let (machine, mut closed) = self.handle(session_id).await?;

        tokio::select! {
            biased;
            _ = closed.wait_for(|closed| *closed) => {
                info!(%session_id, "Submission discarded, session closed");
                Err(SurveyError::SessionClosed)
            }
            reaction = async move {
                let mut machine = machine.lock().await;
                op(&mut machine).await
            } => Ok(reaction),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GenerationError;
    use crate::survey::generator::{GenerationRequest, OfflineGenerator};
    use crate::survey::phase::Phase;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(OfflineGenerator), SurveyConfig::default())
    }

    /// Blocks every call until released.
    struct GatedGenerator {
        gate: Notify,
    }

    #[async_trait]
    impl ResponseGenerator for GatedGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            self.gate.notified().await;
            Ok("Thanks for sharing that.".to_string())
        }
    }

    #[tokio::test]
    async fn start_session_registers_and_greets() {
        let manager = manager();
        let started = manager.start_session("Rahul").await;
        assert_eq!(started.reaction.phase, Phase::Consent);
        assert_eq!(started.reaction.turns.len(), 3);
        assert_eq!(manager.session_count().await, 1);

        let snapshot = manager.snapshot(started.session_id).await.unwrap();
        assert_eq!(snapshot.user_name, "Rahul");
        assert_eq!(snapshot.transcript.len(), 3);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let manager = manager();
        let id = Uuid::new_v4();
        assert_eq!(
            manager.submit_free_text(id, "hello").await.unwrap_err(),
            SurveyError::SessionNotFound(id)
        );
        assert_eq!(
            manager.end_session(id).await.unwrap_err(),
            SurveyError::SessionNotFound(id)
        );
    }

    #[tokio::test]
    async fn offline_session_runs_on_fallbacks() {
        let manager = manager();
        let id = manager.start_session("Rahul").await.session_id;
        manager.submit_primary_answer(id, "full").await.unwrap();

        // Fallback for question_1 asks for more, so a follow-up is expected.
        let reaction = manager.submit_primary_answer(id, "4").await.unwrap();
        assert!(reaction.flags.awaiting_follow_up());
        assert!(reaction.texts()[0].starts_with("Thank you for sharing that with me."));
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let manager = manager();
        let a = manager.start_session("Asha").await.session_id;
        let b = manager.start_session("Ben").await.session_id;

        manager.submit_primary_answer(a, "declined").await.unwrap();
        let snapshot_b = manager.snapshot(b).await.unwrap();
        assert_eq!(snapshot_b.phase, Phase::Consent);
        assert_eq!(manager.snapshot(a).await.unwrap().phase, Phase::Complete);
    }

    #[tokio::test]
    async fn concurrent_submissions_queue_in_order() {
        let generator = Arc::new(GatedGenerator {
            gate: Notify::new(),
        });
        let manager = Arc::new(SessionManager::new(
            generator.clone(),
            SurveyConfig::default(),
        ));
        let id = manager.start_session("Rahul").await.session_id;
        manager.submit_primary_answer(id, "full").await.unwrap();

        let first = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.submit_primary_answer(id, "4").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.submit_free_text(id, "next").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        generator.gate.notify_one();

        let first = first.await.unwrap().unwrap();
        assert!(first.flags.awaiting_confirmation());
        let second = second.await.unwrap().unwrap();
        assert_eq!(second.phase, Phase::Question2);
    }

    #[tokio::test]
    async fn end_session_cancels_pending_submission() {
        let generator = Arc::new(GatedGenerator {
            gate: Notify::new(),
        });
        let manager = Arc::new(SessionManager::new(generator, SurveyConfig::default()));
        let id = manager.start_session("Rahul").await.session_id;
        manager.submit_primary_answer(id, "full").await.unwrap();

        let pending = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.submit_primary_answer(id, "3").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        manager.end_session(id).await.unwrap();
        assert_eq!(
            pending.await.unwrap().unwrap_err(),
            SurveyError::SessionClosed
        );
        assert_eq!(manager.session_count().await, 0);
    }
}
