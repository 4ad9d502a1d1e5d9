//! Response generator: writes the empathetic acknowledgments.
//!
//! The state machine only sees the `ResponseGenerator` trait. Any failure is
//! reported as a `GenerationError` and replaced by canned text upstream.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{GeneratorConfig, GeneratorSource};
use crate::error::{GenerationError, LlmError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, create_provider};

use super::assessment::{Assessment, AssessmentKey, ConsentDecision};
use super::phase::Phase;
use super::prompts::generator_system_prompt;
use super::transcript::{Speaker, Turn};

/// Assessment snapshot in the generator's wire shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponses {
    pub work_satisfaction: String,
    pub personal_concerns: String,
    pub growth_metrics: String,
    pub one_on_one_frequency: String,
    pub one_on_one_helpfulness: String,
}

impl QuestionResponses {
    pub fn from_assessment(assessment: &Assessment) -> Self {
        let value = |key| assessment.get(key).unwrap_or_default().to_string();
        Self {
            work_satisfaction: value(AssessmentKey::WorkSatisfaction),
            personal_concerns: value(AssessmentKey::PersonalConcerns),
            growth_metrics: value(AssessmentKey::GrowthSupport),
            one_on_one_frequency: value(AssessmentKey::OneOnOneFrequency),
            one_on_one_helpfulness: value(AssessmentKey::OneOnOneHelpfulness),
        }
    }

    /// Answer for `key`, empty if not yet given.
    pub fn get(&self, key: AssessmentKey) -> &str {
        match key {
            AssessmentKey::WorkSatisfaction => &self.work_satisfaction,
            AssessmentKey::PersonalConcerns => &self.personal_concerns,
            AssessmentKey::GrowthSupport => &self.growth_metrics,
            AssessmentKey::OneOnOneFrequency => &self.one_on_one_frequency,
            AssessmentKey::OneOnOneHelpfulness => &self.one_on_one_helpfulness,
        }
    }
}

/// Context record passed with every generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContext {
    pub user_name: String,
    pub question_responses: QuestionResponses,
    pub current_phase: Phase,
    pub consent_given: ConsentDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_feedback: Option<String>,
}

impl GenerationContext {
    pub fn new(
        user_name: impl Into<String>,
        assessment: &Assessment,
        current_phase: Phase,
        consent_given: ConsentDecision,
        additional_feedback: Option<String>,
    ) -> Self {
        Self {
            user_name: user_name.into(),
            question_responses: QuestionResponses::from_assessment(assessment),
            current_phase,
            consent_given,
            additional_feedback,
        }
    }
}

/// A transcript entry as the generator sees it: no ids, no timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationMessage {
    pub role: GenerationRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationRole {
    User,
    Assistant,
}

impl From<&Turn> for GenerationMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: match turn.speaker {
                Speaker::User => GenerationRole::User,
                Speaker::System => GenerationRole::Assistant,
            },
            content: turn.text.clone(),
        }
    }
}

/// One generation request; serializes to the remote endpoint's body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub messages: Vec<GenerationMessage>,
    pub context: GenerationContext,
    /// Phase tag, possibly suffixed (e.g. `question_2-followup`).
    pub question_phase: String,
}

impl GenerationRequest {
    pub fn new(turns: &[Turn], context: GenerationContext, question_phase: impl Into<String>) -> Self {
        Self {
            messages: turns.iter().map(GenerationMessage::from).collect(),
            context,
            question_phase: question_phase.into(),
        }
    }
}

/// Remote endpoint reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReply {
    #[serde(default)]
    pub response: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Produces an acknowledgment for the latest user input.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Settings shared by the LLM and HTTP generators.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-call timeout; expiry counts as a failure.
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 100,
            temperature: 0.7,
            timeout: Duration::from_secs(20),
        }
    }
}

/// Generates replies with an `LlmProvider` and the wellness system prompt.
pub struct LlmResponseGenerator {
    llm: Arc<dyn LlmProvider>,
    settings: GenerationSettings,
}

impl LlmResponseGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, settings: GenerationSettings) -> Self {
        Self { llm, settings }
    }

    fn build_request(&self, request: &GenerationRequest) -> CompletionRequest {
        let mut messages = vec![ChatMessage::system(generator_system_prompt(
            &request.context,
            &request.question_phase,
        ))];
        messages.extend(request.messages.iter().map(|m| match m.role {
            GenerationRole::User => ChatMessage::user(&m.content),
            GenerationRole::Assistant => ChatMessage::assistant(&m.content),
        }));

        CompletionRequest::new(messages)
            .with_max_tokens(self.settings.max_tokens)
            .with_temperature(self.settings.temperature)
    }
}

#[async_trait]
impl ResponseGenerator for LlmResponseGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let completion = self.build_request(request);
        debug!(
            model = self.llm.model_name(),
            phase = %request.question_phase,
            messages = completion.messages.len(),
            "Requesting empathetic reply"
        );

        let response = tokio::time::timeout(self.settings.timeout, self.llm.complete(completion))
            .await
            .map_err(|_| GenerationError::Timeout(self.settings.timeout))??;

        non_empty(response.content)
    }
}

/// Calls a remote generation endpoint speaking the JSON wire contract.
pub struct HttpResponseGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    timeout: Duration,
}

impl HttpResponseGenerator {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: None,
            timeout,
        }
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: SecretString) -> Self {
        self.api_key = Some(api_key);
        self
    }
}

#[async_trait]
impl ResponseGenerator for HttpResponseGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(request);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(self.timeout)
            } else {
                GenerationError::Transport(e.to_string())
            }
        })?;

        // The endpoint reports failures in the body, often with a 500 status.
        let status = response.status();
        let reply: GenerationReply = response
            .json()
            .await
            .map_err(|e| GenerationError::Transport(format!("HTTP {status}: {e}")))?;

        if !reply.success {
            return Err(GenerationError::Rejected(
                reply
                    .error
                    .unwrap_or_else(|| format!("endpoint returned HTTP {status}")),
            ));
        }
        non_empty(reply.response)
    }
}

/// Never generates; every reply becomes the canned fallback.
pub struct OfflineGenerator;

#[async_trait]
impl ResponseGenerator for OfflineGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
        Err(GenerationError::Unavailable)
    }
}

/// Build the generator selected by `config`.
pub fn create_generator(config: &GeneratorConfig) -> Result<Arc<dyn ResponseGenerator>, LlmError> {
    match &config.source {
        GeneratorSource::Llm(llm_config) => {
            let llm = create_provider(llm_config)?;
            Ok(Arc::new(LlmResponseGenerator::new(llm, config.settings.clone())))
        }
        GeneratorSource::Endpoint { url, api_key } => {
            tracing::info!(endpoint = %url, "Using remote response generator");
            let client = reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .build()
                .map_err(|e| LlmError::RequestFailed {
                    provider: "endpoint".to_string(),
                    reason: format!("Failed to build HTTP client: {e}"),
                })?;
            let mut generator = HttpResponseGenerator::new(client, url, config.settings.timeout);
            if let Some(key) = api_key {
                generator = generator.with_api_key(key.clone());
            }
            Ok(Arc::new(generator))
        }
        GeneratorSource::Offline => {
            tracing::warn!("No generator configured, replies will use canned fallbacks");
            Ok(Arc::new(OfflineGenerator))
        }
    }
}

fn non_empty(text: String) -> Result<String, GenerationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        Err(GenerationError::EmptyResponse)
    } else {
        Ok(trimmed.to_string())
    }
}
