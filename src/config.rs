//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::survey::generator::GenerationSettings;

/// Survey behavior.
#[derive(Debug, Clone)]
pub struct SurveyConfig {
    /// Address offered to users who decline consent.
    pub contact_email: String,
    /// After the last question, ask for free-form feedback before finishing.
    pub collect_additional_feedback: bool,
    /// Elaboration rounds allowed while awaiting confirmation before the
    /// survey advances on its own. `None` keeps asking indefinitely.
    pub max_elaboration_rounds: Option<u32>,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            contact_email: "PSPersonal.Assistant@PS.com".to_string(),
            collect_additional_feedback: false,
            max_elaboration_rounds: None,
        }
    }
}

impl SurveyConfig {
    /// Read overrides from `WELLNESS_CHAT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(email) = std::env::var("WELLNESS_CHAT_CONTACT_EMAIL") {
            config.contact_email = email;
        }
        if let Some(flag) = env_parse::<bool>("WELLNESS_CHAT_ADDITIONAL_FEEDBACK")? {
            config.collect_additional_feedback = flag;
        }
        config.max_elaboration_rounds = env_parse::<u32>("WELLNESS_CHAT_MAX_ELABORATIONS")?;
        Ok(config)
    }
}

/// Where empathetic replies come from.
#[derive(Debug, Clone)]
pub enum GeneratorSource {
    /// Call an LLM provider directly.
    Llm(LlmConfig),
    /// POST to a remote generation endpoint.
    Endpoint {
        url: String,
        api_key: Option<SecretString>,
    },
    /// Use canned fallbacks only.
    Offline,
}

/// Response generator configuration.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub source: GeneratorSource,
    pub settings: GenerationSettings,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            source: GeneratorSource::Offline,
            settings: GenerationSettings::default(),
        }
    }
}

impl GeneratorConfig {
    /// Resolve the generator from the environment.
    ///
    /// `WELLNESS_CHAT_GENERATOR_URL` wins; otherwise `OPENAI_API_KEY` or
    /// `ANTHROPIC_API_KEY` selects a provider (`WELLNESS_CHAT_LLM_BACKEND`
    /// breaks ties); with none set the generator runs offline.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = GenerationSettings::default();
        if let Some(secs) = env_parse::<u64>("WELLNESS_CHAT_GENERATOR_TIMEOUT_SECS")? {
            settings.timeout = Duration::from_secs(secs);
        }
        if let Some(max_tokens) = env_parse::<u32>("WELLNESS_CHAT_MAX_TOKENS")? {
            settings.max_tokens = max_tokens;
        }

        if let Ok(url) = std::env::var("WELLNESS_CHAT_GENERATOR_URL") {
            let api_key = std::env::var("WELLNESS_CHAT_GENERATOR_KEY")
                .ok()
                .map(SecretString::from);
            return Ok(Self {
                source: GeneratorSource::Endpoint { url, api_key },
                settings,
            });
        }

        let backend = match env_parse::<LlmBackend>("WELLNESS_CHAT_LLM_BACKEND")? {
            Some(backend) => Some(backend),
            None if std::env::var("OPENAI_API_KEY").is_ok() => Some(LlmBackend::OpenAi),
            None if std::env::var("ANTHROPIC_API_KEY").is_ok() => Some(LlmBackend::Anthropic),
            None => None,
        };

        let source = match backend {
            Some(backend) => {
                let (key_var, default_model) = match backend {
                    LlmBackend::OpenAi => ("OPENAI_API_KEY", "gpt-4o-mini"),
                    LlmBackend::Anthropic => ("ANTHROPIC_API_KEY", "claude-3-5-haiku-latest"),
                };
                let api_key = std::env::var(key_var)
                    .map_err(|_| ConfigError::MissingEnvVar(key_var.to_string()))?;
                GeneratorSource::Llm(LlmConfig {
                    backend,
                    api_key: SecretString::from(api_key),
                    model: std::env::var("WELLNESS_CHAT_MODEL")
                        .unwrap_or_else(|_| default_model.to_string()),
                    base_url: std::env::var("OPENAI_BASE_URL").ok(),
                })
            }
            None => GeneratorSource::Offline,
        };

        Ok(Self { source, settings })
    }
}

/// Parse an optional environment variable.
fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
