//! LLM integration.
//!
//! Supports:
//! - **OpenAI**: chat completions (or any OpenAI-compatible server)
//! - **Anthropic**: messages API
//!
//! Both are thin `reqwest` clients behind the `LlmProvider` trait.

pub mod anthropic;
pub mod openai;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use provider::*;

use std::sync::Arc;
use std::time::Duration;

use crate::error::LlmError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

impl std::str::FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            other => Err(format!("unknown LLM backend '{other}'")),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
    /// Override for OpenAI-compatible servers.
    pub base_url: Option<String>,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| LlmError::RequestFailed {
            provider: format!("{:?}", config.backend).to_lowercase(),
            reason: format!("Failed to build HTTP client: {e}"),
        })?;

    match config.backend {
        LlmBackend::Anthropic => {
            tracing::info!("Using Anthropic (model: {})", config.model);
            Ok(Arc::new(AnthropicProvider::new(
                client,
                config.api_key.clone(),
                &config.model,
            )))
        }
        LlmBackend::OpenAi => {
            tracing::info!("Using OpenAI (model: {})", config.model);
            let mut provider = OpenAiProvider::new(client, config.api_key.clone(), &config.model);
            if let Some(ref base_url) = config.base_url {
                provider = provider.with_base_url(base_url);
            }
            Ok(Arc::new(provider))
        }
    }
}

/// Turn a non-success HTTP status into the matching `LlmError`.
pub(crate) async fn error_for_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();

    Err(match status.as_u16() {
        401 | 403 => LlmError::AuthFailed {
            provider: provider.to_string(),
        },
        429 => LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after,
        },
        code => LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: format!("HTTP {code}: {}", body.chars().take(200).collect::<String>()),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_provider_missing_key_still_constructs() {
        // Auth failures only surface when a request is made.
        let config = LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: secrecy::SecretString::from("test-key"),
            model: "claude-3-5-haiku-latest".to_string(),
            base_url: None,
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "claude-3-5-haiku-latest");
    }

    #[test]
    fn create_openai_provider() {
        let config = LlmConfig {
            backend: LlmBackend::OpenAi,
            api_key: secrecy::SecretString::from("sk-test"),
            model: "gpt-4o-mini".to_string(),
            base_url: Some("http://localhost:9999/v1".to_string()),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gpt-4o-mini");
    }

    fn response(status: u16, retry_after: Option<&str>, body: &'static str) -> reqwest::Response {
        let mut builder = axum::http::Response::builder().status(status);
        if let Some(secs) = retry_after {
            builder = builder.header("retry-after", secs);
        }
        reqwest::Response::from(builder.body(body).unwrap())
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let err = error_for_status("openai", response(429, Some("7"), "slow down"))
            .await
            .unwrap_err();
        match err {
            LlmError::RateLimited { provider, retry_after } => {
                assert_eq!(provider, "openai");
                assert_eq!(retry_after, Some(Duration::from_secs(7)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn auth_and_server_errors_are_mapped() {
        let auth = error_for_status("anthropic", response(401, None, "")).await;
        assert!(matches!(auth, Err(LlmError::AuthFailed { .. })));

        let server = error_for_status("anthropic", response(500, None, "overloaded")).await;
        match server {
            Err(LlmError::RequestFailed { reason, .. }) => {
                assert!(reason.starts_with("HTTP 500"));
                assert!(reason.contains("overloaded"));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(error_for_status("anthropic", response(200, None, "{}")).await.is_ok());
    }

    #[test]
    fn backend_from_str() {
        assert_eq!("OpenAI".parse::<LlmBackend>(), Ok(LlmBackend::OpenAi));
        assert_eq!("anthropic".parse::<LlmBackend>(), Ok(LlmBackend::Anthropic));
        assert!("gemini".parse::<LlmBackend>().is_err());
    }
}
