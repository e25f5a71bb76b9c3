use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use menuwise_core::config::{LlmConfig, ProviderKind};

use super::{compose_prompt, BackendError, GenerationBackend};

const TEMPERATURE: f64 = 0.7;
const MAX_OUTPUT_TOKENS: u32 = 1000;

pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    timeout_secs: u64,
    max_attempts: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiBackend {
    pub fn from_config(config: &LlmConfig, api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            timeout_secs: config.timeout_secs,
            max_attempts: config.max_retries.max(1),
        }
    }

    async fn request_once(&self, full_prompt: &str) -> Result<String, BackendError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url,
            self.model,
            self.api_key.expose_secret()
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": full_prompt }] }],
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": MAX_OUTPUT_TOKENS,
            }
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .timeout(Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|error| classify_transport_error(self.kind(), self.timeout_secs, error))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS
            || status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(BackendError::Quota {
                provider: self.kind(),
                message: format!("status {status}"),
            });
        }
        if !status.is_success() {
            return Err(BackendError::Transport {
                provider: self.kind(),
                message: format!("status {status}"),
            });
        }

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|error| BackendError::MalformedResponse {
                provider: self.kind(),
                message: error.to_string(),
            })?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| BackendError::MalformedResponse {
                provider: self.kind(),
                message: "response carried no candidate text".to_string(),
            })
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn generate(&self, prompt: &str, context: Option<&str>) -> Result<String, BackendError> {
        let full_prompt = compose_prompt(prompt, context);
        retry_transient(self.kind(), self.max_attempts, || self.request_once(&full_prompt)).await
    }
}

pub(super) fn classify_transport_error(
    provider: ProviderKind,
    timeout_secs: u64,
    error: reqwest::Error,
) -> BackendError {
    if error.is_timeout() {
        BackendError::Timeout { provider, timeout_secs }
    } else {
        BackendError::Transport { provider, message: error.to_string() }
    }
}

/// Retries timeouts and transport failures with exponential backoff;
/// quota and malformed-response failures are returned immediately.
pub(super) async fn retry_transient<F, Fut>(
    provider: ProviderKind,
    max_attempts: u32,
    mut call: F,
) -> Result<String, BackendError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<String, BackendError>>,
{
    let mut backoff = Duration::from_millis(500);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match call().await {
            Ok(text) => return Ok(text),
            Err(error @ (BackendError::Quota { .. } | BackendError::MalformedResponse { .. })) => {
                return Err(error);
            }
            Err(error) => {
                warn!(
                    event_name = "llm.backend.transient_failure",
                    provider = %provider,
                    attempt,
                    max_attempts,
                    error = %error,
                    "generation attempt failed"
                );
                last_error = Some(error);
                if attempt < max_attempts {
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(10));
                }
            }
        }
    }

    Err(last_error.unwrap_or(BackendError::Transport {
        provider,
        message: "no generation attempt was made".to_string(),
    }))
}
