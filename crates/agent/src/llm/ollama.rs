use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use menuwise_core::config::{LlmConfig, ProviderKind};

use super::gemini::{classify_transport_error, retry_transient};
use super::{compose_prompt, BackendError, GenerationBackend};

const TEMPERATURE: f64 = 0.7;
const NUM_PREDICT: u32 = 1000;

pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
    max_attempts: u32,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaBackend {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.ollama_base_url.trim_end_matches('/').to_string(),
            model: config.ollama_model.clone(),
            timeout_secs: config.timeout_secs,
            max_attempts: config.max_retries.max(1),
        }
    }

    async fn request_once(&self, full_prompt: &str) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = json!({
            "model": self.model,
            "prompt": full_prompt,
            "stream": false,
            "options": {
                "temperature": TEMPERATURE,
                "num_predict": NUM_PREDICT,
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
        if !status.is_success() {
            return Err(BackendError::Transport {
                provider: self.kind(),
                message: format!("status {status}"),
            });
        }

        let parsed: OllamaGenerateResponse =
            response.json().await.map_err(|error| BackendError::MalformedResponse {
                provider: self.kind(),
                message: error.to_string(),
            })?;

        if parsed.response.is_empty() {
            return Err(BackendError::MalformedResponse {
                provider: self.kind(),
                message: "response field was empty".to_string(),
            });
        }
        Ok(parsed.response)
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    async fn generate(&self, prompt: &str, context: Option<&str>) -> Result<String, BackendError> {
        let full_prompt = compose_prompt(prompt, context);
        retry_transient(self.kind(), self.max_attempts, || self.request_once(&full_prompt)).await
    }
}
