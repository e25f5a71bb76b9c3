//! Generation backends and the failover orchestrator that fronts them.
//!
//! A backend is an opaque capability: prompt in, text out, or a
//! distinguishable failure. Provider selection, error counting, and health
//! tracking live in [`orchestrator::FailoverOrchestrator`].

pub mod gemini;
pub mod ollama;
pub mod orchestrator;
pub mod structured;

use async_trait::async_trait;
use thiserror::Error;

use menuwise_core::config::ProviderKind;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{provider} request timed out after {timeout_secs}s")]
    Timeout { provider: ProviderKind, timeout_secs: u64 },
    #[error("{provider} transport failure: {message}")]
    Transport { provider: ProviderKind, message: String },
    #[error("{provider} rejected the request (quota or auth): {message}")]
    Quota { provider: ProviderKind, message: String },
    #[error("{provider} returned an unusable response: {message}")]
    MalformedResponse { provider: ProviderKind, message: String },
}

impl BackendError {
    pub fn provider(&self) -> ProviderKind {
        match self {
            Self::Timeout { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Quota { provider, .. }
            | Self::MalformedResponse { provider, .. } => *provider,
        }
    }
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// One generation call. Bounded transient retry (backoff within a
    /// fixed attempt count) is the backend's own concern; callers see a
    /// single success or a single classified failure.
    async fn generate(&self, prompt: &str, context: Option<&str>) -> Result<String, BackendError>;
}

pub(crate) fn compose_prompt(prompt: &str, context: Option<&str>) -> String {
    match context {
        Some(context) if !context.is_empty() => format!("{context}\n\n{prompt}"),
        _ => prompt.to_string(),
    }
}
