use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use menuwise_agent::llm::gemini::GeminiBackend;
use menuwise_agent::llm::ollama::OllamaBackend;
use menuwise_agent::{
    ConversationEngine, EngineLimits, FailoverOrchestrator, FailoverPolicy, GenerationBackend,
    PhraseIntentClassifier, SufficiencyPolicy,
};
use menuwise_core::catalog::{CatalogError, InMemoryCatalog};
use menuwise_core::config::{AppConfig, ConfigError, LlmConfig, ProviderKind};

pub struct Application {
    pub config: AppConfig,
    pub catalog: Arc<InMemoryCatalog>,
    pub orchestrator: Arc<FailoverOrchestrator>,
    pub engine: Arc<ConversationEngine>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("gemini selected as a provider but no api key is configured")]
    MissingGeminiKey,
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let catalog = Arc::new(InMemoryCatalog::load_from_file(&config.catalog.menu_data_path)?);
    info!(
        event_name = "system.bootstrap.catalog_loaded",
        path = %config.catalog.menu_data_path.display(),
        item_count = catalog.len(),
        "menu catalog loaded"
    );

    let primary = backend_for(config.llm.primary, &config.llm)?;
    let secondary = backend_for(config.llm.secondary, &config.llm)?;
    let orchestrator = Arc::new(FailoverOrchestrator::new(
        primary,
        secondary,
        FailoverPolicy::from(&config.llm),
    ));
    info!(
        event_name = "system.bootstrap.providers_ready",
        primary = %config.llm.primary,
        secondary = %config.llm.secondary,
        failover_enabled = config.llm.failover_enabled,
        "generation providers configured"
    );

    let engine = Arc::new(ConversationEngine::new(
        catalog.clone(),
        orchestrator.clone(),
        Box::new(PhraseIntentClassifier),
        SufficiencyPolicy { required_facets: config.recommendation.required_facets },
        EngineLimits {
            max_recommendations: config.recommendation.max_recommendations,
            max_active_sessions: config.session.max_active_sessions,
        },
    ));

    Ok(Application { config, catalog, orchestrator, engine })
}

fn backend_for(
    kind: ProviderKind,
    llm: &LlmConfig,
) -> Result<Arc<dyn GenerationBackend>, BootstrapError> {
    match kind {
        ProviderKind::Gemini => {
            let api_key =
                llm.gemini_api_key.clone().ok_or(BootstrapError::MissingGeminiKey)?;
            Ok(Arc::new(GeminiBackend::from_config(llm, api_key)))
        }
        ProviderKind::Ollama => Ok(Arc::new(OllamaBackend::from_config(llm))),
    }
}
