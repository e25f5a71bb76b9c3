//! Conversational recommendation agent: intent classification, prompt
//! construction, dual-provider generation with failover, and the
//! per-session dialogue state machine.

pub mod conversation;
pub mod intent;
pub mod llm;
pub mod prompts;

pub use conversation::{
    ConversationEngine, EngineError, EngineLimits, Session, SessionState, SufficiencyPolicy,
};
pub use intent::{IntentClassifier, PhraseIntentClassifier, TurnIntent};
pub use llm::orchestrator::{
    FailoverOrchestrator, FailoverPolicy, GenerationOutcome, OrchestratorError, ProviderHealth,
    ProviderRole,
};
pub use llm::{BackendError, GenerationBackend};
