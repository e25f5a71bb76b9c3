use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use menuwise_agent::{ConversationEngine, FailoverOrchestrator};

#[derive(Clone)]
pub struct HealthState {
    pub orchestrator: Arc<FailoverOrchestrator>,
    pub engine: Arc<ConversationEngine>,
    pub catalog_items: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub primary_provider: HealthCheck,
    pub secondary_provider: HealthCheck,
    pub active_sessions: usize,
    pub catalog_items: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

/// Provider probes are throttled inside the orchestrator, so polling this
/// endpoint does not hammer the generation backends.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let providers = state.orchestrator.health_check().await;
    // One healthy provider is enough to serve conversations.
    let ready = providers.primary_healthy || providers.secondary_healthy;

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "menuwise-server runtime initialized".to_string(),
        },
        primary_provider: provider_check(providers.primary_healthy),
        secondary_provider: provider_check(providers.secondary_healthy),
        active_sessions: state.engine.active_sessions(),
        catalog_items: state.catalog_items,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn provider_check(healthy: bool) -> HealthCheck {
    if healthy {
        HealthCheck { status: "ready", detail: "provider probe succeeded".to_string() }
    } else {
        HealthCheck { status: "degraded", detail: "provider probe failed".to_string() }
    }
}
