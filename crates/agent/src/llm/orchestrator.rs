//! Dual-provider generation with failover under a consecutive-error
//! threshold, plus throttled health probing.
//!
//! Provider state is one shared point of contention for all sessions. The
//! lock is never held across an await: each call snapshots the active
//! provider, runs the backend calls, then applies the read-modify-write
//! under the lock once the outcome is known. A call cancelled mid-flight
//! therefore mutates nothing.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use menuwise_core::config::{LlmConfig, ProviderKind};

use super::{BackendError, GenerationBackend};

const HEALTH_PROBE_PROMPT: &str = "Reply with the single word: ok";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderRole {
    Primary,
    Secondary,
}

#[derive(Clone, Debug)]
pub struct GenerationOutcome {
    pub text: String,
    pub provider_used: ProviderKind,
    pub role_used: ProviderRole,
    /// True only when the secondary served after the primary failed within
    /// this same call. A call served by a sticky-active secondary reports
    /// `false` here.
    pub fallback_used: bool,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("both generation providers failed (primary: {primary}; secondary: {secondary})")]
    BothProvidersFailed { primary: BackendError, secondary: BackendError },
    #[error("generation provider failed with failover disabled: {0}")]
    ProviderFailed(#[from] BackendError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ProviderHealth {
    pub primary_healthy: bool,
    pub secondary_healthy: bool,
    pub checked_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug)]
pub struct FailoverPolicy {
    pub failover_enabled: bool,
    pub error_threshold: u32,
    pub health_check_interval: Duration,
}

impl From<&LlmConfig> for FailoverPolicy {
    fn from(config: &LlmConfig) -> Self {
        Self {
            failover_enabled: config.failover_enabled,
            error_threshold: config.error_threshold,
            health_check_interval: Duration::from_secs(config.health_check_interval_secs),
        }
    }
}

#[derive(Debug)]
struct ProviderState {
    current: ProviderRole,
    consecutive_errors: u32,
    primary_healthy: bool,
    secondary_healthy: bool,
    last_health_check: Option<Instant>,
    last_health_checked_at: DateTime<Utc>,
}

impl Default for ProviderState {
    fn default() -> Self {
        Self {
            current: ProviderRole::Primary,
            consecutive_errors: 0,
            primary_healthy: true,
            secondary_healthy: true,
            last_health_check: None,
            last_health_checked_at: Utc::now(),
        }
    }
}

pub struct FailoverOrchestrator {
    primary: Arc<dyn GenerationBackend>,
    secondary: Arc<dyn GenerationBackend>,
    policy: FailoverPolicy,
    state: Mutex<ProviderState>,
}

impl FailoverOrchestrator {
    pub fn new(
        primary: Arc<dyn GenerationBackend>,
        secondary: Arc<dyn GenerationBackend>,
        policy: FailoverPolicy,
    ) -> Self {
        Self { primary, secondary, policy, state: Mutex::new(ProviderState::default()) }
    }

    pub fn current_provider(&self) -> ProviderRole {
        self.lock_state().current
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.lock_state().consecutive_errors
    }

    /// One generation call: at most the active provider plus a single
    /// one-hop attempt on the other. Fails only when both providers fail.
    pub async fn generate(
        &self,
        prompt: &str,
        context: Option<&str>,
    ) -> Result<GenerationOutcome, OrchestratorError> {
        let started = Instant::now();
        let active = {
            let mut state = self.lock_state();
            if self.policy.failover_enabled
                && state.consecutive_errors >= self.policy.error_threshold
                && state.current == ProviderRole::Primary
            {
                warn!(
                    event_name = "llm.orchestrator.sticky_failover",
                    consecutive_errors = state.consecutive_errors,
                    error_threshold = self.policy.error_threshold,
                    "switching active provider to secondary"
                );
                state.current = ProviderRole::Secondary;
            }
            state.current
        };

        match active {
            ProviderRole::Primary => self.generate_via_primary(prompt, context, started).await,
            ProviderRole::Secondary => self.generate_via_secondary(prompt, context, started).await,
        }
    }

    async fn generate_via_primary(
        &self,
        prompt: &str,
        context: Option<&str>,
        started: Instant,
    ) -> Result<GenerationOutcome, OrchestratorError> {
        match self.primary.generate(prompt, context).await {
            Ok(text) => {
                self.lock_state().consecutive_errors = 0;
                Ok(self.outcome(text, ProviderRole::Primary, false, started))
            }
            Err(primary_error) => {
                if !self.policy.failover_enabled {
                    self.lock_state().consecutive_errors += 1;
                    return Err(OrchestratorError::ProviderFailed(primary_error));
                }
                warn!(
                    event_name = "llm.orchestrator.primary_failed",
                    error = %primary_error,
                    "primary provider failed, attempting secondary"
                );
                match self.secondary.generate(prompt, context).await {
                    Ok(text) => {
                        self.lock_state().consecutive_errors += 1;
                        Ok(self.outcome(text, ProviderRole::Secondary, true, started))
                    }
                    Err(secondary_error) => {
                        self.lock_state().consecutive_errors += 1;
                        Err(OrchestratorError::BothProvidersFailed {
                            primary: primary_error,
                            secondary: secondary_error,
                        })
                    }
                }
            }
        }
    }

    async fn generate_via_secondary(
        &self,
        prompt: &str,
        context: Option<&str>,
        started: Instant,
    ) -> Result<GenerationOutcome, OrchestratorError> {
        match self.secondary.generate(prompt, context).await {
            Ok(text) => {
                self.lock_state().consecutive_errors = 0;
                Ok(self.outcome(text, ProviderRole::Secondary, false, started))
            }
            Err(secondary_error) => {
                // Recovery probe: a primary success ends the sticky switch.
                match self.primary.generate(prompt, context).await {
                    Ok(text) => {
                        let mut state = self.lock_state();
                        state.consecutive_errors = 0;
                        state.current = ProviderRole::Primary;
                        drop(state);
                        info!(
                            event_name = "llm.orchestrator.primary_recovered",
                            "primary provider recovered, restoring it as active"
                        );
                        Ok(self.outcome(text, ProviderRole::Primary, false, started))
                    }
                    Err(primary_error) => {
                        self.lock_state().consecutive_errors += 1;
                        Err(OrchestratorError::BothProvidersFailed {
                            primary: primary_error,
                            secondary: secondary_error,
                        })
                    }
                }
            }
        }
    }

    /// Probes both backends with a trivial prompt, throttled: inside the
    /// configured interval this is a no-op returning the cached booleans.
    /// A failed probe on one provider does not affect the other's health.
    pub async fn health_check(&self) -> ProviderHealth {
        {
            let state = self.lock_state();
            if let Some(last) = state.last_health_check {
                if last.elapsed() < self.policy.health_check_interval {
                    return ProviderHealth {
                        primary_healthy: state.primary_healthy,
                        secondary_healthy: state.secondary_healthy,
                        checked_at: state.last_health_checked_at,
                    };
                }
            }
        }

        let primary_healthy = self.primary.generate(HEALTH_PROBE_PROMPT, None).await.is_ok();
        let secondary_healthy = self.secondary.generate(HEALTH_PROBE_PROMPT, None).await.is_ok();
        let checked_at = Utc::now();

        let mut state = self.lock_state();
        state.primary_healthy = primary_healthy;
        state.secondary_healthy = secondary_healthy;
        state.last_health_check = Some(Instant::now());
        state.last_health_checked_at = checked_at;
        ProviderHealth { primary_healthy, secondary_healthy, checked_at }
    }

    fn outcome(
        &self,
        text: String,
        role: ProviderRole,
        fallback_used: bool,
        started: Instant,
    ) -> GenerationOutcome {
        let provider_used = match role {
            ProviderRole::Primary => self.primary.kind(),
            ProviderRole::Secondary => self.secondary.kind(),
        };
        GenerationOutcome {
            text,
            provider_used,
            role_used: role,
            fallback_used,
            elapsed: started.elapsed(),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ProviderState> {
        // Poisoning only happens if a holder panicked; the state is still
        // coherent because every mutation is a single assignment batch.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
