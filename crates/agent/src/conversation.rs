//! Per-session dialogue state machine.
//!
//! Each session tracks its message history, the user's preferences, the
//! ranked safety-filtered candidate list, and a cursor into that list. The
//! cursor only moves forward; replacing preferences rebuilds the list and
//! resets it. Once the cursor runs off the end the session is exhausted
//! and stays that way until preferences change.
//!
//! Candidates pass two independent allergen defenses: the selector zeroes
//! out items carrying a declared allergen, and the checker filters the
//! ranked list again. Either alone suffices; both are kept so a regression
//! in one cannot surface an unsafe item.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use menuwise_core::allergy::AllergyChecker;
use menuwise_core::catalog::CatalogSource;
use menuwise_core::domain::chat::{ChatMessage, ChatReply};
use menuwise_core::domain::menu::ScoredCandidate;
use menuwise_core::domain::preferences::UserPreferences;
use menuwise_core::selector::MealSelector;

use crate::intent::{IntentClassifier, TurnIntent};
use crate::llm::orchestrator::FailoverOrchestrator;
use crate::llm::structured::{parse_follow_ups, parse_llm_turn};
use crate::prompts;

const FALLBACK_WELCOME: &str = "Welcome! I'm the restaurant's assistant. Tell me about your \
     dietary needs, favorite cuisines, or budget and I'll find you something great.";

const APOLOGY_MESSAGE: &str = "I apologize, but I'm having trouble processing your request. \
     Could you please rephrase it?";

const EXHAUSTED_MESSAGE: &str = "I've shown you everything that matches your current \
     preferences. Would you like to adjust them, perhaps a different cuisine or price range?";

const DEFAULT_FOLLOW_UPS: [&str; 3] = [
    "What type of cuisine are you in the mood for?",
    "Do you have any dietary restrictions?",
    "What's your preferred price range?",
];

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown session id: {0}")]
    SessionNotFound(String),
    #[error("active session limit reached ({0})")]
    TooManySessions(usize),
}

/// Decides whether stated preferences are specific enough to recommend
/// from directly instead of continuing to gather facets.
#[derive(Clone, Copy, Debug)]
pub struct SufficiencyPolicy {
    pub required_facets: usize,
}

impl Default for SufficiencyPolicy {
    fn default() -> Self {
        Self { required_facets: 3 }
    }
}

impl SufficiencyPolicy {
    pub fn is_sufficient(&self, preferences: &UserPreferences) -> bool {
        preferences.facet_count() >= self.required_facets
    }
}

#[derive(Clone, Copy, Debug)]
pub struct EngineLimits {
    pub max_recommendations: usize,
    pub max_active_sessions: usize,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self { max_recommendations: 5, max_active_sessions: 1000 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Still gathering preference facets.
    Collecting,
    /// Presenting ranked candidates; the cursor points at the current one.
    Presenting,
    /// The cursor ran past the candidate list. Sticky until preferences
    /// are replaced.
    Exhausted,
}

#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub messages: Vec<ChatMessage>,
    pub preferences: UserPreferences,
    pub candidates: Vec<ScoredCandidate>,
    pub shown_index: usize,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    fn new(id: String, preferences: UserPreferences) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            preferences,
            candidates: Vec::new(),
            shown_index: 0,
            state: SessionState::Collecting,
            created_at: now,
            last_active_at: now,
        }
    }

    fn cursor_candidate(&self) -> Option<&ScoredCandidate> {
        self.candidates.get(self.shown_index)
    }
}

type SharedSession = Arc<tokio::sync::Mutex<Session>>;

pub struct ConversationEngine {
    catalog: Arc<dyn CatalogSource>,
    selector: MealSelector,
    allergy_checker: AllergyChecker,
    orchestrator: Arc<FailoverOrchestrator>,
    classifier: Box<dyn IntentClassifier>,
    policy: SufficiencyPolicy,
    limits: EngineLimits,
    sessions: RwLock<HashMap<String, SharedSession>>,
}

impl ConversationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        orchestrator: Arc<FailoverOrchestrator>,
        classifier: Box<dyn IntentClassifier>,
        policy: SufficiencyPolicy,
        limits: EngineLimits,
    ) -> Self {
        Self {
            catalog,
            selector: MealSelector::new(),
            allergy_checker: AllergyChecker::new(),
            orchestrator,
            classifier,
            policy,
            limits,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.read_sessions().len()
    }

    /// Opens a session. With sufficient preferences the top candidate is
    /// presented immediately; otherwise the model writes a welcome and the
    /// engine asks the stock facet questions.
    pub async fn start_conversation(
        &self,
        preferences: Option<UserPreferences>,
    ) -> Result<ChatReply, EngineError> {
        // Refuse up front so a saturated engine never spends a generation
        // call on a session it cannot keep.
        if self.active_sessions() >= self.limits.max_active_sessions {
            return Err(EngineError::TooManySessions(self.limits.max_active_sessions));
        }

        let session_id = Uuid::new_v4().to_string();
        let mut session = Session::new(session_id.clone(), preferences.unwrap_or_default());
        self.refresh_candidates(&mut session);

        let reply = if let Some(candidate) = session.cursor_candidate().cloned() {
            session.state = SessionState::Presenting;
            let message = presentation_message(&candidate);
            ChatReply {
                message,
                session_id: session_id.clone(),
                suggested_items: session.candidates.clone(),
                follow_up_questions: Vec::new(),
            }
        } else {
            let prompt = prompts::welcome_prompt(Some(&session.preferences));
            let message = match self.orchestrator.generate(&prompt, None).await {
                Ok(outcome) => outcome.text,
                Err(error) => {
                    warn!(
                        event_name = "conversation.welcome_degraded",
                        error = %error,
                        "providers unavailable for welcome, using static greeting"
                    );
                    FALLBACK_WELCOME.to_string()
                }
            };
            ChatReply {
                message,
                session_id: session_id.clone(),
                suggested_items: Vec::new(),
                follow_up_questions: default_follow_ups(),
            }
        };

        session.messages.push(ChatMessage::assistant(reply.message.clone(), None));

        {
            let mut sessions = self.write_sessions();
            if sessions.len() >= self.limits.max_active_sessions {
                return Err(EngineError::TooManySessions(self.limits.max_active_sessions));
            }
            sessions.insert(session_id.clone(), Arc::new(tokio::sync::Mutex::new(session)));
        }

        info!(event_name = "conversation.session_started", session_id = %session_id, "session opened");
        Ok(reply)
    }

    /// One user turn. Turns for the same session serialize on its mutex;
    /// distinct sessions proceed independently.
    pub async fn process_turn(
        &self,
        session_id: &str,
        message: &str,
        preferences: Option<UserPreferences>,
    ) -> Result<ChatReply, EngineError> {
        let shared = self.session(session_id)?;
        let mut session = shared.lock().await;
        session.last_active_at = Utc::now();

        if let Some(preferences) = preferences {
            session.preferences = preferences;
            session.shown_index = 0;
            self.refresh_candidates(&mut session);
            session.state = if session.candidates.is_empty() {
                SessionState::Collecting
            } else {
                SessionState::Presenting
            };
        }

        session.messages.push(ChatMessage::user(message));

        let reply = match self.classifier.classify(message) {
            TurnIntent::MoreInfo if session.cursor_candidate().is_some() => {
                self.more_info_turn(&session, message).await
            }
            TurnIntent::MoreOptions => self.more_options_turn(&mut session),
            _ => match session.cursor_candidate().cloned() {
                // Candidates on the table and no navigation request: keep
                // the current one in front of the user.
                Some(candidate) => ChatReply {
                    message: presentation_message(&candidate),
                    session_id: session.id.clone(),
                    suggested_items: session.candidates.clone(),
                    follow_up_questions: Vec::new(),
                },
                None => self.llm_turn(&mut session, message).await,
            },
        };

        session.messages.push(ChatMessage::assistant(reply.message.clone(), None));
        Ok(reply)
    }

    pub async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>, EngineError> {
        let shared = self.session(session_id)?;
        let session = shared.lock().await;
        Ok(session.messages.clone())
    }

    pub async fn end_conversation(&self, session_id: &str) -> Result<(), EngineError> {
        let removed = self
            .write_sessions()
            .remove(session_id)
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
        let session = removed.lock().await;
        info!(
            event_name = "conversation.session_ended",
            session_id = %session_id,
            message_count = session.messages.len(),
            duration_secs = (Utc::now() - session.created_at).num_seconds(),
            "session closed"
        );
        Ok(())
    }

    /// Removes sessions idle past the cutoff; returns how many were
    /// dropped. Scheduling this is the caller's concern.
    pub fn expire_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(max_idle.as_secs() as i64);
        let expired: Vec<String> = self
            .read_sessions()
            .iter()
            .filter_map(|(id, shared)| {
                // A locked session is mid-turn, so it is not idle.
                let session = shared.try_lock().ok()?;
                (session.last_active_at < cutoff).then(|| id.clone())
            })
            .collect();

        if expired.is_empty() {
            return 0;
        }

        let dropped = self.remove_if_still_idle(&expired, cutoff);
        if dropped > 0 {
            info!(
                event_name = "conversation.sessions_expired",
                count = dropped,
                "idle sessions dropped"
            );
        }
        dropped
    }

    /// Second look under the write lock: a turn may have touched the
    /// session after the scan listed it, and a locked session is mid-turn
    /// either way.
    fn remove_if_still_idle(&self, expired: &[String], cutoff: DateTime<Utc>) -> usize {
        let mut sessions = self.write_sessions();
        let mut dropped = 0;
        for id in expired {
            let still_idle = sessions
                .get(id)
                .and_then(|shared| shared.try_lock().ok())
                .is_some_and(|session| session.last_active_at < cutoff);
            if still_idle && sessions.remove(id).is_some() {
                dropped += 1;
            }
        }
        dropped
    }

    async fn more_info_turn(&self, session: &Session, message: &str) -> ChatReply {
        // Caller checked the cursor; re-check instead of unwrapping.
        let Some(candidate) = session.cursor_candidate() else {
            return apology_reply(&session.id);
        };
        let prompt = prompts::item_info_prompt(&candidate.item, message);
        let text = match self.orchestrator.generate(&prompt, None).await {
            Ok(outcome) => outcome.text,
            Err(error) => {
                warn!(
                    event_name = "conversation.turn_degraded",
                    session_id = %session.id,
                    error = %error,
                    "providers unavailable for item info"
                );
                APOLOGY_MESSAGE.to_string()
            }
        };
        ChatReply {
            message: text,
            session_id: session.id.clone(),
            suggested_items: vec![candidate.clone()],
            follow_up_questions: Vec::new(),
        }
    }

    fn more_options_turn(&self, session: &mut Session) -> ChatReply {
        session.shown_index = session.shown_index.saturating_add(1);
        match session.cursor_candidate().cloned() {
            Some(candidate) => {
                session.state = SessionState::Presenting;
                ChatReply {
                    message: presentation_message(&candidate),
                    session_id: session.id.clone(),
                    suggested_items: session.candidates.clone(),
                    follow_up_questions: Vec::new(),
                }
            }
            None => {
                session.state = SessionState::Exhausted;
                ChatReply {
                    message: EXHAUSTED_MESSAGE.to_string(),
                    session_id: session.id.clone(),
                    suggested_items: Vec::new(),
                    follow_up_questions: default_follow_ups(),
                }
            }
        }
    }

    async fn llm_turn(&self, session: &mut Session, message: &str) -> ChatReply {
        let prompt =
            prompts::turn_prompt(message, &session.messages, Some(&session.preferences));
        let turn = match self.orchestrator.generate(&prompt, None).await {
            Ok(outcome) => parse_llm_turn(&outcome.text),
            Err(error) => {
                warn!(
                    event_name = "conversation.turn_degraded",
                    session_id = %session.id,
                    error = %error,
                    "providers unavailable for turn"
                );
                return ChatReply {
                    message: APOLOGY_MESSAGE.to_string(),
                    session_id: session.id.clone(),
                    suggested_items: Vec::new(),
                    follow_up_questions: default_follow_ups(),
                };
            }
        };

        let mut suggested_items = Vec::new();
        if turn.should_recommend {
            session.shown_index = 0;
            self.refresh_candidates(session);
            if !session.candidates.is_empty() {
                session.state = SessionState::Presenting;
                suggested_items = session.candidates.clone();
            }
        }

        let items: Vec<_> =
            suggested_items.iter().map(|candidate| candidate.item.clone()).collect();
        let follow_ups_prompt = prompts::follow_ups_prompt(message, &items, None);
        let follow_up_questions = match self.orchestrator.generate(&follow_ups_prompt, None).await {
            Ok(outcome) => parse_follow_ups(&outcome.text),
            Err(_) => default_follow_ups(),
        };

        ChatReply {
            message: turn.message,
            session_id: session.id.clone(),
            suggested_items,
            follow_up_questions,
        }
    }

    /// Recomputes the ranked candidate list when preferences are specific
    /// enough; otherwise clears it so the dialogue keeps gathering facets.
    fn refresh_candidates(&self, session: &mut Session) {
        if !self.policy.is_sufficient(&session.preferences) {
            session.candidates.clear();
            return;
        }
        let items = self.catalog.list_available_items();
        let mut candidates =
            self.selector.rank(&items, &session.preferences, self.limits.max_recommendations);
        if !session.preferences.allergies.is_empty() {
            candidates.retain(|candidate| {
                self.allergy_checker.is_safe(&candidate.item, &session.preferences.allergies)
            });
        }
        session.candidates = candidates;
    }

    fn session(&self, session_id: &str) -> Result<SharedSession, EngineError> {
        self.read_sessions()
            .get(session_id)
            .cloned()
            .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))
    }

    fn read_sessions(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SharedSession>> {
        self.sessions.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_sessions(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, SharedSession>> {
        self.sessions.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn presentation_message(candidate: &ScoredCandidate) -> String {
    format!(
        "I recommend the {}: {} (${:.2}). Would you like to order this or hear more options?",
        candidate.item.name, candidate.item.description, candidate.item.price
    )
}

fn apology_reply(session_id: &str) -> ChatReply {
    ChatReply {
        message: APOLOGY_MESSAGE.to_string(),
        session_id: session_id.to_string(),
        suggested_items: Vec::new(),
        follow_up_questions: default_follow_ups(),
    }
}

fn default_follow_ups() -> Vec<String> {
    DEFAULT_FOLLOW_UPS.iter().map(|question| question.to_string()).collect()
}
