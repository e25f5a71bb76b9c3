use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::menu::ScoredCandidate;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into(), timestamp: Utc::now(), metadata: None }
    }

    pub fn assistant(content: impl Into<String>, metadata: Option<serde_json::Value>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into(), timestamp: Utc::now(), metadata }
    }
}

/// One turn's reply as returned to the transport layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub message: String,
    pub session_id: String,
    #[serde(default)]
    pub suggested_items: Vec<ScoredCandidate>,
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}
