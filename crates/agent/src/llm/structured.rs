//! Structured-output contract for conversational turns.
//!
//! Models are asked for JSON but routinely wrap it in Markdown code fences
//! or drift from the schema. Parsing here is therefore forgiving: fences
//! are stripped, missing fields take defaults, and an unparseable payload
//! degrades to a fixed apologetic turn instead of an error. A malformed
//! model reply must never take a session down.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// One assistant turn as the model is asked to shape it.
#[derive(Clone, Debug, Deserialize)]
pub struct LlmTurn {
    pub message: String,
    #[serde(default, rename = "should_recommend_meals")]
    pub should_recommend: bool,
    #[serde(default)]
    pub context: TurnContext,
    #[serde(default)]
    pub metadata: Value,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct TurnContext {
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub key_preferences: Vec<String>,
}

/// Parses a model reply into an [`LlmTurn`], falling back to an apologetic
/// non-recommending turn when the payload is not usable JSON.
pub fn parse_llm_turn(raw: &str) -> LlmTurn {
    match serde_json::from_str::<LlmTurn>(strip_code_fences(raw)) {
        Ok(turn) => turn,
        Err(error) => {
            warn!(
                event_name = "llm.structured.turn_parse_failed",
                error = %error,
                "model turn was not valid JSON, using fallback turn"
            );
            fallback_turn()
        }
    }
}

/// Parses a model reply into follow-up questions, falling back to three
/// stock questions when the payload is not a JSON array of strings.
pub fn parse_follow_ups(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(strip_code_fences(raw)) {
        Ok(questions) if !questions.is_empty() => questions,
        Ok(_) => fallback_follow_ups(),
        Err(error) => {
            warn!(
                event_name = "llm.structured.follow_ups_parse_failed",
                error = %error,
                "follow-up questions were not a JSON array, using defaults"
            );
            fallback_follow_ups()
        }
    }
}

fn fallback_turn() -> LlmTurn {
    LlmTurn {
        message: "I apologize, but I'm having trouble processing your request. \
                  Could you please rephrase it?"
            .to_string(),
        should_recommend: false,
        context: TurnContext { intent: "error".to_string(), key_preferences: Vec::new() },
        metadata: Value::Object(serde_json::Map::new()),
    }
}

fn fallback_follow_ups() -> Vec<String> {
    vec![
        "What type of cuisine are you interested in?".to_string(),
        "Do you have any dietary restrictions?".to_string(),
        "What's your preferred price range?".to_string(),
    ]
}

/// Strips a surrounding Markdown code fence (with or without a language
/// tag) so the inner JSON can be handed to serde.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the language tag line if one follows the opening fence.
    match body.find('\n') {
        Some(newline) if body[..newline].chars().all(|c| c.is_ascii_alphanumeric()) => {
            body[newline + 1..].trim()
        }
        _ => body.trim(),
    }
}
