//! Prompt builders for the conversational flow.
//!
//! Each builder returns the complete prompt string; the orchestrator is
//! handed text only and knows nothing about dialogue structure.

use menuwise_core::domain::chat::{ChatMessage, MessageRole};
use menuwise_core::domain::menu::MenuItem;
use menuwise_core::domain::preferences::{DietaryRestriction, UserPreferences};

const ASSISTANT_PERSONA: &str = "You are a friendly and knowledgeable restaurant AI assistant.\n\
    Your goal is to help customers find the perfect meal based on their preferences and needs.";

pub fn welcome_prompt(preferences: Option<&UserPreferences>) -> String {
    format!(
        "{ASSISTANT_PERSONA}\n\n\
         {}\n\n\
         Generate a warm welcome message that:\n\
         1. Introduces yourself as the restaurant's AI assistant\n\
         2. Acknowledges any provided preferences\n\
         3. Invites the customer to start their dining experience\n\
         4. Keeps the message concise and friendly\n\n\
         Response:",
        format_preferences(preferences)
    )
}

/// Prompt for a free-form turn. The reply is expected to follow the JSON
/// contract parsed by [`crate::llm::structured::parse_llm_turn`].
pub fn turn_prompt(
    message: &str,
    history: &[ChatMessage],
    preferences: Option<&UserPreferences>,
) -> String {
    format!(
        "{ASSISTANT_PERSONA}\n\n\
         {}\n\n\
         Previous conversation:\n\
         {}\n\
         User's latest message: {message}\n\n\
         Generate a response that:\n\
         1. Addresses the user's message directly\n\
         2. Maintains a friendly and helpful tone\n\
         3. Provides relevant information about menu items if appropriate\n\
         4. Asks follow-up questions to better understand their needs\n\n\
         Format your response as a JSON object with the following structure:\n\
         {{\n\
             \"message\": \"Your response message\",\n\
             \"should_recommend_meals\": true/false,\n\
             \"context\": {{\n\
                 \"intent\": \"user's intent (e.g., 'meal_recommendation', 'menu_inquiry', 'general_question')\",\n\
                 \"key_preferences\": [\"list\", \"of\", \"key\", \"preferences\", \"mentioned\"]\n\
             }},\n\
             \"metadata\": {{}}\n\
         }}\n\n\
         Response:",
        format_preferences(preferences),
        format_chat_history(history)
    )
}

/// Prompt for 2-3 follow-up questions. The reply is expected to be a JSON
/// array of strings.
pub fn follow_ups_prompt(
    message: &str,
    suggested_items: &[MenuItem],
    turn_context: Option<&serde_json::Value>,
) -> String {
    let context = match turn_context {
        Some(value) => value.to_string(),
        None => "No context provided".to_string(),
    };
    let meals = if suggested_items.is_empty() {
        "No meals suggested".to_string()
    } else {
        suggested_items.iter().map(|item| item.name.as_str()).collect::<Vec<_>>().join(", ")
    };

    format!(
        "You are a restaurant AI assistant generating follow-up questions.\n\n\
         User's message: {message}\n\n\
         Context: {context}\n\n\
         Suggested meals: {meals}\n\n\
         Generate 2-3 relevant follow-up questions that will help:\n\
         1. Better understand the user's preferences\n\
         2. Narrow down meal recommendations\n\
         3. Address any unclear aspects of their request\n\n\
         Format your response as a JSON array of strings.\n\n\
         Response:"
    )
}

/// Prompt grounding a "tell me more" answer in the item actually on the
/// table, so the model cannot drift to an invented dish.
pub fn item_info_prompt(item: &MenuItem, message: &str) -> String {
    format!(
        "{ASSISTANT_PERSONA}\n\n\
         The customer is asking about this menu item:\n\
         - Name: {}\n\
         - Description: {}\n\
         - Price: ${:.2}\n\
         - Cuisine: {}\n\
         - Ingredients: {}\n\
         - Nutritional info: {}\n\n\
         Customer's question: {message}\n\n\
         Answer using only the details above. Keep it concise and friendly.\n\n\
         Response:",
        item.name,
        item.description,
        item.price,
        item.cuisine_type,
        item.ingredients.join(", "),
        item.nutritional_info,
    )
}

fn format_chat_history(messages: &[ChatMessage]) -> String {
    let mut formatted = String::new();
    for message in messages {
        let role = match message.role {
            MessageRole::User => "User",
            MessageRole::Assistant => "Assistant",
        };
        formatted.push_str(role);
        formatted.push_str(": ");
        formatted.push_str(&message.content);
        formatted.push('\n');
    }
    formatted
}

fn format_preferences(preferences: Option<&UserPreferences>) -> String {
    let Some(preferences) = preferences else {
        return "No specific preferences provided.".to_string();
    };
    if preferences.facet_count() == 0 && preferences.disliked_ingredients.is_empty() {
        return "No specific preferences provided.".to_string();
    }

    let mut out = String::from("User Preferences:\n");
    if !preferences.dietary_restrictions.is_empty() {
        let labels: Vec<&str> =
            preferences.dietary_restrictions.iter().map(restriction_label).collect();
        out.push_str(&format!("- Dietary Restrictions: {}\n", labels.join(", ")));
    }
    if !preferences.allergies.is_empty() {
        out.push_str(&format!("- Allergies: {}\n", preferences.allergies.join(", ")));
    }
    if let Some(range) = &preferences.price_range {
        out.push_str(&format!("- Price Range: ${} - ${}\n", range.min, range.max));
    }
    if !preferences.favorite_cuisines.is_empty() {
        out.push_str(&format!("- Favorite Cuisines: {}\n", preferences.favorite_cuisines.join(", ")));
    }
    if let Some(spice) = preferences.spice_preference {
        out.push_str(&format!("- Spice Preference: Level {spice}/5\n"));
    }
    if !preferences.dislikes.is_empty() || !preferences.disliked_ingredients.is_empty() {
        let mut dislikes = preferences.dislikes.clone();
        dislikes.extend(preferences.disliked_ingredients.iter().cloned());
        out.push_str(&format!("- Dislikes: {}\n", dislikes.join(", ")));
    }
    out
}

fn restriction_label(restriction: &DietaryRestriction) -> &'static str {
    match restriction {
        DietaryRestriction::Vegetarian => "vegetarian",
        DietaryRestriction::Vegan => "vegan",
        DietaryRestriction::GlutenFree => "gluten-free",
        DietaryRestriction::DairyFree => "dairy-free",
        DietaryRestriction::NutFree => "nut-free",
        DietaryRestriction::Halal => "halal",
        DietaryRestriction::Kosher => "kosher",
    }
}

#[cfg(test)]
mod tests {
    use menuwise_core::domain::chat::ChatMessage;
    use menuwise_core::domain::preferences::{DietaryRestriction, PriceRange, UserPreferences};

    use super::{format_preferences, turn_prompt, welcome_prompt};

    #[test]
    fn preferences_block_lists_only_set_facets() {
        let preferences = UserPreferences {
            dietary_restrictions: vec![DietaryRestriction::Vegetarian],
            price_range: Some(PriceRange::new(10.0, 20.0).expect("valid range")),
            ..UserPreferences::default()
        };

        let block = format_preferences(Some(&preferences));
        assert!(block.contains("- Dietary Restrictions: vegetarian"));
        assert!(block.contains("- Price Range: $10 - $20"));
        assert!(!block.contains("Allergies"));
        assert!(!block.contains("Spice"));
    }

    #[test]
    fn empty_preferences_collapse_to_placeholder() {
        assert_eq!(format_preferences(None), "No specific preferences provided.");
        assert_eq!(
            format_preferences(Some(&UserPreferences::default())),
            "No specific preferences provided."
        );
    }

    #[test]
    fn turn_prompt_carries_history_and_contract() {
        let history =
            vec![ChatMessage::user("hi"), ChatMessage::assistant("hello, what sounds good?", None)];
        let prompt = turn_prompt("something vegetarian", &history, None);

        assert!(prompt.contains("User: hi"));
        assert!(prompt.contains("Assistant: hello, what sounds good?"));
        assert!(prompt.contains("User's latest message: something vegetarian"));
        assert!(prompt.contains("\"should_recommend_meals\""));
    }

    #[test]
    fn welcome_prompt_mentions_preferences() {
        let preferences = UserPreferences {
            favorite_cuisines: vec!["thai".to_string()],
            ..UserPreferences::default()
        };
        let prompt = welcome_prompt(Some(&preferences));
        assert!(prompt.contains("- Favorite Cuisines: thai"));
        assert!(prompt.contains("warm welcome message"));
    }
}
