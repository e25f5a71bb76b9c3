//! End-to-end scenarios for the conversation engine: a scripted generation
//! backend stands in for the real providers, an in-memory catalog stands
//! in for the menu data file.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use menuwise_agent::{
    BackendError, ConversationEngine, EngineError, EngineLimits, FailoverOrchestrator,
    FailoverPolicy, GenerationBackend, PhraseIntentClassifier, SufficiencyPolicy,
};
use menuwise_core::catalog::InMemoryCatalog;
use menuwise_core::config::ProviderKind;
use menuwise_core::domain::menu::{CuisineType, MealCategory, MenuItem, MenuItemId};
use menuwise_core::domain::preferences::{DietaryRestriction, PriceRange, UserPreferences};

/// Backend that always answers with the same canned text, or always fails.
struct CannedBackend {
    kind: ProviderKind,
    reply: Option<String>,
    calls: AtomicUsize,
}

impl CannedBackend {
    fn healthy(kind: ProviderKind, reply: &str) -> Arc<Self> {
        Arc::new(Self { kind, reply: Some(reply.to_string()), calls: AtomicUsize::new(0) })
    }

    fn broken(kind: ProviderKind) -> Arc<Self> {
        Arc::new(Self { kind, reply: None, calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for CannedBackend {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn generate(&self, _prompt: &str, _context: Option<&str>) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(reply) => Ok(reply.clone()),
            None => Err(BackendError::Transport {
                provider: self.kind,
                message: "connection refused".to_string(),
            }),
        }
    }
}

fn item(
    id: &str,
    name: &str,
    price: f64,
    cuisine: CuisineType,
    vegetarian: bool,
    ingredients: &[&str],
    popularity: f64,
) -> MenuItem {
    MenuItem {
        id: MenuItemId(id.to_string()),
        name: name.to_string(),
        description: format!("{name} from our kitchen"),
        price,
        category: MealCategory::MainCourse,
        cuisine_type: cuisine,
        ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
        allergens: Vec::new(),
        nutritional_info: serde_json::json!({"calories": 600}),
        is_vegetarian: vegetarian,
        is_vegan: false,
        is_gluten_free: false,
        is_dairy_free: false,
        spice_level: 2,
        preparation_time: 20,
        available: true,
        popularity_score: popularity,
    }
}

fn catalog() -> Arc<InMemoryCatalog> {
    Arc::new(InMemoryCatalog::new(vec![
        item(
            "margherita",
            "Margherita Pizza",
            14.99,
            CuisineType::Italian,
            true,
            &["dough", "tomato", "mozzarella", "basil"],
            8.5,
        ),
        item(
            "calzone",
            "Spinach Calzone",
            13.50,
            CuisineType::Italian,
            true,
            &["dough", "spinach", "ricotta"],
            6.4,
        ),
        item(
            "tikka",
            "Chicken Tikka Masala",
            11.99,
            CuisineType::Indian,
            false,
            &["chicken", "cream", "tomato", "spices"],
            9.1,
        ),
        item(
            "satay",
            "Chicken Satay",
            12.50,
            CuisineType::Thai,
            false,
            &["chicken", "groundnut oil", "soy sauce"],
            7.0,
        ),
    ]))
}

fn engine_with_limits(
    primary: Arc<dyn GenerationBackend>,
    secondary: Arc<dyn GenerationBackend>,
    limits: EngineLimits,
) -> ConversationEngine {
    let policy = FailoverPolicy {
        failover_enabled: true,
        error_threshold: 2,
        health_check_interval: Duration::from_secs(300),
    };
    let orchestrator = Arc::new(FailoverOrchestrator::new(primary, secondary, policy));
    ConversationEngine::new(
        catalog(),
        orchestrator,
        Box::new(PhraseIntentClassifier),
        SufficiencyPolicy::default(),
        limits,
    )
}

fn engine_with(primary: Arc<dyn GenerationBackend>, secondary: Arc<dyn GenerationBackend>) -> ConversationEngine {
    engine_with_limits(primary, secondary, EngineLimits::default())
}

fn engine() -> ConversationEngine {
    engine_with(
        CannedBackend::healthy(ProviderKind::Gemini, "Welcome! What are you in the mood for?"),
        CannedBackend::healthy(ProviderKind::Ollama, "Hi there, tell me what you like."),
    )
}

fn italian_vegetarian_preferences() -> UserPreferences {
    // The 13-20 budget leaves exactly two matches: both Italian
    // vegetarian dishes. The curries fall below the floor and score zero.
    UserPreferences {
        dietary_restrictions: vec![DietaryRestriction::Vegetarian],
        favorite_cuisines: vec!["italian".to_string()],
        price_range: Some(PriceRange::new(13.0, 20.0).expect("valid range")),
        ..UserPreferences::default()
    }
}

#[tokio::test]
async fn sufficient_preferences_surface_the_top_candidate_immediately() {
    let engine = engine();
    let reply = engine
        .start_conversation(Some(italian_vegetarian_preferences()))
        .await
        .expect("session opens");

    assert!(reply.message.starts_with("I recommend the Margherita Pizza:"));
    assert!(reply.message.contains("$14.99"));
    assert!(reply.message.ends_with("Would you like to order this or hear more options?"));
    assert!(!reply.suggested_items.is_empty());
    assert_eq!(reply.suggested_items[0].item.id.0, "margherita");
    assert!(reply.follow_up_questions.is_empty());
}

#[tokio::test]
async fn insufficient_preferences_get_a_welcome_and_stock_questions() {
    let engine = engine();
    let reply = engine.start_conversation(None).await.expect("session opens");

    assert_eq!(reply.message, "Welcome! What are you in the mood for?");
    assert!(reply.suggested_items.is_empty());
    assert_eq!(reply.follow_up_questions.len(), 3);
}

#[tokio::test]
async fn peanut_allergy_excludes_groundnut_oil_dishes() {
    let engine = engine();
    let preferences = UserPreferences {
        allergies: vec!["peanuts".to_string()],
        favorite_cuisines: vec!["thai".to_string()],
        price_range: Some(PriceRange::new(5.0, 20.0).expect("valid range")),
        ..UserPreferences::default()
    };

    let reply = engine.start_conversation(Some(preferences)).await.expect("session opens");
    assert!(
        reply.suggested_items.iter().all(|candidate| candidate.item.id.0 != "satay"),
        "groundnut oil must be caught by the peanut variation table"
    );
}

#[tokio::test]
async fn show_me_more_walks_the_list_then_sticks_at_exhausted() {
    let engine = engine();
    let start = engine
        .start_conversation(Some(italian_vegetarian_preferences()))
        .await
        .expect("session opens");
    let session_id = start.session_id.clone();
    // Two vegetarian Italian dishes in range: margherita first, calzone second.
    assert_eq!(start.suggested_items.len(), 2);

    let second = engine
        .process_turn(&session_id, "show me more options", None)
        .await
        .expect("turn succeeds");
    assert!(second.message.starts_with("I recommend the Spinach Calzone:"));

    for _ in 0..2 {
        let exhausted = engine
            .process_turn(&session_id, "show me more options", None)
            .await
            .expect("turn succeeds");
        assert!(exhausted.suggested_items.is_empty());
        assert!(exhausted.message.contains("everything that matches"));
    }
}

#[tokio::test]
async fn replacing_preferences_resets_the_cursor() {
    let engine = engine();
    let start = engine
        .start_conversation(Some(italian_vegetarian_preferences()))
        .await
        .expect("session opens");
    let session_id = start.session_id.clone();

    engine.process_turn(&session_id, "next", None).await.expect("advance");
    engine.process_turn(&session_id, "next", None).await.expect("exhaust");

    // Fresh preferences rebuild the list and start over at the top.
    let reply = engine
        .process_turn(&session_id, "actually let's start over", Some(italian_vegetarian_preferences()))
        .await
        .expect("turn succeeds");
    assert!(reply.message.starts_with("I recommend the Margherita Pizza:"));
}

#[tokio::test]
async fn more_info_answers_without_advancing_the_cursor() {
    let engine = engine_with(
        CannedBackend::healthy(ProviderKind::Gemini, "It's a classic wood-fired pizza."),
        CannedBackend::healthy(ProviderKind::Ollama, "unused"),
    );
    let start = engine
        .start_conversation(Some(italian_vegetarian_preferences()))
        .await
        .expect("session opens");
    let session_id = start.session_id.clone();

    let info = engine
        .process_turn(&session_id, "tell me more about it", None)
        .await
        .expect("turn succeeds");
    assert_eq!(info.message, "It's a classic wood-fired pizza.");
    assert_eq!(info.suggested_items.len(), 1);
    assert_eq!(info.suggested_items[0].item.id.0, "margherita");

    // The cursor did not move: the next advance lands on the second item.
    let next = engine.process_turn(&session_id, "more options", None).await.expect("turn succeeds");
    assert!(next.message.starts_with("I recommend the Spinach Calzone:"));
}

#[tokio::test]
async fn broken_primary_fails_over_to_secondary_for_welcome() {
    let engine = engine_with(
        CannedBackend::broken(ProviderKind::Gemini),
        CannedBackend::healthy(ProviderKind::Ollama, "Hello from the backup."),
    );
    let reply = engine.start_conversation(None).await.expect("session opens");
    assert_eq!(reply.message, "Hello from the backup.");
}

#[tokio::test]
async fn total_outage_degrades_to_apology_instead_of_error() {
    let engine = engine_with(
        CannedBackend::broken(ProviderKind::Gemini),
        CannedBackend::broken(ProviderKind::Ollama),
    );
    let start = engine.start_conversation(None).await.expect("session opens");
    let session_id = start.session_id.clone();

    let reply = engine
        .process_turn(&session_id, "what do you have?", None)
        .await
        .expect("turn still succeeds");
    assert!(reply.message.starts_with("I apologize"));
    assert_eq!(reply.follow_up_questions.len(), 3);
}

#[tokio::test]
async fn unknown_session_is_a_not_found_error() {
    let engine = engine();
    let error = engine.process_turn("no-such-session", "hi", None).await.expect_err("must fail");
    assert!(matches!(error, EngineError::SessionNotFound(_)));

    let error = engine.history("no-such-session").await.expect_err("must fail");
    assert!(matches!(error, EngineError::SessionNotFound(_)));
}

#[tokio::test]
async fn history_records_both_sides_of_the_dialogue() {
    let engine = engine();
    let start = engine
        .start_conversation(Some(italian_vegetarian_preferences()))
        .await
        .expect("session opens");
    let session_id = start.session_id.clone();

    engine.process_turn(&session_id, "more options", None).await.expect("turn succeeds");
    let history = engine.history(&session_id).await.expect("history exists");
    // Opening assistant message, then one user/assistant exchange.
    assert_eq!(history.len(), 3);

    engine.end_conversation(&session_id).await.expect("session closes");
    let error = engine.history(&session_id).await.expect_err("session gone");
    assert!(matches!(error, EngineError::SessionNotFound(_)));
}

#[tokio::test]
async fn saturated_engine_rejects_before_spending_a_generation_call() {
    let primary = CannedBackend::healthy(ProviderKind::Gemini, "Welcome!");
    let secondary = CannedBackend::healthy(ProviderKind::Ollama, "Hello.");
    let engine = engine_with_limits(
        primary.clone(),
        secondary.clone(),
        EngineLimits { max_recommendations: 5, max_active_sessions: 1 },
    );

    engine.start_conversation(None).await.expect("first session fits");
    let spent = primary.calls() + secondary.calls();

    let error = engine.start_conversation(None).await.expect_err("limit reached");
    assert!(matches!(error, EngineError::TooManySessions(1)));
    assert_eq!(
        primary.calls() + secondary.calls(),
        spent,
        "a rejected session must not reach a provider"
    );
}

#[tokio::test]
async fn idle_sessions_are_reaped() {
    let engine = engine();
    engine.start_conversation(None).await.expect("session opens");
    assert_eq!(engine.active_sessions(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(engine.expire_idle(Duration::ZERO), 1);
    assert_eq!(engine.active_sessions(), 0);
}
