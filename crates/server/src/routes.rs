//! Chat and menu routes.
//!
//! Endpoints:
//! - `POST   /chat/start`                 — open a session, greet or recommend
//! - `POST   /chat/message`               — one dialogue turn
//! - `GET    /chat/history/{session_id}`  — full message history
//! - `DELETE /chat/session/{session_id}`  — close a session
//! - `GET    /menu/items`                 — every available item
//! - `GET    /menu/items/{id}`            — one item by id
//! - `GET    /menu/search`                — filtered item search
//! - `GET    /menu/categories`            — every meal category label
//! - `GET    /menu/cuisines`              — every cuisine label
//! - `GET    /menu/dietary-tags`          — every dietary restriction label
//! - `POST   /menu/recommend`             — ranked, allergen-safe candidates
//! - `GET    /menu/items/{id}/similar`    — items similar to a reference
//! - `POST   /menu/items/{id}/safety-check` — allergen verdict for one item

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use menuwise_agent::{ConversationEngine, EngineError};
use menuwise_core::allergy::{AllergenWarning, AllergyChecker};
use menuwise_core::catalog::{CatalogSource, MenuFilters};
use menuwise_core::domain::chat::{ChatMessage, ChatReply};
use menuwise_core::domain::menu::{CuisineType, MealCategory, MenuItem, MenuItemId, ScoredCandidate};
use menuwise_core::domain::preferences::{DietaryRestriction, UserPreferences};
use menuwise_core::selector::MealSelector;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ConversationEngine>,
    pub catalog: Arc<dyn CatalogSource>,
}

const MAX_RECOMMENDATIONS: usize = 5;
const MAX_SIMILAR_ITEMS: usize = 20;
const MAX_SAFE_ALTERNATIVES: usize = 3;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chat/start", post(start_chat))
        .route("/chat/message", post(chat_message))
        .route("/chat/history/{session_id}", get(chat_history))
        .route("/chat/session/{session_id}", delete(end_chat))
        .route("/menu/items", get(list_items))
        .route("/menu/items/{id}", get(item_by_id))
        .route("/menu/search", get(search_items))
        .route("/menu/categories", get(list_categories))
        .route("/menu/cuisines", get(list_cuisines))
        .route("/menu/dietary-tags", get(list_dietary_tags))
        .route("/menu/recommend", post(recommend_items))
        .route("/menu/items/{id}/similar", get(similar_items))
        .route("/menu/items/{id}/safety-check", post(safety_check))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StartChatRequest {
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessageRequest {
    pub session_id: String,
    pub message: String,
    #[serde(default)]
    pub preferences: Option<UserPreferences>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub preferences: UserPreferences,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SafetyCheckRequest {
    pub allergies: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SafetyCheckResponse {
    pub safe: bool,
    pub warnings: Vec<AllergenWarning>,
    pub alternatives: Vec<MenuItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub cuisine: Option<String>,
    pub category: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub dietary: Option<String>,
    pub max_spice: Option<u8>,
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

pub struct RouteError {
    status: StatusCode,
    message: String,
}

impl RouteError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.into() }
    }
}

impl From<EngineError> for RouteError {
    fn from(error: EngineError) -> Self {
        match error {
            EngineError::SessionNotFound(_) => Self::not_found(error.to_string()),
            EngineError::TooManySessions(_) => {
                error!(event_name = "api.session_limit", error = %error, "session limit hit");
                Self { status: StatusCode::SERVICE_UNAVAILABLE, message: error.to_string() }
            }
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiError { error: self.message })).into_response()
    }
}

// ---------------------------------------------------------------------------
// Chat handlers
// ---------------------------------------------------------------------------

async fn start_chat(
    State(state): State<AppState>,
    Json(request): Json<StartChatRequest>,
) -> Result<Json<ChatReply>, RouteError> {
    let reply = state.engine.start_conversation(request.preferences).await?;
    Ok(Json(reply))
}

async fn chat_message(
    State(state): State<AppState>,
    Json(request): Json<ChatMessageRequest>,
) -> Result<Json<ChatReply>, RouteError> {
    if request.message.trim().is_empty() {
        return Err(RouteError::bad_request("message must not be empty"));
    }
    let reply = state
        .engine
        .process_turn(&request.session_id, &request.message, request.preferences)
        .await?;
    Ok(Json(reply))
}

async fn chat_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ChatMessage>>, RouteError> {
    let history = state.engine.history(&session_id).await?;
    Ok(Json(history))
}

async fn end_chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, RouteError> {
    state.engine.end_conversation(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Menu handlers
// ---------------------------------------------------------------------------

async fn list_items(State(state): State<AppState>) -> Json<Vec<MenuItem>> {
    Json(state.catalog.list_available_items())
}

async fn item_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MenuItem>, RouteError> {
    state
        .catalog
        .item_by_id(&MenuItemId(id.clone()))
        .map(Json)
        .ok_or_else(|| RouteError::not_found(format!("no menu item with id `{id}`")))
}

async fn search_items(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<MenuItem>>, RouteError> {
    let filters = filters_from_params(params)?;
    Ok(Json(state.catalog.search(&filters)))
}

async fn list_categories() -> Json<Vec<&'static str>> {
    Json(category_labels())
}

async fn list_cuisines() -> Json<Vec<&'static str>> {
    Json(cuisine_labels())
}

async fn list_dietary_tags() -> Json<Vec<&'static str>> {
    Json(dietary_labels())
}

fn category_labels() -> Vec<&'static str> {
    MealCategory::ALL.iter().map(MealCategory::label).collect()
}

fn cuisine_labels() -> Vec<&'static str> {
    CuisineType::ALL.iter().map(CuisineType::label).collect()
}

fn dietary_labels() -> Vec<&'static str> {
    DietaryRestriction::ALL.iter().map(DietaryRestriction::label).collect()
}

async fn recommend_items(
    State(state): State<AppState>,
    Json(request): Json<RecommendRequest>,
) -> Result<Json<Vec<ScoredCandidate>>, RouteError> {
    let limit = clamped_limit(request.limit, MAX_RECOMMENDATIONS, MAX_SIMILAR_ITEMS)?;
    let items = state.catalog.list_available_items();
    let mut candidates = MealSelector::new().rank(&items, &request.preferences, limit);
    if !request.preferences.allergies.is_empty() {
        let checker = AllergyChecker::new();
        candidates
            .retain(|candidate| checker.is_safe(&candidate.item, &request.preferences.allergies));
    }
    Ok(Json(candidates))
}

async fn similar_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<Vec<ScoredCandidate>>, RouteError> {
    let limit = clamped_limit(params.limit, MAX_RECOMMENDATIONS, MAX_SIMILAR_ITEMS)?;
    let reference = state
        .catalog
        .item_by_id(&MenuItemId(id.clone()))
        .ok_or_else(|| RouteError::not_found(format!("no menu item with id `{id}`")))?;
    let candidates = state.catalog.list_available_items();
    Ok(Json(MealSelector::new().similar(&reference, &candidates, limit)))
}

async fn safety_check(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<SafetyCheckRequest>,
) -> Result<Json<SafetyCheckResponse>, RouteError> {
    let item = state
        .catalog
        .item_by_id(&MenuItemId(id.clone()))
        .ok_or_else(|| RouteError::not_found(format!("no menu item with id `{id}`")))?;

    let checker = AllergyChecker::new();
    let warnings = checker.explain(&item, &request.allergies);
    let alternatives = if warnings.is_empty() {
        Vec::new()
    } else {
        checker.safe_alternatives(
            &item,
            &request.allergies,
            &state.catalog.list_available_items(),
            MAX_SAFE_ALTERNATIVES,
        )
    };
    Ok(Json(SafetyCheckResponse { safe: warnings.is_empty(), warnings, alternatives }))
}

fn clamped_limit(
    requested: Option<usize>,
    default: usize,
    ceiling: usize,
) -> Result<usize, RouteError> {
    match requested {
        Some(0) => Err(RouteError::bad_request("limit must be at least 1")),
        Some(limit) => Ok(limit.min(ceiling)),
        None => Ok(default),
    }
}

fn filters_from_params(params: SearchParams) -> Result<MenuFilters, RouteError> {
    let category = params
        .category
        .map(|raw| {
            serde_json::from_value::<MealCategory>(serde_json::Value::String(raw.clone()))
                .map_err(|_| RouteError::bad_request(format!("unknown category `{raw}`")))
        })
        .transpose()?;

    let dietary = params
        .dietary
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .map(|tag| {
                    serde_json::from_value::<DietaryRestriction>(serde_json::Value::String(
                        tag.to_string(),
                    ))
                    .map_err(|_| {
                        RouteError::bad_request(format!("unknown dietary restriction `{tag}`"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();

    if let (Some(min), Some(max)) = (params.price_min, params.price_max) {
        if min > max {
            return Err(RouteError::bad_request("price_min must not exceed price_max"));
        }
    }

    Ok(MenuFilters {
        category,
        cuisine: params.cuisine.as_deref().map(CuisineType::from_label),
        price_min: params.price_min,
        price_max: params.price_max,
        dietary,
        max_spice: params.max_spice,
        text_query: params.q,
    })
}
