//! Domain core for the menu recommendation engine: the catalog data model,
//! preference scoring and ranking, allergen safety filtering, and the
//! configuration layer. Everything here is synchronous and in-memory; the
//! conversational machinery lives in `menuwise-agent`.

pub mod allergy;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod selector;

pub use allergy::{AllergenSeverity, AllergenWarning, AllergyChecker, MatchType};
pub use catalog::{CatalogError, CatalogSource, InMemoryCatalog, MenuFilters};
pub use domain::chat::{ChatMessage, ChatReply, MessageRole};
pub use domain::menu::{CuisineType, MealCategory, MenuItem, MenuItemId, ScoredCandidate};
pub use domain::preferences::{DietaryRestriction, PriceRange, UserPreferences};
pub use errors::DomainError;
pub use selector::MealSelector;
