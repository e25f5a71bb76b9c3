//! Multi-criteria preference scoring and ranking of catalog items.
//!
//! Each facet contributes only when the corresponding preference is set;
//! the final score is normalized by the sum of the weights that were
//! actually applied, so an unset facet is excluded from numerator and
//! denominator alike.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::domain::menu::{MenuItem, ScoredCandidate};
use crate::domain::preferences::{DietaryRestriction, UserPreferences};

const WEIGHT_DIETARY: f64 = 0.30;
const WEIGHT_PRICE: f64 = 0.25;
const WEIGHT_CUISINE: f64 = 0.20;
const WEIGHT_SPICE: f64 = 0.15;
const WEIGHT_DISLIKED_INGREDIENTS: f64 = 0.10;
const DISLIKE_PENALTY: f64 = 0.5;
const MAX_SPICE_DISTANCE: f64 = 5.0;
const MAX_REASONS: usize = 3;

const SIMILARITY_WEIGHT_CATEGORY: f64 = 0.30;
const SIMILARITY_WEIGHT_PRICE: f64 = 0.20;
const SIMILARITY_WEIGHT_INGREDIENTS: f64 = 0.30;
const SIMILARITY_WEIGHT_SPICE: f64 = 0.20;

#[derive(Clone, Debug, Default)]
pub struct MealSelector;

impl MealSelector {
    pub fn new() -> Self {
        Self
    }

    /// Score in `[0, 1]`. Items whose allergen set intersects the declared
    /// allergies score 0 unconditionally; the downstream safety filter is a
    /// second, deliberately redundant authority on the same question.
    pub fn score(&self, item: &MenuItem, preferences: &UserPreferences) -> f64 {
        if has_declared_allergen(item, &preferences.allergies) {
            return 0.0;
        }

        let mut score = 0.0;
        let mut applied_weight = 0.0;

        if !preferences.dietary_restrictions.is_empty() {
            score += dietary_match_ratio(item, &preferences.dietary_restrictions) * WEIGHT_DIETARY;
            applied_weight += WEIGHT_DIETARY;
        }

        if let Some(range) = &preferences.price_range {
            if range.contains(item.price) {
                score += WEIGHT_PRICE;
            }
            applied_weight += WEIGHT_PRICE;
        }

        if !preferences.favorite_cuisines.is_empty() {
            if cuisine_matches(item, &preferences.favorite_cuisines) {
                score += WEIGHT_CUISINE;
            }
            applied_weight += WEIGHT_CUISINE;
        }

        if let Some(preferred_spice) = preferences.spice_preference {
            score += spice_closeness(item.spice_level, preferred_spice) * WEIGHT_SPICE;
            applied_weight += WEIGHT_SPICE;
        }

        if !preferences.disliked_ingredients.is_empty() {
            if !contains_disliked_ingredient(item, &preferences.disliked_ingredients) {
                score += WEIGHT_DISLIKED_INGREDIENTS;
            }
            applied_weight += WEIGHT_DISLIKED_INGREDIENTS;
        }

        if applied_weight == 0.0 {
            return 0.0;
        }

        let mut normalized = score / applied_weight;
        if mentions_dislike(item, &preferences.dislikes) {
            normalized *= DISLIKE_PENALTY;
        }
        normalized.clamp(0.0, 1.0)
    }

    /// Ranked candidates, descending score. Ties break by higher popularity
    /// then ascending id so repeated calls over the same inputs always
    /// produce the same order. Allergen-excluded and zero-scored items are
    /// dropped; an empty catalog yields an empty ranking.
    pub fn rank(
        &self,
        items: &[MenuItem],
        preferences: &UserPreferences,
        limit: usize,
    ) -> Vec<ScoredCandidate> {
        let mut candidates: Vec<ScoredCandidate> = items
            .iter()
            .filter_map(|item| {
                let score = self.score(item, preferences);
                (score > 0.0).then(|| ScoredCandidate {
                    item: item.clone(),
                    score,
                    reasoning: self.reasoning(item, preferences, score),
                })
            })
            .collect();

        candidates.sort_by(|a, b| compare_candidates(a, b));
        candidates.truncate(limit);
        candidates
    }

    /// Up to three human-readable reasons, highest-signal first.
    pub fn reasoning(
        &self,
        item: &MenuItem,
        preferences: &UserPreferences,
        score: f64,
    ) -> Vec<String> {
        let mut reasons = Vec::new();

        if score > 0.8 {
            reasons.push("Excellent match for your preferences".to_string());
        } else if score > 0.6 {
            reasons.push("Good match for your preferences".to_string());
        }

        for cuisine in &preferences.favorite_cuisines {
            if item.cuisine_type.label() == cuisine.trim().to_ascii_lowercase() {
                reasons.push(format!("Matches your preference for {cuisine} cuisine"));
                break;
            }
        }

        if let Some(range) = &preferences.price_range {
            if range.contains(item.price) {
                reasons.push(format!("Fits your budget of ${}-${}", range.min, range.max));
            }
        }

        let matched_restrictions = matched_restriction_labels(item, &preferences.dietary_restrictions);
        if !matched_restrictions.is_empty() {
            reasons.push(format!("Meets your {} requirements", matched_restrictions.join(", ")));
        }

        if let Some(preferred_spice) = preferences.spice_preference {
            if item.spice_level.abs_diff(preferred_spice) <= 1 {
                reasons.push("Matches your preferred spice level".to_string());
            }
        }

        if reasons.is_empty() {
            reasons.push("Matches your preferences".to_string());
        }
        reasons.truncate(MAX_REASONS);
        reasons
    }

    /// Items most similar to a reference item, by category, price,
    /// ingredient overlap, and spice level. The reference item itself is
    /// excluded by id.
    pub fn similar(
        &self,
        item: &MenuItem,
        candidates: &[MenuItem],
        limit: usize,
    ) -> Vec<ScoredCandidate> {
        let mut similar: Vec<ScoredCandidate> = candidates
            .iter()
            .filter(|other| other.id != item.id)
            .map(|other| ScoredCandidate {
                item: other.clone(),
                score: similarity_score(item, other),
                reasoning: Vec::new(),
            })
            .collect();

        similar.sort_by(|a, b| compare_candidates(a, b));
        similar.truncate(limit);
        similar
    }
}

fn compare_candidates(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.item
                .popularity_score
                .partial_cmp(&a.item.popularity_score)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.item.id.cmp(&b.item.id))
}

fn has_declared_allergen(item: &MenuItem, allergies: &[String]) -> bool {
    if allergies.is_empty() {
        return false;
    }
    item.allergens.iter().any(|allergen| {
        allergies.iter().any(|allergy| allergen.eq_ignore_ascii_case(allergy.trim()))
    })
}

fn dietary_match_ratio(item: &MenuItem, restrictions: &[DietaryRestriction]) -> f64 {
    let matched = restrictions
        .iter()
        .filter(|restriction| restriction_satisfied(item, restriction))
        .count();
    matched as f64 / restrictions.len() as f64
}

fn restriction_satisfied(item: &MenuItem, restriction: &DietaryRestriction) -> bool {
    match restriction {
        DietaryRestriction::Vegetarian => item.is_vegetarian,
        DietaryRestriction::Vegan => item.is_vegan,
        DietaryRestriction::GlutenFree => item.is_gluten_free,
        DietaryRestriction::DairyFree => item.is_dairy_free,
        // The catalog carries no flags for these; they never match.
        DietaryRestriction::NutFree | DietaryRestriction::Halal | DietaryRestriction::Kosher => {
            false
        }
    }
}

fn restriction_label(restriction: &DietaryRestriction) -> &'static str {
    match restriction {
        DietaryRestriction::Vegetarian => "vegetarian",
        DietaryRestriction::Vegan => "vegan",
        DietaryRestriction::GlutenFree => "gluten free",
        DietaryRestriction::DairyFree => "dairy free",
        DietaryRestriction::NutFree => "nut free",
        DietaryRestriction::Halal => "halal",
        DietaryRestriction::Kosher => "kosher",
    }
}

fn matched_restriction_labels(
    item: &MenuItem,
    restrictions: &[DietaryRestriction],
) -> Vec<&'static str> {
    restrictions
        .iter()
        .filter(|restriction| restriction_satisfied(item, restriction))
        .map(restriction_label)
        .collect()
}

fn cuisine_matches(item: &MenuItem, favorite_cuisines: &[String]) -> bool {
    favorite_cuisines
        .iter()
        .any(|cuisine| item.cuisine_type.label() == cuisine.trim().to_ascii_lowercase())
}

fn spice_closeness(item_spice: u8, preferred_spice: u8) -> f64 {
    let distance = f64::from(item_spice.abs_diff(preferred_spice));
    (1.0 - distance / MAX_SPICE_DISTANCE).max(0.0)
}

fn contains_disliked_ingredient(item: &MenuItem, disliked: &[String]) -> bool {
    item.ingredients.iter().any(|ingredient| {
        disliked.iter().any(|term| ingredient.eq_ignore_ascii_case(term.trim()))
    })
}

fn mentions_dislike(item: &MenuItem, dislikes: &[String]) -> bool {
    dislikes.iter().any(|dislike| {
        let term = dislike.trim().to_ascii_lowercase();
        if term.is_empty() {
            return false;
        }
        item.name.to_ascii_lowercase().contains(&term)
            || item.description.to_ascii_lowercase().contains(&term)
            || item.ingredients.iter().any(|ingredient| {
                ingredient.to_ascii_lowercase().contains(&term)
            })
    })
}

fn similarity_score(reference: &MenuItem, other: &MenuItem) -> f64 {
    let mut score = 0.0;

    if reference.category == other.category {
        score += SIMILARITY_WEIGHT_CATEGORY;
    }

    let max_price = reference.price.max(other.price);
    let price_closeness = if max_price > 0.0 {
        (1.0 - (reference.price - other.price).abs() / max_price).max(0.0)
    } else {
        1.0
    };
    score += price_closeness * SIMILARITY_WEIGHT_PRICE;

    score += ingredient_overlap(reference, other) * SIMILARITY_WEIGHT_INGREDIENTS;
    score += spice_closeness(reference.spice_level, other.spice_level) * SIMILARITY_WEIGHT_SPICE;
    score
}

fn ingredient_overlap(reference: &MenuItem, other: &MenuItem) -> f64 {
    let longer = reference.ingredients.len().max(other.ingredients.len());
    if longer == 0 {
        return 0.0;
    }
    let reference_set: BTreeSet<String> =
        reference.ingredients.iter().map(|i| i.to_ascii_lowercase()).collect();
    let common = other
        .ingredients
        .iter()
        .map(|i| i.to_ascii_lowercase())
        .collect::<BTreeSet<String>>()
        .intersection(&reference_set)
        .count();
    common as f64 / longer as f64
}
