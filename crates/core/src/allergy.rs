//! Allergen safety filtering with synonym and variant matching.
//!
//! Matching runs per declared allergy, per ingredient, in three escalating
//! passes: direct substring, synonym dictionary, variation dictionary. The
//! first pass that matches settles the pair. Severity is attached from a
//! fixed three-tier table and is informational only.

use serde::{Deserialize, Serialize};

use crate::domain::menu::MenuItem;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllergenSeverity {
    High,
    Medium,
    Low,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Direct,
    Synonym,
    Variation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllergenWarning {
    pub allergen: String,
    pub severity: AllergenSeverity,
    pub ingredient: String,
    pub match_type: MatchType,
}

#[derive(Clone, Debug, Default)]
pub struct AllergyChecker;

impl AllergyChecker {
    pub fn new() -> Self {
        Self
    }

    /// True when no declared allergy matches any ingredient. An item with
    /// zero ingredients is safe by construction, and an empty allergy list
    /// makes every item safe.
    pub fn is_safe(&self, item: &MenuItem, allergies: &[String]) -> bool {
        self.explain(item, allergies).is_empty()
    }

    /// Subset of `items` safe for the declared allergies, original order
    /// preserved. Identity on an empty allergy list; idempotent.
    pub fn filter_safe(&self, items: &[MenuItem], allergies: &[String]) -> Vec<MenuItem> {
        if allergies.is_empty() {
            return items.to_vec();
        }
        items.iter().filter(|item| self.is_safe(item, allergies)).cloned().collect()
    }

    /// Every allergen hit for the item, one warning per matching
    /// (allergy, ingredient) pair, in ingredient order.
    pub fn explain(&self, item: &MenuItem, allergies: &[String]) -> Vec<AllergenWarning> {
        let mut warnings = Vec::new();
        for ingredient in &item.ingredients {
            let ingredient_norm = ingredient.to_ascii_lowercase();
            for allergy in allergies {
                let allergy_norm = allergy.trim().to_ascii_lowercase();
                if allergy_norm.is_empty() {
                    continue;
                }
                if let Some(match_type) = match_ingredient(&allergy_norm, &ingredient_norm) {
                    warnings.push(AllergenWarning {
                        allergen: allergy_norm.clone(),
                        severity: severity_of(&allergy_norm),
                        ingredient: ingredient.clone(),
                        match_type,
                    });
                }
            }
        }
        warnings
    }

    /// Other catalog items carrying none of the declared allergens, the
    /// reference item excluded by id.
    pub fn safe_alternatives(
        &self,
        item: &MenuItem,
        allergies: &[String],
        catalog_items: &[MenuItem],
        limit: usize,
    ) -> Vec<MenuItem> {
        catalog_items
            .iter()
            .filter(|alternative| alternative.id != item.id)
            .filter(|alternative| self.is_safe(alternative, allergies))
            .take(limit)
            .cloned()
            .collect()
    }
}

fn match_ingredient(allergy: &str, ingredient: &str) -> Option<MatchType> {
    if ingredient.contains(allergy) {
        return Some(MatchType::Direct);
    }
    if synonyms_of(allergy).iter().any(|synonym| ingredient.contains(synonym)) {
        return Some(MatchType::Synonym);
    }
    if variations_of(allergy).iter().any(|variation| ingredient.contains(variation)) {
        return Some(MatchType::Variation);
    }
    None
}

pub fn severity_of(allergen: &str) -> AllergenSeverity {
    match allergen.trim().to_ascii_lowercase().as_str() {
        "peanuts" | "tree nuts" | "shellfish" | "fish" => AllergenSeverity::High,
        "milk" | "eggs" | "soy" | "wheat" => AllergenSeverity::Medium,
        "sesame" | "sulfites" | "celery" | "mustard" => AllergenSeverity::Low,
        _ => AllergenSeverity::Unknown,
    }
}

fn synonyms_of(allergy: &str) -> &'static [&'static str] {
    match allergy {
        "dairy" => &["milk", "cheese", "butter", "cream", "yogurt", "lactose"],
        "gluten" => &["wheat", "barley", "rye", "oats", "flour"],
        "nuts" => &["tree nuts", "almonds", "walnuts", "pecans", "cashews", "pistachios"],
        "peanuts" => &["groundnuts"],
        "shellfish" => &["crab", "lobster", "shrimp", "prawns", "mussels", "clams"],
        "fish" => &["salmon", "tuna", "cod", "mackerel"],
        "eggs" => &["egg", "albumen"],
        "soy" => &["soya", "soybeans", "tofu", "tempeh"],
        "sesame" => &["sesame seeds", "tahini"],
        _ => &[],
    }
}

fn variations_of(allergy: &str) -> &'static [&'static str] {
    match allergy {
        "peanuts" => &["peanut", "arachis", "groundnut"],
        "tree nuts" => &["almond", "cashew", "walnut", "pecan", "hazelnut", "brazil nut"],
        "shellfish" => &["shrimp", "crab", "lobster", "prawn", "crayfish"],
        "fish" => &["salmon", "tuna", "cod", "halibut", "anchovy"],
        "milk" => &["dairy", "lactose", "whey", "casein"],
        "eggs" => &["egg", "albumin", "ovalbumin"],
        "soy" => &["soya", "soybean", "edamame"],
        "wheat" => &["gluten", "flour", "semolina"],
        "sesame" => &["sesame seed", "tahini"],
        "sulfites" => &["sulphite", "sulfite", "sulphur dioxide"],
        "celery" => &["celery seed", "celery salt"],
        "mustard" => &["mustard seed", "mustard powder"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::menu::{CuisineType, MealCategory, MenuItem, MenuItemId};

    use super::{AllergenSeverity, AllergyChecker, MatchType};

    #[test]
    fn empty_allergy_list_is_identity() {
        let checker = AllergyChecker::new();
        let items = vec![item_with_ingredients("satay", &["chicken", "peanut sauce"])];
        assert_eq!(checker.filter_safe(&items, &[]), items);
    }

    #[test]
    fn filter_is_idempotent() {
        let checker = AllergyChecker::new();
        let items = vec![
            item_with_ingredients("satay", &["chicken", "peanut sauce"]),
            item_with_ingredients("salad", &["lettuce", "tomato"]),
        ];
        let allergies = vec!["peanuts".to_string()];

        let once = checker.filter_safe(&items, &allergies);
        let twice = checker.filter_safe(&once, &allergies);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 1);
        assert_eq!(once[0].id.0, "salad");
    }

    #[test]
    fn direct_substring_match_flags_ingredient() {
        let checker = AllergyChecker::new();
        let item = item_with_ingredients("satay", &["chicken", "peanut sauce"]);
        let warnings = checker.explain(&item, &["peanut".to_string()]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].match_type, MatchType::Direct);
        assert_eq!(warnings[0].ingredient, "peanut sauce");
    }

    #[test]
    fn synonym_match_covers_dairy_family() {
        let checker = AllergyChecker::new();
        let item = item_with_ingredients("alfredo", &["pasta", "Cream", "parmesan"]);
        let warnings = checker.explain(&item, &["dairy".to_string()]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].match_type, MatchType::Synonym);
        assert!(!checker.is_safe(&item, &["dairy".to_string()]));
    }

    #[test]
    fn variation_match_catches_groundnut_oil_for_peanut_allergy() {
        let checker = AllergyChecker::new();
        let item = item_with_ingredients("stir fry", &["vegetables", "groundnut oil"]);
        let warnings = checker.explain(&item, &["peanuts".to_string()]);
        assert_eq!(warnings.len(), 1);
        // "groundnut" is in the synonym list as "groundnuts" (no hit) but
        // in the variation list as "groundnut".
        assert_eq!(warnings[0].match_type, MatchType::Variation);
        assert_eq!(warnings[0].severity, AllergenSeverity::High);
    }

    #[test]
    fn zero_ingredient_item_is_safe_by_construction() {
        let checker = AllergyChecker::new();
        let item = item_with_ingredients("mystery", &[]);
        assert!(checker.is_safe(&item, &["peanuts".to_string(), "dairy".to_string()]));
    }

    #[test]
    fn severity_table_tiers() {
        use super::severity_of;
        assert_eq!(severity_of("shellfish"), AllergenSeverity::High);
        assert_eq!(severity_of("Eggs"), AllergenSeverity::Medium);
        assert_eq!(severity_of("sesame"), AllergenSeverity::Low);
        assert_eq!(severity_of("strawberries"), AllergenSeverity::Unknown);
    }

    #[test]
    fn safe_alternatives_skip_reference_and_unsafe_items() {
        let checker = AllergyChecker::new();
        let reference = item_with_ingredients("satay", &["chicken", "peanut sauce"]);
        let catalog = vec![
            reference.clone(),
            item_with_ingredients("pad thai", &["rice noodles", "crushed peanuts"]),
            item_with_ingredients("salad", &["lettuce", "tomato"]),
        ];

        let alternatives =
            checker.safe_alternatives(&reference, &["peanuts".to_string()], &catalog, 5);
        assert_eq!(alternatives.len(), 1);
        assert_eq!(alternatives[0].id.0, "salad");
    }

    fn item_with_ingredients(id: &str, ingredients: &[&str]) -> MenuItem {
        MenuItem {
            id: MenuItemId(id.to_string()),
            name: id.to_string(),
            description: String::new(),
            price: 10.0,
            category: MealCategory::MainCourse,
            cuisine_type: CuisineType::Other,
            ingredients: ingredients.iter().map(|i| i.to_string()).collect(),
            allergens: Vec::new(),
            nutritional_info: serde_json::Value::Null,
            is_vegetarian: false,
            is_vegan: false,
            is_gluten_free: false,
            is_dairy_free: false,
            spice_level: 0,
            preparation_time: 10,
            available: true,
            popularity_score: 0.0,
        }
    }
}
