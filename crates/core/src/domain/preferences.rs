use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DietaryRestriction {
    Vegetarian,
    Vegan,
    GlutenFree,
    DairyFree,
    NutFree,
    Halal,
    Kosher,
}

impl DietaryRestriction {
    pub const ALL: [Self; 7] = [
        Self::Vegetarian,
        Self::Vegan,
        Self::GlutenFree,
        Self::DairyFree,
        Self::NutFree,
        Self::Halal,
        Self::Kosher,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Vegetarian => "vegetarian",
            Self::Vegan => "vegan",
            Self::GlutenFree => "gluten_free",
            Self::DairyFree => "dairy_free",
            Self::NutFree => "nut_free",
            Self::Halal => "halal",
            Self::Kosher => "kosher",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Result<Self, DomainError> {
        if min < 0.0 || max < 0.0 || min > max {
            return Err(DomainError::InvalidPriceRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, price: f64) -> bool {
        self.min <= price && price <= self.max
    }
}

/// One user's stated preferences. Replaced wholesale whenever a turn
/// supplies a new payload; individual fields are never merged.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub dietary_restrictions: Vec<DietaryRestriction>,
    pub allergies: Vec<String>,
    pub price_range: Option<PriceRange>,
    pub favorite_cuisines: Vec<String>,
    pub disliked_ingredients: Vec<String>,
    pub dislikes: Vec<String>,
    pub spice_preference: Option<u8>,
}

impl UserPreferences {
    /// Number of set facets among the six that count toward sufficiency:
    /// dietary restrictions, favorite cuisines, a complete price range,
    /// allergies, spice preference, dislikes.
    pub fn facet_count(&self) -> usize {
        [
            !self.dietary_restrictions.is_empty(),
            !self.favorite_cuisines.is_empty(),
            self.price_range.is_some(),
            !self.allergies.is_empty(),
            self.spice_preference.is_some(),
            !self.dislikes.is_empty(),
        ]
        .into_iter()
        .filter(|set| *set)
        .count()
    }
}

#[cfg(test)]
mod tests {
    use super::{DietaryRestriction, PriceRange, UserPreferences};

    #[test]
    fn price_range_rejects_inverted_and_negative_bounds() {
        assert!(PriceRange::new(20.0, 10.0).is_err());
        assert!(PriceRange::new(-1.0, 10.0).is_err());
        let range = PriceRange::new(10.0, 20.0).expect("valid range");
        assert!(range.contains(10.0));
        assert!(range.contains(20.0));
        assert!(!range.contains(20.01));
    }

    #[test]
    fn dietary_labels_match_the_wire_encoding() {
        for restriction in DietaryRestriction::ALL {
            let wire = serde_json::to_value(restriction).expect("restriction serializes");
            assert_eq!(wire, serde_json::Value::String(restriction.label().to_string()));
        }
    }

    #[test]
    fn facet_count_counts_only_set_facets() {
        assert_eq!(UserPreferences::default().facet_count(), 0);

        let preferences = UserPreferences {
            dietary_restrictions: vec![DietaryRestriction::Vegetarian],
            favorite_cuisines: vec!["italian".to_string()],
            price_range: Some(PriceRange::new(10.0, 20.0).expect("valid range")),
            ..UserPreferences::default()
        };
        assert_eq!(preferences.facet_count(), 3);

        let preferences = UserPreferences {
            allergies: vec!["peanuts".to_string()],
            spice_preference: Some(2),
            dislikes: vec!["olives".to_string()],
            ..preferences
        };
        assert_eq!(preferences.facet_count(), 6);
    }
}
