use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MenuItemId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealCategory {
    Appetizer,
    MainCourse,
    Dessert,
    Beverage,
    SideDish,
}

impl MealCategory {
    pub const ALL: [Self; 5] =
        [Self::Appetizer, Self::MainCourse, Self::Dessert, Self::Beverage, Self::SideDish];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Appetizer => "appetizer",
            Self::MainCourse => "main_course",
            Self::Dessert => "dessert",
            Self::Beverage => "beverage",
            Self::SideDish => "side_dish",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CuisineType {
    Italian,
    Indian,
    Chinese,
    Japanese,
    Mexican,
    Thai,
    French,
    Greek,
    American,
    Other,
}

impl CuisineType {
    pub const ALL: [Self; 10] = [
        Self::Italian,
        Self::Indian,
        Self::Chinese,
        Self::Japanese,
        Self::Mexican,
        Self::Thai,
        Self::French,
        Self::Greek,
        Self::American,
        Self::Other,
    ];

    /// Forgiving parse for free-text cuisine labels; anything unrecognized
    /// lands in `Other` rather than failing catalog loads.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "italian" => Self::Italian,
            "indian" => Self::Indian,
            "chinese" => Self::Chinese,
            "japanese" => Self::Japanese,
            "mexican" => Self::Mexican,
            "thai" => Self::Thai,
            "french" => Self::French,
            "greek" => Self::Greek,
            "american" => Self::American,
            _ => Self::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Italian => "italian",
            Self::Indian => "indian",
            Self::Chinese => "chinese",
            Self::Japanese => "japanese",
            Self::Mexican => "mexican",
            Self::Thai => "thai",
            Self::French => "french",
            Self::Greek => "greek",
            Self::American => "american",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for CuisineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable catalog record. Created by the catalog source; the engine
/// treats it as read-only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MenuItem {
    pub id: MenuItemId,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category: MealCategory,
    pub cuisine_type: CuisineType,
    pub ingredients: Vec<String>,
    pub allergens: Vec<String>,
    #[serde(default)]
    pub nutritional_info: serde_json::Value,
    pub is_vegetarian: bool,
    pub is_vegan: bool,
    pub is_gluten_free: bool,
    pub is_dairy_free: bool,
    pub spice_level: u8,
    pub preparation_time: u32,
    pub available: bool,
    #[serde(default)]
    pub popularity_score: f64,
}

/// A catalog item paired with its computed relevance for one preference
/// set. Transient: recomputed on every scoring call, never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub item: MenuItem,
    pub score: f64,
    pub reasoning: Vec<String>,
}
