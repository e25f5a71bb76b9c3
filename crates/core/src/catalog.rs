//! Catalog accessor: the engine consumes menu items through a trait and
//! owns no catalog storage itself.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::domain::menu::{CuisineType, MealCategory, MenuItem, MenuItemId};
use crate::domain::preferences::DietaryRestriction;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read menu data file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse menu data file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: serde_json::Error },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MenuFilters {
    pub category: Option<MealCategory>,
    pub cuisine: Option<CuisineType>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub dietary: Vec<DietaryRestriction>,
    pub max_spice: Option<u8>,
    pub text_query: Option<String>,
}

pub trait CatalogSource: Send + Sync {
    /// Every item currently orderable.
    fn list_available_items(&self) -> Vec<MenuItem>;

    fn item_by_id(&self, id: &MenuItemId) -> Option<MenuItem>;

    /// Filtered view of the available items, sorted by popularity
    /// descending.
    fn search(&self, filters: &MenuFilters) -> Vec<MenuItem>;
}

#[derive(Deserialize)]
struct MenuFile {
    items: Vec<MenuItem>,
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    items: Vec<MenuItem>,
}

impl InMemoryCatalog {
    pub fn new(items: Vec<MenuItem>) -> Self {
        Self { items }
    }

    pub fn load_from_file(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
        let menu: MenuFile = serde_json::from_str(&raw)
            .map_err(|source| CatalogError::ParseFile { path: path.to_path_buf(), source })?;
        Ok(Self::new(menu.items))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl CatalogSource for InMemoryCatalog {
    fn list_available_items(&self) -> Vec<MenuItem> {
        self.items.iter().filter(|item| item.available).cloned().collect()
    }

    fn item_by_id(&self, id: &MenuItemId) -> Option<MenuItem> {
        self.items.iter().find(|item| &item.id == id).cloned()
    }

    fn search(&self, filters: &MenuFilters) -> Vec<MenuItem> {
        let mut matches: Vec<MenuItem> = self
            .items
            .iter()
            .filter(|item| item.available && matches_filters(item, filters))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.popularity_score
                .partial_cmp(&a.popularity_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches
    }
}

fn matches_filters(item: &MenuItem, filters: &MenuFilters) -> bool {
    if let Some(category) = filters.category {
        if item.category != category {
            return false;
        }
    }
    if let Some(cuisine) = filters.cuisine {
        if item.cuisine_type != cuisine {
            return false;
        }
    }
    if let Some(price_min) = filters.price_min {
        if item.price < price_min {
            return false;
        }
    }
    if let Some(price_max) = filters.price_max {
        if item.price > price_max {
            return false;
        }
    }
    if let Some(max_spice) = filters.max_spice {
        if item.spice_level > max_spice {
            return false;
        }
    }
    if !filters.dietary.iter().all(|restriction| dietary_tag_matches(item, restriction)) {
        return false;
    }
    if let Some(query) = &filters.text_query {
        let query = query.trim().to_ascii_lowercase();
        if !query.is_empty() {
            let haystack_hit = item.name.to_ascii_lowercase().contains(&query)
                || item.description.to_ascii_lowercase().contains(&query)
                || item
                    .ingredients
                    .iter()
                    .any(|ingredient| ingredient.to_ascii_lowercase().contains(&query));
            if !haystack_hit {
                return false;
            }
        }
    }
    true
}

fn dietary_tag_matches(item: &MenuItem, restriction: &DietaryRestriction) -> bool {
    match restriction {
        DietaryRestriction::Vegetarian => item.is_vegetarian,
        DietaryRestriction::Vegan => item.is_vegan,
        DietaryRestriction::GlutenFree => item.is_gluten_free,
        DietaryRestriction::DairyFree => item.is_dairy_free,
        DietaryRestriction::NutFree | DietaryRestriction::Halal | DietaryRestriction::Kosher => {
            false
        }
    }
}
