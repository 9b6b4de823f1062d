//! Daily suggestion and taste profile models.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Recipe;

/// Themed set of recipes picked for one day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySuggestion {
    pub theme: String,
    pub date: String,
    pub recipes: Vec<Recipe>,
}

/// Taste profile the service derives from searches, saves and ratings.
///
/// Every field is absent until there is data behind it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserPreferences {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_ingredients: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_cuisines: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub avg_rating_by_cuisine: BTreeMap<String, f64>,
}
