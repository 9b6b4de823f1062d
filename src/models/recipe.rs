//! Recipe model matching the recipe service's recipe payload.

use serde::{Deserialize, Serialize};

use super::TabId;

/// Provenance filter for library listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RecipeSource {
    #[serde(rename = "ai")]
    Generated,
    #[serde(rename = "imported")]
    Imported,
}

impl RecipeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipeSource::Generated => "ai",
            RecipeSource::Imported => "imported",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "ai" | "generated" => Some(RecipeSource::Generated),
            "imported" => Some(RecipeSource::Imported),
            _ => None,
        }
    }
}

/// A recipe as returned by the recipe service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ingredients: String,
    #[serde(default)]
    pub directions: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub prep_time: Option<String>,
    #[serde(default)]
    pub cook_time: Option<String>,
    #[serde(default)]
    pub total_time: Option<String>,
    #[serde(default)]
    pub servings: Option<String>,
    /// JSON encoded list of category names, see [`Recipe::category_list`]
    #[serde(default)]
    pub categories: Option<String>,
    #[serde(default)]
    pub nutritional_info: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub cuisine: Option<String>,
    #[serde(default)]
    pub ai_generated: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub is_saved: bool,
    #[serde(default)]
    pub rating: Option<u8>,
}

impl Recipe {
    pub fn provenance(&self) -> RecipeSource {
        if self.ai_generated {
            RecipeSource::Generated
        } else {
            RecipeSource::Imported
        }
    }

    pub fn category_list(&self) -> Vec<String> {
        parse_categories(self.categories.as_deref())
    }

    pub fn ingredient_lines(&self) -> Vec<&str> {
        non_empty_lines(&self.ingredients)
    }

    pub fn direction_lines(&self) -> Vec<&str> {
        non_empty_lines(&self.directions)
    }
}

/// Parse a stored category list. Anything that is not a JSON array of strings
/// yields an empty list.
pub fn parse_categories(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str::<Vec<String>>(s).ok())
        .unwrap_or_default()
}

fn non_empty_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// One page of a recipe listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipePage {
    pub recipes: Vec<Recipe>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

impl RecipePage {
    pub fn total_pages(&self) -> u32 {
        crate::view::total_pages(self.total, self.per_page)
    }
}

/// Parameters of a library listing request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RecipeQuery {
    pub page: u32,
    pub per_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<RecipeSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab_id: Option<TabId>,
}

/// Request body for generating recipes from ingredients.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerateRequest {
    pub ingredients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_preferences: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine_preference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_cook_time: Option<String>,
}

/// Response body for recipe generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub recipes: Vec<Recipe>,
}

/// Request body for saving a recipe.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SaveRecipeRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

/// Request body for rating a recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateRecipeRequest {
    pub rating: u8,
}

/// Ingredient ranked by how often it was searched for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopIngredient {
    pub ingredient: String,
    pub count: u32,
}

/// Fields for a recipe written into the local store.
#[derive(Debug, Clone, Default)]
pub struct NewRecipe {
    pub name: String,
    pub ingredients: String,
    pub directions: String,
    pub description: Option<String>,
    pub source: Option<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub total_time: Option<String>,
    pub servings: Option<String>,
    pub categories: Vec<String>,
    pub difficulty: Option<String>,
    pub cuisine: Option<String>,
    pub ai_generated: bool,
}

impl NewRecipe {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
