//! Boundary to the recipe service.
//!
//! The consistency layer only talks to the service through [`RecipeService`];
//! [`HttpRecipeService`] speaks the JSON API and `crate::db::Repository` is the
//! offline SQLite store.

mod http;

pub use http::HttpRecipeService;

use async_trait::async_trait;

use crate::errors::ClientResult;
use crate::models::{
    BackfillResult, DailySuggestion, ExportRequest, GenerateRequest, ImportResult, ImportSource,
    Recipe, RecipePage, RecipeQuery, Tab, TabId, TopIngredient, UpdateTabRequest, UploadFile, UserPreferences,
};

/// Typed request/response contract of the recipe service.
#[async_trait]
pub trait RecipeService: Send + Sync {
    // Recipes
    async fn list_recipes(&self, query: &RecipeQuery) -> ClientResult<RecipePage>;
    async fn list_saved(&self, page: u32, per_page: u32) -> ClientResult<RecipePage>;
    async fn get_recipe(&self, id: &str) -> ClientResult<Recipe>;
    async fn generate(&self, request: &GenerateRequest) -> ClientResult<Vec<Recipe>>;
    async fn save_recipe(&self, id: &str, notes: Option<&str>) -> ClientResult<Recipe>;
    async fn unsave_recipe(&self, id: &str) -> ClientResult<()>;
    async fn rate_recipe(&self, id: &str, rating: u8) -> ClientResult<Recipe>;
    async fn upload_image(&self, id: &str, image: &UploadFile) -> ClientResult<Recipe>;
    async fn delete_image(&self, id: &str) -> ClientResult<()>;

    // Import / export
    async fn import(&self, source: &ImportSource) -> ClientResult<ImportResult>;
    async fn export(&self, request: &ExportRequest) -> ClientResult<Vec<u8>>;
    async fn backfill_images(&self) -> ClientResult<BackfillResult>;

    // Tabs
    async fn list_tabs(&self) -> ClientResult<Vec<Tab>>;
    async fn create_tab(&self, name: &str) -> ClientResult<Tab>;
    async fn update_tab(&self, id: TabId, request: &UpdateTabRequest) -> ClientResult<Tab>;
    async fn delete_tab(&self, id: TabId) -> ClientResult<()>;
    async fn add_to_tab(&self, id: TabId, recipe_ids: &[String]) -> ClientResult<Tab>;
    async fn remove_from_tab(&self, id: TabId, recipe_id: &str) -> ClientResult<()>;
    async fn recipe_tab_ids(&self, recipe_id: &str) -> ClientResult<Vec<TabId>>;

    // Suggestions and stats
    async fn daily_suggestions(&self) -> ClientResult<DailySuggestion>;
    async fn refresh_suggestions(&self) -> ClientResult<DailySuggestion>;
    async fn top_ingredients(&self, limit: u32) -> ClientResult<Vec<TopIngredient>>;
    async fn user_preferences(&self) -> ClientResult<UserPreferences>;
}
