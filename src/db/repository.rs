//! Database repository implementing the recipe service against SQLite.
//!
//! Mirrors the service's write semantics: tab counts are computed from the
//! membership table, rating a recipe saves it, unsaving deletes the saved row.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::markdown::{parse_markdown, render_collection, render_markdown};
use crate::errors::{ClientError, ClientResult};
use crate::models::{
    BackfillResult, DailySuggestion, ExportFormat, ExportRequest, ExportScope, GenerateRequest,
    ImportResult, ImportSource, NewRecipe, Recipe, RecipePage, RecipeQuery, RecipeSource, Tab,
    TabId, TopIngredient, UpdateTabRequest, UploadFile, UserPreferences,
};
use crate::remote::RecipeService;

const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const IMPORT_FILE_EXTENSIONS: &[&str] = &[".txt", ".md"];

const RECIPE_SELECT: &str = r#"
    SELECT r.id, r.name, r.ingredients, r.directions, r.description,
           COALESCE(s.notes, r.notes) AS notes, r.source, r.prep_time, r.cook_time,
           r.total_time, r.servings, r.categories, r.nutritional_info, r.image_url,
           r.difficulty, r.cuisine, r.ai_generated, r.created_at,
           CASE WHEN s.recipe_id IS NULL THEN 0 ELSE 1 END AS is_saved,
           s.rating AS rating
    FROM recipes r
    LEFT JOIN saved_recipes s ON s.recipe_id = r.id
"#;

const TAB_SELECT: &str = r#"
    SELECT t.id, t.name, t.position,
           (SELECT COUNT(*) FROM tab_recipes tr WHERE tr.tab_id = t.id) AS recipe_count
    FROM tabs t
"#;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== RECIPE OPERATIONS ====================

    /// Insert a recipe and return it as the service would.
    pub async fn insert_recipe(&self, recipe: &NewRecipe) -> ClientResult<Recipe> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let categories_json = if recipe.categories.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&recipe.categories)?)
        };

        sqlx::query(
            "INSERT INTO recipes (id, name, ingredients, directions, description, source, prep_time, cook_time, total_time, servings, categories, difficulty, cuisine, ai_generated, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&recipe.name)
        .bind(&recipe.ingredients)
        .bind(&recipe.directions)
        .bind(&recipe.description)
        .bind(&recipe.source)
        .bind(&recipe.prep_time)
        .bind(&recipe.cook_time)
        .bind(&recipe.total_time)
        .bind(&recipe.servings)
        .bind(&categories_json)
        .bind(&recipe.difficulty)
        .bind(&recipe.cuisine)
        .bind(recipe.ai_generated as i32)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_recipe(&id).await
    }

    async fn find_recipe(&self, id: &str) -> ClientResult<Option<Recipe>> {
        let row = sqlx::query(&format!("{} WHERE r.id = ?", RECIPE_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(recipe_from_row))
    }

    async fn require_recipe(&self, id: &str) -> ClientResult<()> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM recipes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        exists
            .map(|_| ())
            .ok_or_else(|| ClientError::NotFound("Recipe not found".to_string()))
    }

    async fn name_exists(&self, name: &str) -> ClientResult<bool> {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM recipes WHERE lower(name) = lower(?) LIMIT 1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(exists.is_some())
    }

    async fn all_recipes(&self, saved_only: bool) -> ClientResult<Vec<Recipe>> {
        let filter = if saved_only {
            "WHERE s.recipe_id IS NOT NULL ORDER BY s.saved_at DESC"
        } else {
            "ORDER BY r.created_at DESC"
        };
        let rows = sqlx::query(&format!("{} {}", RECIPE_SELECT, filter))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(recipe_from_row).collect())
    }

    async fn import_markdown_files(&self, files: &[UploadFile]) -> ClientResult<ImportResult> {
        let mut imported = 0;
        let mut skipped = 0;
        let mut errors = Vec::new();

        for file in files {
            let allowed = file
                .extension()
                .map(|ext| IMPORT_FILE_EXTENSIONS.contains(&ext.as_str()))
                .unwrap_or(false);
            if !allowed {
                errors.push(format!(
                    "Skipped '{}': must be .txt or .md",
                    file.file_name
                ));
                continue;
            }

            let Ok(text) = std::str::from_utf8(&file.bytes) else {
                errors.push(format!(
                    "Skipped '{}': could not decode as UTF-8",
                    file.file_name
                ));
                continue;
            };

            for recipe in parse_markdown(text) {
                if self.name_exists(&recipe.name).await? {
                    skipped += 1;
                    continue;
                }
                self.insert_recipe(&recipe).await?;
                imported += 1;
            }
        }

        let mut message = format!(
            "Imported {} recipes, skipped {} duplicates",
            imported, skipped
        );
        if !errors.is_empty() {
            message.push_str(&format!(". Errors: {}", errors.join("; ")));
        }

        tracing::info!(imported, skipped, "Imported recipes from files");
        Ok(ImportResult {
            imported,
            skipped,
            message,
            errors,
        })
    }

    // ==================== TAB OPERATIONS ====================

    async fn find_tab(&self, id: TabId) -> ClientResult<Option<Tab>> {
        let row = sqlx::query(&format!("{} WHERE t.id = ?", TAB_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(tab_from_row))
    }

    async fn require_tab(&self, id: TabId) -> ClientResult<Tab> {
        self.find_tab(id)
            .await?
            .ok_or_else(|| ClientError::NotFound("Tab not found".to_string()))
    }
}

#[async_trait]
impl RecipeService for Repository {
    async fn list_recipes(&self, query: &RecipeQuery) -> ClientResult<RecipePage> {
        let page = query.page.max(1);
        let offset = (page as i64 - 1) * query.per_page as i64;

        let mut count = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM recipes r LEFT JOIN saved_recipes s ON s.recipe_id = r.id",
        );
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Sqlite>::new(RECIPE_SELECT);
        push_filters(&mut select, query);
        select.push(" ORDER BY r.created_at DESC, r.id LIMIT ");
        select.push_bind(query.per_page as i64);
        select.push(" OFFSET ");
        select.push_bind(offset);
        let rows = select.build().fetch_all(&self.pool).await?;

        Ok(RecipePage {
            recipes: rows.iter().map(recipe_from_row).collect(),
            total: total.max(0) as u64,
            page,
            per_page: query.per_page,
        })
    }

    async fn list_saved(&self, page: u32, per_page: u32) -> ClientResult<RecipePage> {
        let page = page.max(1);
        let offset = (page as i64 - 1) * per_page as i64;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM saved_recipes")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(&format!(
            "{} WHERE s.recipe_id IS NOT NULL ORDER BY s.saved_at DESC, r.id LIMIT ? OFFSET ?",
            RECIPE_SELECT
        ))
        .bind(per_page as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(RecipePage {
            recipes: rows.iter().map(recipe_from_row).collect(),
            total: total.max(0) as u64,
            page,
            per_page,
        })
    }

    async fn get_recipe(&self, id: &str) -> ClientResult<Recipe> {
        self.find_recipe(id)
            .await?
            .ok_or_else(|| ClientError::NotFound("Recipe not found".to_string()))
    }

    async fn generate(&self, _request: &GenerateRequest) -> ClientResult<Vec<Recipe>> {
        Err(ClientError::Unsupported(
            "Recipe generation requires the recipe service".to_string(),
        ))
    }

    async fn save_recipe(&self, id: &str, notes: Option<&str>) -> ClientResult<Recipe> {
        self.require_recipe(id).await?;

        let already: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM saved_recipes WHERE recipe_id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        if already.is_some() {
            return Err(ClientError::Conflict("Recipe already saved".to_string()));
        }

        sqlx::query("INSERT INTO saved_recipes (recipe_id, notes, saved_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(notes)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        self.get_recipe(id).await
    }

    async fn unsave_recipe(&self, id: &str) -> ClientResult<()> {
        let result = sqlx::query("DELETE FROM saved_recipes WHERE recipe_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ClientError::NotFound("Saved recipe not found".to_string()));
        }
        Ok(())
    }

    async fn rate_recipe(&self, id: &str, rating: u8) -> ClientResult<Recipe> {
        if !(1..=5).contains(&rating) {
            return Err(ClientError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        self.require_recipe(id).await?;

        // Rating an unsaved recipe saves it
        sqlx::query(
            "INSERT INTO saved_recipes (recipe_id, rating, saved_at) VALUES (?, ?, ?) ON CONFLICT(recipe_id) DO UPDATE SET rating = excluded.rating"
        )
        .bind(id)
        .bind(rating as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get_recipe(id).await
    }

    async fn upload_image(&self, id: &str, image: &UploadFile) -> ClientResult<Recipe> {
        let extension = image.extension().unwrap_or_default();
        if !ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(ClientError::Validation(format!(
                "File type not allowed. Use: {}",
                ALLOWED_IMAGE_EXTENSIONS.join(", ")
            )));
        }
        if image.bytes.len() > MAX_IMAGE_BYTES {
            return Err(ClientError::Validation(
                "File too large. Maximum 5MB.".to_string(),
            ));
        }
        self.require_recipe(id).await?;

        let image_url = format!("/images/{}{}", id, extension);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO recipe_images (recipe_id, file_name, bytes) VALUES (?, ?, ?) ON CONFLICT(recipe_id) DO UPDATE SET file_name = excluded.file_name, bytes = excluded.bytes"
        )
        .bind(id)
        .bind(&image.file_name)
        .bind(&image.bytes)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE recipes SET image_url = ? WHERE id = ?")
            .bind(&image_url)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.get_recipe(id).await
    }

    async fn delete_image(&self, id: &str) -> ClientResult<()> {
        self.require_recipe(id).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM recipe_images WHERE recipe_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE recipes SET image_url = NULL WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn import(&self, source: &ImportSource) -> ClientResult<ImportResult> {
        match source {
            ImportSource::Files(files) => self.import_markdown_files(files).await,
            other => Err(ClientError::Unsupported(format!(
                "Import from {} requires the recipe service",
                other.describe()
            ))),
        }
    }

    async fn export(&self, request: &ExportRequest) -> ClientResult<Vec<u8>> {
        if request.format == ExportFormat::Paprika {
            return Err(ClientError::Unsupported(
                "Paprika export requires the recipe service".to_string(),
            ));
        }

        let text = match &request.scope {
            ExportScope::Recipe(id) => render_markdown(&self.get_recipe(id).await?),
            ExportScope::Saved => render_collection(&self.all_recipes(true).await?),
            ExportScope::Library => render_collection(&self.all_recipes(false).await?),
        };
        Ok(text.into_bytes())
    }

    async fn backfill_images(&self) -> ClientResult<BackfillResult> {
        Err(ClientError::Unsupported(
            "Image backfill requires the recipe service".to_string(),
        ))
    }

    async fn list_tabs(&self) -> ClientResult<Vec<Tab>> {
        let rows = sqlx::query(&format!("{} ORDER BY t.position, t.id", TAB_SELECT))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(tab_from_row).collect())
    }

    async fn create_tab(&self, name: &str) -> ClientResult<Tab> {
        let max_position: Option<i64> = sqlx::query_scalar("SELECT MAX(position) FROM tabs")
            .fetch_one(&self.pool)
            .await?;

        let result = sqlx::query("INSERT INTO tabs (name, position, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(max_position.map(|p| p + 1).unwrap_or(0))
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        self.require_tab(result.last_insert_rowid()).await
    }

    async fn update_tab(&self, id: TabId, request: &UpdateTabRequest) -> ClientResult<Tab> {
        let existing = self.require_tab(id).await?;
        let name = request.name.as_ref().unwrap_or(&existing.name);
        let position = request.position.unwrap_or(existing.position);

        sqlx::query("UPDATE tabs SET name = ?, position = ? WHERE id = ?")
            .bind(name)
            .bind(position)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.require_tab(id).await
    }

    async fn delete_tab(&self, id: TabId) -> ClientResult<()> {
        let result = sqlx::query("DELETE FROM tabs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ClientError::NotFound("Tab not found".to_string()));
        }
        Ok(())
    }

    async fn add_to_tab(&self, id: TabId, recipe_ids: &[String]) -> ClientResult<Tab> {
        self.require_tab(id).await?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;
        for recipe_id in recipe_ids {
            // Unknown recipes and existing memberships are skipped
            sqlx::query(
                "INSERT OR IGNORE INTO tab_recipes (tab_id, recipe_id, added_at) SELECT ?, id, ? FROM recipes WHERE id = ?"
            )
            .bind(id)
            .bind(&now)
            .bind(recipe_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.require_tab(id).await
    }

    async fn remove_from_tab(&self, id: TabId, recipe_id: &str) -> ClientResult<()> {
        let result = sqlx::query("DELETE FROM tab_recipes WHERE tab_id = ? AND recipe_id = ?")
            .bind(id)
            .bind(recipe_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ClientError::NotFound(
                "Recipe not in this tab".to_string(),
            ));
        }
        Ok(())
    }

    async fn recipe_tab_ids(&self, recipe_id: &str) -> ClientResult<Vec<TabId>> {
        let ids = sqlx::query_scalar(
            "SELECT tab_id FROM tab_recipes WHERE recipe_id = ? ORDER BY tab_id",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn daily_suggestions(&self) -> ClientResult<DailySuggestion> {
        Err(ClientError::Unsupported(
            "Daily suggestions require the recipe service".to_string(),
        ))
    }

    async fn refresh_suggestions(&self) -> ClientResult<DailySuggestion> {
        self.daily_suggestions().await
    }

    async fn top_ingredients(&self, _limit: u32) -> ClientResult<Vec<TopIngredient>> {
        Err(ClientError::Unsupported(
            "Ingredient statistics require the recipe service".to_string(),
        ))
    }

    /// Cuisine preferences from saved and rated recipes. Ingredient searches
    /// are only tracked by the service, so `top_ingredients` stays empty.
    async fn user_preferences(&self) -> ClientResult<UserPreferences> {
        let top_cuisines: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.cuisine FROM recipes r
            JOIN saved_recipes s ON s.recipe_id = r.id
            WHERE r.cuisine IS NOT NULL
            GROUP BY r.cuisine
            ORDER BY COUNT(*) DESC, r.cuisine
            LIMIT 5
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let rows = sqlx::query(
            r#"
            SELECT r.cuisine, AVG(s.rating) AS avg_rating FROM recipes r
            JOIN saved_recipes s ON s.recipe_id = r.id
            WHERE s.rating IS NOT NULL AND r.cuisine IS NOT NULL
            GROUP BY r.cuisine
            ORDER BY avg_rating DESC, r.cuisine
            LIMIT 5
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let avg_rating_by_cuisine: BTreeMap<String, f64> = rows
            .iter()
            .map(|row| {
                let cuisine: String = row.get("cuisine");
                let avg: f64 = row.get("avg_rating");
                (cuisine, (avg * 10.0).round() / 10.0)
            })
            .collect();

        Ok(UserPreferences {
            top_ingredients: Vec::new(),
            top_cuisines,
            avg_rating_by_cuisine,
        })
    }
}

/// Append the WHERE clause for a library query.
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &RecipeQuery) {
    builder.push(" WHERE 1 = 1");

    if let Some(ref search) = query.search {
        builder.push(" AND r.name LIKE ");
        builder.push_bind(format!("%{}%", escape_like(search)));
        builder.push(" ESCAPE '\\'");
    }

    if let Some(source) = query.source {
        builder.push(" AND r.ai_generated = ");
        builder.push_bind(matches!(source, RecipeSource::Generated) as i32);
    }

    if let Some(tab_id) = query.tab_id {
        builder.push(" AND r.id IN (SELECT recipe_id FROM tab_recipes WHERE tab_id = ");
        builder.push_bind(tab_id);
        builder.push(")");
    }
}

/// Escape `LIKE` wildcards so user text matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn recipe_from_row(row: &sqlx::sqlite::SqliteRow) -> Recipe {
    let ai_generated: i32 = row.get("ai_generated");
    let is_saved: i32 = row.get("is_saved");
    let rating: Option<i64> = row.get("rating");
    Recipe {
        id: row.get("id"),
        name: row.get("name"),
        ingredients: row.get("ingredients"),
        directions: row.get("directions"),
        description: row.get("description"),
        notes: row.get("notes"),
        source: row.get("source"),
        prep_time: row.get("prep_time"),
        cook_time: row.get("cook_time"),
        total_time: row.get("total_time"),
        servings: row.get("servings"),
        categories: row.get("categories"),
        nutritional_info: row.get("nutritional_info"),
        image_url: row.get("image_url"),
        difficulty: row.get("difficulty"),
        cuisine: row.get("cuisine"),
        ai_generated: ai_generated != 0,
        created_at: row.get("created_at"),
        is_saved: is_saved != 0,
        rating: rating.and_then(|r| u8::try_from(r).ok()),
    }
}

fn tab_from_row(row: &sqlx::sqlite::SqliteRow) -> Tab {
    let recipe_count: i64 = row.get("recipe_count");
    Tab {
        id: row.get("id"),
        name: row.get("name"),
        position: row.get("position"),
        recipe_count: recipe_count.max(0) as u64,
    }
}
