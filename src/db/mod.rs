//! Local SQLite recipe store.
//!
//! Offline stand-in for the recipe service with the same write semantics.

mod markdown;
mod repository;

pub use markdown::{parse_markdown, render_markdown};
pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recipes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            ingredients TEXT NOT NULL DEFAULT '',
            directions TEXT NOT NULL DEFAULT '',
            description TEXT,
            notes TEXT,
            source TEXT,
            prep_time TEXT,
            cook_time TEXT,
            total_time TEXT,
            servings TEXT,
            categories TEXT,
            nutritional_info TEXT,
            image_url TEXT,
            difficulty TEXT,
            cuisine TEXT,
            ai_generated INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS saved_recipes (
            recipe_id TEXT PRIMARY KEY REFERENCES recipes(id) ON DELETE CASCADE,
            rating INTEGER,
            notes TEXT,
            saved_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tabs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tab_recipes (
            tab_id INTEGER NOT NULL REFERENCES tabs(id) ON DELETE CASCADE,
            recipe_id TEXT NOT NULL REFERENCES recipes(id) ON DELETE CASCADE,
            added_at TEXT NOT NULL,
            PRIMARY KEY (tab_id, recipe_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS recipe_images (
            recipe_id TEXT PRIMARY KEY REFERENCES recipes(id) ON DELETE CASCADE,
            file_name TEXT NOT NULL,
            bytes BLOB NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_recipes_created_at ON recipes(created_at);
        CREATE INDEX IF NOT EXISTS idx_recipes_name ON recipes(name);
        CREATE INDEX IF NOT EXISTS idx_saved_recipes_saved_at ON saved_recipes(saved_at);
        CREATE INDEX IF NOT EXISTS idx_tab_recipes_recipe_id ON tab_recipes(recipe_id);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
