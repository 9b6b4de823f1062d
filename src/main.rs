//! Recipe Box command-line client
//!
//! Every command runs through a [`RecipeSession`], so reads are cached and
//! writes keep the cache consistent for the rest of the invocation.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use recipe_box::models::{
    ExportFormat, ExportRequest, ExportScope, GenerateRequest, ImportSource, RecipeSource, TabId,
    UploadFile,
};
use recipe_box::{ClientError, Config, RecipeSession};

#[derive(Parser, Debug)]
#[command(name = "recipe-box", version, about = "Recipe Box client", long_about = None)]
struct Cli {
    /// Recipe service base URL, including the /api prefix
    #[arg(long, env = "RECIPE_API_URL")]
    api_url: Option<String>,

    /// Use a local SQLite store instead of the recipe service
    #[arg(long, env = "RECIPE_LOCAL_DB")]
    local_db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the library with optional filters
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        source: Option<SourceArg>,
        #[arg(long)]
        tab: Option<TabId>,
    },
    /// List saved recipes
    Saved {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show one recipe
    Show { id: String },
    /// List tabs with their recipe counts
    Tabs,
    /// Create a tab
    TabCreate { name: String },
    /// Rename a tab
    TabRename { id: TabId, name: String },
    /// Delete a tab
    TabDelete { id: TabId },
    /// Add a recipe to a tab, or remove it if it is already there
    Toggle { recipe: String, tab: TabId },
    /// Save a recipe
    Save {
        id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Remove a recipe from saved recipes
    Unsave { id: String },
    /// Rate a recipe from 1 to 5
    Rate { id: String, rating: u8 },
    /// Generate recipes from ingredients
    Generate {
        #[arg(required = true)]
        ingredients: Vec<String>,
        #[arg(long)]
        cuisine: Option<String>,
    },
    /// Import recipes from a URL or from text/markdown files
    Import {
        #[arg(long, conflicts_with = "files")]
        url: Option<String>,
        files: Vec<PathBuf>,
    },
    /// Search images for recipes that have none
    Backfill,
    /// Show the taste profile derived from saves and ratings
    Preferences,
    /// Show today's suggestions
    Suggestions {
        #[arg(long)]
        refresh: bool,
    },
    /// Export a recipe (by id), the saved recipes or the whole library
    Export {
        /// `saved`, `library` or a recipe id
        scope: String,
        #[arg(long, value_enum, default_value_t = FormatArg::Markdown)]
        format: FormatArg,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SourceArg {
    Ai,
    Imported,
}

impl From<SourceArg> for RecipeSource {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::Ai => RecipeSource::Generated,
            SourceArg::Imported => RecipeSource::Imported,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Paprika,
    Markdown,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Paprika => ExportFormat::Paprika,
            FormatArg::Markdown => ExportFormat::Markdown,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env();
    if let Some(url) = cli.api_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }
    if cli.local_db.is_some() {
        config.local_db_path = cli.local_db;
    }

    // Initialize logging; stdout is reserved for command output
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);
    if config.log_json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let session = RecipeSession::from_config(config).await?;
    let result = run(&session, cli.command).await;

    for notice in session.active_notices() {
        eprintln!("{}", notice.message);
    }
    session.end().await;

    result.map_err(Into::into)
}

async fn run(session: &RecipeSession, command: Commands) -> Result<(), ClientError> {
    match command {
        Commands::List {
            page,
            search,
            source,
            tab,
        } => {
            session.update_view(|view| {
                view.set_search(search.as_deref().unwrap_or_default());
                view.set_source(source.map(Into::into));
                view.set_tab(tab);
                view.set_page(page);
            });
            print_json(&session.library().await?)
        }
        Commands::Saved { page } => print_json(&session.saved(page).await?),
        Commands::Show { id } => match session.recipe(&id).await? {
            Some(recipe) => print_json(&recipe),
            None => Err(ClientError::NotFound(format!("Recipe {} not found", id))),
        },
        Commands::Tabs => print_json(&session.tabs().await?),
        Commands::TabCreate { name } => print_json(&session.create_tab(&name).await?),
        Commands::TabRename { id, name } => print_json(&session.rename_tab(id, &name).await?),
        Commands::TabDelete { id } => {
            session.delete_tab(id).await?;
            print_json(&json!({ "deleted": id }))
        }
        Commands::Toggle { recipe, tab } => {
            session.recipe_tabs(&recipe).await?;
            let change = session.toggle_tab(&recipe, tab).await?;
            print_json(&json!({
                "recipe_id": recipe,
                "tab_id": tab,
                "change": format!("{:?}", change).to_lowercase(),
            }))
        }
        Commands::Save { id, notes } => print_json(&session.save(&id, notes.as_deref()).await?),
        Commands::Unsave { id } => {
            session.unsave(&id).await?;
            print_json(&json!({ "unsaved": id }))
        }
        Commands::Rate { id, rating } => print_json(&session.rate(&id, rating).await?),
        Commands::Generate {
            ingredients,
            cuisine,
        } => {
            let results = session
                .generate(GenerateRequest {
                    ingredients,
                    cuisine_preference: cuisine,
                    ..Default::default()
                })
                .await?;
            print_json(&results.recipes())
        }
        Commands::Import { url, files } => {
            let source = match url {
                Some(url) => ImportSource::Url(url),
                None => ImportSource::Files(read_files(&files).await?),
            };
            print_json(&session.import(source).await?)
        }
        Commands::Backfill => print_json(&session.backfill_images().await?),
        Commands::Preferences => print_json(&session.preferences().await?),
        Commands::Suggestions { refresh } => {
            let suggestion = if refresh {
                session.refresh_suggestions().await?
            } else {
                session.daily_suggestions().await?
            };
            print_json(&suggestion)
        }
        Commands::Export { scope, format, out } => {
            let scope = match scope.as_str() {
                "saved" => ExportScope::Saved,
                "library" => ExportScope::Library,
                id => ExportScope::Recipe(id.to_string()),
            };
            let request = ExportRequest {
                format: format.into(),
                scope,
            };
            let bytes = session.export(&request).await?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, &bytes)
                        .await
                        .map_err(|e| ClientError::Internal(format!("Failed to write export: {}", e)))?;
                    tracing::info!(path = %path.display(), bytes = bytes.len(), "Export written");
                    Ok(())
                }
                None => {
                    println!("{}", String::from_utf8_lossy(&bytes));
                    Ok(())
                }
            }
        }
    }
}

async fn read_files(paths: &[PathBuf]) -> Result<Vec<UploadFile>, ClientError> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            ClientError::Validation(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        files.push(UploadFile::new(name, bytes));
    }
    Ok(files)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), ClientError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
