//! Mutation coordinator.
//!
//! Every write goes through [`MutationCoordinator::mutate`]. A mutation is
//! validated, sent to the service and, only once the service confirms it,
//! patched into every cached value that holds the affected recipe. Fetches of
//! recipe-holding queries still in flight at that point complete as stale,
//! since their response may predate the write. Then the invalidation set is
//! marked stale. A failed mutation leaves the cache as it was.

mod inflight;
mod patch;

pub use inflight::{EntityKey, InFlight, InFlightGuard};
pub use patch::{patch_recipe, patch_value};

use std::sync::Arc;

use crate::cache::{QueryCache, QueryFamily, QueryKey, QueryKind, QueryValue};
use crate::errors::{ClientError, ClientResult};
use crate::models::{
    normalize_tab_name, BackfillResult, DailySuggestion, GenerateRequest, ImportResult,
    ImportSource, Recipe, Tab, TabId, UpdateTabRequest, UploadFile,
};
use crate::remote::RecipeService;

/// A write against the recipe service.
#[derive(Debug, Clone)]
pub enum Mutation {
    Save {
        recipe_id: String,
        notes: Option<String>,
    },
    Unsave {
        recipe_id: String,
    },
    Rate {
        recipe_id: String,
        rating: u8,
    },
    UploadImage {
        recipe_id: String,
        image: UploadFile,
    },
    DeleteImage {
        recipe_id: String,
    },
    Generate(GenerateRequest),
    Import(ImportSource),
    BackfillImages,
    RefreshSuggestions,
    CreateTab {
        name: String,
    },
    RenameTab {
        tab_id: TabId,
        name: String,
    },
    DeleteTab {
        tab_id: TabId,
    },
    AddToTab {
        tab_id: TabId,
        recipe_ids: Vec<String>,
    },
    RemoveFromTab {
        tab_id: TabId,
        recipe_id: String,
    },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::Save { .. } => "save",
            Mutation::Unsave { .. } => "unsave",
            Mutation::Rate { .. } => "rate",
            Mutation::UploadImage { .. } => "upload_image",
            Mutation::DeleteImage { .. } => "delete_image",
            Mutation::Generate(_) => "generate",
            Mutation::Import(_) => "import",
            Mutation::BackfillImages => "backfill_images",
            Mutation::RefreshSuggestions => "refresh_suggestions",
            Mutation::CreateTab { .. } => "create_tab",
            Mutation::RenameTab { .. } => "rename_tab",
            Mutation::DeleteTab { .. } => "delete_tab",
            Mutation::AddToTab { .. } => "add_to_tab",
            Mutation::RemoveFromTab { .. } => "remove_from_tab",
        }
    }

    /// Entity this mutation writes to, if it targets a single one.
    pub fn entity(&self) -> Option<EntityKey> {
        match self {
            Mutation::Save { recipe_id, .. }
            | Mutation::Unsave { recipe_id }
            | Mutation::Rate { recipe_id, .. }
            | Mutation::UploadImage { recipe_id, .. }
            | Mutation::DeleteImage { recipe_id } => Some(EntityKey::Recipe(recipe_id.clone())),
            Mutation::RenameTab { tab_id, .. } | Mutation::DeleteTab { tab_id } => {
                Some(EntityKey::Tab(*tab_id))
            }
            Mutation::AddToTab { tab_id, recipe_ids } => match recipe_ids.as_slice() {
                [recipe_id] => Some(EntityKey::Membership {
                    tab_id: *tab_id,
                    recipe_id: recipe_id.clone(),
                }),
                _ => Some(EntityKey::Tab(*tab_id)),
            },
            Mutation::RemoveFromTab { tab_id, recipe_id } => Some(EntityKey::Membership {
                tab_id: *tab_id,
                recipe_id: recipe_id.clone(),
            }),
            Mutation::Generate(_)
            | Mutation::Import(_)
            | Mutation::BackfillImages
            | Mutation::RefreshSuggestions
            | Mutation::CreateTab { .. } => None,
        }
    }

    /// Cache families this mutation makes stale once it succeeds.
    pub fn invalidation_set(&self) -> Vec<QueryFamily> {
        match self {
            Mutation::Save { recipe_id, .. }
            | Mutation::Unsave { recipe_id }
            | Mutation::Rate { recipe_id, .. } => vec![
                QueryFamily::Recipe(recipe_id.clone()),
                QueryFamily::Kind(QueryKind::Saved),
                QueryFamily::Kind(QueryKind::Preferences),
            ],
            Mutation::UploadImage { recipe_id, .. } | Mutation::DeleteImage { recipe_id } => {
                vec![QueryFamily::Recipe(recipe_id.clone())]
            }
            Mutation::Generate(_) => vec![
                QueryFamily::Kind(QueryKind::Library),
                QueryFamily::Kind(QueryKind::TopIngredients),
                QueryFamily::Kind(QueryKind::Preferences),
            ],
            Mutation::Import(_) | Mutation::BackfillImages => vec![
                QueryFamily::Kind(QueryKind::Library),
                QueryFamily::Kind(QueryKind::Saved),
            ],
            // The response replaces the suggestions entry directly
            Mutation::RefreshSuggestions => Vec::new(),
            Mutation::CreateTab { .. } | Mutation::RenameTab { .. } => {
                vec![QueryFamily::Kind(QueryKind::Tabs)]
            }
            Mutation::DeleteTab { tab_id } => vec![
                QueryFamily::Kind(QueryKind::Tabs),
                QueryFamily::Kind(QueryKind::RecipeTabs),
                QueryFamily::LibraryInTab(*tab_id),
            ],
            Mutation::AddToTab { tab_id, recipe_ids } => {
                let mut families = vec![
                    QueryFamily::Kind(QueryKind::Tabs),
                    QueryFamily::LibraryInTab(*tab_id),
                ];
                families.extend(recipe_ids.iter().cloned().map(QueryFamily::RecipeTabs));
                families
            }
            Mutation::RemoveFromTab { tab_id, recipe_id } => vec![
                QueryFamily::Kind(QueryKind::Tabs),
                QueryFamily::RecipeTabs(recipe_id.clone()),
                QueryFamily::LibraryInTab(*tab_id),
            ],
        }
    }

    /// Reject invalid input before any request is made. Tab names come back trimmed.
    pub fn validate(self) -> ClientResult<Self> {
        match self {
            Mutation::Rate { rating, .. } if !(1..=5).contains(&rating) => Err(
                ClientError::Validation("Rating must be between 1 and 5".to_string()),
            ),
            Mutation::CreateTab { name } => Ok(Mutation::CreateTab {
                name: required_tab_name(&name)?,
            }),
            Mutation::RenameTab { tab_id, name } => Ok(Mutation::RenameTab {
                tab_id,
                name: required_tab_name(&name)?,
            }),
            Mutation::AddToTab { ref recipe_ids, .. } if recipe_ids.is_empty() => Err(
                ClientError::Validation("At least one recipe is required".to_string()),
            ),
            Mutation::Generate(ref request)
                if request.ingredients.iter().all(|i| i.trim().is_empty()) =>
            {
                Err(ClientError::Validation(
                    "At least one ingredient is required".to_string(),
                ))
            }
            Mutation::Import(ImportSource::Url(ref url)) if url.trim().is_empty() => Err(
                ClientError::Validation("A URL is required".to_string()),
            ),
            Mutation::Import(ImportSource::Files(ref files)) if files.is_empty() => Err(
                ClientError::Validation("At least one file is required".to_string()),
            ),
            other => Ok(other),
        }
    }
}

fn required_tab_name(name: &str) -> ClientResult<String> {
    normalize_tab_name(name).ok_or_else(|| ClientError::Validation("Tab name is required".to_string()))
}

/// Confirmed result of a mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Server copy of a recipe after save, rate or image upload
    Recipe(Recipe),
    Unsaved { recipe_id: String },
    ImageRemoved { recipe_id: String },
    Generated(Vec<Recipe>),
    Imported(ImportResult),
    Backfilled(BackfillResult),
    Suggestions(DailySuggestion),
    Tab(Tab),
    TabDeleted(TabId),
    MembershipRemoved { tab_id: TabId, recipe_id: String },
}

fn unexpected(expected: &str) -> ClientError {
    ClientError::Internal(format!("Mutation did not produce {}", expected))
}

impl MutationOutcome {
    /// Whether this result changes recipe fields held by cached values.
    pub fn patches_recipes(&self) -> bool {
        matches!(
            self,
            MutationOutcome::Recipe(_)
                | MutationOutcome::Unsaved { .. }
                | MutationOutcome::ImageRemoved { .. }
        )
    }

    pub fn into_recipe(self) -> ClientResult<Recipe> {
        match self {
            MutationOutcome::Recipe(recipe) => Ok(recipe),
            _ => Err(unexpected("a recipe")),
        }
    }

    pub fn into_recipes(self) -> ClientResult<Vec<Recipe>> {
        match self {
            MutationOutcome::Generated(recipes) => Ok(recipes),
            _ => Err(unexpected("generated recipes")),
        }
    }

    pub fn into_tab(self) -> ClientResult<Tab> {
        match self {
            MutationOutcome::Tab(tab) => Ok(tab),
            _ => Err(unexpected("a tab")),
        }
    }

    pub fn into_import(self) -> ClientResult<ImportResult> {
        match self {
            MutationOutcome::Imported(result) => Ok(result),
            _ => Err(unexpected("an import result")),
        }
    }

    pub fn into_backfill(self) -> ClientResult<BackfillResult> {
        match self {
            MutationOutcome::Backfilled(result) => Ok(result),
            _ => Err(unexpected("a backfill result")),
        }
    }

    pub fn into_suggestions(self) -> ClientResult<DailySuggestion> {
        match self {
            MutationOutcome::Suggestions(suggestion) => Ok(suggestion),
            _ => Err(unexpected("daily suggestions")),
        }
    }
}

/// Applies writes and keeps the query cache consistent with them.
#[derive(Clone)]
pub struct MutationCoordinator {
    service: Arc<dyn RecipeService>,
    cache: QueryCache,
    in_flight: InFlight,
}

impl MutationCoordinator {
    pub fn new(service: Arc<dyn RecipeService>, cache: QueryCache) -> Self {
        Self {
            service,
            cache,
            in_flight: InFlight::new(),
        }
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub fn is_pending(&self, entity: &EntityKey) -> bool {
        self.in_flight.is_pending(entity)
    }

    pub async fn mutate(&self, mutation: Mutation) -> ClientResult<MutationOutcome> {
        self.mutate_with(mutation, |_| {}).await
    }

    /// Like [`mutate`](Self::mutate), running `on_success` after the service
    /// confirms the write and before the cache is touched.
    pub async fn mutate_with<F>(
        &self,
        mutation: Mutation,
        on_success: F,
    ) -> ClientResult<MutationOutcome>
    where
        F: FnOnce(&MutationOutcome) + Send,
    {
        let mutation = mutation.validate().inspect_err(|err| {
            tracing::warn!(error = %err, "Mutation rejected");
        })?;
        let _guard = mutation.entity().map(|entity| self.in_flight.begin(entity));

        let outcome = match self.execute(&mutation).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(mutation = mutation.name(), error = %err, "Mutation failed");
                return Err(err);
            }
        };

        on_success(&outcome);

        let patched = if outcome.patches_recipes() {
            self.cache
                .patch(|_, value| patch_value(&outcome, value))
                .await
        } else {
            0
        };

        let mut invalidated = 0;
        for family in mutation.invalidation_set() {
            invalidated += self.cache.mark_stale(&family).await;
        }

        if let MutationOutcome::Suggestions(ref suggestion) = outcome {
            self.cache
                .set(
                    QueryKey::DailySuggestions,
                    QueryValue::Suggestions(suggestion.clone()),
                )
                .await;
        }

        tracing::info!(
            mutation = mutation.name(),
            patched,
            invalidated,
            "Mutation applied"
        );
        Ok(outcome)
    }

    async fn execute(&self, mutation: &Mutation) -> ClientResult<MutationOutcome> {
        let service = self.service.as_ref();
        Ok(match mutation {
            Mutation::Save { recipe_id, notes } => {
                MutationOutcome::Recipe(service.save_recipe(recipe_id, notes.as_deref()).await?)
            }
            Mutation::Unsave { recipe_id } => {
                service.unsave_recipe(recipe_id).await?;
                MutationOutcome::Unsaved {
                    recipe_id: recipe_id.clone(),
                }
            }
            Mutation::Rate { recipe_id, rating } => {
                MutationOutcome::Recipe(service.rate_recipe(recipe_id, *rating).await?)
            }
            Mutation::UploadImage { recipe_id, image } => {
                MutationOutcome::Recipe(service.upload_image(recipe_id, image).await?)
            }
            Mutation::DeleteImage { recipe_id } => {
                service.delete_image(recipe_id).await?;
                MutationOutcome::ImageRemoved {
                    recipe_id: recipe_id.clone(),
                }
            }
            Mutation::Generate(request) => {
                MutationOutcome::Generated(service.generate(request).await?)
            }
            Mutation::Import(source) => MutationOutcome::Imported(service.import(source).await?),
            Mutation::BackfillImages => MutationOutcome::Backfilled(service.backfill_images().await?),
            Mutation::RefreshSuggestions => {
                MutationOutcome::Suggestions(service.refresh_suggestions().await?)
            }
            Mutation::CreateTab { name } => MutationOutcome::Tab(service.create_tab(name).await?),
            Mutation::RenameTab { tab_id, name } => {
                let request = UpdateTabRequest {
                    name: Some(name.clone()),
                    position: None,
                };
                MutationOutcome::Tab(service.update_tab(*tab_id, &request).await?)
            }
            Mutation::DeleteTab { tab_id } => {
                service.delete_tab(*tab_id).await?;
                MutationOutcome::TabDeleted(*tab_id)
            }
            Mutation::AddToTab { tab_id, recipe_ids } => {
                MutationOutcome::Tab(service.add_to_tab(*tab_id, recipe_ids).await?)
            }
            Mutation::RemoveFromTab { tab_id, recipe_id } => {
                service.remove_from_tab(*tab_id, recipe_id).await?;
                MutationOutcome::MembershipRemoved {
                    tab_id: *tab_id,
                    recipe_id: recipe_id.clone(),
                }
            }
        })
    }
}
