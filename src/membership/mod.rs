//! Collection membership: tabs and the recipes they hold.
//!
//! Tab counts are never adjusted locally. Every membership write marks the
//! tab list stale and the next read brings back the service's count.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::cache::{QueryCache, QueryKey};
use crate::errors::{ClientError, ClientResult};
use crate::models::{Tab, TabId};
use crate::mutation::{EntityKey, Mutation, MutationCoordinator};
use crate::view::ViewState;

/// View state shared between the session and the collection operations.
pub type SharedView = Arc<Mutex<ViewState>>;

pub(crate) fn lock_view(view: &SharedView) -> MutexGuard<'_, ViewState> {
    view.lock().unwrap_or_else(|e| e.into_inner())
}

/// What a toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Added,
    Removed,
}

/// Tab and membership operations.
#[derive(Clone)]
pub struct Collections {
    cache: QueryCache,
    coordinator: MutationCoordinator,
    view: SharedView,
}

impl Collections {
    pub fn new(cache: QueryCache, coordinator: MutationCoordinator, view: SharedView) -> Self {
        Self {
            cache,
            coordinator,
            view,
        }
    }

    /// All tabs with their counts.
    pub async fn tabs(&self) -> ClientResult<Vec<Tab>> {
        self.cache.fetch_or_serve(&QueryKey::Tabs).await?.into_tabs()
    }

    pub async fn create(&self, name: &str) -> ClientResult<Tab> {
        self.coordinator
            .mutate(Mutation::CreateTab {
                name: name.to_string(),
            })
            .await?
            .into_tab()
    }

    pub async fn rename(&self, tab_id: TabId, name: &str) -> ClientResult<Tab> {
        self.coordinator
            .mutate(Mutation::RenameTab {
                tab_id,
                name: name.to_string(),
            })
            .await?
            .into_tab()
    }

    /// Delete a tab. If the library view is filtered to it, the filter is
    /// cleared before any view can read the invalidated listing.
    pub async fn delete(&self, tab_id: TabId) -> ClientResult<()> {
        let view = Arc::clone(&self.view);
        self.coordinator
            .mutate_with(Mutation::DeleteTab { tab_id }, move |_| {
                if lock_view(&view).clear_tab_if(tab_id) {
                    tracing::info!(tab_id, "Cleared filter on deleted tab");
                }
            })
            .await?;
        Ok(())
    }

    pub async fn add(&self, tab_id: TabId, recipe_ids: &[String]) -> ClientResult<Tab> {
        self.coordinator
            .mutate(Mutation::AddToTab {
                tab_id,
                recipe_ids: recipe_ids.to_vec(),
            })
            .await?
            .into_tab()
    }

    pub async fn remove(&self, tab_id: TabId, recipe_id: &str) -> ClientResult<()> {
        self.coordinator
            .mutate(Mutation::RemoveFromTab {
                tab_id,
                recipe_id: recipe_id.to_string(),
            })
            .await?;
        Ok(())
    }

    /// Tab ids the recipe belongs to, fetched on first use.
    pub async fn recipe_tabs(&self, recipe_id: &str) -> ClientResult<Vec<TabId>> {
        self.cache
            .fetch_or_serve(&QueryKey::RecipeTabs(recipe_id.to_string()))
            .await?
            .into_tab_ids()
    }

    /// Last fetched tab ids for a recipe, stale or not. `None` if never loaded.
    pub async fn loaded_tabs_for(&self, recipe_id: &str) -> Option<Vec<TabId>> {
        self.cache
            .peek(&QueryKey::RecipeTabs(recipe_id.to_string()))
            .await
            .and_then(|cached| cached.value)
            .and_then(|value| value.into_tab_ids().ok())
    }

    /// Add the recipe to the tab or remove it, based on the last fetched membership.
    pub async fn toggle(&self, recipe_id: &str, tab_id: TabId) -> ClientResult<MembershipChange> {
        let Some(current) = self.loaded_tabs_for(recipe_id).await else {
            return Err(ClientError::MembershipUnknown {
                recipe_id: recipe_id.to_string(),
            });
        };

        if current.contains(&tab_id) {
            self.remove(tab_id, recipe_id).await?;
            Ok(MembershipChange::Removed)
        } else {
            self.add(tab_id, &[recipe_id.to_string()]).await?;
            Ok(MembershipChange::Added)
        }
    }

    /// Whether a toggle of this pair is still waiting on the service.
    pub fn is_toggle_pending(&self, recipe_id: &str, tab_id: TabId) -> bool {
        self.coordinator.is_pending(&EntityKey::Membership {
            tab_id,
            recipe_id: recipe_id.to_string(),
        })
    }
}
