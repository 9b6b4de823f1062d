//! Session wiring: one cache, one coordinator and the views built on them.
//!
//! A session owns its query cache; nothing outlives [`RecipeSession::end`].

use std::sync::{Arc, Mutex, MutexGuard};

use crate::cache::{QueryCache, QueryKey, QueryValue};
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::errors::{ClientError, ClientResult};
use crate::membership::{lock_view, Collections, MembershipChange, SharedView};
use crate::models::{
    BackfillResult, DailySuggestion, ExportRequest, GenerateRequest, ImportResult, ImportSource,
    Recipe, RecipePage, RecipeSource, Tab, TabId, TopIngredient, UploadFile, UserPreferences,
};
use crate::mutation::{EntityKey, Mutation, MutationCoordinator, MutationOutcome};
use crate::notices::{Notice, NoticeBoard};
use crate::optimistic::ResultList;
use crate::remote::{HttpRecipeService, RecipeService};
use crate::view::ViewState;

/// Everything a user session reads and writes through.
pub struct RecipeSession {
    config: Config,
    service: Arc<dyn RecipeService>,
    cache: QueryCache,
    coordinator: MutationCoordinator,
    collections: Collections,
    view: SharedView,
    notices: Mutex<NoticeBoard>,
}

impl RecipeSession {
    pub fn new(config: Config, service: Arc<dyn RecipeService>) -> Self {
        let cache = QueryCache::new(Arc::clone(&service));
        let coordinator = MutationCoordinator::new(Arc::clone(&service), cache.clone());
        let view: SharedView = Arc::new(Mutex::new(ViewState::new(config.per_page)));
        let collections = Collections::new(cache.clone(), coordinator.clone(), Arc::clone(&view));
        let notices = Mutex::new(NoticeBoard::new(config.notice_ttl));

        Self {
            config,
            service,
            cache,
            coordinator,
            collections,
            view,
            notices,
        }
    }

    /// Open a session against the local store if one is configured, the HTTP
    /// service otherwise.
    pub async fn from_config(config: Config) -> ClientResult<Self> {
        let service: Arc<dyn RecipeService> = match config.local_db_path {
            Some(ref path) => {
                tracing::info!(path = %path.display(), "Using local recipe store");
                let pool = init_database(path).await?;
                Arc::new(Repository::new(pool))
            }
            None => {
                tracing::info!(url = %config.api_base_url, "Using recipe service");
                Arc::new(HttpRecipeService::new(&config)?)
            }
        };
        Ok(Self::new(config, service))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    pub fn collections(&self) -> &Collections {
        &self.collections
    }

    // ==================== LIBRARY VIEW ====================

    /// Snapshot of the library view's filters.
    pub fn view(&self) -> ViewState {
        lock_view(&self.view).clone()
    }

    /// Change the library view's filters.
    pub fn update_view<R>(&self, update: impl FnOnce(&mut ViewState) -> R) -> R {
        update(&mut lock_view(&self.view))
    }

    pub fn set_search(&self, search: &str) {
        self.update_view(|v| v.set_search(search));
    }

    pub fn set_source(&self, source: Option<RecipeSource>) {
        self.update_view(|v| v.set_source(source));
    }

    pub fn set_tab(&self, tab_id: Option<TabId>) {
        self.update_view(|v| v.set_tab(tab_id));
    }

    pub fn set_page(&self, page: u32) {
        self.update_view(|v| v.set_page(page));
    }

    /// Current page of the library view.
    pub async fn library(&self) -> ClientResult<RecipePage> {
        let key = self.view().descriptor();
        self.read(&key).await?.into_page()
    }

    /// Last library page held in the cache for the current filters, stale or not.
    pub async fn library_snapshot(&self) -> Option<RecipePage> {
        let key = self.view().descriptor();
        self.cache
            .peek(&key)
            .await
            .and_then(|cached| cached.value)
            .and_then(|value| value.into_page().ok())
    }

    // ==================== READS ====================

    pub async fn saved(&self, page: u32) -> ClientResult<RecipePage> {
        let key = QueryKey::Saved {
            page: page.max(1),
            per_page: self.config.per_page,
        };
        self.read(&key).await?.into_page()
    }

    /// Recipe detail; a recipe the service does not know is `None`.
    pub async fn recipe(&self, id: &str) -> ClientResult<Option<Recipe>> {
        match self.read(&QueryKey::Recipe(id.to_string())).await {
            Ok(value) => value.into_recipe().map(Some),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn tabs(&self) -> ClientResult<Vec<Tab>> {
        self.collections.tabs().await.inspect_err(|err| self.notify(err))
    }

    pub async fn daily_suggestions(&self) -> ClientResult<DailySuggestion> {
        self.read(&QueryKey::DailySuggestions)
            .await?
            .into_suggestions()
    }

    pub async fn top_ingredients(&self, limit: u32) -> ClientResult<Vec<TopIngredient>> {
        self.read(&QueryKey::TopIngredients(limit))
            .await?
            .into_ingredients()
    }

    pub async fn preferences(&self) -> ClientResult<UserPreferences> {
        self.read(&QueryKey::Preferences).await?.into_preferences()
    }

    async fn read(&self, key: &QueryKey) -> ClientResult<QueryValue> {
        self.cache
            .fetch_or_serve(key)
            .await
            .inspect_err(|err| self.notify(err))
    }

    // ==================== WRITES ====================

    async fn run(&self, mutation: Mutation) -> ClientResult<MutationOutcome> {
        self.coordinator
            .mutate(mutation)
            .await
            .inspect_err(|err| self.notify(err))
    }

    pub async fn save(&self, recipe_id: &str, notes: Option<&str>) -> ClientResult<Recipe> {
        self.run(Mutation::Save {
            recipe_id: recipe_id.to_string(),
            notes: notes.map(str::to_string),
        })
        .await?
        .into_recipe()
    }

    pub async fn unsave(&self, recipe_id: &str) -> ClientResult<()> {
        self.run(Mutation::Unsave {
            recipe_id: recipe_id.to_string(),
        })
        .await?;
        Ok(())
    }

    pub async fn rate(&self, recipe_id: &str, rating: u8) -> ClientResult<Recipe> {
        self.run(Mutation::Rate {
            recipe_id: recipe_id.to_string(),
            rating,
        })
        .await?
        .into_recipe()
    }

    pub async fn upload_image(&self, recipe_id: &str, image: UploadFile) -> ClientResult<Recipe> {
        self.run(Mutation::UploadImage {
            recipe_id: recipe_id.to_string(),
            image,
        })
        .await?
        .into_recipe()
    }

    pub async fn delete_image(&self, recipe_id: &str) -> ClientResult<()> {
        self.run(Mutation::DeleteImage {
            recipe_id: recipe_id.to_string(),
        })
        .await?;
        Ok(())
    }

    pub async fn generate(&self, request: GenerateRequest) -> ClientResult<ResultList> {
        let recipes = self.run(Mutation::Generate(request)).await?.into_recipes()?;
        Ok(ResultList::new(recipes))
    }

    pub async fn import(&self, source: ImportSource) -> ClientResult<ImportResult> {
        let result = self.run(Mutation::Import(source)).await?.into_import()?;
        self.notices().push_info(result.message.clone());
        Ok(result)
    }

    pub async fn backfill_images(&self) -> ClientResult<BackfillResult> {
        let result = self.run(Mutation::BackfillImages).await?.into_backfill()?;
        let message = if result.pexels_key_set {
            format!(
                "Found images for {} of {} recipes",
                result.updated, result.total
            )
        } else {
            "Image search is not configured on the service".to_string()
        };
        self.notices().push_info(message);
        Ok(result)
    }

    pub async fn refresh_suggestions(&self) -> ClientResult<DailySuggestion> {
        self.run(Mutation::RefreshSuggestions)
            .await?
            .into_suggestions()
    }

    /// Run a recipe mutation and patch a list held outside the cache with its result.
    pub async fn mutate_list(
        &self,
        list: &mut ResultList,
        mutation: Mutation,
    ) -> ClientResult<MutationOutcome> {
        let outcome = self.run(mutation).await?;
        list.apply(&outcome);
        Ok(outcome)
    }

    /// Download an export. Exports are never cached.
    pub async fn export(&self, request: &ExportRequest) -> ClientResult<Vec<u8>> {
        self.service
            .export(request)
            .await
            .inspect_err(|err| self.notify(err))
    }

    pub fn is_recipe_pending(&self, recipe_id: &str) -> bool {
        self.coordinator
            .is_pending(&EntityKey::Recipe(recipe_id.to_string()))
    }

    // ==================== TABS ====================

    pub async fn create_tab(&self, name: &str) -> ClientResult<Tab> {
        self.collections
            .create(name)
            .await
            .inspect_err(|err| self.notify(err))
    }

    pub async fn rename_tab(&self, tab_id: TabId, name: &str) -> ClientResult<Tab> {
        self.collections
            .rename(tab_id, name)
            .await
            .inspect_err(|err| self.notify(err))
    }

    pub async fn delete_tab(&self, tab_id: TabId) -> ClientResult<()> {
        self.collections
            .delete(tab_id)
            .await
            .inspect_err(|err| self.notify(err))
    }

    pub async fn add_to_tab(&self, tab_id: TabId, recipe_ids: &[String]) -> ClientResult<Tab> {
        self.collections
            .add(tab_id, recipe_ids)
            .await
            .inspect_err(|err| self.notify(err))
    }

    pub async fn remove_from_tab(&self, tab_id: TabId, recipe_id: &str) -> ClientResult<()> {
        self.collections
            .remove(tab_id, recipe_id)
            .await
            .inspect_err(|err| self.notify(err))
    }

    pub async fn recipe_tabs(&self, recipe_id: &str) -> ClientResult<Vec<TabId>> {
        self.collections
            .recipe_tabs(recipe_id)
            .await
            .inspect_err(|err| self.notify(err))
    }

    pub async fn toggle_tab(
        &self,
        recipe_id: &str,
        tab_id: TabId,
    ) -> ClientResult<MembershipChange> {
        self.collections
            .toggle(recipe_id, tab_id)
            .await
            .inspect_err(|err| self.notify(err))
    }

    // ==================== NOTICES ====================

    fn notices(&self) -> MutexGuard<'_, NoticeBoard> {
        self.notices.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, err: &ClientError) {
        if err.is_transient() {
            self.notices().push_error(err);
        }
    }

    /// Notices that have not expired yet.
    pub fn active_notices(&self) -> Vec<Notice> {
        let mut board = self.notices();
        board.prune();
        board.active().into_iter().cloned().collect()
    }

    pub fn dismiss_notice(&self, id: u64) -> bool {
        self.notices().dismiss(id)
    }

    /// Tear down the session's cache.
    pub async fn end(&self) {
        let stats = self.cache.stats().await;
        tracing::debug!(?stats, "Ending session");
        self.cache.clear().await;
    }
}
