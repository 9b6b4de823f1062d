//! Integration tests for the recipe client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::cache::{Freshness, QueryFamily, QueryKey, QueryKind};
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::errors::{ClientError, ClientResult};
use crate::membership::MembershipChange;
use crate::models::{
    BackfillResult, DailySuggestion, ExportRequest, GenerateRequest, ImportResult, ImportSource,
    NewRecipe, Recipe, RecipePage, RecipeQuery, Tab, TabId, TopIngredient, UpdateTabRequest,
    UploadFile, UserPreferences,
};
use crate::mutation::{EntityKey, Mutation};
use crate::remote::RecipeService;
use crate::session::RecipeSession;

/// Recipe service backed by a temporary SQLite store that counts calls and can
/// be told to slow down or fail.
///
/// `read_delay` is applied before a read touches the store, `response_delay`
/// after it, so a response can carry data older than a write that lands during
/// the delay.
struct ScriptedService {
    repo: Repository,
    calls: Mutex<HashMap<&'static str, usize>>,
    read_delay: Mutex<Option<Duration>>,
    response_delay: Mutex<Option<Duration>>,
    fail_next: Mutex<Option<ClientError>>,
}

impl ScriptedService {
    fn new(repo: Repository) -> Self {
        Self {
            repo,
            calls: Mutex::new(HashMap::new()),
            read_delay: Mutex::new(None),
            response_delay: Mutex::new(None),
            fail_next: Mutex::new(None),
        }
    }

    fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap() = Some(delay);
    }

    fn set_response_delay(&self, delay: Duration) {
        *self.response_delay.lock().unwrap() = Some(delay);
    }

    fn fail_next(&self, err: ClientError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    async fn enter(&self, name: &'static str) -> ClientResult<()> {
        *self.calls.lock().unwrap().entry(name).or_insert(0) += 1;
        if let Some(err) = self.fail_next.lock().unwrap().take() {
            return Err(err);
        }
        Ok(())
    }

    async fn enter_read(&self, name: &'static str) -> ClientResult<()> {
        let delay = *self.read_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.enter(name).await
    }

    async fn respond<T>(&self, result: ClientResult<T>) -> ClientResult<T> {
        let delay = *self.response_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        result
    }

    async fn suggestion(&self, theme: &str) -> ClientResult<DailySuggestion> {
        let page = self
            .repo
            .list_recipes(&RecipeQuery {
                page: 1,
                per_page: 3,
                search: None,
                source: None,
                tab_id: None,
            })
            .await?;
        Ok(DailySuggestion {
            theme: theme.to_string(),
            date: "2026-10-19".to_string(),
            recipes: page.recipes,
        })
    }
}

#[async_trait]
impl RecipeService for ScriptedService {
    async fn list_recipes(&self, query: &RecipeQuery) -> ClientResult<RecipePage> {
        self.enter_read("list_recipes").await?;
        self.respond(self.repo.list_recipes(query).await).await
    }

    async fn list_saved(&self, page: u32, per_page: u32) -> ClientResult<RecipePage> {
        self.enter_read("list_saved").await?;
        self.respond(self.repo.list_saved(page, per_page).await).await
    }

    async fn get_recipe(&self, id: &str) -> ClientResult<Recipe> {
        self.enter_read("get_recipe").await?;
        self.respond(self.repo.get_recipe(id).await).await
    }

    async fn generate(&self, request: &GenerateRequest) -> ClientResult<Vec<Recipe>> {
        self.enter("generate").await?;
        let mut recipes = Vec::new();
        for ingredient in &request.ingredients {
            let mut recipe = NewRecipe::named(format!("{} skillet", ingredient));
            recipe.ingredients = ingredient.clone();
            recipe.ai_generated = true;
            recipes.push(self.repo.insert_recipe(&recipe).await?);
        }
        Ok(recipes)
    }

    async fn save_recipe(&self, id: &str, notes: Option<&str>) -> ClientResult<Recipe> {
        self.enter("save_recipe").await?;
        self.repo.save_recipe(id, notes).await
    }

    async fn unsave_recipe(&self, id: &str) -> ClientResult<()> {
        self.enter("unsave_recipe").await?;
        self.repo.unsave_recipe(id).await
    }

    async fn rate_recipe(&self, id: &str, rating: u8) -> ClientResult<Recipe> {
        self.enter("rate_recipe").await?;
        self.repo.rate_recipe(id, rating).await
    }

    async fn upload_image(&self, id: &str, image: &UploadFile) -> ClientResult<Recipe> {
        self.enter("upload_image").await?;
        self.repo.upload_image(id, image).await
    }

    async fn delete_image(&self, id: &str) -> ClientResult<()> {
        self.enter("delete_image").await?;
        self.repo.delete_image(id).await
    }

    async fn import(&self, source: &ImportSource) -> ClientResult<ImportResult> {
        self.enter("import").await?;
        self.repo.import(source).await
    }

    async fn export(&self, request: &ExportRequest) -> ClientResult<Vec<u8>> {
        self.enter("export").await?;
        self.repo.export(request).await
    }

    async fn backfill_images(&self) -> ClientResult<BackfillResult> {
        self.enter("backfill_images").await?;
        Ok(BackfillResult {
            total: 2,
            updated: 1,
            pexels_key_set: true,
            errors: Vec::new(),
        })
    }

    async fn list_tabs(&self) -> ClientResult<Vec<Tab>> {
        self.enter_read("list_tabs").await?;
        self.respond(self.repo.list_tabs().await).await
    }

    async fn create_tab(&self, name: &str) -> ClientResult<Tab> {
        self.enter("create_tab").await?;
        self.repo.create_tab(name).await
    }

    async fn update_tab(&self, id: TabId, request: &UpdateTabRequest) -> ClientResult<Tab> {
        self.enter("update_tab").await?;
        self.repo.update_tab(id, request).await
    }

    async fn delete_tab(&self, id: TabId) -> ClientResult<()> {
        self.enter("delete_tab").await?;
        self.repo.delete_tab(id).await
    }

    async fn add_to_tab(&self, id: TabId, recipe_ids: &[String]) -> ClientResult<Tab> {
        self.enter("add_to_tab").await?;
        self.repo.add_to_tab(id, recipe_ids).await
    }

    async fn remove_from_tab(&self, id: TabId, recipe_id: &str) -> ClientResult<()> {
        self.enter("remove_from_tab").await?;
        self.repo.remove_from_tab(id, recipe_id).await
    }

    async fn recipe_tab_ids(&self, recipe_id: &str) -> ClientResult<Vec<TabId>> {
        self.enter_read("recipe_tab_ids").await?;
        self.respond(self.repo.recipe_tab_ids(recipe_id).await).await
    }

    async fn daily_suggestions(&self) -> ClientResult<DailySuggestion> {
        self.enter_read("daily_suggestions").await?;
        self.suggestion("Comfort food").await
    }

    async fn refresh_suggestions(&self) -> ClientResult<DailySuggestion> {
        self.enter("refresh_suggestions").await?;
        self.suggestion("Quick dinners").await
    }

    async fn top_ingredients(&self, limit: u32) -> ClientResult<Vec<TopIngredient>> {
        self.enter_read("top_ingredients").await?;
        let ranking = [("garlic", 12), ("onion", 9), ("lemon", 4)];
        Ok(ranking
            .iter()
            .take(limit as usize)
            .map(|(ingredient, count)| TopIngredient {
                ingredient: ingredient.to_string(),
                count: *count,
            })
            .collect())
    }

    async fn user_preferences(&self) -> ClientResult<UserPreferences> {
        self.enter_read("user_preferences").await?;
        let preferences = self.repo.user_preferences().await;
        self.respond(preferences).await
    }
}

/// Test fixture for integration tests.
struct TestFixture {
    session: RecipeSession,
    repo: Repository,
    service: Arc<ScriptedService>,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Repository::new(pool);
        let service = Arc::new(ScriptedService::new(repo.clone()));

        let config = Config {
            local_db_path: Some(db_path),
            log_level: "warn".to_string(),
            ..Config::default()
        };
        let session = RecipeSession::new(config, service.clone());

        TestFixture {
            session,
            repo,
            service,
            _temp_dir: temp_dir,
        }
    }

    async fn seed(&self, count: usize) -> Vec<Recipe> {
        let mut recipes = Vec::with_capacity(count);
        for i in 0..count {
            let recipe = NewRecipe::named(format!("Recipe {:02}", i));
            recipes.push(self.repo.insert_recipe(&recipe).await.unwrap());
        }
        recipes
    }

    async fn tab_count(&self, tab_id: TabId) -> u64 {
        self.session
            .tabs()
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.id == tab_id)
            .map(|t| t.recipe_count)
            .expect("tab should exist")
    }
}

// ==================== VIEW & PAGINATION ====================

#[tokio::test]
async fn test_library_pagination() {
    let fixture = TestFixture::new().await;
    fixture.seed(25).await;

    let first = fixture.session.library().await.unwrap();
    assert_eq!(first.recipes.len(), 20);
    assert_eq!(first.total, 25);
    assert_eq!(first.total_pages(), 2);

    fixture.session.set_page(2);
    let second = fixture.session.library().await.unwrap();
    assert_eq!(second.recipes.len(), 5);

    // Past the end: empty page, no error
    fixture.session.set_page(3);
    let past = fixture.session.library().await.unwrap();
    assert!(past.recipes.is_empty());
    assert!(fixture
        .session
        .update_view(|view| view.clamp_to(past.total_pages())));
    assert_eq!(fixture.session.view().page(), 2);
}

#[tokio::test]
async fn test_filter_change_resets_page() {
    let fixture = TestFixture::new().await;
    fixture.seed(25).await;

    fixture.session.set_page(2);
    fixture.session.set_search("  Recipe 1 ");
    let view = fixture.session.view();
    assert_eq!(view.page(), 1);
    assert_eq!(view.search(), Some("Recipe 1"));

    let page = fixture.session.library().await.unwrap();
    assert_eq!(page.total, 10);
}

// ==================== QUERY CACHE ====================

#[tokio::test]
async fn test_concurrent_identical_reads_share_one_request() {
    let fixture = TestFixture::new().await;
    fixture.seed(3).await;
    fixture.service.set_read_delay(Duration::from_millis(50));

    let (a, b) = tokio::join!(fixture.session.library(), fixture.session.library());

    assert_eq!(a.unwrap(), b.unwrap());
    assert_eq!(fixture.service.calls("list_recipes"), 1);
    assert_eq!(fixture.session.cache().stats().await.coalesced, 1);
}

#[tokio::test]
async fn test_fresh_entry_served_until_marked_stale() {
    let fixture = TestFixture::new().await;
    fixture.seed(2).await;

    fixture.session.library().await.unwrap();
    fixture.session.library().await.unwrap();
    assert_eq!(fixture.service.calls("list_recipes"), 1);

    let marked = fixture
        .session
        .cache()
        .mark_stale(&QueryFamily::Kind(QueryKind::Library))
        .await;
    assert_eq!(marked, 1);

    fixture.session.library().await.unwrap();
    assert_eq!(fixture.service.calls("list_recipes"), 2);
}

#[tokio::test]
async fn test_failed_refetch_keeps_previous_value() {
    let fixture = TestFixture::new().await;
    fixture.seed(2).await;
    let key = fixture.session.view().descriptor();

    let before = fixture.session.library().await.unwrap();
    fixture
        .session
        .cache()
        .mark_stale(&QueryFamily::Kind(QueryKind::Library))
        .await;

    fixture
        .service
        .fail_next(ClientError::Network("connection reset".into()));
    let err = fixture.session.library().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));

    let cached = fixture.session.cache().peek(&key).await.unwrap();
    assert_eq!(cached.freshness, Freshness::Stale);
    assert_eq!(cached.value.unwrap().into_page().unwrap(), before);
    assert!(cached.last_error.is_some());
    assert_eq!(
        fixture.session.library_snapshot().await.unwrap(),
        before
    );

    let notices = fixture.session.active_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].code, Some("NETWORK_ERROR"));

    // User-initiated retry succeeds
    assert_eq!(fixture.session.library().await.unwrap(), before);
}

#[tokio::test]
async fn test_cleared_fetch_does_not_overwrite_newer_fetch() {
    let fixture = TestFixture::new().await;
    let cache = fixture.session.cache().clone();
    let key = QueryKey::Tabs;
    fixture.service.set_response_delay(Duration::from_millis(100));

    let first = {
        let (cache, key) = (cache.clone(), key.clone());
        tokio::spawn(async move { cache.fetch_or_serve(&key).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    cache.clear().await;

    fixture.service.set_response_delay(Duration::from_millis(300));
    let second = {
        let (cache, key) = (cache.clone(), key.clone());
        tokio::spawn(async move { cache.fetch_or_serve(&key).await })
    };

    // The first fetch has completed; the second is still running
    tokio::time::sleep(Duration::from_millis(130)).await;
    assert_eq!(cache.freshness(&key).await, Some(Freshness::Loading));
    let third = cache.fetch_or_serve(&key).await.unwrap();

    first.await.unwrap().unwrap();
    assert_eq!(second.await.unwrap().unwrap(), third);
    assert_eq!(fixture.service.calls("list_tabs"), 2);
    assert_eq!(cache.freshness(&key).await, Some(Freshness::Fresh));
}

#[tokio::test]
async fn test_invalidation_during_fetch_leaves_entry_stale() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(1).await;
    let key = QueryKey::Saved {
        page: 1,
        per_page: 20,
    };
    fixture.service.set_read_delay(Duration::from_millis(100));

    let cache = fixture.session.cache().clone();
    let read_key = key.clone();
    let read = tokio::spawn(async move { cache.fetch_or_serve(&read_key).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        fixture.session.cache().freshness(&key).await,
        Some(Freshness::Loading)
    );
    fixture.session.save(&recipes[0].id, None).await.unwrap();

    // The response is delivered, but the entry was invalidated while in flight
    read.await.unwrap().unwrap().into_page().unwrap();
    assert_eq!(
        fixture.session.cache().freshness(&key).await,
        Some(Freshness::Stale)
    );

    let fresh = fixture.session.saved(1).await.unwrap();
    assert_eq!(fresh.total, 1);
    assert_eq!(fixture.service.calls("list_saved"), 2);
}

#[tokio::test]
async fn test_missing_recipe_is_none() {
    let fixture = TestFixture::new().await;
    assert_eq!(fixture.session.recipe("nope").await.unwrap(), None);
    assert!(fixture.session.active_notices().is_empty());
}

#[tokio::test]
async fn test_end_clears_cache() {
    let fixture = TestFixture::new().await;
    fixture.seed(1).await;
    fixture.session.library().await.unwrap();
    assert_eq!(fixture.session.cache().len().await, 1);

    fixture.session.end().await;
    assert!(fixture.session.cache().is_empty().await);
}

// ==================== MUTATIONS ====================

#[tokio::test]
async fn test_save_patches_open_listing_without_refetch() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(3).await;

    fixture.session.library().await.unwrap();
    fixture.session.save(&recipes[1].id, None).await.unwrap();

    let page = fixture.session.library().await.unwrap();
    let patched = page.recipes.iter().find(|r| r.id == recipes[1].id).unwrap();
    assert!(patched.is_saved);
    assert_eq!(fixture.service.calls("list_recipes"), 1);
}

#[tokio::test]
async fn test_rate_last_write_visible_in_open_listing() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(2).await;
    let id = recipes[0].id.clone();

    fixture.session.library().await.unwrap();
    fixture.session.rate(&id, 4).await.unwrap();
    fixture.session.rate(&id, 2).await.unwrap();

    let page = fixture.session.library().await.unwrap();
    let listed = page.recipes.iter().find(|r| r.id == id).unwrap();
    assert_eq!(listed.rating, Some(2));
    assert!(listed.is_saved);
    assert_eq!(
        fixture.session.recipe(&id).await.unwrap().unwrap().rating,
        Some(2)
    );
}

#[tokio::test]
async fn test_unsave_clears_rating_and_resave_does_not_restore_it() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(1).await;
    let id = recipes[0].id.clone();

    fixture.session.rate(&id, 5).await.unwrap();
    fixture.session.library().await.unwrap();
    assert_eq!(fixture.session.saved(1).await.unwrap().total, 1);

    fixture.session.unsave(&id).await.unwrap();
    let listed = fixture.session.library().await.unwrap().recipes[0].clone();
    assert!(!listed.is_saved);
    assert_eq!(listed.rating, None);
    assert_eq!(fixture.session.saved(1).await.unwrap().total, 0);

    let resaved = fixture.session.save(&id, None).await.unwrap();
    assert_eq!(resaved.rating, None);
}

#[tokio::test]
async fn test_invalid_rating_makes_no_request() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(1).await;

    let err = fixture.session.rate(&recipes[0].id, 6).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(fixture.service.calls("rate_recipe"), 0);
}

#[tokio::test]
async fn test_failed_mutation_leaves_cache_untouched() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(1).await;
    let key = fixture.session.view().descriptor();

    fixture.session.library().await.unwrap();
    fixture
        .service
        .fail_next(ClientError::Server {
            status: 500,
            message: "boom".into(),
        });
    assert!(fixture.session.save(&recipes[0].id, None).await.is_err());

    let cached = fixture.session.cache().peek(&key).await.unwrap();
    assert_eq!(cached.freshness, Freshness::Fresh);
    assert!(!cached.value.unwrap().into_page().unwrap().recipes[0].is_saved);
    assert_eq!(fixture.session.active_notices().len(), 1);
}

#[tokio::test]
async fn test_listing_fetched_before_save_refetched_after_it() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(1).await;
    let id = recipes[0].id.clone();
    let session = &fixture.session;
    let key = session.view().descriptor();
    fixture.service.set_response_delay(Duration::from_millis(100));

    // The listing reads the store, then the save lands before it responds
    let (listed, saved) = tokio::join!(session.library(), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        session.save(&id, None).await
    });
    assert!(!listed.unwrap().recipes[0].is_saved);
    assert!(saved.unwrap().is_saved);
    assert_eq!(
        session.cache().freshness(&key).await,
        Some(Freshness::Stale)
    );

    let page = session.library().await.unwrap();
    assert!(page.recipes[0].is_saved);
    assert_eq!(fixture.service.calls("list_recipes"), 2);
}

#[tokio::test]
async fn test_generation_results_patched_on_save() {
    let fixture = TestFixture::new().await;

    fixture.session.top_ingredients(2).await.unwrap();
    let mut results = fixture
        .session
        .generate(GenerateRequest {
            ingredients: vec!["leek".into(), "tofu".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(
        fixture
            .session
            .cache()
            .freshness(&QueryKey::TopIngredients(2))
            .await,
        Some(Freshness::Stale)
    );

    let id = results.recipes()[0].id.clone();
    fixture
        .session
        .mutate_list(
            &mut results,
            Mutation::Save {
                recipe_id: id.clone(),
                notes: None,
            },
        )
        .await
        .unwrap();
    assert!(results.get(&id).unwrap().is_saved);
    assert!(!results.recipes()[1].is_saved);
}

#[tokio::test]
async fn test_refresh_replaces_suggestions_without_refetch() {
    let fixture = TestFixture::new().await;
    fixture.seed(2).await;

    let daily = fixture.session.daily_suggestions().await.unwrap();
    assert_eq!(daily.theme, "Comfort food");

    let refreshed = fixture.session.refresh_suggestions().await.unwrap();
    let served = fixture.session.daily_suggestions().await.unwrap();
    assert_eq!(served, refreshed);
    assert_eq!(served.theme, "Quick dinners");
    assert_eq!(fixture.service.calls("daily_suggestions"), 1);
}

#[tokio::test]
async fn test_preferences_refetched_after_rating() {
    let fixture = TestFixture::new().await;
    let mut curry = NewRecipe::named("Green Curry");
    curry.cuisine = Some("Thai".into());
    let curry = fixture.repo.insert_recipe(&curry).await.unwrap();

    let empty = fixture.session.preferences().await.unwrap();
    assert!(empty.top_cuisines.is_empty());
    fixture.session.preferences().await.unwrap();
    assert_eq!(fixture.service.calls("user_preferences"), 1);

    fixture.session.rate(&curry.id, 4).await.unwrap();
    let prefs = fixture.session.preferences().await.unwrap();
    assert_eq!(prefs.top_cuisines, vec!["Thai"]);
    assert_eq!(prefs.avg_rating_by_cuisine.get("Thai"), Some(&4.0));
    assert_eq!(fixture.service.calls("user_preferences"), 2);
}

#[tokio::test]
async fn test_import_invalidates_library_and_posts_notice() {
    let fixture = TestFixture::new().await;
    fixture.seed(1).await;
    assert_eq!(fixture.session.library().await.unwrap().total, 1);

    let markdown = "# Chana Masala\n\n## Ingredients\n\n- chickpeas\n\n## Directions\n\n1. Simmer\n";
    let result = fixture
        .session
        .import(ImportSource::Files(vec![UploadFile::new(
            "chana.md",
            markdown.as_bytes().to_vec(),
        )]))
        .await
        .unwrap();
    assert_eq!(result.imported, 1);

    assert_eq!(fixture.session.library().await.unwrap().total, 2);
    assert!(fixture
        .session
        .active_notices()
        .iter()
        .any(|n| n.message.starts_with("Imported 1 recipes")));
}

#[tokio::test]
async fn test_image_upload_and_delete_patch_detail() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(1).await;
    let id = recipes[0].id.clone();

    assert_eq!(
        fixture.session.recipe(&id).await.unwrap().unwrap().image_url,
        None
    );
    fixture
        .session
        .upload_image(&id, UploadFile::new("dish.jpg", vec![0xff, 0xd8]))
        .await
        .unwrap();
    let cached = fixture
        .session
        .cache()
        .peek(&QueryKey::Recipe(id.clone()))
        .await
        .unwrap();
    assert!(cached.value.unwrap().into_recipe().unwrap().image_url.is_some());

    fixture.session.delete_image(&id).await.unwrap();
    assert_eq!(
        fixture.session.recipe(&id).await.unwrap().unwrap().image_url,
        None
    );
}

#[tokio::test]
async fn test_in_flight_entity_is_pending() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(1).await;
    let id = recipes[0].id.clone();

    let guard = fixture
        .session
        .coordinator()
        .in_flight()
        .begin(EntityKey::Recipe(id.clone()));
    assert!(fixture.session.is_recipe_pending(&id));

    // Not a lock: a concurrent mutation of the same entity still runs
    fixture.session.save(&id, None).await.unwrap();
    assert!(fixture.session.is_recipe_pending(&id));

    drop(guard);
    assert!(!fixture.session.is_recipe_pending(&id));
}

#[tokio::test]
async fn test_export_is_not_cached() {
    let fixture = TestFixture::new().await;
    fixture.seed(1).await;
    let request = ExportRequest {
        format: crate::models::ExportFormat::Markdown,
        scope: crate::models::ExportScope::Library,
    };

    fixture.session.export(&request).await.unwrap();
    fixture.session.export(&request).await.unwrap();
    assert_eq!(fixture.service.calls("export"), 2);
    assert!(fixture.session.cache().is_empty().await);
}

// ==================== COLLECTIONS ====================

#[tokio::test]
async fn test_weeknight_count_settles() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(2).await;
    let (a, b) = (recipes[0].id.clone(), recipes[1].id.clone());
    let collections = fixture.session.collections();

    let tab = collections.create("Weeknight").await.unwrap();
    assert_eq!(tab.recipe_count, 0);
    assert_eq!(fixture.tab_count(tab.id).await, 0);

    collections.add(tab.id, &[a.clone()]).await.unwrap();
    assert_eq!(fixture.tab_count(tab.id).await, 1);

    collections.add(tab.id, &[b.clone()]).await.unwrap();
    assert_eq!(fixture.tab_count(tab.id).await, 2);

    collections.remove(tab.id, &a).await.unwrap();
    assert_eq!(fixture.tab_count(tab.id).await, 1);

    let renamed = collections.rename(tab.id, " Weeknights ").await.unwrap();
    assert_eq!(renamed.name, "Weeknights");
    assert_eq!(renamed.id, tab.id);
    assert_eq!(fixture.tab_count(tab.id).await, 1);
}

#[tokio::test]
async fn test_blank_tab_name_rejected_without_request() {
    let fixture = TestFixture::new().await;
    let err = fixture.session.collections().create("   ").await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(fixture.service.calls("create_tab"), 0);
}

#[tokio::test]
async fn test_double_toggle_restores_membership() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(1).await;
    let id = recipes[0].id.clone();
    let collections = fixture.session.collections();
    let tab = collections.create("Soups").await.unwrap();

    let before = collections.recipe_tabs(&id).await.unwrap();
    assert!(before.is_empty());

    assert_eq!(
        collections.toggle(&id, tab.id).await.unwrap(),
        MembershipChange::Added
    );
    assert_eq!(collections.recipe_tabs(&id).await.unwrap(), vec![tab.id]);

    assert_eq!(
        collections.toggle(&id, tab.id).await.unwrap(),
        MembershipChange::Removed
    );
    assert_eq!(collections.recipe_tabs(&id).await.unwrap(), before);
    assert!(!collections.is_toggle_pending(&id, tab.id));
}

#[tokio::test]
async fn test_double_toggle_from_member_restores_membership() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(1).await;
    let id = recipes[0].id.clone();
    let session = &fixture.session;
    let soups = session.create_tab("Soups").await.unwrap();
    let quick = session.create_tab("Quick").await.unwrap();
    session.add_to_tab(soups.id, &[id.clone()]).await.unwrap();
    session.add_to_tab(quick.id, &[id.clone()]).await.unwrap();

    let before = session.recipe_tabs(&id).await.unwrap();
    assert_eq!(before, vec![soups.id, quick.id]);

    assert_eq!(
        session.toggle_tab(&id, soups.id).await.unwrap(),
        MembershipChange::Removed
    );
    assert_eq!(session.recipe_tabs(&id).await.unwrap(), vec![quick.id]);
    assert_eq!(fixture.tab_count(soups.id).await, 0);

    assert_eq!(
        session.toggle_tab(&id, soups.id).await.unwrap(),
        MembershipChange::Added
    );
    assert_eq!(session.recipe_tabs(&id).await.unwrap(), before);
    assert_eq!(fixture.tab_count(soups.id).await, 1);
}

#[tokio::test]
async fn test_toggle_before_membership_loaded_is_rejected() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(1).await;
    let collections = fixture.session.collections();
    let tab = collections.create("Later").await.unwrap();

    let err = collections.toggle(&recipes[0].id, tab.id).await.unwrap_err();
    assert!(matches!(err, ClientError::MembershipUnknown { .. }));
    assert_eq!(fixture.service.calls("add_to_tab"), 0);
    assert_eq!(fixture.service.calls("remove_from_tab"), 0);
}

#[tokio::test]
async fn test_tab_filtered_listing_refetched_after_membership_change() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(3).await;
    let collections = fixture.session.collections();
    let tab = collections.create("Weeknight").await.unwrap();

    fixture.session.set_tab(Some(tab.id));
    assert_eq!(fixture.session.library().await.unwrap().total, 0);

    collections
        .add(tab.id, &[recipes[0].id.clone(), recipes[2].id.clone()])
        .await
        .unwrap();
    assert_eq!(fixture.session.library().await.unwrap().total, 2);
}

#[tokio::test]
async fn test_deleting_selected_tab_clears_filter() {
    let fixture = TestFixture::new().await;
    let recipes = fixture.seed(3).await;
    let collections = fixture.session.collections();
    let tab = collections.create("Doomed").await.unwrap();
    collections.add(tab.id, &[recipes[0].id.clone()]).await.unwrap();
    collections.recipe_tabs(&recipes[0].id).await.unwrap();

    fixture.session.set_tab(Some(tab.id));
    fixture.session.set_page(2);
    assert_eq!(fixture.session.library().await.unwrap().total, 1);

    collections.delete(tab.id).await.unwrap();

    let view = fixture.session.view();
    assert_eq!(view.tab_id(), None);
    assert_eq!(view.page(), 1);
    match view.descriptor() {
        QueryKey::Library(query) => assert_eq!(query.tab_id, None),
        other => panic!("unexpected descriptor {:?}", other),
    }
    assert_eq!(fixture.session.library().await.unwrap().total, 3);
    assert!(fixture.session.tabs().await.unwrap().is_empty());
    assert_eq!(
        fixture
            .session
            .cache()
            .freshness(&QueryKey::RecipeTabs(recipes[0].id.clone()))
            .await,
        Some(Freshness::Stale)
    );
}

#[tokio::test]
async fn test_failed_tab_write_posts_notice() {
    let fixture = TestFixture::new().await;
    fixture
        .service
        .fail_next(ClientError::Network("connection reset".into()));

    let err = fixture.session.create_tab("Weeknight").await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
    let notices = fixture.session.active_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].code, Some("NETWORK_ERROR"));

    // Toggling an unloaded membership is reported to the caller only
    let recipes = fixture.seed(1).await;
    let tab = fixture.session.create_tab("Weeknight").await.unwrap();
    let err = fixture
        .session
        .toggle_tab(&recipes[0].id, tab.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::MembershipUnknown { .. }));
    assert_eq!(fixture.session.active_notices().len(), 1);
}
