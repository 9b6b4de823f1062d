//! Query descriptors, invalidation families and cached values.

use crate::errors::{ClientError, ClientResult};
use crate::models::{
    DailySuggestion, Recipe, RecipePage, RecipeQuery, Tab, TabId, TopIngredient, UserPreferences,
};
use crate::remote::RecipeService;

/// Kind of a cached query, used to address a whole family of entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Library,
    Saved,
    Recipe,
    Tabs,
    RecipeTabs,
    DailySuggestions,
    TopIngredients,
    Preferences,
}

impl QueryKind {
    /// Whether values of this kind contain recipes a mutation may patch.
    pub fn holds_recipes(self) -> bool {
        matches!(
            self,
            QueryKind::Library | QueryKind::Saved | QueryKind::Recipe | QueryKind::DailySuggestions
        )
    }
}

/// Structural identifier of one cached query.
///
/// Two descriptors built from the same filters compare equal and hash alike,
/// so they share one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// One page of the library listing
    Library(RecipeQuery),
    /// One page of saved recipes
    Saved { page: u32, per_page: u32 },
    /// Recipe detail
    Recipe(String),
    /// All tabs with their counts
    Tabs,
    /// Tab ids a recipe belongs to
    RecipeTabs(String),
    DailySuggestions,
    TopIngredients(u32),
    /// Taste profile derived from saves and ratings
    Preferences,
}

impl QueryKey {
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryKey::Library(_) => QueryKind::Library,
            QueryKey::Saved { .. } => QueryKind::Saved,
            QueryKey::Recipe(_) => QueryKind::Recipe,
            QueryKey::Tabs => QueryKind::Tabs,
            QueryKey::RecipeTabs(_) => QueryKind::RecipeTabs,
            QueryKey::DailySuggestions => QueryKind::DailySuggestions,
            QueryKey::TopIngredients(_) => QueryKind::TopIngredients,
            QueryKey::Preferences => QueryKind::Preferences,
        }
    }

    /// Issue the request this descriptor stands for.
    pub async fn load(&self, service: &dyn RecipeService) -> ClientResult<QueryValue> {
        Ok(match self {
            QueryKey::Library(query) => QueryValue::Recipes(service.list_recipes(query).await?),
            QueryKey::Saved { page, per_page } => {
                QueryValue::Recipes(service.list_saved(*page, *per_page).await?)
            }
            QueryKey::Recipe(id) => QueryValue::Recipe(service.get_recipe(id).await?),
            QueryKey::Tabs => QueryValue::Tabs(service.list_tabs().await?),
            QueryKey::RecipeTabs(id) => QueryValue::TabIds(service.recipe_tab_ids(id).await?),
            QueryKey::DailySuggestions => {
                QueryValue::Suggestions(service.daily_suggestions().await?)
            }
            QueryKey::TopIngredients(limit) => {
                QueryValue::Ingredients(service.top_ingredients(*limit).await?)
            }
            QueryKey::Preferences => QueryValue::Preferences(service.user_preferences().await?),
        })
    }
}

/// A set of cache entries addressed together by an invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFamily {
    /// Every entry of a kind (all pages, all filters)
    Kind(QueryKind),
    /// Detail entry of one recipe
    Recipe(String),
    /// Tab id list of one recipe
    RecipeTabs(String),
    /// Library pages filtered to one tab
    LibraryInTab(TabId),
}

impl QueryFamily {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match (self, key) {
            (QueryFamily::Kind(kind), key) => key.kind() == *kind,
            (QueryFamily::Recipe(id), QueryKey::Recipe(other)) => id == other,
            (QueryFamily::RecipeTabs(id), QueryKey::RecipeTabs(other)) => id == other,
            (QueryFamily::LibraryInTab(tab), QueryKey::Library(query)) => {
                query.tab_id == Some(*tab)
            }
            _ => false,
        }
    }
}

/// Value stored in a cache entry.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Recipes(RecipePage),
    Recipe(Recipe),
    Tabs(Vec<Tab>),
    TabIds(Vec<TabId>),
    Suggestions(DailySuggestion),
    Ingredients(Vec<TopIngredient>),
    Preferences(UserPreferences),
}

fn mismatch(expected: &str) -> ClientError {
    ClientError::Internal(format!("Cached value is not {}", expected))
}

impl QueryValue {
    pub fn into_page(self) -> ClientResult<RecipePage> {
        match self {
            QueryValue::Recipes(page) => Ok(page),
            _ => Err(mismatch("a recipe page")),
        }
    }

    pub fn into_recipe(self) -> ClientResult<Recipe> {
        match self {
            QueryValue::Recipe(recipe) => Ok(recipe),
            _ => Err(mismatch("a recipe")),
        }
    }

    pub fn into_tabs(self) -> ClientResult<Vec<Tab>> {
        match self {
            QueryValue::Tabs(tabs) => Ok(tabs),
            _ => Err(mismatch("a tab list")),
        }
    }

    pub fn into_tab_ids(self) -> ClientResult<Vec<TabId>> {
        match self {
            QueryValue::TabIds(ids) => Ok(ids),
            _ => Err(mismatch("a tab id list")),
        }
    }

    pub fn into_suggestions(self) -> ClientResult<DailySuggestion> {
        match self {
            QueryValue::Suggestions(suggestion) => Ok(suggestion),
            _ => Err(mismatch("daily suggestions")),
        }
    }

    pub fn into_ingredients(self) -> ClientResult<Vec<TopIngredient>> {
        match self {
            QueryValue::Ingredients(ingredients) => Ok(ingredients),
            _ => Err(mismatch("an ingredient ranking")),
        }
    }

    pub fn into_preferences(self) -> ClientResult<UserPreferences> {
        match self {
            QueryValue::Preferences(preferences) => Ok(preferences),
            _ => Err(mismatch("a preference profile")),
        }
    }

    /// Every recipe held by this value.
    pub fn recipes_mut(&mut self) -> Vec<&mut Recipe> {
        match self {
            QueryValue::Recipes(page) => page.recipes.iter_mut().collect(),
            QueryValue::Recipe(recipe) => vec![recipe],
            QueryValue::Suggestions(suggestion) => suggestion.recipes.iter_mut().collect(),
            QueryValue::Tabs(_)
            | QueryValue::TabIds(_)
            | QueryValue::Ingredients(_)
            | QueryValue::Preferences(_) => Vec::new(),
        }
    }
}
