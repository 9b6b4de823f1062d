//! Recipe lists held outside the query cache, such as generation results.
//!
//! Patches are applied only after the service confirms a mutation, using the
//! same patch rules as the cache.

use crate::models::Recipe;
use crate::mutation::{patch_recipe, MutationOutcome};

/// A list of recipes kept in sync with confirmed mutations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultList {
    recipes: Vec<Recipe>,
}

impl ResultList {
    pub fn new(recipes: Vec<Recipe>) -> Self {
        Self { recipes }
    }

    pub fn replace(&mut self, recipes: Vec<Recipe>) {
        self.recipes = recipes;
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Apply a confirmed mutation. Returns whether any entry changed.
    pub fn apply(&mut self, outcome: &MutationOutcome) -> bool {
        self.recipes
            .iter_mut()
            .fold(false, |changed, recipe| patch_recipe(outcome, recipe) || changed)
    }
}
