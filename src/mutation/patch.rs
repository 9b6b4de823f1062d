//! Local patches derived from confirmed mutation results.
//!
//! The same functions patch cache entries and lists held outside the cache.

use super::MutationOutcome;
use crate::cache::QueryValue;
use crate::models::Recipe;

/// Apply a mutation result to one recipe. Returns whether anything changed.
pub fn patch_recipe(outcome: &MutationOutcome, recipe: &mut Recipe) -> bool {
    match outcome {
        MutationOutcome::Recipe(updated) if updated.id == recipe.id => {
            if recipe == updated {
                return false;
            }
            *recipe = updated.clone();
            true
        }
        MutationOutcome::Unsaved { recipe_id } if *recipe_id == recipe.id => {
            let changed = recipe.is_saved || recipe.rating.is_some();
            recipe.is_saved = false;
            recipe.rating = None;
            changed
        }
        MutationOutcome::ImageRemoved { recipe_id } if *recipe_id == recipe.id => {
            recipe.image_url.take().is_some()
        }
        _ => false,
    }
}

/// Apply a mutation result to every recipe inside a cached value.
pub fn patch_value(outcome: &MutationOutcome, value: &mut QueryValue) -> bool {
    value
        .recipes_mut()
        .into_iter()
        .fold(false, |changed, recipe| patch_recipe(outcome, recipe) || changed)
}
