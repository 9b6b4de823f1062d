//! Tab (named collection) model.

use serde::{Deserialize, Serialize};

/// Server-assigned tab identifier.
pub type TabId = i64;

/// A named collection of recipes.
///
/// `recipe_count` is computed by the service from the membership set and is
/// only ever replaced by a refetch, never adjusted locally.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tab {
    pub id: TabId,
    pub name: String,
    pub position: i64,
    pub recipe_count: u64,
}

/// Request body for creating a new tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTabRequest {
    pub name: String,
}

/// Request body for updating an existing tab.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTabRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

/// Request body for adding recipes to a tab.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddRecipesToTabRequest {
    pub recipe_ids: Vec<String>,
}

/// Validate and normalize a tab name.
pub fn normalize_tab_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
