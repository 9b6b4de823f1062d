//! View composer: turns filter state into query descriptors.

use crate::cache::QueryKey;
use crate::models::{RecipeQuery, RecipeSource, TabId};

pub const DEFAULT_PER_PAGE: u32 = 20;

/// Filter and pagination state of the library view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    search: Option<String>,
    source: Option<RecipeSource>,
    tab_id: Option<TabId>,
    page: u32,
    per_page: u32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(DEFAULT_PER_PAGE)
    }
}

impl ViewState {
    pub fn new(per_page: u32) -> Self {
        Self {
            search: None,
            source: None,
            tab_id: None,
            page: 1,
            per_page: per_page.max(1),
        }
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn source(&self) -> Option<RecipeSource> {
        self.source
    }

    pub fn tab_id(&self) -> Option<TabId> {
        self.tab_id
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    // Every filter change starts over at page 1.

    pub fn set_search(&mut self, search: &str) {
        self.search = normalize_search(search);
        self.page = 1;
    }

    pub fn set_source(&mut self, source: Option<RecipeSource>) {
        self.source = source;
        self.page = 1;
    }

    pub fn set_tab(&mut self, tab_id: Option<TabId>) {
        self.tab_id = tab_id;
        self.page = 1;
    }

    pub fn set_page(&mut self, page: u32) {
        self.page = page.max(1);
    }

    pub fn next_page(&mut self) {
        self.page = self.page.saturating_add(1);
    }

    pub fn prev_page(&mut self) {
        self.page = self.page.saturating_sub(1).max(1);
    }

    /// Drop the tab filter if it points at `tab_id`. Returns whether it did.
    pub fn clear_tab_if(&mut self, tab_id: TabId) -> bool {
        if self.tab_id == Some(tab_id) {
            self.set_tab(None);
            true
        } else {
            false
        }
    }

    /// Move back to the last page when the current one is past the end.
    pub fn clamp_to(&mut self, total_pages: u32) -> bool {
        let last = total_pages.max(1);
        if self.page > last {
            self.page = last;
            true
        } else {
            false
        }
    }

    pub fn descriptor(&self) -> QueryKey {
        compose(
            self.search.as_deref(),
            self.source,
            self.tab_id,
            self.page,
            self.per_page,
        )
    }
}

/// Trim a search string; blank means no search.
pub fn normalize_search(search: &str) -> Option<String> {
    let trimmed = search.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Build the library descriptor for a set of filters.
pub fn compose(
    search: Option<&str>,
    source: Option<RecipeSource>,
    tab_id: Option<TabId>,
    page: u32,
    per_page: u32,
) -> QueryKey {
    QueryKey::Library(RecipeQuery {
        page: page.max(1),
        per_page: per_page.max(1),
        search: search.and_then(normalize_search),
        source,
        tab_id,
    })
}

/// Number of pages needed for `total` items.
pub fn total_pages(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    let pages = total.div_ceil(per_page as u64);
    u32::try_from(pages).unwrap_or(u32::MAX)
}
