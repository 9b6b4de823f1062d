//! Per-entity in-flight tracking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::models::TabId;

/// Entity a mutation writes to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Recipe(String),
    Tab(TabId),
    Membership { tab_id: TabId, recipe_id: String },
}

/// Counts mutations in flight per entity so views can disable their controls.
///
/// This is a counter, not a lock: two mutations of the same entity may run
/// at once and the last to complete wins.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    counts: Arc<Mutex<HashMap<EntityKey, usize>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn counts(&self) -> MutexGuard<'_, HashMap<EntityKey, usize>> {
        // A poisoned counter map is still consistent: every update is a single insert or remove
        self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a mutation; the entity stays pending until the guard drops.
    pub fn begin(&self, key: EntityKey) -> InFlightGuard {
        *self.counts().entry(key.clone()).or_insert(0) += 1;
        InFlightGuard {
            set: self.clone(),
            key,
        }
    }

    pub fn is_pending(&self, key: &EntityKey) -> bool {
        self.counts().contains_key(key)
    }

    pub fn pending(&self) -> Vec<EntityKey> {
        self.counts().keys().cloned().collect()
    }
}

/// Keeps an entity pending while alive.
#[derive(Debug)]
pub struct InFlightGuard {
    set: InFlight,
    key: EntityKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut counts = self.set.counts();
        if let Some(count) = counts.get_mut(&self.key) {
            *count -= 1;
            if *count == 0 {
                counts.remove(&self.key);
            }
        }
    }
}
