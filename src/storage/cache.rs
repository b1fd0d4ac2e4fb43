//! Per-entity in-memory record caches.

use crate::models::EntityType;
use crate::storage::sqlite::acquire_lock;
use crate::storage::traits::SqlValue;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;

const DEFAULT_CAPACITY: usize = 512;

/// LRU caches of store rows, one per entity type, keyed by natural key.
///
/// A successful bulk import invalidates the whole cache of its entity type.
pub struct RecordCache {
    capacity: NonZeroUsize,
    caches: Mutex<HashMap<EntityType, LruCache<String, Vec<SqlValue>>>>,
}

impl RecordCache {
    /// Creates a cache holding up to `capacity` rows per entity type.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a cached row.
    #[must_use]
    pub fn get(&self, entity: EntityType, key: &str) -> Option<Vec<SqlValue>> {
        let mut caches = acquire_lock(&self.caches);
        caches.get_mut(&entity).and_then(|c| c.get(key).cloned())
    }

    /// Caches a row.
    pub fn put(&self, entity: EntityType, key: impl Into<String>, row: Vec<SqlValue>) {
        let mut caches = acquire_lock(&self.caches);
        caches
            .entry(entity)
            .or_insert_with(|| LruCache::new(self.capacity))
            .put(key.into(), row);
    }

    /// Drops every cached row of `entity`.
    pub fn invalidate(&self, entity: EntityType) {
        let mut caches = acquire_lock(&self.caches);
        if let Some(cache) = caches.get_mut(&entity) {
            tracing::debug!(entity = %entity, dropped = cache.len(), "Cache invalidated");
            cache.clear();
        }
    }

    /// Returns the number of cached rows of `entity`.
    #[must_use]
    pub fn len(&self, entity: EntityType) -> usize {
        let caches = acquire_lock(&self.caches);
        caches.get(&entity).map_or(0, LruCache::len)
    }

    /// Returns whether no row of `entity` is cached.
    #[must_use]
    pub fn is_empty(&self, entity: EntityType) -> bool {
        self.len(entity) == 0
    }
}

impl Default for RecordCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
