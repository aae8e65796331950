//! In-memory cache storage

use crate::cache::{Cache, CacheStorage, CachedEntry};
use crate::error::PrecacheResult;
use crate::http::RequestKey;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Cache storage held entirely in process memory
///
/// Cloning shares the underlying caches.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    caches: Arc<RwLock<BTreeMap<String, Arc<MemoryCache>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> PrecacheResult<Arc<dyn Cache>> {
        let mut caches = self.caches.write().await;
        let cache: Arc<dyn Cache> = caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::new(name)))
            .clone();
        Ok(cache)
    }

    async fn has(&self, name: &str) -> PrecacheResult<bool> {
        Ok(self.caches.read().await.contains_key(name))
    }

    async fn keys(&self) -> PrecacheResult<Vec<String>> {
        Ok(self.caches.read().await.keys().cloned().collect())
    }

    async fn delete(&self, name: &str) -> PrecacheResult<bool> {
        Ok(self.caches.write().await.remove(name).is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// A single in-memory cache
///
/// A handle stays usable after its cache is deleted from the storage; its
/// writes are simply no longer reachable by name.
#[derive(Debug)]
pub struct MemoryCache {
    name: String,
    entries: RwLock<HashMap<RequestKey, CachedEntry>>,
}

impl MemoryCache {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn lookup(&self, key: &RequestKey) -> PrecacheResult<Option<CachedEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn store(&self, entries: Vec<CachedEntry>) -> PrecacheResult<()> {
        // One write lock for the whole batch keeps it atomic to readers
        let mut map = self.entries.write().await;
        for entry in entries {
            map.insert(entry.key.clone(), entry);
        }
        Ok(())
    }

    async fn remove(&self, key: &RequestKey) -> PrecacheResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn entries(&self) -> PrecacheResult<Vec<CachedEntry>> {
        let mut entries: Vec<CachedEntry> = self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }
}
