//! Named response caches
//!
//! The worker never touches a concrete store directly. It is handed an
//! `Arc<dyn CacheStorage>` and opens caches by name, where the name is the
//! generation identifier of the deployment.
//!
//! # Backends
//!
//! | Backend | Persistence | Used by |
//! |---------|-------------|---------|
//! | `MemoryStorage` | process lifetime | tests, `storage.backend = "memory"` |
//! | `DiskStorage` | one directory per cache | the `precache` host |
//!
//! All writes are keyed puts: two writers racing on the same request
//! identity leave whichever finished last.

pub mod disk;
pub mod entry;
pub mod memory;

pub use disk::DiskStorage;
pub use entry::{format_bytes, CachedEntry};
pub use memory::MemoryStorage;

use crate::config::schema::StorageConfig;
use crate::config::ConfigManager;
use crate::error::{PrecacheError, PrecacheResult};
use crate::http::{Method, Request, RequestKey, Response};
use async_trait::async_trait;
use std::sync::Arc;

/// The set of named caches owned by the worker
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a cache by name, creating it if it does not exist
    async fn open(&self, name: &str) -> PrecacheResult<Arc<dyn Cache>>;

    /// Check whether a cache with this name exists
    async fn has(&self, name: &str) -> PrecacheResult<bool>;

    /// Names of every existing cache
    async fn keys(&self) -> PrecacheResult<Vec<String>>;

    /// Delete a cache and all of its entries. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> PrecacheResult<bool>;

    /// Human-readable backend name for display
    fn backend_name(&self) -> &'static str;
}

/// A single named cache of request/response pairs
#[async_trait]
pub trait Cache: Send + Sync {
    fn name(&self) -> &str;

    /// Raw lookup by identity, without `Vary` checks
    async fn lookup(&self, key: &RequestKey) -> PrecacheResult<Option<CachedEntry>>;

    /// Commit a batch of entries. Either every entry becomes visible or none does.
    async fn store(&self, entries: Vec<CachedEntry>) -> PrecacheResult<()>;

    /// Remove an entry by identity. Returns false if it was absent.
    async fn remove(&self, key: &RequestKey) -> PrecacheResult<bool>;

    /// Every stored entry
    async fn entries(&self) -> PrecacheResult<Vec<CachedEntry>>;

    /// Find the stored response for a request
    ///
    /// Only GET requests ever match.
    async fn match_request(&self, request: &Request) -> PrecacheResult<Option<Response>> {
        if request.method != Method::Get {
            return Ok(None);
        }

        Ok(self
            .lookup(&request.key())
            .await?
            .filter(|entry| entry.matches(request))
            .map(|entry| entry.response))
    }

    /// Store a response under the request's identity
    async fn put(&self, request: &Request, response: Response) -> PrecacheResult<()> {
        self.store(vec![CachedEntry::new(request, response)?]).await
    }

    /// Store several responses atomically
    async fn put_all(&self, pairs: Vec<(Request, Response)>) -> PrecacheResult<()> {
        let entries = pairs
            .into_iter()
            .map(|(request, response)| CachedEntry::new(&request, response))
            .collect::<PrecacheResult<Vec<_>>>()?;
        self.store(entries).await
    }

    /// Remove the entry stored for a request
    async fn delete(&self, request: &Request) -> PrecacheResult<bool> {
        self.remove(&request.key()).await
    }
}

/// Create the storage backend selected in configuration
pub fn create_storage(config: &StorageConfig) -> PrecacheResult<Arc<dyn CacheStorage>> {
    match config.backend.as_str() {
        "disk" => {
            let dir = config
                .dir
                .clone()
                .unwrap_or_else(ConfigManager::caches_dir);
            Ok(Arc::new(DiskStorage::new(dir)))
        }
        "memory" => Ok(Arc::new(MemoryStorage::new())),
        other => Err(PrecacheError::User(format!(
            "Unknown storage backend '{}'. Expected \"disk\" or \"memory\"",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_storage_selects_backend() {
        let temp = TempDir::new().unwrap();
        let config = StorageConfig {
            backend: "disk".to_string(),
            dir: Some(temp.path().to_path_buf()),
        };
        assert_eq!(create_storage(&config).unwrap().backend_name(), "disk");

        let config = StorageConfig {
            backend: "memory".to_string(),
            dir: None,
        };
        assert_eq!(create_storage(&config).unwrap().backend_name(), "memory");
    }

    #[test]
    fn create_storage_rejects_unknown() {
        let config = StorageConfig {
            backend: "redis".to_string(),
            dir: None,
        };
        assert!(create_storage(&config).is_err());
    }

    #[tokio::test]
    async fn match_ignores_non_get() {
        let storage = MemoryStorage::new();
        let cache = storage.open("v1").await.unwrap();
        let get = Request::parse("https://example.com/a").unwrap();
        cache.put(&get, Response::new(200, "OK", "a")).await.unwrap();

        let mut head = get.clone();
        head.method = Method::Head;
        assert!(cache.match_request(&head).await.unwrap().is_none());
        assert!(cache.match_request(&get).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn put_rejects_non_get() {
        let storage = MemoryStorage::new();
        let cache = storage.open("v1").await.unwrap();
        let post = Request::parse("https://example.com/a")
            .unwrap()
            .with_body("x");
        let post = Request {
            method: Method::Post,
            ..post
        };

        assert!(cache.put(&post, Response::new(200, "OK", "")).await.is_err());
        assert!(cache.entries().await.unwrap().is_empty());
    }
}
