//! Test doubles for the storage and network seams

use crate::cache::{Cache, CacheStorage, CachedEntry, MemoryStorage};
use crate::error::{PrecacheError, PrecacheResult};
use crate::http::{Request, RequestKey, Response};
use crate::network::Network;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Network that answers from a fixed table and records every call
///
/// URLs missing from the table fail with `PrecacheError::Network`, as does
/// everything once `go_offline` has been called.
#[derive(Debug, Default)]
pub struct ScriptedNetwork {
    routes: Mutex<HashMap<String, Response>>,
    calls: Mutex<Vec<String>>,
    offline: Mutex<bool>,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, response: Response) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
        self
    }

    pub fn go_offline(&self) {
        *self.offline.lock().unwrap() = true;
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> PrecacheResult<Response> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(url.clone());

        if *self.offline.lock().unwrap() {
            return Err(PrecacheError::Network("offline".to_string()));
        }

        self.routes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .ok_or_else(|| PrecacheError::Network(format!("no route to {}", url)))
    }
}

/// Storage whose caches can be made to fail reads or writes
#[derive(Debug, Clone, Default)]
pub struct FlakyStorage {
    inner: MemoryStorage,
    fail_reads: bool,
    fail_writes: bool,
}

impl FlakyStorage {
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::default()
        }
    }

    pub fn inner(&self) -> &MemoryStorage {
        &self.inner
    }
}

#[async_trait]
impl CacheStorage for FlakyStorage {
    async fn open(&self, name: &str) -> PrecacheResult<Arc<dyn Cache>> {
        Ok(Arc::new(FlakyCache {
            inner: self.inner.open(name).await?,
            fail_reads: self.fail_reads,
            fail_writes: self.fail_writes,
        }))
    }

    async fn has(&self, name: &str) -> PrecacheResult<bool> {
        self.inner.has(name).await
    }

    async fn keys(&self) -> PrecacheResult<Vec<String>> {
        self.inner.keys().await
    }

    async fn delete(&self, name: &str) -> PrecacheResult<bool> {
        self.inner.delete(name).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

struct FlakyCache {
    inner: Arc<dyn Cache>,
    fail_reads: bool,
    fail_writes: bool,
}

#[async_trait]
impl Cache for FlakyCache {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn lookup(&self, key: &RequestKey) -> PrecacheResult<Option<CachedEntry>> {
        if self.fail_reads {
            return Err(PrecacheError::storage("reading", "store unavailable"));
        }
        self.inner.lookup(key).await
    }

    async fn store(&self, entries: Vec<CachedEntry>) -> PrecacheResult<()> {
        if self.fail_writes {
            return Err(PrecacheError::storage("writing", "quota exceeded"));
        }
        self.inner.store(entries).await
    }

    async fn remove(&self, key: &RequestKey) -> PrecacheResult<bool> {
        self.inner.remove(key).await
    }

    async fn entries(&self) -> PrecacheResult<Vec<CachedEntry>> {
        self.inner.entries().await
    }
}

/// Plain `200 OK` response with the given body
pub fn ok(body: &str) -> Response {
    Response::new(200, "OK", body.as_bytes().to_vec())
}
