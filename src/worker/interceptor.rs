//! Fetch step: cache-first with network fallback
//!
//! Decision order for every request:
//!
//! 1. Non-GET requests pass through untouched.
//! 2. A cached response for the request is returned as-is.
//! 3. Otherwise the network answers. Successful same-origin responses are
//!    copied into the cache by a detached task.
//! 4. If the network fails, navigations get the offline page and
//!    everything else gets an empty `503 Offline`.
//!
//! Nothing in this path returns an error to the page.

use crate::cache::CacheStorage;
use crate::error::PrecacheResult;
use crate::http::{Method, Request, Response};
use crate::network::Network;
use crate::worker::manifest::WorkerSettings;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Where an intercepted response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    OfflinePage,
    Synthesized,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Network => write!(f, "network"),
            Self::OfflinePage => write!(f, "offline page"),
            Self::Synthesized => write!(f, "synthesized"),
        }
    }
}

/// A response produced by the interceptor
#[derive(Debug)]
pub struct Intercepted {
    pub response: Response,
    pub source: ResponseSource,
    /// Background cache write, if one was started
    ///
    /// Dropping the handle detaches the task; it keeps running.
    pub write_back: Option<JoinHandle<()>>,
}

impl Intercepted {
    fn new(response: Response, source: ResponseSource) -> Self {
        Self {
            response,
            source,
            write_back: None,
        }
    }
}

/// What the worker did with a fetch event
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the host sends the request itself
    Passthrough,
    Respond(Intercepted),
}

impl FetchOutcome {
    pub fn into_intercepted(self) -> Option<Intercepted> {
        match self {
            Self::Passthrough => None,
            Self::Respond(intercepted) => Some(intercepted),
        }
    }
}

/// Per-request fetch policy
pub struct Interceptor {
    settings: Arc<WorkerSettings>,
    storage: Arc<dyn CacheStorage>,
    network: Arc<dyn Network>,
}

impl Interceptor {
    pub fn new(
        settings: Arc<WorkerSettings>,
        storage: Arc<dyn CacheStorage>,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            settings,
            storage,
            network,
        }
    }

    pub async fn handle(&self, request: Request) -> FetchOutcome {
        if request.method != Method::Get {
            debug!("Passthrough: {} {}", request.method, request.url);
            return FetchOutcome::Passthrough;
        }

        if let Some(response) = self.lookup(&request).await {
            debug!("Cache hit: {}", request.url);
            return FetchOutcome::Respond(Intercepted::new(response, ResponseSource::Cache));
        }

        debug!("Cache miss: {}", request.url);
        let intercepted = match self.network.fetch(&request).await {
            Ok(response) => {
                let write_back = if self.should_store(&request, &response) {
                    Some(self.spawn_write_back(request, response.clone()))
                } else {
                    None
                };
                Intercepted {
                    response,
                    source: ResponseSource::Network,
                    write_back,
                }
            }
            Err(e) => {
                debug!("Network failed for {}: {}", request.url, e);
                self.fallback(&request).await
            }
        };

        FetchOutcome::Respond(intercepted)
    }

    /// Only successful responses from the page's own origin are kept
    fn should_store(&self, request: &Request, response: &Response) -> bool {
        response.is_ok() && self.settings.is_same_origin(&request.url)
    }

    /// Cache lookup in the current generation; any failure counts as a miss
    async fn lookup(&self, request: &Request) -> Option<Response> {
        match self.try_lookup(request).await {
            Ok(found) => found,
            Err(e) => {
                warn!("Cache lookup failed for {}: {}", request.url, e);
                None
            }
        }
    }

    async fn try_lookup(&self, request: &Request) -> PrecacheResult<Option<Response>> {
        let generation = &self.settings.generation;
        // Looking up must not recreate a cache that activation deleted
        if !self.storage.has(generation).await? {
            return Ok(None);
        }
        self.storage
            .open(generation)
            .await?
            .match_request(request)
            .await
    }

    fn spawn_write_back(&self, request: Request, response: Response) -> JoinHandle<()> {
        let storage = Arc::clone(&self.storage);
        let generation = self.settings.generation.clone();

        tokio::spawn(async move {
            match write_back(storage.as_ref(), &generation, &request, response).await {
                Ok(()) => debug!("Cached {}", request.url),
                Err(e) => warn!("Failed to cache {}: {}", request.url, e),
            }
        })
    }

    async fn fallback(&self, request: &Request) -> Intercepted {
        if request.is_navigation() {
            let offline = Request::get(self.settings.offline_page.clone());
            if let Some(response) = self.lookup(&offline).await {
                return Intercepted::new(response, ResponseSource::OfflinePage);
            }
            warn!(
                "Offline page {} is not cached; answering {} with 503",
                self.settings.offline_page, request.url
            );
        }

        Intercepted::new(Response::offline(), ResponseSource::Synthesized)
    }
}

async fn write_back(
    storage: &dyn CacheStorage,
    generation: &str,
    request: &Request,
    response: Response,
) -> PrecacheResult<()> {
    storage.open(generation).await?.put(request, response).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStorage;
    use crate::http::RequestMode;
    use crate::testing::{ok, FlakyStorage, ScriptedNetwork};
    use crate::worker::manifest::AssetManifest;
    use url::Url;

    const GENERATION: &str = "v9";

    fn settings() -> Arc<WorkerSettings> {
        Arc::new(
            WorkerSettings::new(
                GENERATION,
                "https://example.com/app/",
                &AssetManifest::new(["index.html"]),
                "index.html",
            )
            .unwrap(),
        )
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    async fn seeded_storage() -> Arc<MemoryStorage> {
        let storage = Arc::new(MemoryStorage::new());
        let cache = storage.open(GENERATION).await.unwrap();
        cache
            .put(
                &get("https://example.com/app/index.html"),
                ok("<html>offline home</html>").with_header("Content-Type", "text/html"),
            )
            .await
            .unwrap();
        storage
    }

    async fn cached_urls(storage: &MemoryStorage) -> Vec<String> {
        storage
            .open(GENERATION)
            .await
            .unwrap()
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.key.url)
            .collect()
    }

    fn respond(outcome: FetchOutcome) -> Intercepted {
        outcome.into_intercepted().expect("request should be intercepted")
    }

    #[tokio::test]
    async fn cache_hit_skips_network() {
        let storage = seeded_storage().await;
        let network = Arc::new(ScriptedNetwork::new());
        let interceptor = Interceptor::new(settings(), storage, network.clone());

        let out = respond(interceptor.handle(get("https://example.com/app/index.html")).await);

        assert_eq!(out.source, ResponseSource::Cache);
        assert_eq!(out.response.body, b"<html>offline home</html>");
        assert!(out.write_back.is_none());
        assert_eq!(network.call_count(), 0);
    }

    #[tokio::test]
    async fn non_get_passes_through() {
        let storage = Arc::new(FlakyStorage::failing_reads());
        let network = Arc::new(ScriptedNetwork::new());
        let interceptor = Interceptor::new(settings(), storage.clone(), network.clone());

        let mut post = get("https://example.com/app/index.html").with_body("form=1");
        post.method = Method::Post;

        assert!(matches!(interceptor.handle(post).await, FetchOutcome::Passthrough));
        assert_eq!(network.call_count(), 0);
        assert!(storage.inner().keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_origin_miss_is_written_back() {
        let storage = seeded_storage().await;
        let network = Arc::new(
            ScriptedNetwork::new().route("https://example.com/app/data.json", ok("{\"a\":1}")),
        );
        let interceptor = Interceptor::new(settings(), storage.clone(), network.clone());

        let out = respond(interceptor.handle(get("https://example.com/app/data.json")).await);
        assert_eq!(out.source, ResponseSource::Network);
        assert_eq!(out.response.body, b"{\"a\":1}");
        out.write_back.expect("write-back should start").await.unwrap();

        assert!(cached_urls(&storage)
            .await
            .contains(&"https://example.com/app/data.json".to_string()));

        // Second request is served from cache
        let again = respond(interceptor.handle(get("https://example.com/app/data.json")).await);
        assert_eq!(again.source, ResponseSource::Cache);
        assert_eq!(network.call_count(), 1);
    }

    #[tokio::test]
    async fn cross_origin_miss_is_not_cached() {
        let storage = seeded_storage().await;
        let network = Arc::new(
            ScriptedNetwork::new().route("https://cdn.example.net/lib.js", ok("lib()")),
        );
        let interceptor = Interceptor::new(settings(), storage.clone(), network);

        let out = respond(interceptor.handle(get("https://cdn.example.net/lib.js")).await);
        assert_eq!(out.source, ResponseSource::Network);
        assert_eq!(out.response.body, b"lib()");
        assert!(out.write_back.is_none());
        assert_eq!(cached_urls(&storage).await.len(), 1);
    }

    #[tokio::test]
    async fn error_status_is_returned_but_not_cached() {
        let storage = seeded_storage().await;
        let network = Arc::new(ScriptedNetwork::new().route(
            "https://example.com/app/missing.png",
            Response::new(404, "Not Found", "nope"),
        ));
        let interceptor = Interceptor::new(settings(), storage.clone(), network);

        let out = respond(interceptor.handle(get("https://example.com/app/missing.png")).await);
        assert_eq!(out.response.status, 404);
        assert!(out.write_back.is_none());
        assert_eq!(cached_urls(&storage).await.len(), 1);
    }

    #[tokio::test]
    async fn failed_navigation_gets_offline_page() {
        let storage = seeded_storage().await;
        let network = Arc::new(ScriptedNetwork::new());
        network.go_offline();
        let interceptor = Interceptor::new(settings(), storage.clone(), network);

        let precached = storage
            .open(GENERATION)
            .await
            .unwrap()
            .match_request(&get("https://example.com/app/index.html"))
            .await
            .unwrap()
            .unwrap();

        let nav = get("https://example.com/app/settings").with_mode(RequestMode::Navigate);
        let out = respond(interceptor.handle(nav).await);

        assert_eq!(out.source, ResponseSource::OfflinePage);
        assert_eq!(out.response, precached);
    }

    #[tokio::test]
    async fn failed_subresource_gets_empty_503() {
        let storage = seeded_storage().await;
        let network = Arc::new(ScriptedNetwork::new());
        network.go_offline();
        let interceptor = Interceptor::new(settings(), storage, network);

        let out = respond(interceptor.handle(get("https://example.com/app/chart.js")).await);

        assert_eq!(out.source, ResponseSource::Synthesized);
        assert_eq!(out.response.status, 503);
        assert!(out.response.body.is_empty());
    }

    #[tokio::test]
    async fn failed_navigation_without_offline_page_gets_503() {
        let storage = Arc::new(MemoryStorage::new());
        let network = Arc::new(ScriptedNetwork::new());
        network.go_offline();
        let interceptor = Interceptor::new(settings(), storage, network);

        let nav = get("https://example.com/app/").with_mode(RequestMode::Navigate);
        let out = respond(interceptor.handle(nav).await);

        assert_eq!(out.source, ResponseSource::Synthesized);
        assert_eq!(out.response.status, 503);
    }

    #[tokio::test]
    async fn write_failure_does_not_affect_response() {
        let storage = Arc::new(FlakyStorage::failing_writes());
        let network = Arc::new(
            ScriptedNetwork::new().route("https://example.com/app/data.json", ok("fresh")),
        );
        let interceptor = Interceptor::new(settings(), storage.clone(), network);

        let out = respond(interceptor.handle(get("https://example.com/app/data.json")).await);
        assert_eq!(out.response.body, b"fresh");
        out.write_back.unwrap().await.unwrap();

        let cache = storage.inner().open(GENERATION).await.unwrap();
        assert!(cache.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn read_failure_falls_back_to_network() {
        let storage = Arc::new(FlakyStorage::failing_reads());
        storage.open(GENERATION).await.unwrap();
        let network = Arc::new(
            ScriptedNetwork::new().route("https://example.com/app/index.html", ok("live")),
        );
        let interceptor = Interceptor::new(settings(), storage, network.clone());

        let out = respond(interceptor.handle(get("https://example.com/app/index.html")).await);
        assert_eq!(out.source, ResponseSource::Network);
        assert_eq!(network.call_count(), 1);
    }
}
