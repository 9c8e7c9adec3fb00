//! The fetch policy router.
//!
//! `FetchRouter::handle` is the intercepted-fetch entry point: it classifies
//! the request and runs the matching policy against the current version's
//! cache and the network.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Method;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::cache::{Cache, CacheError, CacheStorage};
use crate::config::WorkerConfig;
use crate::fetch::{fetch_with_timeout, FetchError, Fetcher};
use crate::models::{Request, RequestKey, Response};
use crate::policy::{classify, Policy};

/// Where a routed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    /// The shell document served in place of an uncached page.
    ShellFallback,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSource::Network => write!(f, "network"),
            ResponseSource::Cache => write!(f, "cache"),
            ResponseSource::ShellFallback => write!(f, "shell fallback"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Routed {
    pub response: Response,
    pub policy: Policy,
    pub source: ResponseSource,
}

/// A cache write that failed after the response was already returned.
#[derive(Debug)]
pub struct CacheWriteFailure {
    pub cache: String,
    pub key: RequestKey,
    pub error: CacheError,
}

pub type CacheWriteHook = Arc<dyn Fn(&CacheWriteFailure) + Send + Sync>;

fn log_write_failure(failure: &CacheWriteFailure) {
    warn!(
        cache = %failure.cache,
        key = %failure.key,
        error = %failure.error,
        "Cache write failed"
    );
}

pub struct FetchRouter<F> {
    config: Arc<WorkerConfig>,
    storage: CacheStorage,
    fetcher: Arc<F>,
    on_write_failure: CacheWriteHook,
    background: Mutex<JoinSet<()>>,
}

impl<F: Fetcher> FetchRouter<F> {
    pub fn new(config: Arc<WorkerConfig>, storage: CacheStorage, fetcher: Arc<F>) -> Self {
        Self {
            config,
            storage,
            fetcher,
            on_write_failure: Arc::new(log_write_failure),
            background: Mutex::new(JoinSet::new()),
        }
    }

    /// Replace the default logging hook for failed cache writes.
    pub fn with_write_failure_hook(mut self, hook: CacheWriteHook) -> Self {
        self.on_write_failure = hook;
        self
    }

    pub async fn handle(&self, request: &Request) -> Result<Response, FetchError> {
        self.route(request).await.map(|routed| routed.response)
    }

    /// Like `handle`, but also reports the policy and where the response came from.
    pub async fn route(&self, request: &Request) -> Result<Routed, FetchError> {
        // Caches only hold GET entries; everything else goes straight out
        if request.method != Method::GET {
            let response = self.network(request).await?;
            return Ok(Routed {
                response,
                policy: Policy::Network,
                source: ResponseSource::Network,
            });
        }

        let policy = classify(request, &self.config);
        debug!(url = %request.url, policy = %policy, "Routing request");
        let (response, source) = match policy {
            Policy::Asset => self.cache_first(request).await?,
            Policy::Document => self.stale_while_revalidate(request).await?,
            Policy::Network => self.network_first(request).await?,
        };
        Ok(Routed {
            response,
            policy,
            source,
        })
    }

    /// Wait for outstanding background cache writes.
    pub async fn settle(&self) {
        let mut pending = std::mem::take(&mut *self.lock_background());
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Background cache task did not complete");
            }
        }
    }

    fn lock_background(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.background.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_cache(&self) -> Option<Arc<Cache>> {
        let name = self.config.cache_name();
        match self.storage.open(&name) {
            Ok(cache) => Some(cache),
            Err(e) => {
                warn!(cache = %name, error = %e, "Cache storage unavailable");
                None
            }
        }
    }

    async fn network(&self, request: &Request) -> Result<Response, FetchError> {
        fetch_with_timeout(self.fetcher.as_ref(), request, self.config.request_timeout).await
    }

    async fn cache_first(&self, request: &Request) -> Result<(Response, ResponseSource), FetchError> {
        let cache = self.current_cache();
        if let Some(hit) = cache.as_ref().and_then(|c| c.lookup(request)) {
            debug!(url = %request.url, "Asset cache hit");
            return Ok((hit, ResponseSource::Cache));
        }

        let response = self.network(request).await?;
        if let Some(cache) = cache {
            // Stored before returning so the next request is a hit
            let hook = Arc::clone(&self.on_write_failure);
            let (key, copy) = (request.key(), response.clone());
            let write = tokio::task::spawn_blocking(move || store_entry(&cache, key, copy, &hook));
            if let Err(e) = write.await {
                warn!(url = %request.url, error = %e, "Asset cache write did not complete");
            }
        }
        Ok((response, ResponseSource::Network))
    }

    async fn stale_while_revalidate(
        &self,
        request: &Request,
    ) -> Result<(Response, ResponseSource), FetchError> {
        match self.network(request).await {
            Ok(response) => {
                if let Some(cache) = self.current_cache() {
                    self.spawn_cache_write(cache, request.key(), response.clone());
                }
                Ok((response, ResponseSource::Network))
            }
            Err(network_error) => {
                debug!(url = %request.url, error = %network_error, "Document fetch failed, trying cache");
                let Some(cache) = self.current_cache() else {
                    return Err(network_error);
                };
                if let Some(hit) = cache.lookup(request) {
                    return Ok((hit, ResponseSource::Cache));
                }
                let shell = self
                    .config
                    .resolve(&self.config.fallback_document)
                    .ok()
                    .and_then(|url| cache.lookup(&Request::get(url)));
                match shell {
                    Some(shell) => Ok((shell, ResponseSource::ShellFallback)),
                    None => Err(network_error),
                }
            }
        }
    }

    async fn network_first(&self, request: &Request) -> Result<(Response, ResponseSource), FetchError> {
        match self.network(request).await {
            Ok(response) => Ok((response, ResponseSource::Network)),
            Err(network_error) => {
                let hit = self.current_cache().and_then(|cache| cache.lookup(request));
                match hit {
                    Some(hit) => Ok((hit, ResponseSource::Cache)),
                    None => Err(network_error),
                }
            }
        }
    }

    /// Best-effort cache update that the response path does not wait for.
    fn spawn_cache_write(&self, cache: Arc<Cache>, key: RequestKey, response: Response) {
        let hook = Arc::clone(&self.on_write_failure);
        let mut background = self.lock_background();
        // Reap finished writes so the set does not grow without bound
        while background.try_join_next().is_some() {}
        background.spawn_blocking(move || store_entry(&cache, key, response, &hook));
    }
}

fn store_entry(cache: &Cache, key: RequestKey, response: Response, hook: &CacheWriteHook) {
    if let Err(error) = cache.put_key(key.clone(), response) {
        hook(&CacheWriteFailure {
            cache: cache.name().to_string(),
            key,
            error,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::ScriptedFetcher;
    use reqwest::Url;
    use std::time::Duration;

    const ORIGIN: &str = "https://klinik.test/";

    struct Harness {
        storage: CacheStorage,
        fetcher: Arc<ScriptedFetcher>,
        router: FetchRouter<ScriptedFetcher>,
    }

    fn harness() -> Harness {
        let config = Arc::new(WorkerConfig::new(Url::parse(ORIGIN).unwrap(), "v1"));
        let storage = CacheStorage::in_memory();
        let fetcher = Arc::new(ScriptedFetcher::new());
        let router = FetchRouter::new(config, storage.clone(), Arc::clone(&fetcher));
        Harness {
            storage,
            fetcher,
            router,
        }
    }

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    fn seed(storage: &CacheStorage, path: &str, body: &str) {
        storage
            .open("klinik-v1")
            .unwrap()
            .put(&Request::get(url(path)), Response::new(url(path).as_str(), 200, body))
            .unwrap();
    }

    #[tokio::test]
    async fn test_asset_second_request_served_from_cache() {
        let h = harness();
        h.fetcher.respond("https://klinik.test/logo.png", 200, "png-bytes");
        let request = Request::get(url("/logo.png"));

        let first = h.router.route(&request).await.unwrap();
        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(first.policy, Policy::Asset);

        let second = h.router.route(&request).await.unwrap();
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(second.response.body, b"png-bytes");
        assert_eq!(h.fetcher.calls_to("https://klinik.test/logo.png"), 1);
    }

    #[tokio::test]
    async fn test_asset_miss_while_offline_propagates() {
        let h = harness();
        h.fetcher.set_offline(true);

        let result = h.router.handle(&Request::get(url("/foto/dokter.jpg"))).await;
        assert!(matches!(result, Err(FetchError::Network { .. })));
        assert!(h.storage.open("klinik-v1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_document_success_refreshes_cache_in_background() {
        let h = harness();
        h.fetcher.respond("https://klinik.test/layanan", 200, "versi baru");
        seed(&h.storage, "/layanan", "versi lama");

        let request = Request::navigate(url("/layanan"));
        let routed = h.router.route(&request).await.unwrap();
        assert_eq!(routed.policy, Policy::Document);
        assert_eq!(routed.source, ResponseSource::Network);
        assert_eq!(routed.response.text(), "versi baru");

        h.router.settle().await;
        let cached = h.storage.open("klinik-v1").unwrap().lookup(&request).unwrap();
        assert_eq!(cached.text(), "versi baru");
    }

    #[tokio::test]
    async fn test_document_offline_uses_cached_page() {
        let h = harness();
        seed(&h.storage, "/jadwal", "jadwal tersimpan");
        seed(&h.storage, "/", "beranda");
        h.fetcher.set_offline(true);

        let routed = h.router.route(&Request::navigate(url("/jadwal"))).await.unwrap();
        assert_eq!(routed.source, ResponseSource::Cache);
        assert_eq!(routed.response.text(), "jadwal tersimpan");
    }

    #[tokio::test]
    async fn test_document_offline_falls_back_to_shell() {
        let h = harness();
        seed(&h.storage, "/", "beranda offline");
        h.fetcher.set_offline(true);

        let routed = h
            .router
            .route(&Request::navigate(url("/layanan/poli-kia")))
            .await
            .unwrap();
        assert_eq!(routed.source, ResponseSource::ShellFallback);
        assert_eq!(routed.response.text(), "beranda offline");
    }

    #[tokio::test]
    async fn test_document_offline_without_shell_propagates() {
        let h = harness();
        h.fetcher.set_offline(true);

        let result = h.router.handle(&Request::navigate(url("/kontak"))).await;
        assert!(matches!(result, Err(FetchError::Network { .. })));
    }

    #[tokio::test]
    async fn test_network_first_falls_back_to_cache() {
        let h = harness();
        seed(&h.storage, "/api/info", "{\"buka\":true}");
        h.fetcher.set_offline(true);

        let routed = h.router.route(&Request::get(url("/api/info"))).await.unwrap();
        assert_eq!(routed.policy, Policy::Network);
        assert_eq!(routed.source, ResponseSource::Cache);

        // No shell fallback for non-documents
        seed(&h.storage, "/", "beranda");
        let missing = h.router.handle(&Request::get(url("/api/lain"))).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_network_first_does_not_write_cache() {
        let h = harness();
        h.fetcher.respond("https://klinik.test/api/info", 200, "{}");

        h.router.handle(&Request::get(url("/api/info"))).await.unwrap();
        h.router.settle().await;
        assert!(h.storage.open("klinik-v1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_get_bypasses_cache() {
        let h = harness();
        seed(&h.storage, "/logo.png", "cached");
        h.fetcher.respond("https://klinik.test/logo.png", 200, "fresh");

        let request = Request::get(url("/logo.png")).with_method(Method::POST);
        let routed = h.router.route(&request).await.unwrap();
        assert_eq!(routed.source, ResponseSource::Network);
        assert_eq!(routed.response.text(), "fresh");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_document_times_out_to_cache() {
        let h = harness();
        seed(&h.storage, "/", "beranda");
        h.fetcher.set_delay(Duration::from_secs(3600));

        let routed = h.router.route(&Request::navigate(url("/"))).await.unwrap();
        assert_eq!(routed.source, ResponseSource::Cache);
        assert_eq!(routed.response.text(), "beranda");
    }

    /// Router over disk storage whose root can be pulled out from under it.
    struct DiskHarness {
        _dir: tempfile::TempDir,
        root: std::path::PathBuf,
        storage: CacheStorage,
        fetcher: Arc<ScriptedFetcher>,
        router: FetchRouter<ScriptedFetcher>,
        failures: Arc<Mutex<Vec<String>>>,
    }

    fn disk_harness() -> DiskHarness {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("caches");
        let storage = CacheStorage::open_dir(&root).unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new());

        let failures: Arc<Mutex<Vec<String>>> = Arc::default();
        let seen = Arc::clone(&failures);
        let config = Arc::new(WorkerConfig::new(Url::parse(ORIGIN).unwrap(), "v1"));
        let router = FetchRouter::new(config, storage.clone(), Arc::clone(&fetcher))
            .with_write_failure_hook(Arc::new(move |failure: &CacheWriteFailure| {
                seen.lock().unwrap().push(failure.key.to_string());
            }));
        DiskHarness {
            _dir: dir,
            root,
            storage,
            fetcher,
            router,
            failures,
        }
    }

    #[tokio::test]
    async fn test_background_write_failure_reaches_hook() {
        let h = disk_harness();
        h.fetcher.respond("https://klinik.test/", 200, "beranda");

        // Cache is opened (and its files created) before the directory vanishes
        h.storage.open("klinik-v1").unwrap();
        std::fs::remove_dir_all(&h.root).unwrap();

        let response = h.router.handle(&Request::navigate(url("/"))).await.unwrap();
        assert_eq!(response.text(), "beranda");
        h.router.settle().await;

        assert_eq!(*h.failures.lock().unwrap(), vec!["GET https://klinik.test/".to_string()]);
    }

    #[tokio::test]
    async fn test_asset_write_failure_reaches_hook() {
        let h = disk_harness();
        h.fetcher.respond("https://klinik.test/logo.png", 200, "png");
        h.storage.open("klinik-v1").unwrap();
        std::fs::remove_dir_all(&h.root).unwrap();

        let request = Request::get(url("/logo.png"));
        let routed = h.router.route(&request).await.unwrap();
        assert_eq!(routed.source, ResponseSource::Network);
        assert_eq!(routed.response.text(), "png");
        assert_eq!(
            *h.failures.lock().unwrap(),
            vec!["GET https://klinik.test/logo.png".to_string()]
        );

        // Nothing was stored, so the next request goes out again
        h.router.route(&request).await.unwrap();
        assert_eq!(h.fetcher.calls_to("https://klinik.test/logo.png"), 2);
    }

    #[tokio::test]
    async fn test_asset_served_from_network_when_cache_cannot_open() {
        let h = disk_harness();
        h.fetcher.respond("https://klinik.test/app.js", 200, "console.log(1)");
        std::fs::remove_dir_all(&h.root).unwrap();

        let routed = h.router.route(&Request::get(url("/app.js"))).await.unwrap();
        assert_eq!(routed.policy, Policy::Asset);
        assert_eq!(routed.source, ResponseSource::Network);
        assert_eq!(routed.response.text(), "console.log(1)");

        assert!(!h.storage.has("klinik-v1"));
        assert!(h.failures.lock().unwrap().is_empty());
    }
}
