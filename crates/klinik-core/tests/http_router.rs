//! End-to-end tests for the fetch router over real HTTP.
//!
//! Uses wiremock as the site origin and a temporary directory as the
//! on-disk cache storage.

use std::sync::Arc;
use std::time::Duration;

use klinik_core::{
    CacheStorage, FetchRouter, HttpFetcher, Registration, RegistrationOutcome, Request,
    ResponseSource, WorkerConfig,
};
use reqwest::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount(server: &MockServer, route: &str, body: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/plain"),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn config(server: &MockServer, version: &str) -> WorkerConfig {
    WorkerConfig::new(Url::parse(&server.uri()).unwrap(), version).with_shell(["/", "/app.css"])
}

#[tokio::test]
async fn test_asset_fetched_once_then_served_from_disk_cache() {
    let server = MockServer::start().await;
    mount(&server, "/infografis/alur-pendaftaran.png", "png", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let storage = CacheStorage::open_dir(dir.path()).unwrap();
    let fetcher = Arc::new(HttpFetcher::new().unwrap());
    let config = Arc::new(config(&server, "v1"));
    let router = FetchRouter::new(Arc::clone(&config), storage, fetcher);

    let request = Request::get(config.resolve("/infografis/alur-pendaftaran.png").unwrap());
    let first = router.route(&request).await.unwrap();
    let second = router.route(&request).await.unwrap();

    assert_eq!(first.source, ResponseSource::Network);
    assert_eq!(second.source, ResponseSource::Cache);
    assert_eq!(second.response.header("content-type"), Some("text/plain"));

    // A fresh storage over the same directory still has the entry
    let reopened = CacheStorage::open_dir(dir.path()).unwrap();
    assert!(reopened.open("klinik-v1").unwrap().lookup(&request).is_some());
}

#[tokio::test]
async fn test_install_then_serve_shell_when_origin_hangs() {
    let server = MockServer::start().await;
    mount(&server, "/", "beranda klinik", 1).await;
    mount(&server, "/app.css", "body{}", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let storage = CacheStorage::open_dir(dir.path()).unwrap();
    let fetcher = Arc::new(HttpFetcher::new().unwrap());
    let mut registration = Registration::new(storage, fetcher);

    let config = config(&server, "v1").with_request_timeout(Duration::from_millis(300));
    let outcome = registration.register(config).await.unwrap();
    assert!(matches!(outcome, RegistrationOutcome::Activated { .. }));

    // The page never answers within the timeout
    Mock::given(method("GET"))
        .and(path("/layanan/poli-umum"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let router = registration.controller().unwrap().router();
    let page = Request::navigate(Url::parse(&format!("{}/layanan/poli-umum", server.uri())).unwrap());

    let routed = router.route(&page).await.unwrap();
    assert_eq!(routed.source, ResponseSource::ShellFallback);
    assert_eq!(routed.response.text(), "beranda klinik");
}
