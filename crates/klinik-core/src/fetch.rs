//! The network side of the fetch boundary.
//!
//! `Fetcher` is what the router calls when a policy needs the network.
//! `HttpFetcher` is the reqwest-backed implementation; tests substitute a
//! scripted one.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::REQUEST_TIMEOUT_SECS;
use crate::models::{Request, Response};

/// A network fetch that produced no response at all.
///
/// HTTP error statuses are not errors here: like a browser fetch, a 404 or
/// 500 is a successful fetch of an error page.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("Request to {url} timed out after {}s", .timeout.as_secs())]
    Timeout { url: String, timeout: Duration },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        FetchError::Network {
            url: url.into(),
            message: message.into(),
        }
    }
}

pub trait Fetcher: Send + Sync + 'static {
    fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response, FetchError>> + Send;
}

/// Run a fetch bounded by `timeout`. A timeout is reported as a network failure.
pub async fn fetch_with_timeout<F: Fetcher>(
    fetcher: &F,
    request: &Request,
    timeout: Duration,
) -> Result<Response, FetchError> {
    match tokio::time::timeout(timeout, fetcher.fetch(request)).await {
        Ok(result) => result,
        Err(_) => {
            debug!(url = %request.url, timeout_secs = timeout.as_secs(), "Fetch timed out");
            Err(FetchError::Timeout {
                url: request.url.to_string(),
                timeout,
            })
        }
    }
}

/// Fetcher backed by a shared reqwest client.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, timeout })
    }

    fn convert_error(&self, url: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout: self.timeout,
            }
        } else {
            FetchError::network(url, error.to_string())
        }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let url = request.url.to_string();
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| self.convert_error(&url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.convert_error(&url, e))?;

        debug!(url = %url, status = status, bytes = body.len(), "Fetched from network");
        Ok(Response {
            url: final_url,
            status,
            headers,
            body: body.to_vec(),
        })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedFetcher;
    use super::*;
    use reqwest::Url;

    #[tokio::test(start_paused = true)]
    async fn test_fetch_with_timeout_reports_timeout() {
        let fetcher = ScriptedFetcher::new();
        fetcher.set_delay(Duration::from_secs(120));
        let request = Request::get(Url::parse("https://klinik.test/lambat").unwrap());

        let result = fetch_with_timeout(&fetcher, &request, Duration::from_secs(30)).await;
        match result {
            Err(FetchError::Timeout { timeout, .. }) => assert_eq!(timeout.as_secs(), 30),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_with_timeout_passes_through() {
        let fetcher = ScriptedFetcher::new();
        fetcher.respond("https://klinik.test/", 200, "beranda");
        let request = Request::get(Url::parse("https://klinik.test/").unwrap());

        let response = fetch_with_timeout(&fetcher, &request, Duration::from_secs(30))
            .await
            .unwrap();
        assert_eq!(response.text(), "beranda");
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::network("https://klinik.test/", "connection refused");
        assert_eq!(
            err.to_string(),
            "Network error fetching https://klinik.test/: connection refused"
        );
    }
}
