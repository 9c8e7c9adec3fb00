//! Application and worker configuration.
//!
//! `Config` is the user-editable file stored at
//! `~/.config/klinik/config.json`, with environment overrides applied on top.
//! `WorkerConfig` is the resolved, explicit configuration handed to the
//! fetch router and lifecycle manager.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "klinik";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";
pub const DEFAULT_CACHE_PREFIX: &str = "klinik-";
pub const DEFAULT_CACHE_VERSION: &str = "v1";

/// Network requests are abandoned after this long and fall back to cache.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Pages and files needed to render the site offline.
pub const DEFAULT_SHELL: &[&str] = &[
    "/",
    "/index.html",
    "/manifest.json",
    "/favicon.ico",
    "/logo.png",
];

/// Served for failed page loads that have no cached copy of their own.
pub const DEFAULT_FALLBACK_DOCUMENT: &str = "/";

pub const DEFAULT_ASSET_SUFFIXES: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "bmp",
    // stylesheets and scripts
    "css", "js", "mjs",
    // fonts
    "woff", "woff2", "ttf", "otf", "eot",
    // audio
    "mp3", "wav", "ogg", "m4a",
    // video
    "mp4", "webm", "mov",
];

pub const DEFAULT_ASSET_PREFIXES: &[&str] = &["/infografis/"];

/// Environment overrides
pub const ENV_ORIGIN: &str = "KLINIK_ORIGIN";
pub const ENV_CACHE_VERSION: &str = "KLINIK_CACHE_VERSION";
pub const ENV_AVAILABILITY_URL: &str = "KLINIK_AVAILABILITY_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub origin: Option<String>,
    pub cache_version: Option<String>,
    pub availability_url: Option<String>,
    pub shell: Option<Vec<String>>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Ok(serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply `KLINIK_*` environment variables over the file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(origin) = non_empty(ENV_ORIGIN) {
            self.origin = Some(origin);
        }
        if let Some(version) = non_empty(ENV_CACHE_VERSION) {
            self.cache_version = Some(version);
        }
        if let Some(url) = non_empty(ENV_AVAILABILITY_URL) {
            self.availability_url = Some(url);
        }
    }

    pub fn worker_config(&self) -> Result<WorkerConfig> {
        let origin = self.origin.as_deref().unwrap_or(DEFAULT_ORIGIN);
        let origin = Url::parse(origin).with_context(|| format!("Invalid origin URL: {}", origin))?;
        let version = self.cache_version.as_deref().unwrap_or(DEFAULT_CACHE_VERSION);

        let mut worker = WorkerConfig::new(origin, version);
        if let Some(ref shell) = self.shell {
            worker = worker.with_shell(shell.clone());
        }
        if let Some(secs) = self.request_timeout_secs {
            worker = worker.with_request_timeout(Duration::from_secs(secs));
        }
        Ok(worker)
    }

    pub fn availability_endpoint(&self) -> Result<Url> {
        let raw = self.availability_url.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "Availability endpoint not configured (set {} or availability_url in {})",
                ENV_AVAILABILITY_URL,
                CONFIG_FILE
            )
        })?;
        Url::parse(raw).with_context(|| format!("Invalid availability URL: {}", raw))
    }
}

/// Everything the worker needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Base URL that shell paths are resolved against.
    pub origin: Url,
    /// Caches whose names start with this prefix belong to the worker.
    pub cache_prefix: String,
    pub version: String,
    pub shell: Vec<String>,
    pub fallback_document: String,
    /// File extensions (without the dot) served cache-first.
    pub asset_suffixes: Vec<String>,
    /// Path prefixes served cache-first regardless of extension.
    pub asset_prefixes: Vec<String>,
    pub request_timeout: Duration,
    /// Activate right after install instead of waiting for the old worker.
    pub skip_waiting: bool,
}

impl WorkerConfig {
    pub fn new(origin: Url, version: impl Into<String>) -> Self {
        Self {
            origin,
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            version: version.into(),
            shell: DEFAULT_SHELL.iter().map(|s| s.to_string()).collect(),
            fallback_document: DEFAULT_FALLBACK_DOCUMENT.to_string(),
            asset_suffixes: DEFAULT_ASSET_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            asset_prefixes: DEFAULT_ASSET_PREFIXES.iter().map(|s| s.to_string()).collect(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            skip_waiting: true,
        }
    }

    pub fn with_shell<I, S>(mut self, shell: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shell = shell.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cache_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    pub fn with_fallback_document(mut self, path: impl Into<String>) -> Self {
        self.fallback_document = path.into();
        self
    }

    pub fn with_asset_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.asset_prefixes.push(prefix.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_skip_waiting(mut self, skip: bool) -> Self {
        self.skip_waiting = skip;
        self
    }

    /// Name of the cache for the current version, e.g. `klinik-v2`.
    pub fn cache_name(&self) -> String {
        format!("{}{}", self.cache_prefix, self.version)
    }

    pub fn owns_cache(&self, name: &str) -> bool {
        name.starts_with(&self.cache_prefix)
    }

    /// Resolve a shell path or URL against the origin.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.origin
            .join(path)
            .with_context(|| format!("Invalid path {:?} for origin {}", path, self.origin))
    }
}
