//! Request classification.
//!
//! Every intercepted request is served by exactly one policy:
//!
//! - `Asset`: cache-first. Static files are immutable by filename.
//! - `Document`: network first, cache refreshed in the background, cached
//!   page or shell document when offline.
//! - `Network`: network first with a plain cache lookup on failure.

use std::fmt;

use crate::config::WorkerConfig;
use crate::models::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Policy {
    Asset,
    Document,
    Network,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Asset => write!(f, "cache-first"),
            Policy::Document => write!(f, "stale-while-revalidate"),
            Policy::Network => write!(f, "network-first"),
        }
    }
}

pub fn classify(request: &Request, config: &WorkerConfig) -> Policy {
    if is_asset_path(request.url.path(), config) {
        Policy::Asset
    } else if request.navigation || request.accepts_html() {
        Policy::Document
    } else {
        Policy::Network
    }
}

/// Suffix match on the last path segment, or any configured prefix.
///
/// Anything under an asset prefix is an asset even without an extension.
pub fn is_asset_path(path: &str, config: &WorkerConfig) -> bool {
    if config
        .asset_prefixes
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
    {
        return true;
    }

    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => config
            .asset_suffixes
            .iter()
            .any(|suffix| suffix.eq_ignore_ascii_case(ext)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;

    fn config() -> WorkerConfig {
        WorkerConfig::new(Url::parse("https://klinik.test/").unwrap(), "v1")
    }

    fn get(path: &str) -> Request {
        Request::get(Url::parse("https://klinik.test/").unwrap().join(path).unwrap())
    }

    #[test]
    fn test_static_suffixes_are_assets() {
        let config = config();
        for path in [
            "/logo.png",
            "/assets/app.3f2a.js",
            "/assets/style.CSS",
            "/fonts/inter.woff2",
            "/media/senam.mp4",
            "/audio/jingle.mp3",
        ] {
            assert_eq!(classify(&get(path), &config), Policy::Asset, "{}", path);
        }
    }

    #[test]
    fn test_infographics_prefix_is_asset_without_extension() {
        let config = config();
        assert_eq!(classify(&get("/infografis/alur-poli-umum"), &config), Policy::Asset);
        // Even an HTML navigation under the prefix stays cache-first
        let nav = Request::navigate(config.resolve("/infografis/fragment").unwrap());
        assert_eq!(classify(&nav, &config), Policy::Asset);
    }

    #[test]
    fn test_navigation_is_document() {
        let config = config();
        let nav = Request::navigate(config.resolve("/layanan/poli-gigi").unwrap());
        assert_eq!(classify(&nav, &config), Policy::Document);

        let html = get("/tentang").with_header("accept", "text/html");
        assert_eq!(classify(&html, &config), Policy::Document);
    }

    #[test]
    fn test_everything_else_is_network() {
        let config = config();
        assert_eq!(classify(&get("/api/jadwal"), &config), Policy::Network);
        assert_eq!(classify(&get("/data.json"), &config), Policy::Network);
        assert_eq!(
            classify(&get("/api").with_header("accept", "application/json"), &config),
            Policy::Network
        );
    }

    #[test]
    fn test_dotfiles_and_query_strings() {
        let config = config();
        // A bare ".png" segment has no stem
        assert!(!is_asset_path("/.png", &config));
        // Query strings are not part of the path
        assert_eq!(classify(&get("/logo.png?v=3"), &config), Policy::Asset);
        assert!(!is_asset_path("/laporan.pdf", &config));
    }
}
