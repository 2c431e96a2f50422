//! Artifact sources and payload fetching.
//!
//! A source enumerates the artifacts a crawl target currently exposes. It
//! either returns the complete enumeration or an error; a short list is
//! never returned in place of a failure.

pub mod config;
pub mod configurable;
pub mod http_client;
pub mod json_endpoint;
pub mod links;
pub mod product_listing;
pub mod rate_limiter;

pub use config::{ListingTemplate, MirrorMode, SourceConfig};
pub use configurable::{validate_sources, ConfigurableSource};
pub use http_client::HttpClient;
pub use json_endpoint::JsonEndpointSource;
pub use links::{DataAttributesSource, HtmlLinksSource, ScriptDataSource};
pub use product_listing::ProductListingSource;
pub use rate_limiter::RateLimiter;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::models::ObservedArtifact;

/// Failure to retrieve one payload.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Failure to enumerate a crawl target.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("failed to parse {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("incomplete listing at {url}: {reason}")]
    Incomplete { url: String, reason: String },

    #[error("invalid source configuration: {0}")]
    Config(String),
}

/// Retrieves the raw bytes behind a URL.
#[async_trait]
pub trait PayloadFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Enumerates the artifacts of one crawl target.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Short label for logs.
    fn describe(&self) -> String;

    async fn enumerate(&self) -> Result<Vec<ObservedArtifact>, SourceError>;
}

/// Fetch a page and decode it as text.
pub async fn fetch_page(fetcher: &dyn PayloadFetcher, url: &str) -> Result<String, SourceError> {
    let bytes = fetcher.fetch(url).await.map_err(|source| SourceError::Fetch {
        url: url.to_string(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse a base URL, treating failure as a configuration error.
pub fn parse_base_url(base_url: &str) -> Result<Url, SourceError> {
    Url::parse(base_url).map_err(|e| SourceError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

/// Resolve a possibly relative reference against a page URL.
pub fn resolve_url(base: &Url, reference: &str) -> Result<Url, SourceError> {
    base.join(reference.trim())
        .map_err(|e| SourceError::InvalidUrl {
            url: reference.to_string(),
            reason: e.to_string(),
        })
}

/// Default file extensions mirrored by link-based sources.
pub fn default_extensions() -> Vec<String> {
    [".pdf", ".jpg", ".png", ".docx", ".zip", ".xlsx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Whether the path of `url` ends with one of `extensions` (case-insensitive).
pub fn has_allowed_extension(url: &Url, extensions: &[String]) -> bool {
    let path = url.path().to_lowercase();
    extensions
        .iter()
        .any(|ext| path.ends_with(&ext.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let base = Url::parse("http://localhost:5500/files/index.html").unwrap();
        assert_eq!(
            resolve_url(&base, "a.pdf").unwrap().as_str(),
            "http://localhost:5500/files/a.pdf"
        );
        assert_eq!(
            resolve_url(&base, "/b.png").unwrap().as_str(),
            "http://localhost:5500/b.png"
        );
        assert_eq!(
            resolve_url(&base, "https://cdn.example.com/c.zip").unwrap().as_str(),
            "https://cdn.example.com/c.zip"
        );
    }

    #[test]
    fn test_has_allowed_extension() {
        let exts = default_extensions();
        let pdf = Url::parse("http://x/Report.PDF?download=1").unwrap();
        let html = Url::parse("http://x/about.html").unwrap();
        assert!(has_allowed_extension(&pdf, &exts));
        assert!(!has_allowed_extension(&html, &exts));
    }

    #[test]
    fn test_parse_base_url_rejects_garbage() {
        assert!(matches!(
            parse_base_url("not a url"),
            Err(SourceError::InvalidUrl { .. })
        ));
    }
}
