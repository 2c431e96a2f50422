//! Artifact models: what a source observed and what the store remembers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::Fingerprint;

/// How an artifact's URL was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    /// `<a href>` link in a page.
    HtmlLink,
    /// Entry in a JSON file listing.
    JsonEndpoint,
    /// `data-file` / `data-url` / `data-download` attribute.
    DataAttribute,
    /// Array assigned to a global in an inline script.
    ScriptData,
    /// Item in a paginated product listing.
    ProductListing,
}

impl RetrievalMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HtmlLink => "html_link",
            Self::JsonEndpoint => "json_endpoint",
            Self::DataAttribute => "data_attribute",
            Self::ScriptData => "script_data",
            Self::ProductListing => "product_listing",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "html_link" => Some(Self::HtmlLink),
            "json_endpoint" => Some(Self::JsonEndpoint),
            "data_attribute" => Some(Self::DataAttribute),
            "script_data" => Some(Self::ScriptData),
            "product_listing" => Some(Self::ProductListing),
            _ => None,
        }
    }
}

/// An artifact seen by a source during one pass. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedArtifact {
    /// Key unique within the crawl target.
    pub identity: String,
    /// Where the payload is fetched from.
    pub source_url: String,
    pub retrieval_method: RetrievalMethod,
}

impl ObservedArtifact {
    pub fn new(
        identity: impl Into<String>,
        source_url: impl Into<String>,
        retrieval_method: RetrievalMethod,
    ) -> Self {
        Self {
            identity: identity.into(),
            source_url: source_url.into(),
            retrieval_method,
        }
    }

    /// Build an observation whose identity is the basename of the URL path.
    pub fn from_url(source_url: &str, retrieval_method: RetrievalMethod) -> Option<Self> {
        let identity = identity_from_url(source_url)?;
        Some(Self::new(identity, source_url, retrieval_method))
    }
}

/// Persistent record of an artifact within one crawl target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub crawl_target: String,
    pub identity: String,
    pub source_url: String,
    /// Fingerprint of the bytes currently held in the content store.
    pub fingerprint: Fingerprint,
    pub retrieval_method: RetrievalMethod,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Record for an artifact observed for the first time.
    pub fn first_seen(
        crawl_target: &str,
        observed: &ObservedArtifact,
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            crawl_target: crawl_target.to_string(),
            identity: observed.identity.clone(),
            source_url: observed.source_url.clone(),
            fingerprint,
            retrieval_method: observed.retrieval_method,
            first_seen_at: now,
            last_seen_at: now,
        }
    }

    /// Successor of this record after it was observed again.
    ///
    /// `first_seen_at` carries over; URL and retrieval method follow the
    /// latest observation since both may legitimately move between passes.
    pub fn seen_again(
        &self,
        observed: &ObservedArtifact,
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            crawl_target: self.crawl_target.clone(),
            identity: self.identity.clone(),
            source_url: observed.source_url.clone(),
            fingerprint,
            retrieval_method: observed.retrieval_method,
            first_seen_at: self.first_seen_at,
            last_seen_at: now,
        }
    }

    /// Lowercase file extension of the identity, if any.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.identity.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_lowercase())
    }
}

/// Derive an artifact identity from a URL: the percent-decoded basename of its path.
///
/// Returns `None` when the path has no usable final segment (directory URLs,
/// `.`/`..`, or segments that decode to a path separator).
pub fn identity_from_url(url: &str) -> Option<String> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };

    let segment = path.rsplit('/').next().unwrap_or_default();
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let decoded = decoded.trim();

    if decoded.is_empty()
        || decoded == "."
        || decoded == ".."
        || decoded.contains(['/', '\\', '\0'])
    {
        return None;
    }

    Some(decoded.to_string())
}
