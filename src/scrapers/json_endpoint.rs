//! Source backed by a JSON file listing.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use super::config::JsonEndpointConfig;
use super::{fetch_page, resolve_url, ArtifactSource, PayloadFetcher, SourceError};
use crate::models::{identity_from_url, ObservedArtifact, RetrievalMethod};

/// Extract a value from nested JSON using dot-notation path.
pub fn extract_path<'a>(data: &'a Value, path: &str) -> &'a Value {
    if path.is_empty() {
        return data;
    }

    let mut current = data;
    for key in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(key).unwrap_or(&Value::Null),
            Value::Array(arr) => key
                .parse::<usize>()
                .ok()
                .and_then(|idx| arr.get(idx))
                .unwrap_or(&Value::Null),
            _ => &Value::Null,
        };
    }

    current
}

/// Turn one listing entry into an observation.
///
/// An entry is either a URL string or an object carrying a URL field and an
/// optional name field. The name, when present, is the identity; otherwise
/// the identity is the basename of the URL.
pub fn observed_from_entry(
    entry: &Value,
    base: &Url,
    url_field: &str,
    name_field: &str,
    method: RetrievalMethod,
) -> Result<Option<ObservedArtifact>, SourceError> {
    let (raw_url, name) = match entry {
        Value::String(s) => (s.as_str(), None),
        Value::Object(map) => {
            let Some(url) = map.get(url_field).and_then(Value::as_str) else {
                return Ok(None);
            };
            let name = map
                .get(name_field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|n| !n.is_empty());
            (url, name)
        }
        _ => return Ok(None),
    };

    let url = resolve_url(base, raw_url)?;
    let identity = match name {
        Some(name) => name.to_string(),
        None => match identity_from_url(url.as_str()) {
            Some(identity) => identity,
            None => return Ok(None),
        },
    };

    Ok(Some(ObservedArtifact::new(identity, url.as_str(), method)))
}

/// Source that reads a JSON document of file entries.
pub struct JsonEndpointSource {
    fetcher: Arc<dyn PayloadFetcher>,
    endpoint: Url,
    config: JsonEndpointConfig,
}

impl JsonEndpointSource {
    pub fn new(
        fetcher: Arc<dyn PayloadFetcher>,
        base_url: &Url,
        config: &JsonEndpointConfig,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            fetcher,
            endpoint: resolve_url(base_url, &config.path)?,
            config: config.clone(),
        })
    }

    /// Parse a fetched document into observations.
    pub fn parse(&self, body: &str) -> Result<Vec<ObservedArtifact>, SourceError> {
        let doc: Value = serde_json::from_str(body).map_err(|e| SourceError::Parse {
            url: self.endpoint.to_string(),
            reason: e.to_string(),
        })?;

        let items = extract_path(&doc, &self.config.items_path)
            .as_array()
            .ok_or_else(|| SourceError::Parse {
                url: self.endpoint.to_string(),
                reason: format!(
                    "expected an array at '{}'",
                    if self.config.items_path.is_empty() {
                        "$"
                    } else {
                        self.config.items_path.as_str()
                    }
                ),
            })?;

        let mut observed = Vec::with_capacity(items.len());
        for item in items {
            if let Some(artifact) = observed_from_entry(
                item,
                &self.endpoint,
                &self.config.url_field,
                &self.config.name_field,
                RetrievalMethod::JsonEndpoint,
            )? {
                observed.push(artifact);
            }
        }
        Ok(observed)
    }
}

#[async_trait]
impl ArtifactSource for JsonEndpointSource {
    fn describe(&self) -> String {
        format!("json_endpoint {}", self.endpoint)
    }

    async fn enumerate(&self) -> Result<Vec<ObservedArtifact>, SourceError> {
        let body = fetch_page(self.fetcher.as_ref(), self.endpoint.as_str()).await?;
        self.parse(&body)
    }
}
