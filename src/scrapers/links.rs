//! Sources that read file references out of a single HTML page.
//!
//! Three page shapes are handled: plain `<a href>` links, `data-*`
//! attributes on arbitrary elements, and JSON arrays assigned to `window`
//! globals in inline scripts.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use super::config::{DataAttributesConfig, HtmlLinksConfig, ScriptDataConfig};
use super::json_endpoint::{extract_path, observed_from_entry};
use super::{
    fetch_page, has_allowed_extension, resolve_url, ArtifactSource, PayloadFetcher, SourceError,
};
use crate::models::{ObservedArtifact, RetrievalMethod};

static WINDOW_ASSIGNMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"window\.([A-Za-z_$][\w$]*)\s*=\s*").unwrap());

fn parse_selector(selector: &str) -> Result<Selector, SourceError> {
    Selector::parse(selector)
        .map_err(|e| SourceError::Config(format!("invalid selector '{}': {}", selector, e)))
}

fn observe_reference(
    page_url: &Url,
    reference: &str,
    extensions: &[String],
    method: RetrievalMethod,
) -> Option<ObservedArtifact> {
    let url = match resolve_url(page_url, reference) {
        Ok(url) => url,
        Err(e) => {
            debug!("Skipping unresolvable reference on {}: {}", page_url, e);
            return None;
        }
    };
    if !has_allowed_extension(&url, extensions) {
        return None;
    }
    ObservedArtifact::from_url(url.as_str(), method)
}

/// Collect `<a href>` links to files with one of `extensions`.
pub fn extract_file_links(
    html: &str,
    page_url: &Url,
    extensions: &[String],
) -> Result<Vec<ObservedArtifact>, SourceError> {
    let document = Html::parse_document(html);
    let selector = parse_selector("a[href]")?;

    Ok(document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| observe_reference(page_url, href, extensions, RetrievalMethod::HtmlLink))
        .collect())
}

/// Collect file references held in `data-*` attributes.
pub fn extract_data_attributes(
    html: &str,
    page_url: &Url,
    attributes: &[String],
    extensions: &[String],
) -> Result<Vec<ObservedArtifact>, SourceError> {
    if attributes.is_empty() {
        return Ok(Vec::new());
    }

    let document = Html::parse_document(html);
    let selector_str = attributes
        .iter()
        .map(|a| format!("[{}]", a))
        .collect::<Vec<_>>()
        .join(", ");
    let selector = parse_selector(&selector_str)?;

    let mut observed = Vec::new();
    for element in document.select(&selector) {
        for attr in attributes {
            let Some(value) = element.value().attr(attr) else {
                continue;
            };
            if value.trim().is_empty() {
                continue;
            }
            if let Some(artifact) =
                observe_reference(page_url, value, extensions, RetrievalMethod::DataAttribute)
            {
                observed.push(artifact);
            }
        }
    }
    Ok(observed)
}

/// Collect `{url, name}` entries from `window.<global> = [...]` assignments.
///
/// `globals` may carry a dot path below the global (`data.files`). Script
/// text that is not valid JSON after the assignment is skipped.
pub fn extract_script_data(
    html: &str,
    page_url: &Url,
    globals: &[String],
) -> Result<Vec<ObservedArtifact>, SourceError> {
    let document = Html::parse_document(html);
    let selector = parse_selector("script:not([src])")?;

    let mut observed = Vec::new();
    for script in document.select(&selector) {
        let text: String = script.text().collect();

        for caps in WINDOW_ASSIGNMENT.captures_iter(&text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = name.as_str();

            let wanted: Vec<&str> = globals
                .iter()
                .filter_map(|g| {
                    let (head, rest) = g.split_once('.').unwrap_or((g.as_str(), ""));
                    (head == name).then_some(rest)
                })
                .collect();
            if wanted.is_empty() {
                continue;
            }

            let rest = &text[whole.end()..];
            let value = match serde_json::Deserializer::from_str(rest)
                .into_iter::<serde_json::Value>()
                .next()
            {
                Some(Ok(value)) => value,
                Some(Err(e)) => {
                    debug!("window.{} on {} is not JSON: {}", name, page_url, e);
                    continue;
                }
                None => continue,
            };

            for path in wanted {
                let Some(items) = extract_path(&value, path).as_array() else {
                    continue;
                };
                for item in items {
                    if let Some(artifact) = observed_from_entry(
                        item,
                        page_url,
                        "url",
                        "name",
                        RetrievalMethod::ScriptData,
                    )? {
                        observed.push(artifact);
                    }
                }
            }
        }
    }
    Ok(observed)
}

/// Source listing `<a href>` file links on one page.
pub struct HtmlLinksSource {
    fetcher: Arc<dyn PayloadFetcher>,
    page_url: Url,
    extensions: Vec<String>,
}

impl HtmlLinksSource {
    pub fn new(
        fetcher: Arc<dyn PayloadFetcher>,
        base_url: &Url,
        config: &HtmlLinksConfig,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            fetcher,
            page_url: resolve_url(base_url, &config.path)?,
            extensions: config.extensions.clone(),
        })
    }
}

#[async_trait]
impl ArtifactSource for HtmlLinksSource {
    fn describe(&self) -> String {
        format!("html_links {}", self.page_url)
    }

    async fn enumerate(&self) -> Result<Vec<ObservedArtifact>, SourceError> {
        let html = fetch_page(self.fetcher.as_ref(), self.page_url.as_str()).await?;
        extract_file_links(&html, &self.page_url, &self.extensions)
    }
}

/// Source listing files referenced by `data-*` attributes on one page.
pub struct DataAttributesSource {
    fetcher: Arc<dyn PayloadFetcher>,
    page_url: Url,
    config: DataAttributesConfig,
}

impl DataAttributesSource {
    pub fn new(
        fetcher: Arc<dyn PayloadFetcher>,
        base_url: &Url,
        config: &DataAttributesConfig,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            fetcher,
            page_url: resolve_url(base_url, &config.path)?,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl ArtifactSource for DataAttributesSource {
    fn describe(&self) -> String {
        format!("data_attributes {}", self.page_url)
    }

    async fn enumerate(&self) -> Result<Vec<ObservedArtifact>, SourceError> {
        let html = fetch_page(self.fetcher.as_ref(), self.page_url.as_str()).await?;
        extract_data_attributes(
            &html,
            &self.page_url,
            &self.config.attributes,
            &self.config.extensions,
        )
    }
}

/// Source listing files embedded as JSON in inline scripts.
pub struct ScriptDataSource {
    fetcher: Arc<dyn PayloadFetcher>,
    page_url: Url,
    globals: Vec<String>,
}

impl ScriptDataSource {
    pub fn new(
        fetcher: Arc<dyn PayloadFetcher>,
        base_url: &Url,
        config: &ScriptDataConfig,
    ) -> Result<Self, SourceError> {
        Ok(Self {
            fetcher,
            page_url: resolve_url(base_url, &config.path)?,
            globals: config.globals.clone(),
        })
    }
}

#[async_trait]
impl ArtifactSource for ScriptDataSource {
    fn describe(&self) -> String {
        format!("script_data {}", self.page_url)
    }

    async fn enumerate(&self) -> Result<Vec<ObservedArtifact>, SourceError> {
        let html = fetch_page(self.fetcher.as_ref(), self.page_url.as_str()).await?;
        extract_script_data(&html, &self.page_url, &self.globals)
    }
}
