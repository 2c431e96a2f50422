//! Paginated product listing source.
//!
//! Walks a listing from its first page along the `next_page` link. Every
//! page must load; a failure part way through fails the whole enumeration,
//! as does running out of page budget while a next link is still present.
//! An item whose own reference cannot be resolved is skipped like any other
//! unusable item, but an unresolvable next-page link fails the enumeration.
//!
//! Titles and prices are only logged: the artifact record has no place for
//! them.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::config::{ListingSelectors, MirrorMode, ProductListingConfig};
use super::{fetch_page, resolve_url, ArtifactSource, PayloadFetcher, SourceError};
use crate::models::{identity_from_url, ObservedArtifact, RetrievalMethod};

/// Items found on one listing page and the link to the following page.
#[derive(Debug, Default)]
pub struct ListingPage {
    pub items: Vec<ObservedArtifact>,
    pub next: Option<Url>,
}

struct CompiledSelectors {
    item: Selector,
    link: Selector,
    image: Option<Selector>,
    next_page: Option<Selector>,
    title: Option<Selector>,
    price: Option<Selector>,
}

fn compile(selector: &str) -> Result<Selector, SourceError> {
    Selector::parse(selector)
        .map_err(|e| SourceError::Config(format!("invalid selector '{}': {}", selector, e)))
}

impl CompiledSelectors {
    fn new(selectors: &ListingSelectors) -> Result<Self, SourceError> {
        Ok(Self {
            item: compile(&selectors.item)?,
            link: compile(&selectors.link)?,
            image: selectors.image.as_deref().map(compile).transpose()?,
            next_page: selectors.next_page.as_deref().map(compile).transpose()?,
            title: selectors.title.as_deref().map(compile).transpose()?,
            price: selectors.price.as_deref().map(compile).transpose()?,
        })
    }
}

impl ProductListingConfig {
    /// Resolve and compile the selectors this listing would use.
    pub fn checked_selectors(&self) -> Result<ListingSelectors, SourceError> {
        let selectors = self.selectors()?;
        if self.mirror == MirrorMode::Image && selectors.image.is_none() {
            return Err(SourceError::Config(
                "mirror = \"image\" needs image_selector or a template".to_string(),
            ));
        }
        CompiledSelectors::new(&selectors)?;
        Ok(selectors)
    }
}

fn element_text(item: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    let text = item
        .select(selector?)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

/// Identity of a listing URL; product pages often end in a slash.
fn listing_identity(url: &Url) -> Option<String> {
    identity_from_url(url.path().trim_end_matches('/'))
}

fn image_source(element: ElementRef<'_>) -> Option<&str> {
    let value = element.value();
    value
        .attr("src")
        .or_else(|| value.attr("data-src"))
        .filter(|s| !s.trim().is_empty() && !s.starts_with("data:"))
}

/// Parse one listing page.
pub fn parse_listing_page(
    html: &str,
    page_url: &Url,
    selectors: &ListingSelectors,
    mirror: MirrorMode,
) -> Result<ListingPage, SourceError> {
    let compiled = CompiledSelectors::new(selectors)?;
    let document = Html::parse_document(html);

    let mut page = ListingPage::default();
    for (index, item) in document.select(&compiled.item).enumerate() {
        let reference = match mirror {
            MirrorMode::Page => item
                .select(&compiled.link)
                .next()
                .and_then(|a| a.value().attr("href")),
            MirrorMode::Image => compiled
                .image
                .as_ref()
                .and_then(|sel| item.select(sel).next())
                .and_then(image_source),
        };

        let Some(reference) = reference else {
            warn!(
                "Listing item {} on {} has no {} reference, skipping",
                index,
                page_url,
                match mirror {
                    MirrorMode::Page => "link",
                    MirrorMode::Image => "image",
                }
            );
            continue;
        };

        let url = match resolve_url(page_url, reference) {
            Ok(url) => url,
            Err(e) => {
                debug!("Skipping listing item {} on {}: {}", index, page_url, e);
                continue;
            }
        };
        match listing_identity(&url) {
            Some(identity) => {
                let title = element_text(item, compiled.title.as_ref());
                let price = element_text(item, compiled.price.as_ref());
                debug!(
                    identity = %identity,
                    title = title.as_deref().unwrap_or("-"),
                    price = price.as_deref().unwrap_or("-"),
                    "Listing item"
                );
                page.items.push(ObservedArtifact::new(
                    identity,
                    url.as_str(),
                    RetrievalMethod::ProductListing,
                ))
            }
            None => debug!("No identity for listing URL {}", url),
        }
    }

    if let Some(next_sel) = &compiled.next_page {
        if let Some(href) = document
            .select(next_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .filter(|h| !h.trim().is_empty() && !h.starts_with('#'))
        {
            let next = resolve_url(page_url, href).map_err(|e| SourceError::Incomplete {
                url: page_url.to_string(),
                reason: format!("next page link unusable: {}", e),
            })?;
            page.next = Some(next);
        }
    }

    Ok(page)
}

/// Source enumerating the products of a paginated listing.
pub struct ProductListingSource {
    fetcher: Arc<dyn PayloadFetcher>,
    start_url: Url,
    selectors: ListingSelectors,
    max_pages: usize,
    mirror: MirrorMode,
}

impl ProductListingSource {
    pub fn new(
        fetcher: Arc<dyn PayloadFetcher>,
        base_url: &Url,
        config: &ProductListingConfig,
    ) -> Result<Self, SourceError> {
        let selectors = config.checked_selectors()?;

        Ok(Self {
            fetcher,
            start_url: resolve_url(base_url, &config.path)?,
            selectors,
            max_pages: config.max_pages(),
            mirror: config.mirror,
        })
    }
}

#[async_trait]
impl ArtifactSource for ProductListingSource {
    fn describe(&self) -> String {
        format!("product_listing {}", self.start_url)
    }

    async fn enumerate(&self) -> Result<Vec<ObservedArtifact>, SourceError> {
        let mut observed = Vec::new();
        let mut visited = HashSet::new();
        let mut url = self.start_url.clone();

        loop {
            if !visited.insert(url.clone()) {
                debug!("Listing pagination returned to {}, stopping", url);
                break;
            }

            let html = fetch_page(self.fetcher.as_ref(), url.as_str()).await?;
            let page = parse_listing_page(&html, &url, &self.selectors, self.mirror)?;
            debug!(
                "Listing page {} yielded {} items",
                visited.len(),
                page.items.len()
            );
            observed.extend(page.items);

            match page.next {
                None => break,
                Some(_) if visited.len() >= self.max_pages => {
                    return Err(SourceError::Incomplete {
                        url: url.to_string(),
                        reason: format!(
                            "more pages remain after max_pages ({})",
                            self.max_pages
                        ),
                    });
                }
                Some(next) => url = next,
            }
        }

        Ok(observed)
    }
}
