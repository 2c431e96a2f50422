//! Configuration-driven source for one crawl target.
//!
//! Builds the concrete sources a target's config names and concatenates
//! their enumerations in configured order.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use url::Url;

use super::config::SourceConfig;
use super::{
    parse_base_url, resolve_url, ArtifactSource, DataAttributesSource, HtmlLinksSource, JsonEndpointSource,
    PayloadFetcher, ProductListingSource, ScriptDataSource, SourceError,
};
use crate::models::ObservedArtifact;

/// All configured sources of a crawl target, enumerated as one.
pub struct ConfigurableSource {
    target: String,
    sources: Vec<Box<dyn ArtifactSource>>,
}

impl ConfigurableSource {
    /// Build the sources for a target from its configuration.
    pub fn new(
        target: &str,
        base_url: &str,
        configs: &[SourceConfig],
        fetcher: Arc<dyn PayloadFetcher>,
    ) -> Result<Self, SourceError> {
        if configs.is_empty() {
            return Err(SourceError::Config(format!(
                "target '{}' has no sources configured",
                target
            )));
        }

        let base = parse_base_url(base_url)?;
        let sources = configs
            .iter()
            .map(|config| build_source(config, &base, fetcher.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            target: target.to_string(),
            sources,
        })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Check a target's source configuration without building its sources.
pub fn validate_sources(base_url: &str, configs: &[SourceConfig]) -> Result<(), SourceError> {
    let base = parse_base_url(base_url)?;
    for config in configs {
        resolve_url(&base, config.path())?;
        if let SourceConfig::ProductListing(cfg) = config {
            cfg.checked_selectors()?;
        }
    }
    Ok(())
}

fn build_source(
    config: &SourceConfig,
    base: &Url,
    fetcher: Arc<dyn PayloadFetcher>,
) -> Result<Box<dyn ArtifactSource>, SourceError> {
    Ok(match config {
        SourceConfig::HtmlLinks(cfg) => Box::new(HtmlLinksSource::new(fetcher, base, cfg)?),
        SourceConfig::JsonEndpoint(cfg) => Box::new(JsonEndpointSource::new(fetcher, base, cfg)?),
        SourceConfig::DataAttributes(cfg) => {
            Box::new(DataAttributesSource::new(fetcher, base, cfg)?)
        }
        SourceConfig::ScriptData(cfg) => Box::new(ScriptDataSource::new(fetcher, base, cfg)?),
        SourceConfig::ProductListing(cfg) => {
            Box::new(ProductListingSource::new(fetcher, base, cfg)?)
        }
    })
}

#[async_trait]
impl ArtifactSource for ConfigurableSource {
    fn describe(&self) -> String {
        format!("{} ({} sources)", self.target, self.sources.len())
    }

    async fn enumerate(&self) -> Result<Vec<ObservedArtifact>, SourceError> {
        let mut observed = Vec::new();

        for source in &self.sources {
            let found = source.enumerate().await?;
            debug!("{}: {} artifacts", source.describe(), found.len());
            observed.extend(found);
        }

        info!(
            target_name = %self.target,
            count = observed.len(),
            "Enumerated artifacts"
        );
        Ok(observed)
    }
}
