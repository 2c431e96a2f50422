//! Source configuration types.
//!
//! Each crawl target lists one or more sources; the `type` field selects the
//! variant. Listing templates supply selector defaults for known storefront
//! layouts so a config only names the template.

use serde::{Deserialize, Serialize};

use super::{default_extensions, SourceError};

/// One way of enumerating a target's artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// `<a href>` links to files on a page.
    HtmlLinks(HtmlLinksConfig),
    /// A JSON document listing files.
    JsonEndpoint(JsonEndpointConfig),
    /// `data-*` attributes pointing at files.
    DataAttributes(DataAttributesConfig),
    /// JSON arrays assigned to globals in inline scripts.
    ScriptData(ScriptDataConfig),
    /// Paginated product listing.
    ProductListing(ProductListingConfig),
}

impl SourceConfig {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::HtmlLinks(_) => "html_links",
            Self::JsonEndpoint(_) => "json_endpoint",
            Self::DataAttributes(_) => "data_attributes",
            Self::ScriptData(_) => "script_data",
            Self::ProductListing(_) => "product_listing",
        }
    }

    /// Page or endpoint path, relative to the target's base URL.
    pub fn path(&self) -> &str {
        match self {
            Self::HtmlLinks(cfg) => &cfg.path,
            Self::JsonEndpoint(cfg) => &cfg.path,
            Self::DataAttributes(cfg) => &cfg.path,
            Self::ScriptData(cfg) => &cfg.path,
            Self::ProductListing(cfg) => &cfg.path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlLinksConfig {
    /// Page path relative to the target's base URL.
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for HtmlLinksConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonEndpointConfig {
    #[serde(default = "default_json_path")]
    pub path: String,
    /// Dot path to the array inside the document; empty means the root.
    #[serde(default)]
    pub items_path: String,
    #[serde(default = "default_url_field")]
    pub url_field: String,
    #[serde(default = "default_name_field")]
    pub name_field: String,
}

impl Default for JsonEndpointConfig {
    fn default() -> Self {
        Self {
            path: default_json_path(),
            items_path: String::new(),
            url_field: default_url_field(),
            name_field: default_name_field(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataAttributesConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_data_attributes")]
    pub attributes: Vec<String>,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for DataAttributesConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            attributes: default_data_attributes(),
            extensions: default_extensions(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptDataConfig {
    #[serde(default)]
    pub path: String,
    /// Globals to read, optionally with a dot path (`data.files`).
    #[serde(default = "default_script_globals")]
    pub globals: Vec<String>,
}

impl Default for ScriptDataConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            globals: default_script_globals(),
        }
    }
}

/// Known storefront listing layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingTemplate {
    Magento,
    Algolia,
}

/// What a product listing mirrors for each item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MirrorMode {
    #[default]
    Page,
    Image,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductListingConfig {
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<ListingTemplate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_selector: Option<String>,
    /// Product title, logged alongside each item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_selector: Option<String>,
    /// Product price, logged alongside each item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_selector: Option<String>,
    /// Upper bound on pages followed; `None` uses the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,
    #[serde(default)]
    pub mirror: MirrorMode,
}

/// Selectors after template defaults and overrides are merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingSelectors {
    pub item: String,
    pub link: String,
    pub image: Option<String>,
    pub next_page: Option<String>,
    pub title: Option<String>,
    pub price: Option<String>,
}

pub const DEFAULT_MAX_PAGES: usize = 50;

impl ListingTemplate {
    fn selectors(&self) -> ListingSelectors {
        match self {
            Self::Magento => ListingSelectors {
                item: "li.product-item".to_string(),
                link: "a.product-item-link".to_string(),
                image: Some("img.product-image-photo".to_string()),
                next_page: Some("a.action.next".to_string()),
                title: Some(".product-item-name a".to_string()),
                price: Some(".special-price .price".to_string()),
            },
            Self::Algolia => ListingSelectors {
                item: "li.ais-Hits-item".to_string(),
                link: "a.result".to_string(),
                image: Some(".result-thumbnail img".to_string()),
                next_page: Some("li.ais-Pagination-item--nextPage a".to_string()),
                title: Some("h3.result-title".to_string()),
                price: Some(".after_special".to_string()),
            },
        }
    }
}

impl ProductListingConfig {
    /// Merge template defaults with explicit selectors.
    pub fn selectors(&self) -> Result<ListingSelectors, SourceError> {
        let base = self.template.map(|t| t.selectors());

        let item = self
            .item_selector
            .clone()
            .or_else(|| base.as_ref().map(|b| b.item.clone()))
            .ok_or_else(|| {
                SourceError::Config("product_listing needs item_selector or a template".into())
            })?;
        let link = self
            .link_selector
            .clone()
            .or_else(|| base.as_ref().map(|b| b.link.clone()))
            .ok_or_else(|| {
                SourceError::Config("product_listing needs link_selector or a template".into())
            })?;

        Ok(ListingSelectors {
            item,
            link,
            image: self
                .image_selector
                .clone()
                .or_else(|| base.as_ref().and_then(|b| b.image.clone())),
            next_page: self
                .next_page_selector
                .clone()
                .or_else(|| base.as_ref().and_then(|b| b.next_page.clone())),
            title: self
                .title_selector
                .clone()
                .or_else(|| base.as_ref().and_then(|b| b.title.clone())),
            price: self
                .price_selector
                .clone()
                .or_else(|| base.as_ref().and_then(|b| b.price.clone())),
        })
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages.unwrap_or(DEFAULT_MAX_PAGES).max(1)
    }
}

fn default_json_path() -> String {
    "data/files.json".to_string()
}

fn default_url_field() -> String {
    "url".to_string()
}

fn default_name_field() -> String {
    "name".to_string()
}

fn default_data_attributes() -> Vec<String> {
    ["data-file", "data-url", "data-download"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_script_globals() -> Vec<String> {
    ["filesList", "files", "documents", "data.files", "appData.files"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
