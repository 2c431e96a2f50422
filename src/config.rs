//! Configuration management for sitemirror using the prefer crate.
//!
//! Settings come from defaults, then the config file, then the
//! environment. The config file also carries the crawl targets.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::reconcile::DEFAULT_WORKERS;
use crate::scrapers::{validate_sources, SourceConfig};
use crate::storage::validate_identity;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "sitemirror.db";

/// Default mirror subdirectory name.
const MIRROR_SUBDIR: &str = "mirror";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename.
    pub database_filename: String,
    /// Database URL (overrides data_dir/database_filename if set).
    pub database_url: Option<String>,
    /// Root of the per-target blob directories.
    pub mirror_dir: PathBuf,
    /// User agent: `None` for the default, `impersonate`, or a custom string.
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    pub request_timeout: u64,
    /// Delay between requests to one domain in milliseconds.
    pub request_delay_ms: u64,
    /// Artifacts processed concurrently per pass.
    pub workers: usize,
    /// Wall-clock limit for one pass in seconds; the pass is cancelled after it.
    pub pass_timeout: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        // Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sitemirror");

        Self {
            mirror_dir: data_dir.join(MIRROR_SUBDIR),
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            database_url: None,
            user_agent: None,
            request_timeout: 30,
            request_delay_ms: 250,
            workers: DEFAULT_WORKERS,
            pass_timeout: None,
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            mirror_dir: data_dir.join(MIRROR_SUBDIR),
            data_dir,
            ..Default::default()
        }
    }

    /// Get the database URL, constructing from path if not explicitly set.
    pub fn database_url(&self) -> String {
        if let Some(ref url) = self.database_url {
            url.clone()
        } else {
            format!("sqlite:{}", self.database_path().display())
        }
    }

    /// Get the full path to the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    /// Check if the database appears to be initialized.
    pub fn database_exists(&self) -> bool {
        self.database_url.is_some() || self.database_path().exists()
    }

    /// Ensure all directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (label, dir) in [("data", &self.data_dir), ("mirror", &self.mirror_dir)] {
            std::fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        label,
                        dir.display(),
                        e
                    ),
                )
            })?;
        }
        Ok(())
    }
}

/// One crawl target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// URL that source paths are resolved against.
    pub base_url: String,
    /// Sources enumerated in order; their results are concatenated.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    /// Overrides the global worker count for this target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Mirror directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mirror_dir: Option<String>,
    /// User agent string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    /// Delay between requests in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    /// Artifacts processed concurrently per pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// Pass timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_timeout: Option<u64>,
    /// Crawl targets by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, TargetConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery of `sitemirror.*` files.
    pub async fn load() -> anyhow::Result<Self> {
        match prefer::load("sitemirror").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default()),
            },
            // No config file found
            Err(_) => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the file extension: TOML, YAML, or JSON.
    pub async fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config = Self::parse(path, &contents)?;
        config.source_path = Some(path.to_path_buf());
        config.validate()?;
        Ok(config)
    }

    fn parse(path: &Path, contents: &str) -> anyhow::Result<Self> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let config = match ext {
            "toml" => toml::from_str(contents).context("Failed to parse TOML config")?,
            "yaml" | "yml" => serde_yaml::from_str(contents).context("Failed to parse YAML config")?,
            _ => serde_json::from_str(contents).context("Failed to parse JSON config")?,
        };
        Ok(config)
    }

    /// Reject targets whose names cannot be used as a mirror directory, or
    /// whose base URL or source selectors are unusable.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, target) in &self.targets {
            if validate_identity(name).is_err() {
                bail!("invalid target name '{}'", name);
            }
            if target.sources.is_empty() {
                bail!("target '{}' has no sources", name);
            }
            validate_sources(&target.base_url, &target.sources)
                .with_context(|| format!("target '{}' is misconfigured", name))?;
        }
        Ok(())
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.mirror_dir = settings.data_dir.join(MIRROR_SUBDIR);
        }
        if let Some(ref mirror_dir) = self.mirror_dir {
            settings.mirror_dir = self.resolve_path(mirror_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay_ms = delay;
        }
        if let Some(workers) = self.workers {
            settings.workers = workers.max(1);
        }
        if self.pass_timeout.is_some() {
            settings.pass_timeout = self.pass_timeout;
        }
    }

    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.get(name)
    }

    /// Worker count for a target after its override.
    pub fn workers_for(&self, name: &str, settings: &Settings) -> usize {
        self.target(name)
            .and_then(|t| t.workers)
            .unwrap_or(settings.workers)
            .max(1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file, skipping discovery.
    pub config_path: Option<PathBuf>,
    /// Resolve relative paths against the working directory.
    pub use_cwd: bool,
    /// Data directory override.
    pub data: Option<PathBuf>,
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn current_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Load settings and config with default options.
pub async fn load_settings() -> anyhow::Result<(Settings, Config)> {
    load_settings_with_options(LoadOptions::default()).await
}

pub async fn load_settings_with_options(options: LoadOptions) -> anyhow::Result<(Settings, Config)> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await?,
    };

    let mut settings = Settings::default();

    let base_dir = if options.use_cwd {
        current_dir()
    } else {
        config.base_dir().unwrap_or_else(current_dir)
    };
    config.apply_to_settings(&mut settings, &base_dir);

    // SITEMIRROR_DATA_DIR, then --data, take precedence over the file
    let data_override = options
        .data
        .clone()
        .or_else(|| env_override("SITEMIRROR_DATA_DIR").map(PathBuf::from));
    if let Some(data_dir) = data_override {
        let data_dir = config.resolve_path(&data_dir.display().to_string(), &current_dir());
        if config.mirror_dir.is_none() {
            settings.mirror_dir = data_dir.join(MIRROR_SUBDIR);
        }
        settings.data_dir = data_dir;
    }

    // DATABASE_URL environment variable takes highest precedence
    if let Some(database_url) = env_override("DATABASE_URL") {
        tracing::debug!("Using DATABASE_URL from environment");
        settings.database_url = Some(database_url);
    }

    Ok((settings, config))
}
