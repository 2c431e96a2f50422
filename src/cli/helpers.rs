//! Shared helper functions for CLI commands.

use anyhow::bail;

use crate::config::{Config, Settings};
use crate::repository::DbContext;

/// Open the database, failing if `init` has not been run.
pub fn open_context(settings: &Settings) -> anyhow::Result<DbContext> {
    if !settings.database_exists() {
        bail!("System not initialized. Run 'sitemirror init' first.");
    }
    Ok(DbContext::from_url(&settings.database_url())?)
}

/// Resolve the targets a command should act on.
pub fn select_targets(config: &Config, names: &[String], all: bool) -> anyhow::Result<Vec<String>> {
    if all {
        if config.targets.is_empty() {
            bail!("No targets configured");
        }
        return Ok(config.targets.keys().cloned().collect());
    }
    if names.is_empty() {
        bail!("Specify one or more targets, or use --all");
    }

    let unknown: Vec<&str> = names
        .iter()
        .filter(|n| !config.targets.contains_key(n.as_str()))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        bail!("Unknown target(s): {}", unknown.join(", "));
    }

    let mut selected = Vec::new();
    for name in names {
        if !selected.contains(name) {
            selected.push(name.clone());
        }
    }
    Ok(selected)
}

/// Format a number with thousands separators.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();
    let chunks: Vec<_> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();
    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Truncate a string to max length with ellipsis.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
