//! Export command.

use std::path::Path;

use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;

use crate::cli::helpers::open_context;
use crate::config::Settings;
use crate::models::ArtifactRecord;
use crate::repository::ArtifactStore;

#[derive(Serialize)]
struct Export {
    crawl_target: String,
    exported_at: DateTime<Utc>,
    artifacts: Vec<ArtifactRecord>,
}

/// Write a target's records as JSON to `output`, or stdout.
pub async fn cmd_export(settings: &Settings, target: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let ctx = open_context(settings)?;
    let repo = ctx.artifacts(target).await?;

    let export = Export {
        crawl_target: target.to_string(),
        exported_at: Utc::now(),
        artifacts: repo.list_all().await?,
    };
    let json = serde_json::to_string_pretty(&export)?;

    match output {
        Some(path) => {
            tokio::fs::write(path, json).await?;
            eprintln!(
                "{} Exported {} artifacts to {}",
                style("✓").green(),
                export.artifacts.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}
