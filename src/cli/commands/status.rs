//! Status, listing, and target commands.

use chrono::Local;
use console::style;

use crate::cli::helpers::{format_number, open_context, truncate_string};
use crate::config::{Config, Settings};
use crate::repository::{ArtifactStore, TargetStats};

/// Show record counts and last pass time per target.
pub async fn cmd_status(
    settings: &Settings,
    config: &Config,
    target: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let ctx = open_context(settings)?;
    let mut stats = ctx.target_stats().await?;

    // Configured targets that have never been synced still get a row
    for name in config.targets.keys() {
        if !stats.iter().any(|s| &s.crawl_target == name) {
            stats.push(TargetStats {
                crawl_target: name.clone(),
                artifacts: 0,
                last_seen_at: None,
            });
        }
    }
    stats.sort_by(|a, b| a.crawl_target.cmp(&b.crawl_target));
    if let Some(target) = target {
        stats.retain(|s| s.crawl_target == target);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let separator = "─".repeat(70);
    println!();
    println!(
        "{:<50} Last updated: {}",
        style("sitemirror status").bold(),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("{}", separator);
    println!("Database: {}", settings.database_url());
    println!("Mirror:   {}", settings.mirror_dir.display());
    println!();

    if stats.is_empty() {
        println!("{} No targets", style("!").yellow());
        return Ok(());
    }

    println!(
        "{:<34} {:>10}   {}",
        style("TARGETS").cyan().bold(),
        "Artifacts",
        "Last seen"
    );
    for s in &stats {
        let last_seen = s
            .last_seen_at
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        let configured = if config.targets.contains_key(&s.crawl_target) {
            String::new()
        } else {
            format!(" {}", style("(not configured)").dim())
        };
        println!(
            "  {:<32} {:>10}   {}{}",
            truncate_string(&s.crawl_target, 32),
            format_number(s.artifacts.max(0) as u64),
            last_seen,
            configured
        );
    }

    Ok(())
}

/// List the records of one target.
pub async fn cmd_ls(settings: &Settings, target: &str, json: bool) -> anyhow::Result<()> {
    let ctx = open_context(settings)?;
    let repo = ctx.artifacts(target).await?;
    let records = repo.list_all().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{} No artifacts for {}", style("!").yellow(), target);
        return Ok(());
    }

    for record in &records {
        println!(
            "{:<40} {}  {:<15} {}",
            truncate_string(&record.identity, 40),
            style(record.fingerprint.short()).dim(),
            record.retrieval_method.as_str(),
            record
                .last_seen_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
        );
    }
    println!(
        "{} {} artifacts",
        style("→").cyan(),
        format_number(records.len() as u64)
    );
    Ok(())
}

/// List configured targets and their sources.
pub fn cmd_targets(config: &Config) -> anyhow::Result<()> {
    if config.targets.is_empty() {
        println!("{} No targets configured", style("!").yellow());
        return Ok(());
    }

    for (name, target) in &config.targets {
        let kinds: Vec<&str> = target.sources.iter().map(|s| s.type_name()).collect();
        println!(
            "{:<24} {:<40} {}",
            style(name).bold(),
            truncate_string(&target.base_url, 40),
            kinds.join(", ")
        );
    }
    Ok(())
}
