//! Audit command.

use console::style;

use crate::cli::helpers::open_context;
use crate::config::Settings;
use crate::reconcile::{audit, prune_orphans};
use crate::storage::FsContentStore;

/// Report mirror inconsistencies for a target; `fix` prunes orphan files.
pub async fn cmd_audit(
    settings: &Settings,
    target: &str,
    fix: bool,
    verify: bool,
    json: bool,
) -> anyhow::Result<()> {
    let ctx = open_context(settings)?;
    let repo = ctx.artifacts(target).await?;
    let content = FsContentStore::for_target(&settings.mirror_dir, target)?;

    let mut report = audit(&repo, &content, verify).await?;
    if fix {
        prune_orphans(&content, &mut report).await?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} {}: {} records, {} files",
        style("→").cyan(),
        style(target).bold(),
        report.records,
        report.blobs
    );
    for identity in &report.missing_blobs {
        println!("  {} missing file: {}", style("!").yellow(), identity);
    }
    for identity in &report.fingerprint_mismatches {
        println!("  {} content differs from record: {}", style("!").yellow(), identity);
    }
    for identity in &report.orphan_blobs {
        let action = if report.pruned.contains(identity) {
            "removed"
        } else {
            "orphan file"
        };
        println!("  {} {}: {}", style("-").red(), action, identity);
    }

    if report.is_clean() {
        println!("  {} Mirror is consistent", style("✓").green());
    } else if !report.missing_blobs.is_empty() || !report.fingerprint_mismatches.is_empty() {
        println!("  Run 'sitemirror sync {}' to restore mirrored files", target);
    }
    Ok(())
}
