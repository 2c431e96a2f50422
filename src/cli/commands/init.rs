//! Initialize command.

use console::style;

use crate::config::{Config, Settings};
use crate::repository::DbContext;

/// Initialize the data directory and database.
pub async fn cmd_init(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    settings.ensure_directories()?;

    let ctx = DbContext::from_url(&settings.database_url())?;
    ctx.init_schema().await?;

    if config.targets.is_empty() {
        println!(
            "{} No targets configured in sitemirror.toml",
            style("!").yellow()
        );
    } else {
        for (name, target) in &config.targets {
            println!(
                "  {} Target {} ({} source{})",
                style("✓").green(),
                style(name).bold(),
                target.sources.len(),
                if target.sources.len() == 1 { "" } else { "s" }
            );
        }
    }

    println!(
        "{} Initialized sitemirror in {}",
        style("✓").green(),
        settings.data_dir.display()
    );

    Ok(())
}
