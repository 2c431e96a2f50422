//! Sync command: one reconciliation pass per target.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use console::style;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::cli::helpers::{open_context, select_targets};
use crate::config::{Config, Settings, TargetConfig};
use crate::models::{Classification, PassSummary};
use crate::reconcile::{ReconcileEvent, Reconciler};
use crate::repository::DbContext;
use crate::scrapers::{ConfigurableSource, HttpClient, PayloadFetcher};
use crate::storage::FsContentStore;

/// Command-line overrides for a sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub workers: Option<usize>,
    pub json: bool,
    /// Pass timeout in seconds.
    pub timeout: Option<u64>,
}

/// Why a pass's cancel signal fired.
#[derive(Default)]
struct Interrupt {
    ctrl_c: AtomicBool,
}

/// Run a pass for each selected target, sequentially.
pub async fn cmd_sync(
    settings: &Settings,
    config: &Config,
    names: &[String],
    all: bool,
    options: SyncOptions,
) -> anyhow::Result<()> {
    let targets = select_targets(config, names, all)?;
    let ctx = open_context(settings)?;

    let client = HttpClient::with_user_agent(
        Duration::from_secs(settings.request_timeout),
        Duration::from_millis(settings.request_delay_ms),
        settings.user_agent.as_deref(),
    )?;
    let fetcher: Arc<dyn PayloadFetcher> = Arc::new(client);

    let interrupt = Arc::new(Interrupt::default());
    let mut results: BTreeMap<String, serde_json::Value> = BTreeMap::new();
    let mut failed_targets = Vec::new();

    for name in &targets {
        let Some(target) = config.target(name) else {
            continue;
        };
        if !options.json {
            println!("{} Syncing {}", style("→").cyan(), style(name).bold());
        }

        let workers = options
            .workers
            .unwrap_or_else(|| config.workers_for(name, settings));
        let pass = PassSetup {
            name,
            target,
            workers,
            timeout: options.timeout,
            quiet: options.json,
        };

        let outcome = pass
            .run(&ctx, settings, fetcher.clone(), interrupt.clone())
            .await;

        match outcome {
            Ok(summary) => {
                if options.json {
                    results.insert(name.clone(), serde_json::to_value(&summary)?);
                } else {
                    print_summary(&summary);
                }
            }
            Err(e) => {
                if options.json {
                    results.insert(name.clone(), serde_json::json!({ "error": format!("{:#}", e) }));
                } else {
                    println!("  {} {:#}", style("✗").red(), e);
                }
                failed_targets.push(name.clone());
            }
        }

        if interrupt.ctrl_c.load(Ordering::SeqCst) {
            if !options.json {
                println!("{} Interrupted, remaining targets skipped", style("!").yellow());
            }
            break;
        }
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    if !failed_targets.is_empty() {
        bail!("Pass failed for: {}", failed_targets.join(", "));
    }
    Ok(())
}

/// One target's pass as the sync command runs it.
struct PassSetup<'a> {
    name: &'a str,
    target: &'a TargetConfig,
    workers: usize,
    timeout: Option<u64>,
    quiet: bool,
}

impl PassSetup<'_> {
    /// Build the target's stores and source, then run the pass. Setup
    /// failures surface like a failed pass so other targets still report.
    async fn run(
        &self,
        ctx: &DbContext,
        settings: &Settings,
        fetcher: Arc<dyn PayloadFetcher>,
        interrupt: Arc<Interrupt>,
    ) -> anyhow::Result<PassSummary> {
        let source = ConfigurableSource::new(
            self.name,
            &self.target.base_url,
            &self.target.sources,
            fetcher.clone(),
        )?;
        let artifacts = Arc::new(ctx.artifacts(self.name).await?);
        let content = Arc::new(FsContentStore::for_target(&settings.mirror_dir, self.name)?);

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let watcher = spawn_cancel_watcher(cancel_tx, self.timeout, interrupt);

        let (event_tx, event_rx) = mpsc::channel(256);
        let printer = spawn_event_printer(event_rx, self.quiet);

        let reconciler = Reconciler::new(artifacts, content, fetcher)
            .with_workers(self.workers)
            .with_events(event_tx)
            .with_cancel(cancel_rx);

        let outcome = reconciler.run_pass(&source).await;
        drop(reconciler);
        watcher.abort();
        let _ = printer.await;

        Ok(outcome?)
    }
}

/// Fire the cancel signal on Ctrl-C or when the pass deadline passes.
fn spawn_cancel_watcher(
    cancel_tx: watch::Sender<bool>,
    timeout: Option<u64>,
    interrupt: Arc<Interrupt>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let deadline = async {
            match timeout {
                Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, finishing in-flight artifacts");
                interrupt.ctrl_c.store(true, Ordering::SeqCst);
            }
            _ = deadline => {
                tracing::info!("Pass timeout reached, finishing in-flight artifacts");
            }
        }
        let _ = cancel_tx.send(true);
    })
}

fn spawn_event_printer(mut rx: mpsc::Receiver<ReconcileEvent>, quiet: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if quiet {
                continue;
            }
            match event {
                ReconcileEvent::Enumerated {
                    count, duplicates, ..
                } => {
                    if duplicates > 0 {
                        println!("  {} artifacts observed ({} duplicates collapsed)", count, duplicates);
                    } else {
                        println!("  {} artifacts observed", count);
                    }
                }
                ReconcileEvent::Applied {
                    identity,
                    classification,
                } => match classification {
                    Classification::New => println!("  {} {}", style("+").green(), identity),
                    Classification::Changed => println!("  {} {}", style("~").yellow(), identity),
                    Classification::Removed => println!("  {} {}", style("-").red(), identity),
                    Classification::Unchanged => {}
                },
                ReconcileEvent::InconsistentState { identity } => {
                    println!("  {} {} had no mirrored file, restored", style("!").yellow(), identity)
                }
                ReconcileEvent::Failed { identity, reason } => {
                    println!("  {} {}: {}", style("✗").red(), identity, reason)
                }
                ReconcileEvent::Cancelled { dispatched, total } => println!(
                    "  {} Cancelled after {}/{} artifacts; removals skipped",
                    style("!").yellow(),
                    dispatched,
                    total
                ),
            }
        }
    })
}

fn print_summary(summary: &PassSummary) {
    let marker = if summary.is_success() {
        style("✓").green()
    } else {
        style("!").yellow()
    };
    println!(
        "  {} {} new, {} changed, {} unchanged, {} removed, {} failed",
        marker,
        summary.new,
        summary.changed,
        summary.unchanged,
        summary.removed,
        summary.failures.len()
    );
}
