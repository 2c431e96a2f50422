//! Reconciliation of observed remote artifacts against the local mirror.
//!
//! One pass takes the artifacts a source observed, fetches and fingerprints
//! each of them, and applies the minimal mutation to make the artifact store
//! and the content store agree with the remote side. Artifacts no longer
//! observed are removed in a sweep after every unit has finished.
//!
//! A unit (one artifact) either applies completely or leaves the stores as
//! they were: a blob is only ever paired with a record carrying its
//! fingerprint, and a failed record write rolls the blob back.

mod audit;
mod error;
mod observed;

pub use audit::{audit, prune_orphans, AuditError, AuditReport};
pub use error::{ArtifactError, ReconcileError};
pub use observed::ObservedSet;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::models::{ArtifactRecord, Classification, Fingerprint, ObservedArtifact, PassSummary};
use crate::repository::ArtifactStore;
use crate::scrapers::{ArtifactSource, PayloadFetcher};
use crate::storage::ContentStore;

/// Default number of artifacts processed concurrently.
pub const DEFAULT_WORKERS: usize = 4;

/// Identity recorded for failures not tied to one artifact.
pub const TARGET_WIDE_IDENTITY: &str = "*";

/// Progress events emitted during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileEvent {
    /// Duplicate collapse finished; `count` units will be dispatched.
    Enumerated {
        target: String,
        count: usize,
        duplicates: usize,
    },
    /// One artifact was applied.
    Applied {
        identity: String,
        classification: Classification,
    },
    /// A record existed without its blob; the blob was rewritten.
    InconsistentState { identity: String },
    /// One artifact could not be applied.
    Failed { identity: String, reason: String },
    /// Dispatch stopped early; the removal sweep will not run.
    Cancelled { dispatched: usize, total: usize },
}

/// Drives reconciliation passes for one crawl target.
pub struct Reconciler {
    target: String,
    artifacts: Arc<dyn ArtifactStore>,
    content: Arc<dyn ContentStore>,
    fetcher: Arc<dyn PayloadFetcher>,
    workers: usize,
    events: Option<mpsc::Sender<ReconcileEvent>>,
    cancel: Option<watch::Receiver<bool>>,
}

impl Reconciler {
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        content: Arc<dyn ContentStore>,
        fetcher: Arc<dyn PayloadFetcher>,
    ) -> Self {
        Self {
            target: artifacts.crawl_target().to_string(),
            artifacts,
            content,
            fetcher,
            workers: DEFAULT_WORKERS,
            events: None,
            cancel: None,
        }
    }

    /// Bound on concurrently processed artifacts (at least one).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<ReconcileEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Stop dispatching new units once the signal turns `true`.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Enumerate `source` and reconcile what it observed.
    ///
    /// An enumeration failure aborts the pass before any mutation.
    pub async fn run_pass(&self, source: &dyn ArtifactSource) -> Result<PassSummary, ReconcileError> {
        self.preflight().await?;

        let observed = source
            .enumerate()
            .await
            .map_err(|source| ReconcileError::Enumeration {
                target: self.target.clone(),
                source,
            })?;

        self.apply(observed, Utc::now()).await
    }

    /// Reconcile an already enumerated observation.
    pub async fn run(&self, observed: Vec<ObservedArtifact>) -> Result<PassSummary, ReconcileError> {
        self.run_at(observed, Utc::now()).await
    }

    /// Reconcile with an explicit pass timestamp.
    pub async fn run_at(
        &self,
        observed: Vec<ObservedArtifact>,
        now: DateTime<Utc>,
    ) -> Result<PassSummary, ReconcileError> {
        self.preflight().await?;
        self.apply(observed, now).await
    }

    async fn preflight(&self) -> Result<(), ReconcileError> {
        self.artifacts
            .ping()
            .await
            .map_err(|e| ReconcileError::fatal(&self.target, e))?;
        self.content
            .prepare()
            .await
            .map_err(|e| ReconcileError::fatal(&self.target, e))?;
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn emit(&self, event: ReconcileEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    async fn apply(
        &self,
        observed: Vec<ObservedArtifact>,
        now: DateTime<Utc>,
    ) -> Result<PassSummary, ReconcileError> {
        let set = ObservedSet::collapse(observed);
        if set.duplicates() > 0 {
            debug!(
                target_name = %self.target,
                duplicates = set.duplicates(),
                "Collapsed duplicate identities"
            );
        }
        self.emit(ReconcileEvent::Enumerated {
            target: self.target.clone(),
            count: set.len(),
            duplicates: set.duplicates(),
        })
        .await;

        let mut summary = PassSummary::default();

        let outcomes: Vec<(String, Result<Classification, ArtifactError>)> =
            stream::iter(set.iter())
                .take_while(|_| std::future::ready(!self.is_cancelled()))
                .map(|artifact| async move {
                    let outcome = self.reconcile_one(artifact, now).await;
                    match &outcome {
                        Ok(classification) => {
                            self.emit(ReconcileEvent::Applied {
                                identity: artifact.identity.clone(),
                                classification: *classification,
                            })
                            .await
                        }
                        Err(e) => {
                            warn!(
                                target_name = %self.target,
                                identity = %artifact.identity,
                                "Failed to reconcile artifact: {}",
                                e
                            );
                            self.emit(ReconcileEvent::Failed {
                                identity: artifact.identity.clone(),
                                reason: e.to_string(),
                            })
                            .await
                        }
                    }
                    (artifact.identity.clone(), outcome)
                })
                .buffer_unordered(self.workers)
                .collect()
                .await;

        let dispatched = outcomes.len();
        for (identity, outcome) in outcomes {
            match outcome {
                Ok(classification) => summary.record(classification),
                Err(e) => summary.fail(identity, e),
            }
        }

        if self.is_cancelled() {
            info!(
                target_name = %self.target,
                dispatched,
                total = set.len(),
                "Pass cancelled, skipping removal sweep"
            );
            self.emit(ReconcileEvent::Cancelled {
                dispatched,
                total: set.len(),
            })
            .await;
            summary.cancelled = true;
        } else {
            self.sweep(&set, &mut summary).await;
        }

        summary
            .failures
            .sort_by(|a, b| a.identity.cmp(&b.identity));

        info!(
            target_name = %self.target,
            new = summary.new,
            changed = summary.changed,
            unchanged = summary.unchanged,
            removed = summary.removed,
            failed = summary.failures.len(),
            "Pass complete"
        );
        Ok(summary)
    }

    /// Classify and apply one observed artifact.
    async fn reconcile_one(
        &self,
        artifact: &ObservedArtifact,
        now: DateTime<Utc>,
    ) -> Result<Classification, ArtifactError> {
        let identity = artifact.identity.as_str();
        let existing = self.artifacts.get(identity).await?;

        let payload = self.fetcher.fetch(&artifact.source_url).await?;
        let fingerprint = Fingerprint::of(&payload);

        match existing {
            None => self.apply_new(artifact, &payload, fingerprint, now).await,
            Some(previous) if previous.fingerprint == fingerprint => {
                self.apply_unchanged(artifact, &previous, &payload, fingerprint, now)
                    .await
            }
            Some(previous) => {
                self.apply_changed(artifact, &previous, &payload, fingerprint, now)
                    .await
            }
        }
    }

    async fn apply_new(
        &self,
        artifact: &ObservedArtifact,
        payload: &[u8],
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<Classification, ArtifactError> {
        let identity = artifact.identity.as_str();
        self.content.write(identity, payload).await?;

        let record = ArtifactRecord::first_seen(&self.target, artifact, fingerprint, now);
        if let Err(e) = self.artifacts.upsert(&record).await {
            if let Err(cleanup) = self.content.delete(identity).await {
                warn!(
                    target_name = %self.target,
                    identity,
                    "Could not remove blob after failed insert: {}",
                    cleanup
                );
            }
            return Err(e.into());
        }

        info!(
            target_name = %self.target,
            identity,
            fingerprint = record.fingerprint.short(),
            "New artifact"
        );
        Ok(Classification::New)
    }

    async fn apply_unchanged(
        &self,
        artifact: &ObservedArtifact,
        previous: &ArtifactRecord,
        payload: &[u8],
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<Classification, ArtifactError> {
        let identity = artifact.identity.as_str();
        let record = previous.seen_again(artifact, fingerprint, now);

        if !self.content.exists(identity).await? {
            warn!(
                target_name = %self.target,
                identity,
                "InconsistentStateDetected: record has no blob, rewriting it"
            );
            self.emit(ReconcileEvent::InconsistentState {
                identity: identity.to_string(),
            })
            .await;

            // Blob and record carry the same fingerprint either way, so a
            // failed upsert below leaves a consistent pair.
            self.content.write(identity, payload).await?;
            self.artifacts.upsert(&record).await?;
            return Ok(Classification::Changed);
        }

        self.artifacts.upsert(&record).await?;
        debug!(target_name = %self.target, identity, "Unchanged artifact");
        Ok(Classification::Unchanged)
    }

    async fn apply_changed(
        &self,
        artifact: &ObservedArtifact,
        previous: &ArtifactRecord,
        payload: &[u8],
        fingerprint: Fingerprint,
        now: DateTime<Utc>,
    ) -> Result<Classification, ArtifactError> {
        let identity = artifact.identity.as_str();

        let backup = self.content.read(identity).await?;
        if backup.is_none() {
            warn!(
                target_name = %self.target,
                identity,
                "InconsistentStateDetected: record has no blob"
            );
            self.emit(ReconcileEvent::InconsistentState {
                identity: identity.to_string(),
            })
            .await;
        }

        self.content.write(identity, payload).await?;

        let record = previous.seen_again(artifact, fingerprint, now);
        if let Err(e) = self.artifacts.upsert(&record).await {
            let restored = match &backup {
                Some(bytes) => self.content.write(identity, bytes).await,
                None => self.content.delete(identity).await,
            };
            if let Err(rollback) = restored {
                warn!(
                    target_name = %self.target,
                    identity,
                    "Could not restore previous blob after failed update: {}",
                    rollback
                );
            }
            return Err(e.into());
        }

        warn!(
            target_name = %self.target,
            identity,
            from = previous.fingerprint.short(),
            to = record.fingerprint.short(),
            "Changed artifact"
        );
        Ok(Classification::Changed)
    }

    /// Remove every stored artifact that was not observed in this pass.
    async fn sweep(&self, observed: &ObservedSet, summary: &mut PassSummary) {
        let records = match self.artifacts.list_all().await {
            Ok(records) => records,
            Err(e) => {
                warn!(target_name = %self.target, "Removal sweep skipped: {}", e);
                summary.fail(TARGET_WIDE_IDENTITY, e);
                return;
            }
        };

        for record in records {
            if observed.contains(&record.identity) {
                continue;
            }

            match self.remove(&record).await {
                Ok(()) => {
                    warn!(
                        target_name = %self.target,
                        identity = %record.identity,
                        "Removed artifact"
                    );
                    summary.record(Classification::Removed);
                    self.emit(ReconcileEvent::Applied {
                        identity: record.identity.clone(),
                        classification: Classification::Removed,
                    })
                    .await;
                }
                Err(e) => {
                    warn!(
                        target_name = %self.target,
                        identity = %record.identity,
                        "Failed to remove artifact: {}",
                        e
                    );
                    self.emit(ReconcileEvent::Failed {
                        identity: record.identity.clone(),
                        reason: e.to_string(),
                    })
                    .await;
                    summary.fail(record.identity, e);
                }
            }
        }
    }

    /// Blob first, then record: an interrupted removal leaves a record
    /// without a blob, which the next pass heals or removes.
    async fn remove(&self, record: &ArtifactRecord) -> Result<(), ArtifactError> {
        self.content.delete(&record.identity).await?;
        self.artifacts.delete(&record.identity).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RetrievalMethod;
    use crate::testing::{MemoryArtifactStore, MemoryContentStore, StaticFetcher};
    use chrono::TimeZone;

    struct Harness {
        artifacts: Arc<MemoryArtifactStore>,
        content: Arc<MemoryContentStore>,
        fetcher: Arc<StaticFetcher>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                artifacts: Arc::new(MemoryArtifactStore::new("site")),
                content: Arc::new(MemoryContentStore::new()),
                fetcher: Arc::new(StaticFetcher::new()),
            }
        }

        fn reconciler(&self) -> Reconciler {
            Reconciler::new(
                self.artifacts.clone(),
                self.content.clone(),
                self.fetcher.clone(),
            )
        }

        fn serve(&self, identity: &str, body: &[u8]) -> ObservedArtifact {
            let url = format!("http://localhost:5500/{}", identity);
            self.fetcher.set_page(&url, body);
            ObservedArtifact::new(identity, url, RetrievalMethod::HtmlLink)
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_two_pass_scenario() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"A");
        let b = h.serve("b.png", b"B");

        let first = h.reconciler().run(vec![a.clone(), b]).await.unwrap();
        assert_eq!((first.new, first.changed, first.unchanged, first.removed), (2, 0, 0, 0));
        assert!(first.failures.is_empty());

        let second = h.reconciler().run(vec![a]).await.unwrap();
        assert_eq!(
            (second.new, second.changed, second.unchanged, second.removed),
            (0, 0, 1, 1)
        );
        assert!(h.content.blob("b.png").is_none());
        assert!(!h.artifacts.snapshot().contains_key("b.png"));
    }

    #[tokio::test]
    async fn test_new_artifact_creates_record_and_blob() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"v1");

        let summary = h.reconciler().run_at(vec![a], at(1)).await.unwrap();
        assert_eq!(summary.new, 1);

        let record = h.artifacts.snapshot()["a.pdf"].clone();
        assert_eq!(record.fingerprint, Fingerprint::of(b"v1"));
        assert_eq!(record.first_seen_at, at(1));
        assert_eq!(record.last_seen_at, at(1));
        assert_eq!(record.crawl_target, "site");
        assert_eq!(h.content.blob("a.pdf"), Some(b"v1".to_vec()));
    }

    #[tokio::test]
    async fn test_change_detection() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"v1");
        h.reconciler().run_at(vec![a.clone()], at(1)).await.unwrap();

        h.serve("a.pdf", b"v2");
        let summary = h.reconciler().run_at(vec![a], at(2)).await.unwrap();
        assert_eq!(summary.changed, 1);

        let record = h.artifacts.snapshot()["a.pdf"].clone();
        assert_eq!(record.fingerprint, Fingerprint::of(b"v2"));
        assert_eq!(record.first_seen_at, at(1));
        assert_eq!(record.last_seen_at, at(2));
        assert_eq!(h.content.blob("a.pdf"), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_unchanged_does_not_rewrite_blob() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"same");
        h.reconciler().run_at(vec![a.clone()], at(1)).await.unwrap();
        let writes = h.content.writes();

        let summary = h.reconciler().run_at(vec![a], at(3)).await.unwrap();
        assert_eq!(summary.unchanged, 1);
        assert_eq!(h.content.writes(), writes);

        let record = h.artifacts.snapshot()["a.pdf"].clone();
        assert_eq!(record.first_seen_at, at(1));
        assert_eq!(record.last_seen_at, at(3));
    }

    #[tokio::test]
    async fn test_unchanged_refreshes_url_and_method() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"same");
        h.reconciler().run(vec![a]).await.unwrap();

        let moved_url = "http://localhost:5500/moved/a.pdf";
        h.fetcher.set_page(moved_url, b"same".to_vec());
        let moved = ObservedArtifact::new("a.pdf", moved_url, RetrievalMethod::JsonEndpoint);

        let summary = h.reconciler().run(vec![moved]).await.unwrap();
        assert_eq!(summary.unchanged, 1);

        let record = h.artifacts.snapshot()["a.pdf"].clone();
        assert_eq!(record.source_url, moved_url);
        assert_eq!(record.retrieval_method, RetrievalMethod::JsonEndpoint);
    }

    #[tokio::test]
    async fn test_idempotence() {
        let h = Harness::new();
        let observed = vec![h.serve("a.pdf", b"A"), h.serve("b.png", b"B")];

        h.reconciler().run_at(observed.clone(), at(1)).await.unwrap();
        let records_after_first = h.artifacts.snapshot();
        let writes_after_first = h.content.writes();

        let summary = h.reconciler().run_at(observed, at(1)).await.unwrap();
        assert_eq!(
            (summary.new, summary.changed, summary.unchanged, summary.removed),
            (0, 0, 2, 0)
        );
        assert_eq!(h.artifacts.snapshot(), records_after_first);
        assert_eq!(h.content.writes(), writes_after_first);
    }

    #[tokio::test]
    async fn test_removal() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"A");
        h.reconciler().run(vec![a]).await.unwrap();

        let summary = h.reconciler().run(Vec::new()).await.unwrap();
        assert_eq!(summary.removed, 1);
        assert!(h.artifacts.snapshot().is_empty());
        assert!(h.content.blob("a.pdf").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_tie_break() {
        let h = Harness::new();
        h.fetcher.set_page("http://localhost:5500/v1/a.pdf", b"first".to_vec());
        h.fetcher.set_page("http://localhost:5500/v2/a.pdf", b"second".to_vec());

        let observed = vec![
            ObservedArtifact::new(
                "a.pdf",
                "http://localhost:5500/v1/a.pdf",
                RetrievalMethod::HtmlLink,
            ),
            ObservedArtifact::new(
                "a.pdf",
                "http://localhost:5500/v2/a.pdf",
                RetrievalMethod::DataAttribute,
            ),
        ];

        let summary = h.reconciler().run(observed).await.unwrap();
        assert_eq!(summary.new, 1);
        assert_eq!(h.fetcher.calls(), 1);

        let record = h.artifacts.snapshot()["a.pdf"].clone();
        assert_eq!(record.source_url, "http://localhost:5500/v2/a.pdf");
        assert_eq!(record.retrieval_method, RetrievalMethod::DataAttribute);
        assert_eq!(h.content.blob("a.pdf"), Some(b"second".to_vec()));
    }

    #[tokio::test]
    async fn test_fetch_failure_isolated_and_state_preserved() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"A");
        let b = h.serve("b.png", b"B");
        h.reconciler().run_at(vec![a.clone(), b.clone()], at(1)).await.unwrap();
        let before = h.artifacts.snapshot()["b.png"].clone();

        h.fetcher.set_status(&b.source_url, 500);
        h.serve("a.pdf", b"A2");

        let summary = h.reconciler().run_at(vec![a, b], at(2)).await.unwrap();
        assert_eq!(summary.changed, 1);
        assert_eq!(summary.removed, 0);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].identity, "b.png");
        assert!(summary.failures[0].reason.contains("500"));

        // Failed artifact is neither touched nor swept
        assert_eq!(h.artifacts.snapshot()["b.png"], before);
        assert_eq!(h.content.blob("b.png"), Some(b"B".to_vec()));
    }

    #[tokio::test]
    async fn test_new_rolls_back_blob_when_upsert_fails() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"A");
        let b = h.serve("b.png", b"B");
        h.artifacts.fail_upsert_for("a.pdf");

        let summary = h.reconciler().run(vec![a, b]).await.unwrap();
        assert_eq!(summary.new, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].identity, "a.pdf");

        assert!(h.content.blob("a.pdf").is_none());
        assert!(!h.artifacts.snapshot().contains_key("a.pdf"));
        assert_eq!(h.content.blob("b.png"), Some(b"B".to_vec()));
    }

    #[tokio::test]
    async fn test_changed_restores_blob_when_upsert_fails() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"v1");
        h.reconciler().run(vec![a.clone()]).await.unwrap();

        h.serve("a.pdf", b"v2");
        h.artifacts.fail_upsert_for("a.pdf");
        let summary = h.reconciler().run(vec![a]).await.unwrap();

        assert_eq!(summary.changed, 0);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(h.content.blob("a.pdf"), Some(b"v1".to_vec()));
        assert_eq!(
            h.artifacts.snapshot()["a.pdf"].fingerprint,
            Fingerprint::of(b"v1")
        );
    }

    #[tokio::test]
    async fn test_content_write_failure_leaves_no_record() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"A");
        h.content.fail_write_for("a.pdf");

        let summary = h.reconciler().run(vec![a]).await.unwrap();
        assert_eq!(summary.new, 0);
        assert_eq!(summary.failures.len(), 1);
        assert!(h.artifacts.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_missing_blob_is_healed() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"A");
        h.reconciler().run(vec![a.clone()]).await.unwrap();
        h.content.remove("a.pdf");

        let (tx, mut rx) = mpsc::channel(16);
        let summary = h.reconciler().with_events(tx).run(vec![a]).await.unwrap();

        assert_eq!(summary.changed, 1);
        assert_eq!(summary.unchanged, 0);
        assert_eq!(h.content.blob("a.pdf"), Some(b"A".to_vec()));

        let mut saw_inconsistency = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, ReconcileEvent::InconsistentState { ref identity } if identity == "a.pdf")
            {
                saw_inconsistency = true;
            }
        }
        assert!(saw_inconsistency);
    }

    #[tokio::test]
    async fn test_unreachable_store_is_fatal_before_mutation() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"A");
        h.artifacts.set_unreachable(true);

        let err = h.reconciler().run(vec![a]).await.unwrap_err();
        assert!(matches!(err, ReconcileError::FatalConfiguration { .. }));
        assert_eq!(h.fetcher.calls(), 0);
        assert_eq!(h.content.writes(), 0);
    }

    #[tokio::test]
    async fn test_unusable_content_root_is_fatal() {
        let h = Harness::new();
        h.content.set_unusable(true);

        let err = h.reconciler().run(Vec::new()).await.unwrap_err();
        assert!(matches!(err, ReconcileError::FatalConfiguration { .. }));
    }

    struct FailingSource;

    #[async_trait::async_trait]
    impl ArtifactSource for FailingSource {
        fn describe(&self) -> String {
            "failing".to_string()
        }

        async fn enumerate(&self) -> Result<Vec<ObservedArtifact>, crate::scrapers::SourceError> {
            Err(crate::scrapers::SourceError::Incomplete {
                url: "http://localhost:5500/?page=2".to_string(),
                reason: "page load timed out".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_enumeration_failure_never_removes() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"A");
        h.reconciler().run(vec![a]).await.unwrap();

        let err = h.reconciler().run_pass(&FailingSource).await.unwrap_err();
        assert!(matches!(err, ReconcileError::Enumeration { .. }));
        assert!(h.artifacts.snapshot().contains_key("a.pdf"));
        assert!(h.content.blob("a.pdf").is_some());
    }

    #[tokio::test]
    async fn test_sweep_list_failure_is_reported() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"A");
        h.artifacts.fail_list(true);

        let summary = h.reconciler().run(vec![a]).await.unwrap();
        assert_eq!(summary.new, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].identity, TARGET_WIDE_IDENTITY);
    }

    #[tokio::test]
    async fn test_removal_failure_is_isolated() {
        let h = Harness::new();
        let observed = vec![h.serve("a.pdf", b"A"), h.serve("b.png", b"B")];
        h.reconciler().run(observed).await.unwrap();
        h.artifacts.fail_delete_for("a.pdf");

        let summary = h.reconciler().run(Vec::new()).await.unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].identity, "a.pdf");
        assert!(!h.artifacts.snapshot().contains_key("b.png"));
    }

    #[tokio::test]
    async fn test_cancelled_pass_skips_sweep() {
        let h = Harness::new();
        let a = h.serve("a.pdf", b"A");
        h.reconciler().run(vec![a]).await.unwrap();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        cancel_tx.send(true).unwrap();

        let b = h.serve("b.png", b"B");
        let summary = h
            .reconciler()
            .with_cancel(cancel_rx)
            .run(vec![b])
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.new, 0);
        assert_eq!(summary.removed, 0);
        assert!(h.artifacts.snapshot().contains_key("a.pdf"));
    }

    /// Fetcher that fires the cancel signal once it has served `after` payloads.
    struct CancelAfter {
        inner: Arc<StaticFetcher>,
        cancel: watch::Sender<bool>,
        after: usize,
    }

    #[async_trait::async_trait]
    impl PayloadFetcher for CancelAfter {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, crate::scrapers::FetchError> {
            let body = self.inner.fetch(url).await;
            if self.inner.calls() >= self.after {
                let _ = self.cancel.send(true);
            }
            body
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_pass_keeps_committed_units() {
        let h = Harness::new();
        let old = h.serve("old.pdf", b"OLD");
        h.reconciler().run(vec![old]).await.unwrap();
        let calls_before = h.fetcher.calls();

        let observed: Vec<_> = (0..6)
            .map(|i| h.serve(&format!("file-{}.pdf", i), format!("body {}", i).as_bytes()))
            .collect();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let fetcher = Arc::new(CancelAfter {
            inner: h.fetcher.clone(),
            cancel: cancel_tx,
            after: calls_before + 2,
        });
        let summary = Reconciler::new(h.artifacts.clone(), h.content.clone(), fetcher)
            .with_workers(1)
            .with_cancel(cancel_rx)
            .run(observed)
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.new, 2);
        assert_eq!(summary.removed, 0);
        assert!(summary.failures.is_empty());

        let records = h.artifacts.snapshot();
        for committed in ["file-0.pdf", "file-1.pdf"] {
            assert!(records.contains_key(committed));
            assert!(h.content.blob(committed).is_some());
        }
        for skipped in ["file-2.pdf", "file-3.pdf", "file-4.pdf", "file-5.pdf"] {
            assert!(!records.contains_key(skipped));
            assert!(h.content.blob(skipped).is_none());
        }
        // Not observed this pass, but the sweep never ran.
        assert!(records.contains_key("old.pdf"));
        assert_eq!(h.content.blob("old.pdf").as_deref(), Some(&b"OLD"[..]));
    }

    #[tokio::test]
    async fn test_cancel_with_parallel_workers_leaves_no_partial_unit() {
        let h = Harness::new();
        let observed: Vec<_> = (0..20)
            .map(|i| h.serve(&format!("file-{:02}.pdf", i), format!("body {}", i).as_bytes()))
            .collect();

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let fetcher = Arc::new(CancelAfter {
            inner: h.fetcher.clone(),
            cancel: cancel_tx,
            after: 5,
        });
        let summary = Reconciler::new(h.artifacts.clone(), h.content.clone(), fetcher)
            .with_workers(3)
            .with_cancel(cancel_rx)
            .run(observed.clone())
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert!(summary.new >= 5 && summary.new < 20);

        let records = h.artifacts.snapshot();
        assert_eq!(records.len(), summary.new);
        for artifact in &observed {
            let record = records.get(&artifact.identity);
            let blob = h.content.blob(&artifact.identity);
            match (record, blob) {
                (Some(record), Some(bytes)) => {
                    assert_eq!(record.fingerprint, Fingerprint::of(&bytes))
                }
                (None, None) => {}
                _ => panic!("{} is half-applied", artifact.identity),
            }
        }
    }

    #[tokio::test]
    async fn test_many_artifacts_with_bounded_workers() {
        let h = Harness::new();
        let observed: Vec<_> = (0..25)
            .map(|i| h.serve(&format!("file-{:02}.pdf", i), format!("body {}", i).as_bytes()))
            .collect();

        let summary = h
            .reconciler()
            .with_workers(3)
            .run(observed)
            .await
            .unwrap();
        assert_eq!(summary.new, 25);
        assert_eq!(h.artifacts.snapshot().len(), 25);
    }

    #[tokio::test]
    async fn test_run_pass_with_source() {
        use crate::scrapers::config::HtmlLinksConfig;
        use crate::scrapers::HtmlLinksSource;

        let h = Harness::new();
        h.fetcher.set_page(
            "http://localhost:5500/",
            r#"<a href="a.pdf">a</a><a href="b.png">b</a>"#,
        );
        h.serve("a.pdf", b"A");
        h.serve("b.png", b"B");

        let base = url::Url::parse("http://localhost:5500/").unwrap();
        let source =
            HtmlLinksSource::new(h.fetcher.clone(), &base, &HtmlLinksConfig::default()).unwrap();

        let summary = h.reconciler().run_pass(&source).await.unwrap();
        assert_eq!(summary.new, 2);
    }
}
