//! Consistency audit between the artifact store and the content store.

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::Fingerprint;
use crate::repository::{ArtifactStore, StoreError};
use crate::storage::{ContentError, ContentStore};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Content(#[from] ContentError),
}

/// Outcome of an audit.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct AuditReport {
    pub crawl_target: String,
    pub records: usize,
    pub blobs: usize,
    /// Records whose blob is missing. The next pass heals them.
    pub missing_blobs: Vec<String>,
    /// Blobs with no record.
    pub orphan_blobs: Vec<String>,
    /// Records whose blob no longer hashes to the stored fingerprint.
    pub fingerprint_mismatches: Vec<String>,
    /// Orphan blobs deleted by `prune_orphans`.
    pub pruned: Vec<String>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.missing_blobs.is_empty()
            && self.orphan_blobs.is_empty()
            && self.fingerprint_mismatches.is_empty()
    }
}

/// Compare records against blobs. With `verify`, every blob is read back and
/// hashed.
pub async fn audit(
    artifacts: &dyn ArtifactStore,
    content: &dyn ContentStore,
    verify: bool,
) -> Result<AuditReport, AuditError> {
    let records = artifacts.list_all().await?;
    let blobs = content.list().await?;

    let blob_set: HashSet<&str> = blobs.iter().map(String::as_str).collect();
    let record_set: HashSet<&str> = records.iter().map(|r| r.identity.as_str()).collect();

    let mut report = AuditReport {
        crawl_target: artifacts.crawl_target().to_string(),
        records: records.len(),
        blobs: blobs.len(),
        ..Default::default()
    };

    for record in &records {
        if !blob_set.contains(record.identity.as_str()) {
            report.missing_blobs.push(record.identity.clone());
            continue;
        }
        if verify {
            match content.read(&record.identity).await? {
                Some(bytes) if Fingerprint::of(&bytes) == record.fingerprint => {}
                Some(_) => report.fingerprint_mismatches.push(record.identity.clone()),
                None => report.missing_blobs.push(record.identity.clone()),
            }
        }
    }

    report.orphan_blobs = blobs
        .iter()
        .filter(|b| !record_set.contains(b.as_str()))
        .cloned()
        .collect();

    report.missing_blobs.sort();
    report.orphan_blobs.sort();
    report.fingerprint_mismatches.sort();

    if !report.is_clean() {
        warn!(
            target_name = %report.crawl_target,
            missing = report.missing_blobs.len(),
            orphans = report.orphan_blobs.len(),
            mismatched = report.fingerprint_mismatches.len(),
            "Mirror is inconsistent"
        );
    }
    Ok(report)
}

/// Delete the orphan blobs listed in `report`.
pub async fn prune_orphans(
    content: &dyn ContentStore,
    report: &mut AuditReport,
) -> Result<usize, AuditError> {
    for identity in &report.orphan_blobs {
        content.delete(identity).await?;
        info!(target_name = %report.crawl_target, identity = %identity, "Pruned orphan blob");
        report.pruned.push(identity.clone());
    }
    Ok(report.pruned.len())
}
