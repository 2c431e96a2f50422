//! The artifact store contract used by the reconciler.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ArtifactRecord;

/// Boxed underlying cause of a store failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failed artifact store operation.
///
/// `identity` is empty for operations that span the whole target.
#[derive(Debug, Error)]
#[error("artifact store error{}: {cause}", identity_suffix(.identity))]
pub struct StoreError {
    pub identity: String,
    #[source]
    pub cause: BoxError,
}

impl StoreError {
    pub fn new(identity: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            identity: identity.into(),
            cause: cause.into(),
        }
    }

    /// Error for an operation not tied to one artifact.
    pub fn target_wide(cause: impl Into<BoxError>) -> Self {
        Self::new(String::new(), cause)
    }
}

fn identity_suffix(identity: &str) -> String {
    if identity.is_empty() {
        String::new()
    } else {
        format!(" for '{}'", identity)
    }
}

/// Persistent record of known artifacts for one crawl target.
///
/// Implementations are scoped to a single target; every identity argument is
/// matched exactly (case-sensitive) within that target.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Crawl target this store is scoped to.
    fn crawl_target(&self) -> &str;

    /// Verify the store is reachable and its schema is present.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get(&self, identity: &str) -> Result<Option<ArtifactRecord>, StoreError>;

    /// All records of the target, in no particular order.
    async fn list_all(&self) -> Result<Vec<ArtifactRecord>, StoreError>;

    /// Insert the record, or replace fingerprint, source URL, retrieval
    /// method and `last_seen_at` of an existing one. `first_seen_at` of an
    /// existing record is never changed.
    async fn upsert(&self, record: &ArtifactRecord) -> Result<(), StoreError>;

    /// Remove a record. Removing an absent identity is not an error.
    async fn delete(&self, identity: &str) -> Result<(), StoreError>;
}
