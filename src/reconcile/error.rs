//! Reconciliation errors.

use thiserror::Error;

use crate::repository::{BoxError, StoreError};
use crate::scrapers::{FetchError, SourceError};
use crate::storage::ContentError;

/// A pass that could not run at all. No state was mutated.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A store is unreachable or unusable.
    #[error("fatal configuration error for target '{target}': {cause}")]
    FatalConfiguration {
        target: String,
        #[source]
        cause: BoxError,
    },

    /// The source could not produce a complete enumeration.
    #[error("enumeration of target '{target}' failed: {source}")]
    Enumeration {
        target: String,
        #[source]
        source: SourceError,
    },
}

impl ReconcileError {
    pub fn fatal(target: &str, cause: impl Into<BoxError>) -> Self {
        Self::FatalConfiguration {
            target: target.to_string(),
            cause: cause.into(),
        }
    }
}

/// Why one artifact could not be reconciled. The pass continues.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Content(#[from] ContentError),
}
