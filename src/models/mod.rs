//! Data models for sitemirror.

mod artifact;
mod fingerprint;
mod summary;

pub use artifact::{identity_from_url, ArtifactRecord, ObservedArtifact, RetrievalMethod};
pub use fingerprint::{Fingerprint, FINGERPRINT_LEN};
pub use summary::{ArtifactFailure, Classification, PassSummary};
