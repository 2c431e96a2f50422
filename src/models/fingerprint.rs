//! Content fingerprints.
//!
//! A fingerprint is the SHA-256 digest of an artifact's bytes, hex encoded.
//! Fingerprint equality is the only signal used to decide whether a remote
//! artifact changed between passes.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 64;

/// SHA-256 fingerprint of an artifact payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a payload.
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap a fingerprint read back from storage.
    ///
    /// No validation is performed: a malformed stored value simply never
    /// equals a freshly computed fingerprint, so the artifact is rewritten.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Hex representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }

    /// Whether this looks like a SHA-256 hex digest.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == FINGERPRINT_LEN && self.0.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
