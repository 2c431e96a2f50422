//! Classification outcomes and the per-pass summary.

use serde::{Deserialize, Serialize};

/// Outcome of reconciling one artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    New,
    Changed,
    Unchanged,
    Removed,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
            Self::Removed => "removed",
        }
    }
}

/// An artifact the pass could not reconcile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFailure {
    pub identity: String,
    pub reason: String,
}

/// Counts and failures for one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub new: usize,
    pub changed: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub failures: Vec<ArtifactFailure>,
    /// Set when the pass stopped early; the removal sweep did not run.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl PassSummary {
    pub fn record(&mut self, classification: Classification) {
        match classification {
            Classification::New => self.new += 1,
            Classification::Changed => self.changed += 1,
            Classification::Unchanged => self.unchanged += 1,
            Classification::Removed => self.removed += 1,
        }
    }

    pub fn fail(&mut self, identity: impl Into<String>, reason: impl ToString) {
        self.failures.push(ArtifactFailure {
            identity: identity.into(),
            reason: reason.to_string(),
        });
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }

    /// Number of artifacts that ended the pass with a record.
    pub fn processed(&self) -> usize {
        self.new + self.changed + self.unchanged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts() {
        let mut summary = PassSummary::default();
        summary.record(Classification::New);
        summary.record(Classification::New);
        summary.record(Classification::Unchanged);
        summary.record(Classification::Removed);

        assert_eq!(summary.new, 2);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.processed(), 3);
        assert!(summary.is_success());
    }

    #[test]
    fn test_summary_json_shape() {
        let mut summary = PassSummary::default();
        summary.record(Classification::Changed);
        summary.fail("b.png", "HTTP 500 for http://x/b.png");

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["changed"], 1);
        assert_eq!(json["failures"][0]["identity"], "b.png");
        assert!(json.get("cancelled").is_none());
        assert!(!summary.is_success());

        summary.cancelled = true;
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["cancelled"], true);
    }
}
