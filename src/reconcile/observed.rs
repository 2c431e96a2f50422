//! Collapsing an observation sequence into a set keyed by identity.

use std::collections::HashMap;

use crate::models::ObservedArtifact;

/// Observed artifacts with duplicate identities collapsed.
///
/// When an identity appears more than once, the last occurrence supplies the
/// URL and retrieval method, while the artifact keeps the position of its
/// first occurrence so dispatch order follows discovery order.
#[derive(Debug, Default, Clone)]
pub struct ObservedSet {
    entries: Vec<ObservedArtifact>,
    index: HashMap<String, usize>,
    duplicates: usize,
}

impl ObservedSet {
    pub fn collapse(observed: impl IntoIterator<Item = ObservedArtifact>) -> Self {
        let mut set = Self::default();
        for artifact in observed {
            match set.index.get(&artifact.identity) {
                Some(&pos) => {
                    set.entries[pos] = artifact;
                    set.duplicates += 1;
                }
                None => {
                    set.index
                        .insert(artifact.identity.clone(), set.entries.len());
                    set.entries.push(artifact);
                }
            }
        }
        set
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.index.contains_key(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ObservedArtifact> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of observations dropped as duplicates.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}
