use serde::{Deserialize, Serialize};

/// Backend-agnostic history record.
///
/// Produced only by history reads; this crate never persists it. `branch` and
/// `tag` are empty when the backend has no such concept or the revision is not
/// tagged, and `diff` is the unified diff against the previous revision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub branch: String,
    pub commit: String,
    pub author: String,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    pub message: String,
    pub tag: String,
    pub diff: String,
}

impl CommitInfo {
    /// Whether this record represents a tagged revision
    pub fn is_tagged(&self) -> bool {
        !self.tag.is_empty()
    }
}
