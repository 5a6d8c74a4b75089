use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{DesignAction, IssueId, UserId, VersionId};

/// An immutable snapshot point on an issue's design timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub issue_id: IssueId,
    /// SHA-256 of the version content
    pub sha: String,
    pub author_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Version {
    /// Content hash of a version: the issue, the sha of the version before
    /// it, and its actions in design order
    pub fn compute_sha(
        issue_id: IssueId,
        parent_sha: Option<&str>,
        actions: &[DesignAction],
    ) -> String {
        use sha2::{Digest, Sha256};

        let mut sorted: Vec<(i64, i16)> = actions
            .iter()
            .map(|a| (a.design_id, a.event.as_i16()))
            .collect();
        sorted.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(format!("issue:{}\n", issue_id));
        if let Some(parent) = parent_sha {
            hasher.update(format!("parent:{}\n", parent));
        }
        for (design_id, event) in sorted {
            hasher.update(format!("action:{}:{}\n", design_id, event));
        }
        hex::encode(hasher.finalize())
    }

    /// Versions are ordered by creation, which is the order of their ids
    pub fn is_at_or_before(&self, other: &Version) -> bool {
        self.id <= other.id
    }
}
