//! Error types for design-at-version resolution.

use std::sync::Arc;

use thiserror::Error;

use crate::model::{DesignId, IssueId, VersionId};

/// Errors surfaced to callers of the resolver.
///
/// Absence of data is never an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The identity string is not of the form `<integer>.<integer>`.
    #[error("malformed design-at-version identity {identity:?}: {reason}")]
    MalformedIdentity { identity: String, reason: String },

    /// A design and version from different issues were combined explicitly.
    #[error(
        "design {design_id} (issue {design_issue_id}) and version {version_id} \
         (issue {version_issue_id}) belong to different issues"
    )]
    InconsistentPair {
        design_id: DesignId,
        design_issue_id: IssueId,
        version_id: VersionId,
        version_issue_id: IssueId,
    },

    /// The caller passed an unusable combination of arguments.
    #[error("{0}")]
    Argument(String),

    /// The backing store failed; passed through untouched.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ResolveError {
    pub fn malformed(identity: &str, reason: impl Into<String>) -> Self {
        ResolveError::MalformedIdentity {
            identity: identity.to_string(),
            reason: reason.into(),
        }
    }
}

/// Outcome of a batched lookup that could not be fulfilled.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The single fetch for the batch failed; every waiter in it sees this.
    #[error("batch fetch failed: {0}")]
    Fetch(Arc<anyhow::Error>),

    /// The batch was dropped before it resolved this lookup.
    #[error("batch was cancelled before the lookup resolved")]
    Cancelled,
}

pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
