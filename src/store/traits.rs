use crate::logic::DesignAtVersionQuery;
use crate::model::{
    Design, DesignAction, DesignAtVersion, DesignFilter, DesignId, Issue, IssueId, Version,
    VersionId,
};
use anyhow::Result;

/// Every store is read-only from the engine's point of view.
#[async_trait::async_trait]
pub trait IssueStore: Send + Sync {
    async fn find_issue(&self, id: IssueId) -> Result<Option<Issue>>;
}

#[async_trait::async_trait]
pub trait DesignStore: Send + Sync {
    async fn find_design(&self, issue_id: IssueId, id: DesignId) -> Result<Option<Design>>;
    async fn find_design_by_filename(
        &self,
        issue_id: IssueId,
        filename: &str,
    ) -> Result<Option<Design>>;
    /// All designs of an issue, ordered by id
    async fn designs_for_issue(&self, issue_id: IssueId) -> Result<Vec<Design>>;
    /// Designs matching any of the `(issue_id, filename)` references, in one query
    async fn find_designs_by_reference(
        &self,
        references: &[(IssueId, String)],
    ) -> Result<Vec<Design>>;
}

#[async_trait::async_trait]
pub trait VersionStore: Send + Sync {
    async fn find_version(&self, id: VersionId) -> Result<Option<Version>>;
    /// Versions of an issue, newest first
    async fn versions_for_issue(&self, issue_id: IssueId) -> Result<Vec<Version>>;
    async fn find_version_by_sha(&self, issue_id: IssueId, sha: &str) -> Result<Option<Version>>;
    /// Actions recorded by one version, ordered by design id
    async fn actions_for_version(&self, version_id: VersionId) -> Result<Vec<DesignAction>>;
}

/// Executes design-at-version join queries. Each call is one round trip.
#[async_trait::async_trait]
pub trait DesignAtVersionStore: Send + Sync {
    async fn count_design_at_versions(&self, query: &DesignAtVersionQuery) -> Result<i64>;
    async fn load_design_at_versions(
        &self,
        query: &DesignAtVersionQuery,
    ) -> Result<Vec<DesignAtVersion>>;
}

/// Which designs existed, and were not deleted, as of a version
#[async_trait::async_trait]
pub trait VersionSnapshotStore: Send + Sync {
    /// Visible designs of the version's issue, ordered by id, in one query
    async fn visible_designs(&self, version: &Version, filter: &DesignFilter)
        -> Result<Vec<Design>>;
    /// Designs the version created, modified or deleted, ordered by id
    async fn designs_changed_in(&self, version: &Version) -> Result<Vec<Design>>;
}

pub trait Store:
    IssueStore + DesignStore + VersionStore + DesignAtVersionStore + VersionSnapshotStore + Send + Sync
{
}

impl<T> Store for T where
    T: IssueStore + DesignStore + VersionStore + DesignAtVersionStore + VersionSnapshotStore + Send + Sync
{
}
