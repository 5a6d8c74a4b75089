//! In-memory store for tests and fixtures.
//!
//! Answers every read trait the engine uses. Each trait call counts as one
//! query, so callers can assert how many round trips an operation needed.
//! Fixture methods (`insert_issue`, `insert_design`, `commit_version`) are
//! the only writes and are not part of any store trait.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use chrono::Utc;
use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::logic::{snapshot, DesignAtVersionQuery};
use crate::model::{
    Design, DesignAction, DesignAtVersion, DesignEvent, DesignFilter, DesignId, Issue, IssueId,
    ProjectId, Version, VersionId,
};
use crate::store::traits::{
    DesignAtVersionStore, DesignStore, IssueStore, VersionSnapshotStore, VersionStore,
};

#[derive(Debug, Default)]
struct Tables {
    issues: BTreeMap<IssueId, Issue>,
    designs: BTreeMap<DesignId, Design>,
    versions: BTreeMap<VersionId, Version>,
    actions: Vec<DesignAction>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    next_id: AtomicI64,
    queries: AtomicUsize,
    /// Error message returned by the next query instead of a result
    fail_next: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Round trips made so far
    pub fn queries_executed(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Make the next query fail, as a dropped connection or timeout would
    pub fn fail_next_query(&self, message: impl Into<String>) {
        *self.fail_next.lock() = Some(message.into());
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Count one round trip, or fail it if a failure was injected
    fn begin_query(&self, kind: &str) -> Result<()> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_next.lock().take() {
            return Err(anyhow!("{}", message));
        }
        debug!("memory store query: {}", kind);
        Ok(())
    }

    pub fn insert_issue(&self, project_id: ProjectId, title: &str) -> Issue {
        let mut tables = self.tables.write();
        let id = self.next_id();
        let iid = tables
            .issues
            .values()
            .filter(|i| i.project_id == project_id)
            .count() as i64
            + 1;
        let issue = Issue {
            id,
            project_id,
            iid,
            title: title.to_string(),
        };
        tables.issues.insert(id, issue.clone());
        issue
    }

    /// Add a design record; it stays invisible until a version acts on it
    pub fn insert_design(&self, issue: &Issue, filename: &str) -> Design {
        let design = Design {
            id: self.next_id(),
            project_id: issue.project_id,
            issue_id: issue.id,
            filename: filename.to_string(),
        };
        self.tables.write().designs.insert(design.id, design.clone());
        design
    }

    /// Record a new version of the issue with the given design actions
    pub fn commit_version(
        &self,
        issue: &Issue,
        events: impl IntoIterator<Item = (DesignId, DesignEvent)>,
    ) -> Version {
        let id = self.next_id();
        let actions: Vec<DesignAction> = events
            .into_iter()
            .map(|(design_id, event)| DesignAction::new(design_id, id, event))
            .collect();

        let mut tables = self.tables.write();
        let parent_sha = tables
            .versions
            .values()
            .rev()
            .find(|v| v.issue_id == issue.id)
            .map(|v| v.sha.clone());
        let version = Version {
            id,
            issue_id: issue.id,
            sha: Version::compute_sha(issue.id, parent_sha.as_deref(), &actions),
            author_id: None,
            created_at: Utc::now(),
        };
        tables.versions.insert(id, version.clone());
        tables.actions.extend(actions);
        version
    }
}

#[async_trait::async_trait]
impl IssueStore for MemoryStore {
    async fn find_issue(&self, id: IssueId) -> Result<Option<Issue>> {
        self.begin_query("find_issue")?;
        Ok(self.tables.read().issues.get(&id).cloned())
    }
}

#[async_trait::async_trait]
impl DesignStore for MemoryStore {
    async fn find_design(&self, issue_id: IssueId, id: DesignId) -> Result<Option<Design>> {
        self.begin_query("find_design")?;
        Ok(self
            .tables
            .read()
            .designs
            .get(&id)
            .filter(|d| d.issue_id == issue_id)
            .cloned())
    }

    async fn find_design_by_filename(
        &self,
        issue_id: IssueId,
        filename: &str,
    ) -> Result<Option<Design>> {
        self.begin_query("find_design_by_filename")?;
        Ok(self
            .tables
            .read()
            .designs
            .values()
            .find(|d| d.issue_id == issue_id && d.filename == filename)
            .cloned())
    }

    async fn designs_for_issue(&self, issue_id: IssueId) -> Result<Vec<Design>> {
        self.begin_query("designs_for_issue")?;
        Ok(self
            .tables
            .read()
            .designs
            .values()
            .filter(|d| d.issue_id == issue_id)
            .cloned()
            .collect())
    }

    async fn find_designs_by_reference(
        &self,
        references: &[(IssueId, String)],
    ) -> Result<Vec<Design>> {
        if references.is_empty() {
            return Ok(Vec::new());
        }
        self.begin_query("find_designs_by_reference")?;
        Ok(self
            .tables
            .read()
            .designs
            .values()
            .filter(|d| {
                references
                    .iter()
                    .any(|(issue_id, filename)| d.issue_id == *issue_id && &d.filename == filename)
            })
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl VersionStore for MemoryStore {
    async fn find_version(&self, id: VersionId) -> Result<Option<Version>> {
        self.begin_query("find_version")?;
        Ok(self.tables.read().versions.get(&id).cloned())
    }

    async fn versions_for_issue(&self, issue_id: IssueId) -> Result<Vec<Version>> {
        self.begin_query("versions_for_issue")?;
        Ok(self
            .tables
            .read()
            .versions
            .values()
            .rev()
            .filter(|v| v.issue_id == issue_id)
            .cloned()
            .collect())
    }

    async fn find_version_by_sha(&self, issue_id: IssueId, sha: &str) -> Result<Option<Version>> {
        self.begin_query("find_version_by_sha")?;
        Ok(self
            .tables
            .read()
            .versions
            .values()
            .find(|v| v.issue_id == issue_id && v.sha == sha)
            .cloned())
    }

    async fn actions_for_version(&self, version_id: VersionId) -> Result<Vec<DesignAction>> {
        self.begin_query("actions_for_version")?;
        let mut actions: Vec<DesignAction> = self
            .tables
            .read()
            .actions
            .iter()
            .filter(|a| a.version_id == version_id)
            .copied()
            .collect();
        actions.sort_by_key(|a| a.design_id);
        Ok(actions)
    }
}

#[async_trait::async_trait]
impl DesignAtVersionStore for MemoryStore {
    async fn count_design_at_versions(&self, query: &DesignAtVersionQuery) -> Result<i64> {
        self.begin_query("count_design_at_versions")?;
        let tables = self.tables.read();
        let count = tables
            .designs
            .values()
            .flat_map(|d| tables.versions.values().map(move |v| (d, v)))
            .filter(|(d, v)| query.accepts(d, v))
            .count();
        Ok(count as i64)
    }

    async fn load_design_at_versions(
        &self,
        query: &DesignAtVersionQuery,
    ) -> Result<Vec<DesignAtVersion>> {
        self.begin_query("load_design_at_versions")?;
        let tables = self.tables.read();
        Ok(tables
            .designs
            .values()
            .flat_map(|d| tables.versions.values().map(move |v| (d, v)))
            .filter(|(d, v)| query.accepts(d, v))
            .map(|(d, v)| DesignAtVersion::new_unchecked(d.clone(), v.clone()))
            .collect())
    }
}

#[async_trait::async_trait]
impl VersionSnapshotStore for MemoryStore {
    async fn visible_designs(
        &self,
        version: &Version,
        filter: &DesignFilter,
    ) -> Result<Vec<Design>> {
        self.begin_query("visible_designs")?;
        let tables = self.tables.read();
        Ok(snapshot::materialize(
            version,
            tables.designs.values(),
            &tables.actions,
            filter,
        ))
    }

    async fn designs_changed_in(&self, version: &Version) -> Result<Vec<Design>> {
        self.begin_query("designs_changed_in")?;
        let tables = self.tables.read();
        Ok(tables
            .designs
            .values()
            .filter(|d| d.issue_id == version.issue_id)
            .filter(|d| {
                tables
                    .actions
                    .iter()
                    .any(|a| a.version_id == version.id && a.design_id == d.id)
            })
            .cloned()
            .collect())
    }
}
