use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use crate::error::ResolveResult;
use crate::logic::{DesignAtVersionLoader, DesignAtVersionQuery, VersionEventCache};
use crate::model::{
    AtVersionKey, AtVersionLookup, Design, DesignAtVersion, DesignAtVersionId, DesignEvent,
    DesignFilter, DesignKey, DesignLookup, IssueId, Version,
};
use crate::store::Store;

/// Entry point for turning identities, designs and versions into
/// design-at-version records.
///
/// Every lookup costs at most one store query. Absence is `Ok(None)`;
/// errors are reserved for bad arguments and store failures.
pub struct DesignAtVersionResolver<S: Store + ?Sized> {
    store: Arc<S>,
}

impl<S: Store + ?Sized> Clone for DesignAtVersionResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> DesignAtVersionResolver<S>
where
    S: Store + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every same-issue (design, version) pair; narrow it with `for_ids` or `for_issue`
    pub fn find_all(&self) -> DesignAtVersionQuery {
        DesignAtVersionQuery::new()
    }

    /// A loader that batches lookups made during one unit of work
    pub fn loader(&self) -> DesignAtVersionLoader<S> {
        DesignAtVersionLoader::new(self.store.clone())
    }

    pub async fn find_by_identity(&self, identity: &str) -> ResolveResult<Option<DesignAtVersion>> {
        let id = match DesignAtVersionId::decode(identity) {
            Ok(id) => id,
            Err(e) => {
                debug!("Identity lookup not found: {}", e);
                return Ok(None);
            }
        };
        self.fetch_one(DesignAtVersionQuery::new().for_ids([id]))
            .await
    }

    /// Like `find_by_identity`, but only designs of `issue_id` are found
    pub async fn find_by_identity_in_issue(
        &self,
        issue_id: IssueId,
        identity: &str,
    ) -> ResolveResult<Option<DesignAtVersion>> {
        let Ok(id) = DesignAtVersionId::decode(identity) else {
            return Ok(None);
        };
        self.fetch_one(DesignAtVersionQuery::new().for_ids([id]).for_issue(issue_id))
            .await
    }

    /// Resolve many identities with one query. Results follow input order;
    /// malformed or unmatched identities are `None`.
    pub async fn find_by_identities<T: AsRef<str>>(
        &self,
        identities: &[T],
    ) -> ResolveResult<Vec<Option<DesignAtVersion>>> {
        let decoded: Vec<Option<DesignAtVersionId>> = identities
            .iter()
            .map(|identity| DesignAtVersionId::decode(identity.as_ref()).ok())
            .collect();

        let records = DesignAtVersionQuery::new()
            .for_ids(decoded.iter().flatten().copied())
            .to_records(&*self.store)
            .await?;
        let found: HashMap<DesignAtVersionId, DesignAtVersion> =
            records.into_iter().map(|dav| (dav.id, dav)).collect();

        debug!(
            "Resolved {} of {} identities",
            found.len(),
            identities.len()
        );

        Ok(decoded
            .into_iter()
            .map(|id| id.and_then(|id| found.get(&id).cloned()))
            .collect())
    }

    /// Pair a design and version already in hand. No query is made; a pair
    /// from different issues is an `InconsistentPair` error.
    pub fn find_by_design_and_version(
        &self,
        design: Design,
        version: Version,
    ) -> ResolveResult<DesignAtVersion> {
        DesignAtVersion::new(design, version)
    }

    /// A cache of version actions for one unit of work
    pub fn event_cache(&self) -> VersionEventCache<S> {
        VersionEventCache::new(self.store.clone())
    }

    /// What the pinned version did to the design; `None` when it left the
    /// design untouched
    pub async fn event_at_version(
        &self,
        design_at_version: &DesignAtVersion,
    ) -> ResolveResult<Option<DesignEvent>> {
        let actions = self
            .store
            .actions_for_version(design_at_version.version.id)
            .await?;
        Ok(actions
            .into_iter()
            .find(|a| a.design_id == design_at_version.design.id)
            .map(|a| a.event))
    }

    /// Designs created, modified or deleted by `version`, ordered by id
    pub async fn designs_changed_in(&self, version: &Version) -> ResolveResult<Vec<Design>> {
        Ok(self.store.designs_changed_in(version).await?)
    }

    /// Designs visible at `version`, ordered by design id, in one query
    pub async fn find_all_for_version(
        &self,
        version: &Version,
        filter: &DesignFilter,
    ) -> ResolveResult<Vec<DesignAtVersion>> {
        let designs = self.store.visible_designs(version, filter).await?;
        debug!(
            "Version {} of issue {} has {} visible designs",
            version.id,
            version.issue_id,
            designs.len()
        );

        Ok(designs
            .into_iter()
            .map(|design| DesignAtVersion::new_unchecked(design, version.clone()))
            .collect())
    }

    /// One design pinned to `version`, by identity, design id or filename.
    ///
    /// An identity only matches when it names this version and a design of
    /// its issue. Design id and filename go through the snapshot, so deleted
    /// or not yet created designs are not found.
    pub async fn find_one_for_version(
        &self,
        version: &Version,
        lookup: &AtVersionLookup,
    ) -> ResolveResult<Option<DesignAtVersion>> {
        match lookup.key()? {
            AtVersionKey::Identity(identity) => {
                let Ok(id) = DesignAtVersionId::decode(identity) else {
                    return Ok(None);
                };
                if id.version_id != version.id {
                    return Ok(None);
                }
                self.fetch_one(
                    DesignAtVersionQuery::new()
                        .for_ids([id])
                        .for_issue(version.issue_id),
                )
                .await
            }
            AtVersionKey::Design(key) => {
                let filter = match key {
                    DesignKey::Id(id) => DesignFilter::by_ids([id]),
                    DesignKey::Filename(filename) => DesignFilter::by_filenames([filename]),
                };
                Ok(self
                    .find_all_for_version(version, &filter)
                    .await?
                    .into_iter()
                    .next())
            }
        }
    }

    /// One design of an issue, by id or filename
    pub async fn find_design(
        &self,
        issue_id: IssueId,
        lookup: &DesignLookup,
    ) -> ResolveResult<Option<Design>> {
        let design = match lookup.key()? {
            DesignKey::Id(id) => self.store.find_design(issue_id, id).await?,
            DesignKey::Filename(filename) => {
                self.store
                    .find_design_by_filename(issue_id, filename)
                    .await?
            }
        };
        Ok(design)
    }

    /// Versions of an issue, newest first, optionally only those at or
    /// before `earlier_or_equal_to`
    pub async fn versions_for_issue(
        &self,
        issue_id: IssueId,
        earlier_or_equal_to: Option<&Version>,
    ) -> ResolveResult<Vec<Version>> {
        let versions = self.store.versions_for_issue(issue_id).await?;
        Ok(match earlier_or_equal_to {
            Some(limit) => versions
                .into_iter()
                .filter(|v| v.is_at_or_before(limit))
                .collect(),
            None => versions,
        })
    }

    pub async fn find_version_by_sha(
        &self,
        issue_id: IssueId,
        sha: &str,
    ) -> ResolveResult<Option<Version>> {
        Ok(self.store.find_version_by_sha(issue_id, sha).await?)
    }

    async fn fetch_one(
        &self,
        query: DesignAtVersionQuery,
    ) -> ResolveResult<Option<DesignAtVersion>> {
        Ok(query.to_records(&*self.store).await?.into_iter().next())
    }
}
