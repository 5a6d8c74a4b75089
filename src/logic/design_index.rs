use std::collections::HashMap;

use anyhow::Result;
use itertools::Itertools;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::{index_by_key, Design, IssueId, ProjectId};
use crate::store::DesignStore;

/// Points at a design by the issue it belongs to and its filename
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DesignReference {
    pub issue_id: IssueId,
    pub filename: String,
}

impl DesignReference {
    pub fn new(issue_id: IssueId, filename: impl Into<String>) -> Self {
        Self {
            issue_id,
            filename: filename.into(),
        }
    }
}

type IndexKey = (ProjectId, IssueId, String);

/// Designs found for a set of references, keyed by
/// `(project_id, issue_id, filename)` and by `(issue_id, filename)`
#[derive(Debug, Clone, Default)]
pub struct DesignIndex {
    designs: HashMap<IndexKey, Design>,
    by_reference: HashMap<DesignReference, IndexKey>,
}

impl DesignIndex {
    pub fn new(designs: impl IntoIterator<Item = Design>) -> Self {
        let designs = index_by_key(designs, |d| {
            (d.project_id, d.issue_id, d.filename.clone())
        });
        let by_reference = index_by_key(designs.keys().cloned(), |key: &IndexKey| {
            DesignReference::new(key.1, key.2.clone())
        });

        Self {
            designs,
            by_reference,
        }
    }

    /// Fetch every referenced design in one query. References that match
    /// nothing are simply absent from the index.
    pub async fn resolve<S>(store: &S, references: &[DesignReference]) -> Result<Self>
    where
        S: DesignStore + ?Sized,
    {
        let wanted: Vec<(IssueId, String)> = references
            .iter()
            .map(|r| (r.issue_id, r.filename.clone()))
            .sorted()
            .dedup()
            .collect();

        let designs = store.find_designs_by_reference(&wanted).await?;
        debug!(
            "Resolved {} of {} design references",
            designs.len(),
            wanted.len()
        );
        Ok(Self::new(designs))
    }

    pub fn get(&self, project_id: ProjectId, issue_id: IssueId, filename: &str) -> Option<&Design> {
        self.designs
            .get(&(project_id, issue_id, filename.to_string()))
    }

    /// Look up a design by issue and filename
    pub fn find(&self, reference: &DesignReference) -> Option<&Design> {
        self.by_reference
            .get(reference)
            .and_then(|key| self.designs.get(key))
    }

    pub fn len(&self) -> usize {
        self.designs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.designs.is_empty()
    }
}
