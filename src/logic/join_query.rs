use std::collections::{HashMap, HashSet};

use anyhow::Result;
use itertools::Itertools;

use crate::model::{Design, DesignAtVersion, DesignAtVersionId, IssueId, Version};
use crate::store::DesignAtVersionStore;

pub const DESIGNS_TABLE: &str = "design_management_designs";
pub const VERSIONS_TABLE: &str = "design_management_versions";
pub const PAIRS_TABLE: &str = "pairs";

/// Design columns, in projection order. `id` comes first: it marks where
/// the design half of a joined row starts.
pub const DESIGN_COLUMNS: [&str; 4] = ["id", "project_id", "issue_id", "filename"];
pub const VERSION_COLUMNS: [&str; 5] = ["id", "issue_id", "sha", "author_id", "created_at"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Count,
    Records,
}

/// Description of one query joining designs to versions of the same issue.
///
/// Cheap to build and re-executable: `count`, `is_empty` and `to_records`
/// each run at most one query and nothing is cached between calls.
///
/// Without `for_ids` this is every same-issue (design, version) pair. With
/// it, the requested pairs are joined in as an inline `VALUES` relation, so
/// pairs from different issues simply produce no row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesignAtVersionQuery {
    ids: Option<Vec<DesignAtVersionId>>,
    issue_id: Option<IssueId>,
}

impl DesignAtVersionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given pairs. Applying this twice keeps the intersection.
    pub fn for_ids(mut self, ids: impl IntoIterator<Item = DesignAtVersionId>) -> Self {
        let requested: Vec<DesignAtVersionId> = ids.into_iter().sorted().dedup().collect();

        self.ids = Some(match self.ids.take() {
            Some(existing) => {
                let keep: HashSet<DesignAtVersionId> = requested.into_iter().collect();
                existing.into_iter().filter(|id| keep.contains(id)).collect()
            }
            None => requested,
        });
        self
    }

    pub fn for_issue(mut self, issue_id: IssueId) -> Self {
        self.issue_id = Some(issue_id);
        self
    }

    pub fn requested_ids(&self) -> Option<&[DesignAtVersionId]> {
        self.ids.as_deref()
    }

    /// An explicit empty id list: answered without touching the store
    pub fn matches_nothing(&self) -> bool {
        matches!(&self.ids, Some(ids) if ids.is_empty())
    }

    /// Whether a (design, version) pair belongs in this query's result
    pub fn accepts(&self, design: &Design, version: &Version) -> bool {
        if design.issue_id != version.issue_id {
            return false;
        }
        if let Some(issue_id) = self.issue_id {
            if design.issue_id != issue_id {
                return false;
            }
        }
        match &self.ids {
            Some(ids) => ids
                .binary_search(&DesignAtVersionId::new(design.id, version.id))
                .is_ok(),
            None => true,
        }
    }

    pub fn to_sql(&self, projection: Projection) -> String {
        let mut sql = String::new();

        if let Some(ids) = &self.ids {
            let values = ids
                .iter()
                .map(|id| format!("({}::bigint, {}::bigint)", id.design_id, id.version_id))
                .join(", ");
            sql.push_str(&format!(
                "WITH {p} (design_id, version_id) AS (VALUES {values}) ",
                p = PAIRS_TABLE,
                values = values
            ));
        }

        let select = match projection {
            Projection::Count => format!("COUNT({}.id) AS count", DESIGNS_TABLE),
            Projection::Records => DESIGN_COLUMNS
                .iter()
                .map(|c| format!("{}.{}", DESIGNS_TABLE, c))
                .chain(VERSION_COLUMNS.iter().map(|c| format!("{}.{}", VERSIONS_TABLE, c)))
                .join(", "),
        };

        sql.push_str(&format!(
            "SELECT {select} FROM {d} INNER JOIN {v} ON {d}.issue_id = {v}.issue_id",
            select = select,
            d = DESIGNS_TABLE,
            v = VERSIONS_TABLE
        ));

        if self.ids.is_some() {
            sql.push_str(&format!(
                " INNER JOIN {p} ON {p}.design_id = {d}.id AND {p}.version_id = {v}.id",
                p = PAIRS_TABLE,
                d = DESIGNS_TABLE,
                v = VERSIONS_TABLE
            ));
        }

        if let Some(issue_id) = self.issue_id {
            sql.push_str(&format!(" WHERE {}.issue_id = {}", DESIGNS_TABLE, issue_id));
        }

        if projection == Projection::Records {
            sql.push_str(&format!(" ORDER BY {}.id, {}.id", DESIGNS_TABLE, VERSIONS_TABLE));
        }

        sql
    }

    pub async fn count<S>(&self, store: &S) -> Result<i64>
    where
        S: DesignAtVersionStore + ?Sized,
    {
        if self.matches_nothing() {
            return Ok(0);
        }
        store.count_design_at_versions(self).await
    }

    pub async fn is_empty<S>(&self, store: &S) -> Result<bool>
    where
        S: DesignAtVersionStore + ?Sized,
    {
        Ok(self.count(store).await? == 0)
    }

    pub async fn to_records<S>(&self, store: &S) -> Result<Vec<DesignAtVersion>>
    where
        S: DesignAtVersionStore + ?Sized,
    {
        if self.matches_nothing() {
            return Ok(Vec::new());
        }
        store.load_design_at_versions(self).await
    }
}

/// Positions of each table's columns in a joined row.
///
/// The version half starts at the second `id` column; everything before it
/// belongs to the design.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSplit {
    boundary: usize,
    design: HashMap<String, usize>,
    version: HashMap<String, usize>,
}

impl ColumnSplit {
    pub fn locate<'a>(columns: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let columns: Vec<&str> = columns.into_iter().collect();
        let boundary = columns
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, name)| **name == "id")
            .map(|(i, _)| i)?;

        let design = columns[..boundary]
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        let version = columns[boundary..]
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), boundary + i))
            .collect();

        Some(Self {
            boundary,
            design,
            version,
        })
    }

    pub fn boundary(&self) -> usize {
        self.boundary
    }

    pub fn design_index(&self, column: &str) -> Option<usize> {
        self.design.get(column).copied()
    }

    pub fn version_index(&self, column: &str) -> Option<usize> {
        self.version.get(column).copied()
    }
}
