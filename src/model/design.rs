use serde::{Deserialize, Serialize};

use crate::model::{DesignId, IssueId, ProjectId, VersionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub project_id: ProjectId,
    /// Project-scoped issue number
    pub iid: i64,
    pub title: String,
}

/// A named artifact attached to an issue. Never mutated once created;
/// changes across versions live in `DesignAction` rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Design {
    pub id: DesignId,
    pub project_id: ProjectId,
    pub issue_id: IssueId,
    /// Unique within the issue
    pub filename: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesignEvent {
    Creation,
    Modification,
    Deletion,
}

impl DesignEvent {
    /// Integer stored in `design_management_designs_versions.event`
    pub fn as_i16(self) -> i16 {
        match self {
            DesignEvent::Creation => 0,
            DesignEvent::Modification => 1,
            DesignEvent::Deletion => 2,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(DesignEvent::Creation),
            1 => Some(DesignEvent::Modification),
            2 => Some(DesignEvent::Deletion),
            _ => None,
        }
    }
}

/// What happened to one design in one version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DesignAction {
    pub design_id: DesignId,
    pub version_id: VersionId,
    pub event: DesignEvent,
}

impl DesignAction {
    pub fn new(design_id: DesignId, version_id: VersionId, event: DesignEvent) -> Self {
        Self {
            design_id,
            version_id,
            event,
        }
    }
}
