use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, ResolveResult};
use crate::model::DesignId;

/// Restricts a version snapshot to some designs. Empty lists do not filter;
/// when both are given a design must match both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ids: Vec<DesignId>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filenames: Vec<String>,
}

impl DesignFilter {
    pub fn by_ids(ids: impl IntoIterator<Item = DesignId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            filenames: Vec::new(),
        }
    }

    pub fn by_filenames<S: Into<String>>(filenames: impl IntoIterator<Item = S>) -> Self {
        Self {
            ids: Vec::new(),
            filenames: filenames.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepts(&self, id: DesignId, filename: &str) -> bool {
        (self.ids.is_empty() || self.ids.contains(&id))
            && (self.filenames.is_empty() || self.filenames.iter().any(|f| f == filename))
    }
}

/// Find one design on an issue, by id or by filename
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesignLookup {
    pub id: Option<DesignId>,
    pub filename: Option<String>,
}

pub enum DesignKey<'a> {
    Id(DesignId),
    Filename(&'a str),
}

impl DesignLookup {
    pub fn key(&self) -> ResolveResult<DesignKey<'_>> {
        match (self.id, self.filename.as_deref()) {
            (Some(_), Some(_)) => Err(only_one()),
            (Some(id), None) => Ok(DesignKey::Id(id)),
            (None, Some(filename)) => Ok(DesignKey::Filename(filename)),
            (None, None) => Err(one_required()),
        }
    }
}

/// Find one design pinned to a known version: by design-at-version
/// identity, by design id, or by filename
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtVersionLookup {
    /// Composite `"<design_id>.<version_id>"` identity
    pub id: Option<String>,
    pub design_id: Option<DesignId>,
    pub filename: Option<String>,
}

pub enum AtVersionKey<'a> {
    Identity(&'a str),
    Design(DesignKey<'a>),
}

impl AtVersionLookup {
    pub fn key(&self) -> ResolveResult<AtVersionKey<'_>> {
        let given = [
            self.id.is_some(),
            self.design_id.is_some(),
            self.filename.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count();

        match given {
            0 => Err(one_required()),
            1 => Ok(match (&self.id, self.design_id, &self.filename) {
                (Some(identity), _, _) => AtVersionKey::Identity(identity),
                (_, Some(id), _) => AtVersionKey::Design(DesignKey::Id(id)),
                (_, _, Some(filename)) => AtVersionKey::Design(DesignKey::Filename(filename)),
                (None, None, None) => return Err(one_required()),
            }),
            _ => Err(only_one()),
        }
    }
}

fn only_one() -> ResolveError {
    ResolveError::Argument("only one of id or filename may be provided".to_string())
}

fn one_required() -> ResolveError {
    ResolveError::Argument("one of id or filename must be passed".to_string())
}
