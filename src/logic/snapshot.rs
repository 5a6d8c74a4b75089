use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::model::{Design, DesignAction, DesignEvent, DesignFilter, DesignId, Version, VersionId};

/// Where a design stands on the version timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DesignState {
    NotYetCreated,
    Visible,
    /// Terminal for the design's lineage
    Deleted,
}

impl DesignState {
    /// Transitions only happen at version boundaries, one action at a time
    pub fn apply(self, event: DesignEvent) -> DesignState {
        match (self, event) {
            (DesignState::Deleted, _) => DesignState::Deleted,
            (_, DesignEvent::Deletion) => DesignState::Deleted,
            (DesignState::NotYetCreated, DesignEvent::Creation)
            | (DesignState::NotYetCreated, DesignEvent::Modification)
            | (DesignState::Visible, _) => DesignState::Visible,
        }
    }

    pub fn is_visible(self) -> bool {
        self == DesignState::Visible
    }
}

/// State of each design as of a version, folded from the action history.
///
/// Actions recorded after `version_id` are ignored.
pub fn states_at<'a>(
    actions: impl IntoIterator<Item = &'a DesignAction>,
    version_id: VersionId,
) -> BTreeMap<DesignId, DesignState> {
    let mut relevant: Vec<&DesignAction> = actions
        .into_iter()
        .filter(|a| a.version_id <= version_id)
        .collect();
    relevant.sort_by_key(|a| (a.version_id, a.design_id));

    let mut states = BTreeMap::new();
    for action in relevant {
        let state = states
            .entry(action.design_id)
            .or_insert(DesignState::NotYetCreated);
        *state = state.apply(action.event);
    }
    states
}

pub fn visible_design_ids<'a>(
    actions: impl IntoIterator<Item = &'a DesignAction>,
    version_id: VersionId,
) -> BTreeSet<DesignId> {
    states_at(actions, version_id)
        .into_iter()
        .filter(|(_, state)| state.is_visible())
        .map(|(id, _)| id)
        .collect()
}

/// Designs of the version's issue that are visible at `version`, filtered,
/// ordered by design id
pub fn materialize<'a>(
    version: &Version,
    designs: impl IntoIterator<Item = &'a Design>,
    actions: impl IntoIterator<Item = &'a DesignAction>,
    filter: &DesignFilter,
) -> Vec<Design> {
    let visible = visible_design_ids(actions, version.id);

    let mut snapshot: Vec<Design> = designs
        .into_iter()
        .filter(|d| d.issue_id == version.issue_id)
        .filter(|d| visible.contains(&d.id))
        .filter(|d| filter.accepts(d.id, &d.filename))
        .cloned()
        .collect();
    snapshot.sort_by_key(|d| d.id);
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DesignEvent::*;

    fn design(id: DesignId, issue_id: i64) -> Design {
        Design {
            id,
            project_id: 1,
            issue_id,
            filename: format!("{}.png", id),
        }
    }

    fn version(id: VersionId, issue_id: i64) -> Version {
        Version {
            id,
            issue_id,
            sha: String::new(),
            author_id: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_transitions() {
        assert_eq!(DesignState::NotYetCreated.apply(Creation), DesignState::Visible);
        assert_eq!(DesignState::NotYetCreated.apply(Modification), DesignState::Visible);
        assert_eq!(DesignState::NotYetCreated.apply(Deletion), DesignState::Deleted);
        assert_eq!(DesignState::Visible.apply(Modification), DesignState::Visible);
        assert_eq!(DesignState::Visible.apply(Deletion), DesignState::Deleted);
        assert_eq!(DesignState::Deleted.apply(Creation), DesignState::Deleted);
        assert_eq!(DesignState::Deleted.apply(Modification), DesignState::Deleted);
    }

    #[test]
    fn test_states_ignore_later_versions() {
        let actions = vec![
            DesignAction::new(1, 1, Creation),
            DesignAction::new(2, 2, Creation),
            DesignAction::new(1, 3, Deletion),
        ];

        let at_1 = states_at(&actions, 1);
        assert_eq!(at_1.get(&1), Some(&DesignState::Visible));
        assert_eq!(at_1.get(&2), None);

        let at_3 = states_at(&actions, 3);
        assert_eq!(at_3.get(&1), Some(&DesignState::Deleted));
        assert_eq!(at_3.get(&2), Some(&DesignState::Visible));
    }

    #[test]
    fn test_actions_fold_in_version_order() {
        // deletion recorded first in the list but at a later version
        let actions = vec![
            DesignAction::new(1, 5, Deletion),
            DesignAction::new(1, 2, Creation),
        ];
        assert_eq!(visible_design_ids(&actions, 4), BTreeSet::from([1]));
        assert!(visible_design_ids(&actions, 5).is_empty());
    }

    #[test]
    fn test_materialize_scopes_to_issue_and_sorts() {
        let designs = vec![design(3, 10), design(1, 10), design(2, 99)];
        let actions = vec![
            DesignAction::new(3, 1, Creation),
            DesignAction::new(1, 1, Creation),
            DesignAction::new(2, 1, Creation),
        ];

        let snapshot = materialize(&version(1, 10), &designs, &actions, &DesignFilter::default());
        let ids: Vec<_> = snapshot.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let filtered = materialize(
            &version(1, 10),
            &designs,
            &actions,
            &DesignFilter::by_filenames(["3.png"]),
        );
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, 3);
    }

    #[test]
    fn test_visibility_is_monotonic_until_deletion() {
        let actions = vec![
            DesignAction::new(1, 1, Creation),
            DesignAction::new(2, 1, Creation),
            DesignAction::new(3, 2, Creation),
            DesignAction::new(2, 3, Deletion),
            DesignAction::new(1, 4, Modification),
        ];

        for earlier in 1..=4 {
            for later in earlier..=4 {
                let at_earlier = visible_design_ids(&actions, earlier);
                let at_later = visible_design_ids(&actions, later);
                let deleted_by_later: BTreeSet<_> = states_at(&actions, later)
                    .into_iter()
                    .filter(|(_, s)| *s == DesignState::Deleted)
                    .map(|(id, _)| id)
                    .collect();

                for id in at_earlier.difference(&deleted_by_later) {
                    assert!(at_later.contains(id), "design {} vanished between {} and {}", id, earlier, later);
                }
            }
        }
    }
}
