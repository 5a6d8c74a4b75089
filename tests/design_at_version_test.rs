use std::collections::HashSet;
use std::sync::Arc;

use design_at_version::logic::snapshot;
use design_at_version::{
    Design, DesignAtVersionId, DesignAtVersionQuery, DesignAtVersionResolver, DesignEvent,
    DesignFilter, Issue, MemoryStore, ResolveError, Version,
};

fn id_of(design: &Design, version: &Version) -> String {
    DesignAtVersionId::new(design.id, version.id).encode()
}

fn filenames(resolved: &[design_at_version::DesignAtVersion]) -> Vec<&str> {
    resolved.iter().map(|dav| dav.filename()).collect()
}

/// Issue with designs A, B, C. V1 creates A; V2 creates B and C and modifies A;
/// V3 deletes C.
struct Timeline {
    store: Arc<MemoryStore>,
    resolver: DesignAtVersionResolver<MemoryStore>,
    issue: Issue,
    designs: [Design; 3],
    versions: [Version; 3],
}

fn timeline() -> Timeline {
    let store = Arc::new(MemoryStore::new());
    let issue = store.insert_issue(1, "homepage redesign");
    let a = store.insert_design(&issue, "a.png");
    let b = store.insert_design(&issue, "b.png");
    let c = store.insert_design(&issue, "c.png");

    let v1 = store.commit_version(&issue, [(a.id, DesignEvent::Creation)]);
    let v2 = store.commit_version(
        &issue,
        [
            (b.id, DesignEvent::Creation),
            (c.id, DesignEvent::Creation),
            (a.id, DesignEvent::Modification),
        ],
    );
    let v3 = store.commit_version(&issue, [(c.id, DesignEvent::Deletion)]);

    Timeline {
        resolver: DesignAtVersionResolver::new(store.clone()),
        store,
        issue,
        designs: [a, b, c],
        versions: [v1, v2, v3],
    }
}

#[tokio::test]
async fn test_basic_resolution_per_version() {
    let t = timeline();
    let [v1, v2, _] = &t.versions;

    let at_v1 = t
        .resolver
        .find_all_for_version(v1, &DesignFilter::default())
        .await
        .unwrap();
    assert_eq!(filenames(&at_v1), vec!["a.png"]);

    let at_v2 = t
        .resolver
        .find_all_for_version(v2, &DesignFilter::default())
        .await
        .unwrap();
    assert_eq!(filenames(&at_v2), vec!["a.png", "b.png", "c.png"]);
    assert!(at_v2.iter().all(|dav| dav.version == *v2));
    assert_eq!(t.store.queries_executed(), 2);
}

#[tokio::test]
async fn test_deleted_design_is_not_visible() {
    let t = timeline();
    let at_v3 = t
        .resolver
        .find_all_for_version(&t.versions[2], &DesignFilter::default())
        .await
        .unwrap();

    assert_eq!(filenames(&at_v3), vec!["a.png", "b.png"]);
    assert!(at_v3.iter().all(|dav| dav.design.issue_id == t.issue.id));
}

#[tokio::test]
async fn test_snapshot_filter_intersects_visibility() {
    let t = timeline();
    let [a, _, c] = &t.designs;

    let filter = DesignFilter::by_filenames(["c.png", "missing.png"]);
    let at_v2 = t
        .resolver
        .find_all_for_version(&t.versions[1], &filter)
        .await
        .unwrap();
    assert_eq!(filenames(&at_v2), vec!["c.png"]);

    let at_v3 = t
        .resolver
        .find_all_for_version(&t.versions[2], &DesignFilter::by_ids([a.id, c.id]))
        .await
        .unwrap();
    assert_eq!(filenames(&at_v3), vec!["a.png"]);
}

#[tokio::test]
async fn test_bulk_resolution_with_one_invalid_pair() {
    let t = timeline();
    let [a, b, _] = &t.designs;
    let v2 = &t.versions[1];

    let other_issue = t.store.insert_issue(1, "unrelated");
    let other_design = t.store.insert_design(&other_issue, "x.png");
    let v_other = t
        .store
        .commit_version(&other_issue, [(other_design.id, DesignEvent::Creation)]);

    let identities = [id_of(a, v2), id_of(b, v2), id_of(a, &v_other)];
    let loader = t.resolver.loader();
    let results = loader.resolve_all(&identities).await.unwrap();

    assert_eq!(t.store.queries_executed(), 1);
    assert_eq!(results.iter().filter(|r| r.is_some()).count(), 2);
    assert_eq!(results[0].as_ref().map(|dav| dav.design.clone()), Some(a.clone()));
    assert_eq!(results[1].as_ref().map(|dav| dav.design.clone()), Some(b.clone()));
    assert!(results[2].is_none());
}

#[tokio::test]
async fn test_ambiguous_filter_is_argument_error() {
    let t = timeline();
    let lookup = design_at_version::AtVersionLookup {
        id: None,
        design_id: Some(t.designs[0].id),
        filename: Some("a.png".to_string()),
    };

    let err = t
        .resolver
        .find_one_for_version(&t.versions[0], &lookup)
        .await
        .unwrap_err();
    match err {
        ResolveError::Argument(message) => assert!(message.contains("only one")),
        other => panic!("expected argument error, got {:?}", other),
    }

    let err = t
        .resolver
        .find_one_for_version(&t.versions[0], &Default::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "one of id or filename must be passed");
}

#[test]
fn test_identity_round_trip() {
    for (d, v) in [(0, 0), (1, 2), (42, 7), (i64::MAX, 1), (9_007_199_254_740_993, 3)] {
        let id = DesignAtVersionId::new(d, v);
        assert_eq!(DesignAtVersionId::decode(&id.encode()).unwrap(), id);
    }
}

#[tokio::test]
async fn test_same_issue_invariant() {
    let t = timeline();
    let other_issue = t.store.insert_issue(2, "elsewhere");
    let stranger = t.store.insert_design(&other_issue, "a.png");
    let v1 = &t.versions[0];

    let err = t
        .resolver
        .find_by_design_and_version(stranger.clone(), v1.clone())
        .unwrap_err();
    assert!(matches!(err, ResolveError::InconsistentPair { .. }));

    let found = t
        .resolver
        .find_by_identity(&id_of(&stranger, v1))
        .await
        .unwrap();
    assert_eq!(found, None);
}

#[tokio::test]
async fn test_visibility_is_monotonic_until_deletion() {
    let t = timeline();
    let mut visible_by_version = Vec::new();
    for version in &t.versions {
        let visible: HashSet<i64> = t
            .resolver
            .find_all_for_version(version, &DesignFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|dav| dav.design.id)
            .collect();
        visible_by_version.push(visible);
    }
    assert_eq!(t.store.queries_executed(), t.versions.len());

    let c = &t.designs[2];
    for window in visible_by_version.windows(2) {
        for id in &window[0] {
            assert!(window[1].contains(id) || *id == c.id);
        }
    }
    assert_eq!(
        snapshot::DesignState::NotYetCreated.apply(DesignEvent::Deletion),
        snapshot::DesignState::Deleted
    );
}

mod find_all {
    use super::*;

    /// Issue A: two versions over five designs. Issue B: one version over three.
    struct Catalog {
        store: MemoryStore,
        version_a: Version,
        version_c: Version,
        designs_b: Vec<Design>,
    }

    fn catalog() -> Catalog {
        let store = MemoryStore::new();
        let issue_a = store.insert_issue(1, "a");
        let issue_b = store.insert_issue(1, "b");

        let create = |issue: &Issue, names: &[&str]| -> (Vec<Design>, Version) {
            let designs: Vec<Design> = names
                .iter()
                .map(|name| store.insert_design(issue, name))
                .collect();
            let version = store.commit_version(
                issue,
                designs.iter().map(|d| (d.id, DesignEvent::Creation)),
            );
            (designs, version)
        };

        let (_, version_a) = create(&issue_a, &["1.png", "2.png", "3.png"]);
        let (designs_b, _) = create(&issue_a, &["4.png", "5.png"]);
        let (_, version_c) = create(&issue_b, &["6.png", "7.png", "8.png"]);

        Catalog {
            store,
            version_a,
            version_c,
            designs_b,
        }
    }

    #[tokio::test]
    async fn test_counts_every_same_issue_pair() {
        let c = catalog();
        let query = DesignAtVersionQuery::new();

        assert_eq!(query.count(&c.store).await.unwrap(), 13);
        assert_eq!(c.store.queries_executed(), 1);
        assert_eq!(query.count(&c.store).await.unwrap(), 13);
        assert_eq!(c.store.queries_executed(), 2);

        let records = query.to_records(&c.store).await.unwrap();
        assert_eq!(records.len(), 13);
        assert!(records
            .iter()
            .all(|dav| dav.design.issue_id == dav.version.issue_id));
        assert_eq!(c.store.queries_executed(), 3);
    }

    #[tokio::test]
    async fn test_for_ids_across_issues_is_empty() {
        let c = catalog();
        let query = DesignAtVersionQuery::new().for_ids(
            c.designs_b
                .iter()
                .map(|d| DesignAtVersionId::new(d.id, c.version_c.id)),
        );

        assert_eq!(query.count(&c.store).await.unwrap(), 0);
        assert!(query.is_empty(&c.store).await.unwrap());
        assert!(query.to_records(&c.store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_for_ids_returns_only_requested_pairs() {
        let c = catalog();
        let ids: HashSet<DesignAtVersionId> = c
            .designs_b
            .iter()
            .map(|d| DesignAtVersionId::new(d.id, c.version_a.id))
            .collect();
        let query = DesignAtVersionQuery::new().for_ids(ids.iter().copied());

        assert_eq!(query.count(&c.store).await.unwrap(), 2);
        assert_eq!(c.store.queries_executed(), 1);

        let records = query.to_records(&c.store).await.unwrap();
        assert_eq!(c.store.queries_executed(), 2);
        let found: HashSet<DesignAtVersionId> = records.iter().map(|dav| dav.id).collect();
        assert_eq!(found, ids);
    }

    #[tokio::test]
    async fn test_empty_id_list_skips_store() {
        let c = catalog();
        let query = DesignAtVersionQuery::new().for_ids(Vec::new());

        assert_eq!(query.count(&c.store).await.unwrap(), 0);
        assert!(query.to_records(&c.store).await.unwrap().is_empty());
        assert_eq!(c.store.queries_executed(), 0);
    }
}
