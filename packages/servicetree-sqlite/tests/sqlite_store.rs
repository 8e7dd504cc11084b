use servicetree_core::{
    BindingStore, EndpointDirectory, Error, NodeSpec, TreeStore,
};
use servicetree_sqlite::SqliteStore;

#[test]
fn in_memory_store_passes_conformance() {
    servicetree_test_support::run_conformance_suite(|| {
        SqliteStore::new_in_memory().expect("in-memory sqlite")
    });
}

#[test]
fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tree.db");

    {
        let mut store = SqliteStore::new(&db).unwrap();
        let root = store.create_root("infra", "").unwrap();
        let leaf = store.create_child(&root, &NodeSpec::new("db-01", true)).unwrap();
        let ep = store.register_endpoint("h1.bj", "alpha").unwrap();
        store.bind(&leaf, &[ep.id], false).unwrap();
    }

    let store = SqliteStore::new(&db).unwrap();
    let leaf = store.get_by_path("infra.db-01").unwrap().unwrap();
    assert!(leaf.leaf);
    let bound = store.bindings(&leaf).unwrap();
    assert_eq!(bound.len(), 1);
    let eps = store.endpoints_by_ids(&bound).unwrap();
    assert_eq!(eps[0].ident, "h1.bj");
}

#[test]
fn independent_handles_share_one_database() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("tree.db");

    let mut writer = SqliteStore::new(&db).unwrap();
    let mut other = SqliteStore::new(&db).unwrap();

    let root = writer.create_root("infra", "").unwrap();
    writer.create_child(&root, &NodeSpec::new("db-01", true)).unwrap();

    // A second caller loses the create race on the same derived path.
    let root_seen = other.get_by_path("infra").unwrap().unwrap();
    let err = other
        .create_child(&root_seen, &NodeSpec::new("db-01", true))
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err}");

    // Renames are visible to the other handle, whole subtree at once.
    writer.rename(&root, "core").unwrap();
    assert!(other.get_by_path("infra.db-01").unwrap().is_none());
    assert!(other.get_by_path("core.db-01").unwrap().is_some());
}

#[test]
fn rename_cascade_is_bounded_to_the_subtree() {
    let mut store = SqliteStore::new_in_memory().unwrap();
    let infra = store.create_root("infra", "").unwrap();
    let infra_x = store.create_root("infra-x", "").unwrap();
    store.create_child(&infra, &NodeSpec::new("db", false)).unwrap();
    store.create_child(&infra_x, &NodeSpec::new("db", false)).unwrap();

    store.rename(&infra, "core").unwrap();

    assert!(store.get_by_path("core.db").unwrap().is_some());
    // The string-prefix sibling root and its child keep their paths.
    assert!(store.get_by_path("infra-x").unwrap().is_some());
    assert!(store.get_by_path("infra-x.db").unwrap().is_some());
}

#[test]
fn deep_rename_rewrites_every_level() {
    let mut store = SqliteStore::new_in_memory().unwrap();
    let root = store.create_root("a", "").unwrap();
    let mut parent = root.clone();
    for name in ["b", "c", "d", "e"] {
        parent = store.create_child(&parent, &NodeSpec::new(name, false)).unwrap();
    }

    let b = store.get_by_path("a.b").unwrap().unwrap();
    store.rename(&b, "bb").unwrap();

    assert!(store.get_by_path("a.bb.c.d.e").unwrap().is_some());
    assert!(store.get_by_path("a.b").unwrap().is_none());
    assert!(store.get_by_path("a.b.c.d.e").unwrap().is_none());
}

#[test]
fn conflicting_rename_leaves_subtree_untouched() {
    let mut store = SqliteStore::new_in_memory().unwrap();
    let root = store.create_root("infra", "").unwrap();
    store.create_child(&root, &NodeSpec::new("a", false)).unwrap();
    let b = store.create_child(&root, &NodeSpec::new("b", false)).unwrap();
    store.create_child(&b, &NodeSpec::new("sub", true)).unwrap();

    // Collides with infra.a; nothing under b may move.
    let err = store.rename(&b, "a").unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err}");
    assert!(store.get_by_path("infra.b").unwrap().is_some());
    assert!(store.get_by_path("infra.b.sub").unwrap().is_some());
    assert!(store.get_by_path("infra.a.sub").unwrap().is_none());
}

#[test]
fn stale_node_handles_fail_closed() {
    let mut store = SqliteStore::new_in_memory().unwrap();
    let root = store.create_root("infra", "").unwrap();
    let stale = root.clone();
    store.delete(&root).unwrap();

    let err = store.create_child(&stale, &NodeSpec::new("db", true)).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {err}");
    let err = store.rename(&stale, "core").unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {err}");
}
