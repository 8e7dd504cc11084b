//! Backend conformance suite. Every store implementation (memory, SQLite,
//! ...) must pass these checks; each backend's test crate calls
//! [`run_conformance_suite`] with a constructor for a fresh, empty store.

use servicetree_core::{
    ancestor_ids, endpoints_under_list, endpoints_under_total, leaf_ids, BindingStore,
    EndpointDirectory, EndpointField, EndpointFilter, Error, NodeSpec, TreeStore,
    DEFAULT_QUERY_LIMIT,
};

/// Everything a conformant backend implements.
pub trait Store: TreeStore + EndpointDirectory + BindingStore {}

impl<S: TreeStore + EndpointDirectory + BindingStore> Store for S {}

/// Run every conformance check, each against a fresh store.
pub fn run_conformance_suite<S: Store>(mut make: impl FnMut() -> S) {
    check_create_and_lookup(make());
    check_duplicate_path_conflict(make());
    check_name_validation(make());
    check_leaf_and_foreign_guards(make());
    check_rename_cascade(make());
    check_delete_guards(make());
    check_query_path(make());
    check_batch_lookup(make());
    check_binding_lifecycle(make());
    check_binding_guards(make());
    check_endpoint_resolution(make());
    check_subtree_queries(make());
    check_endpoints_under(make());
}

pub fn check_create_and_lookup<S: Store>(mut store: S) {
    let root = store.create_root("infra", "service tree root").unwrap();
    assert_eq!(root.path, "infra");
    assert_eq!(root.parent_id, None);
    assert!(!root.leaf);
    assert!(root.locally_managed());

    let child = store
        .create_child(&root, &NodeSpec::new("db-01", true).with_note("primary"))
        .unwrap();
    assert_eq!(child.path, "infra.db-01");
    assert_eq!(child.parent_id, Some(root.id));
    assert_eq!(child.note, "primary");

    assert_eq!(store.get_by_id(child.id).unwrap().unwrap(), child);
    assert_eq!(store.get_by_path("infra.db-01").unwrap().unwrap(), child);
    assert!(store.get_by_path("infra.db-02").unwrap().is_none());
}

pub fn check_duplicate_path_conflict<S: Store>(mut store: S) {
    let root = store.create_root("infra", "").unwrap();
    store.create_child(&root, &NodeSpec::new("db-01", true)).unwrap();

    let err = store.create_child(&root, &NodeSpec::new("db-01", true)).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err}");

    let err = store.create_root("infra", "").unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err}");
}

pub fn check_name_validation<S: Store>(mut store: S) {
    let root = store.create_root("infra", "").unwrap();
    for bad in ["", "with.dot", "under_score", "sp ace"] {
        let err = store.create_child(&root, &NodeSpec::new(bad, false)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{bad:?} gave {err}");
        let err = store.rename(&root, bad).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{bad:?} gave {err}");
    }
    let err = store.create_root("no/slash", "").unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "got {err}");
}

pub fn check_leaf_and_foreign_guards<S: Store>(mut store: S) {
    let root = store.create_root("infra", "").unwrap();
    let leaf = store.create_child(&root, &NodeSpec::new("db-01", true)).unwrap();
    let foreign = store
        .create_child(&root, &NodeSpec::new("imported", false).with_kind(3))
        .unwrap();

    let err = store.create_child(&leaf, &NodeSpec::new("sub", false)).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "got {err}");

    let err = store.create_child(&foreign, &NodeSpec::new("sub", false)).unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)), "got {err}");
    let err = store.rename(&foreign, "renamed").unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)), "got {err}");
    let err = store.delete(&foreign).unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)), "got {err}");

    let untouched = store.get_by_id(foreign.id).unwrap().unwrap();
    assert_eq!(untouched.path, "infra.imported");
    assert_eq!(untouched.kind, 3);
}

pub fn check_rename_cascade<S: Store>(mut store: S) {
    let root = store.create_root("infra", "").unwrap();
    let db = store.create_child(&root, &NodeSpec::new("db", false)).unwrap();
    let shard = store.create_child(&db, &NodeSpec::new("shard-1", true)).unwrap();
    let sibling_root = store.create_root("infra-x", "").unwrap();

    let renamed = store.rename(&root, "core").unwrap();
    assert_eq!(renamed.path, "core");
    assert_eq!(renamed.name, "core");

    assert_eq!(store.get_by_path("core.db").unwrap().unwrap().id, db.id);
    assert_eq!(store.get_by_path("core.db.shard-1").unwrap().unwrap().id, shard.id);
    assert!(store.get_by_path("infra.db.shard-1").unwrap().is_none());
    // String-prefix sibling stays untouched.
    assert_eq!(store.get_by_id(sibling_root.id).unwrap().unwrap().path, "infra-x");

    let a = store.create_child(&renamed, &NodeSpec::new("a", false)).unwrap();
    store.create_child(&renamed, &NodeSpec::new("b", false)).unwrap();
    let err = store.rename(&a, "b").unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err}");
    assert_eq!(store.get_by_id(a.id).unwrap().unwrap().path, "core.a");
}

pub fn check_delete_guards<S: Store>(mut store: S) {
    let root = store.create_root("infra", "").unwrap();
    let db = store.create_child(&root, &NodeSpec::new("db", false)).unwrap();
    let leaf = store.create_child(&db, &NodeSpec::new("shard-1", true)).unwrap();

    let err = store.delete(&root).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err}");

    let ep = store.register_endpoint("h1", "").unwrap();
    store.bind(&leaf, &[ep.id], false).unwrap();
    let err = store.delete(&leaf).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err}");

    store.unbind(&leaf, &[ep.id]).unwrap();
    store.delete(&leaf).unwrap();
    store.delete(&db).unwrap();
    store.delete(&root).unwrap();
    assert!(store.get_by_path("infra").unwrap().is_none());
}

pub fn check_query_path<S: Store>(mut store: S) {
    let root = store.create_root("infra", "").unwrap();
    let db = store.create_child(&root, &NodeSpec::new("db", false)).unwrap();
    for name in ["shard-2", "shard-1"] {
        store.create_child(&db, &NodeSpec::new(name, true)).unwrap();
    }

    let hits = store.query_path("shard", DEFAULT_QUERY_LIMIT).unwrap();
    let paths: Vec<String> = hits.into_iter().map(|n| n.path).collect();
    assert_eq!(paths, ["infra.db.shard-1", "infra.db.shard-2"]);

    assert_eq!(store.query_path("shard", 1).unwrap().len(), 1);
    assert!(store.query_path("SHARD", DEFAULT_QUERY_LIMIT).unwrap().is_empty());
    assert!(store.query_path("missing", DEFAULT_QUERY_LIMIT).unwrap().is_empty());
}

pub fn check_batch_lookup<S: Store>(mut store: S) {
    let root = store.create_root("infra", "").unwrap();
    let a = store.create_child(&root, &NodeSpec::new("a", false)).unwrap();
    let b = store.create_child(&root, &NodeSpec::new("b", false)).unwrap();

    let nodes = store.get_by_ids(&[b.id, servicetree_core::NodeId(404), a.id]).unwrap();
    let ids: Vec<_> = nodes.iter().map(|n| n.id).collect();
    assert_eq!(ids, [b.id, a.id]);
}

pub fn check_binding_lifecycle<S: Store>(mut store: S) {
    let root = store.create_root("infra", "").unwrap();
    let leaf = store.create_child(&root, &NodeSpec::new("db-01", true)).unwrap();

    let e5 = store.register_endpoint("h5", "").unwrap().id;
    let e7 = store.register_endpoint("h7", "").unwrap().id;
    let e9 = store.register_endpoint("h9", "").unwrap().id;

    store.bind(&leaf, &[e5, e7], false).unwrap();
    store.bind(&leaf, &[e5, e7], false).unwrap();
    assert_eq!(store.bindings(&leaf).unwrap(), vec![e5, e7]);

    store.bind(&leaf, &[e7, e9], true).unwrap();
    assert_eq!(store.bindings(&leaf).unwrap(), vec![e7, e9]);

    store.unbind(&leaf, &[e9]).unwrap();
    assert_eq!(store.bindings(&leaf).unwrap(), vec![e7]);

    store.unbind(&leaf, &[e9]).unwrap();
    assert_eq!(store.bindings(&leaf).unwrap(), vec![e7]);
}

pub fn check_binding_guards<S: Store>(mut store: S) {
    let root = store.create_root("infra", "").unwrap();
    let foreign_leaf = store
        .create_child(&root, &NodeSpec::new("imported", true).with_kind(2))
        .unwrap();
    let ep = store.register_endpoint("h1", "").unwrap().id;

    let err = store.bind(&root, &[ep], false).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "got {err}");
    let err = store.bind(&foreign_leaf, &[ep], false).unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)), "got {err}");
    let err = store.unbind(&foreign_leaf, &[ep]).unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)), "got {err}");
}

pub fn check_endpoint_resolution<S: Store>(mut store: S) {
    let h1 = store.register_endpoint("h1", "alpha").unwrap();
    let h2 = store.register_endpoint("h2", "beta").unwrap();

    let resolved = store.endpoint_ids_by_idents(&["h2", "missing", "h1"]).unwrap();
    assert_eq!(resolved, vec![h2.id, h1.id]);

    let again = store.register_endpoint("h1", "gamma").unwrap();
    assert_eq!(again.id, h1.id);
    assert_eq!(again.alias, "gamma");

    let eps = store.endpoints_by_ids(&[h2.id, h1.id]).unwrap();
    let idents: Vec<&str> = eps.iter().map(|e| e.ident.as_str()).collect();
    assert_eq!(idents, ["h2", "h1"]);
}

pub fn check_subtree_queries<S: Store>(mut store: S) {
    let root = store.create_root("infra", "").unwrap();
    let db = store.create_child(&root, &NodeSpec::new("db", false)).unwrap();
    let s1 = store.create_child(&db, &NodeSpec::new("shard-1", true)).unwrap();
    let s2 = store.create_child(&db, &NodeSpec::new("shard-2", true)).unwrap();

    let mut expected = vec![s1.id, s2.id];
    expected.sort();
    assert_eq!(leaf_ids(&store, &root).unwrap(), expected);
    assert_eq!(leaf_ids(&store, &s1).unwrap(), vec![s1.id]);

    assert_eq!(ancestor_ids(&store, &s1).unwrap(), vec![root.id, db.id]);
    assert!(ancestor_ids(&store, &root).unwrap().is_empty());

    let children = store.children(&db).unwrap();
    let names: Vec<&str> = children.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, ["shard-1", "shard-2"]);
}

pub fn check_endpoints_under<S: Store>(mut store: S) {
    let root = store.create_root("infra", "").unwrap();
    let a = store.create_child(&root, &NodeSpec::new("a", true)).unwrap();
    let b = store.create_child(&root, &NodeSpec::new("b", true)).unwrap();

    let h1 = store.register_endpoint("h1.bj", "alpha").unwrap().id;
    let h2 = store.register_endpoint("h2.sh", "beta").unwrap().id;
    let h3 = store.register_endpoint("h3.bj", "gamma").unwrap().id;
    store.bind(&a, &[h1, h2], false).unwrap();
    store.bind(&b, &[h2, h3], false).unwrap();

    let ids = leaf_ids(&store, &root).unwrap();
    let all = EndpointFilter::new(EndpointField::Ident);
    // h2 is bound twice and must count once.
    assert_eq!(endpoints_under_total(&store, &ids, &all).unwrap(), 3);

    let page = endpoints_under_list(&store, &ids, &all, 2, 1).unwrap();
    let idents: Vec<&str> = page.iter().map(|e| e.ident.as_str()).collect();
    assert_eq!(idents, ["h2.sh", "h3.bj"]);
    assert!(endpoints_under_list(&store, &ids, &all, 2, 50).unwrap().is_empty());

    let bj = EndpointFilter::new(EndpointField::Ident).with_query(".bj");
    assert_eq!(endpoints_under_total(&store, &ids, &bj).unwrap(), 2);

    let alias = EndpointFilter::new(EndpointField::Alias).with_query("bet");
    let page = endpoints_under_list(&store, &ids, &alias, 10, 0).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].ident, "h2.sh");

    let batch = EndpointFilter::new(EndpointField::Ident)
        .with_batch(vec!["h1.bj".into(), "h3.bj".into()]);
    assert_eq!(endpoints_under_total(&store, &ids, &batch).unwrap(), 2);

    assert_eq!(endpoints_under_total(&store, &[], &all).unwrap(), 0);
    assert!(endpoints_under_list(&store, &[], &all, 10, 0).unwrap().is_empty());
}
