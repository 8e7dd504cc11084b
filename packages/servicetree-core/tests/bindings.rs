use servicetree_core::{
    BindingStore, EndpointDirectory, EndpointId, Error, MemoryStore, Node, NodeSpec, TreeStore,
};

fn leaf_store() -> (MemoryStore, Node) {
    let mut store = MemoryStore::new();
    let root = store.create_root("infra", "").unwrap();
    let leaf = store.create_child(&root, &NodeSpec::new("db-01", true)).unwrap();
    (store, leaf)
}

fn register(store: &mut MemoryStore, idents: &[&str]) -> Vec<EndpointId> {
    idents
        .iter()
        .map(|ident| store.register_endpoint(ident, "").unwrap().id)
        .collect()
}

#[test]
fn bind_is_idempotent() {
    let (mut store, leaf) = leaf_store();
    let eps = register(&mut store, &["h1", "h2"]);

    store.bind(&leaf, &eps, false).unwrap();
    store.bind(&leaf, &eps, false).unwrap();
    store.bind(&leaf, &eps[..1], false).unwrap();

    assert_eq!(store.bindings(&leaf).unwrap(), eps);
}

#[test]
fn bind_del_old_replaces_whole_set() {
    let (mut store, leaf) = leaf_store();
    let eps = register(&mut store, &["h5", "h7", "h9"]);
    let (e5, e7, e9) = (eps[0], eps[1], eps[2]);

    store.bind(&leaf, &[e5, e7], false).unwrap();
    store.bind(&leaf, &[e7, e9], true).unwrap();
    assert_eq!(store.bindings(&leaf).unwrap(), vec![e7, e9]);

    store.unbind(&leaf, &[e9]).unwrap();
    assert_eq!(store.bindings(&leaf).unwrap(), vec![e7]);
}

#[test]
fn bind_del_old_with_empty_set_clears() {
    let (mut store, leaf) = leaf_store();
    let eps = register(&mut store, &["h1"]);

    store.bind(&leaf, &eps, false).unwrap();
    store.bind(&leaf, &[], true).unwrap();
    assert!(store.bindings(&leaf).unwrap().is_empty());
}

#[test]
fn unbind_missing_pair_is_a_noop() {
    let (mut store, leaf) = leaf_store();
    let eps = register(&mut store, &["h1", "h2"]);

    store.bind(&leaf, &eps[..1], false).unwrap();
    store.unbind(&leaf, &[eps[1]]).unwrap();
    store.unbind(&leaf, &[EndpointId(404)]).unwrap();
    assert_eq!(store.bindings(&leaf).unwrap(), vec![eps[0]]);
}

#[test]
fn non_leaf_nodes_refuse_bindings() {
    let mut store = MemoryStore::new();
    let root = store.create_root("infra", "").unwrap();
    let eps = register(&mut store, &["h1"]);

    let err = store.bind(&root, &eps, false).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "got {err}");
    let err = store.unbind(&root, &eps).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "got {err}");
}

#[test]
fn foreign_leaves_refuse_bindings() {
    let mut store = MemoryStore::new();
    let root = store.create_root("infra", "").unwrap();
    let foreign = store
        .create_child(&root, &NodeSpec::new("imported", true).with_kind(2))
        .unwrap();
    let eps = register(&mut store, &["h1"]);

    let err = store.bind(&foreign, &eps, false).unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)), "got {err}");
}

#[test]
fn idents_resolve_best_effort() {
    let mut store = MemoryStore::new();
    let eps = register(&mut store, &["h1", "h2"]);

    let resolved = store.endpoint_ids_by_idents(&["h2", "missing", "h1"]).unwrap();
    assert_eq!(resolved, vec![eps[1], eps[0]]);

    assert!(store.endpoint_ids_by_idents(&[]).unwrap().is_empty());
}

#[test]
fn register_endpoint_upserts_by_ident() {
    let mut store = MemoryStore::new();
    let first = store.register_endpoint("h1", "old-alias").unwrap();
    let second = store.register_endpoint("h1", "new-alias").unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.alias, "new-alias");
    let fetched = store.endpoints_by_ids(&[first.id]).unwrap();
    assert_eq!(fetched[0].alias, "new-alias");
}
