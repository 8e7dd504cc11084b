//! Read-side queries derived from the store seams: leaf closure, ancestor
//! resolution, and endpoint listing under a subtree.

use crate::error::{Error, Result};
use crate::ids::NodeId;
use crate::node::{Endpoint, EndpointFilter, Node};
use crate::path;
use crate::traits::{BindingStore, TreeStore};

/// Ids of all leaf nodes at or below `node`; `[node.id]` when the node is
/// itself a leaf. Sorted by id so the result is stable for a given tree
/// state (callers must not rely on any particular order).
pub fn leaf_ids<S: TreeStore>(store: &S, node: &Node) -> Result<Vec<NodeId>> {
    if node.leaf {
        return Ok(vec![node.id]);
    }
    let mut ids: Vec<NodeId> = store.leaves_under(&node.path)?.into_iter().map(|n| n.id).collect();
    ids.sort();
    Ok(ids)
}

/// Ids of all ancestors of `node`, root to immediate parent, resolved from
/// the proper prefixes of its path. A prefix with no backing node means the
/// tree is inconsistent and is surfaced as a storage error.
pub fn ancestor_ids<S: TreeStore>(store: &S, node: &Node) -> Result<Vec<NodeId>> {
    let mut ids = Vec::new();
    for prefix in path::proper_prefixes(&node.path) {
        let ancestor = store.get_by_path(prefix)?.ok_or_else(|| {
            Error::Storage(format!("ancestor path {prefix} of {} has no node", node.path))
        })?;
        ids.push(ancestor.id);
    }
    Ok(ids)
}

/// Count of distinct endpoints bound under `leaf_ids`. An empty id set is
/// answered without touching storage.
pub fn endpoints_under_total<S: BindingStore>(
    store: &S,
    leaf_ids: &[NodeId],
    filter: &EndpointFilter,
) -> Result<u64> {
    if leaf_ids.is_empty() {
        return Ok(0);
    }
    store.endpoints_under_total(leaf_ids, filter)
}

/// One page of distinct endpoints bound under `leaf_ids`. An empty id set is
/// answered without touching storage.
pub fn endpoints_under_list<S: BindingStore>(
    store: &S,
    leaf_ids: &[NodeId],
    filter: &EndpointFilter,
    limit: u64,
    offset: u64,
) -> Result<Vec<Endpoint>> {
    if leaf_ids.is_empty() {
        return Ok(Vec::new());
    }
    store.endpoints_under_list(leaf_ids, filter, limit, offset)
}
