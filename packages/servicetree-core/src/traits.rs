use crate::error::Result;
use crate::ids::{EndpointId, NodeId};
use crate::node::{Endpoint, EndpointFilter, Node, NodeSpec};

/// Default result cap for [`TreeStore::query_path`] when the caller does not
/// supply one.
pub const DEFAULT_QUERY_LIMIT: usize = 20;

/// Durable storage of tree nodes keyed by id and by materialized path.
///
/// Implementations must treat their uniqueness constraint on `path` as the
/// authoritative arbiter under concurrent writers; any existence pre-check is
/// an optimization only. `create_*`, `rename`, and `delete` must commit
/// atomically — in particular no reader may observe a rename that has
/// rewritten only part of a subtree.
pub trait TreeStore {
    fn get_by_id(&self, id: NodeId) -> Result<Option<Node>>;

    fn get_by_path(&self, path: &str) -> Result<Option<Node>>;

    /// Batch lookup, order-preserving per input. Missing ids are silently
    /// omitted; the caller decides whether that is an error.
    fn get_by_ids(&self, ids: &[NodeId]) -> Result<Vec<Node>>;

    /// Plant a new root (non-leaf, locally managed, `path = name`).
    /// Fails with `InvalidArgument` on a bad name and `Conflict` if the path
    /// is taken.
    fn create_root(&mut self, name: &str, note: &str) -> Result<Node>;

    /// Create a child under `parent`. Fails with `Forbidden` if the parent is
    /// foreign-managed, `InvalidArgument` if the name is malformed or the
    /// parent is a leaf, and `Conflict` if the derived path already exists.
    fn create_child(&mut self, parent: &Node, spec: &NodeSpec) -> Result<Node>;

    /// Rename `node`, rewriting its own path and every descendant's path in
    /// one atomic unit. Fails with `Forbidden` on foreign-managed nodes,
    /// `InvalidArgument` on a bad name, `Conflict` on path collision.
    /// Returns the updated node.
    fn rename(&mut self, node: &Node, new_name: &str) -> Result<Node>;

    /// Delete `node`. Fails with `Forbidden` on foreign-managed nodes and
    /// `Conflict` while the node still has children or bindings.
    fn delete(&mut self, node: &Node) -> Result<()>;

    /// Case-sensitive substring search over `path`, ordered by path, capped
    /// at `limit`.
    fn query_path(&self, query: &str, limit: usize) -> Result<Vec<Node>>;

    /// Direct children of `node`, ordered by name.
    fn children(&self, node: &Node) -> Result<Vec<Node>>;

    /// All leaf nodes at or below `path` (path-prefix match at segment
    /// boundaries).
    fn leaves_under(&self, path: &str) -> Result<Vec<Node>>;
}

/// Read/intake access to the externally-owned endpoint directory. The tree
/// surface never edits endpoints; `register_endpoint` exists for the owner's
/// sync path (and fixtures) to feed the shared store.
pub trait EndpointDirectory {
    /// Upsert by ident.
    fn register_endpoint(&mut self, ident: &str, alias: &str) -> Result<Endpoint>;

    /// Best-effort batch resolution; unknown idents are silently dropped.
    fn endpoint_ids_by_idents(&self, idents: &[&str]) -> Result<Vec<EndpointId>>;

    /// Batch fetch, order-preserving per input, missing ids omitted.
    fn endpoints_by_ids(&self, ids: &[EndpointId]) -> Result<Vec<Endpoint>>;
}

/// Durable many-to-many relation between leaf nodes and endpoints.
pub trait BindingStore {
    /// Bind `endpoints` to a leaf node. With `del_old` the node's entire
    /// binding set is atomically replaced by `endpoints`; otherwise the new
    /// pairs are unioned in (idempotent on duplicates). Fails with
    /// `InvalidArgument` on non-leaf nodes and `Forbidden` on
    /// foreign-managed nodes.
    fn bind(&mut self, node: &Node, endpoints: &[EndpointId], del_old: bool) -> Result<()>;

    /// Remove exactly the given pairs; absent pairs are a no-op. Same guards
    /// as [`BindingStore::bind`].
    fn unbind(&mut self, node: &Node, endpoints: &[EndpointId]) -> Result<()>;

    /// The node's current binding set, sorted by endpoint id.
    fn bindings(&self, node: &Node) -> Result<Vec<EndpointId>>;

    /// Count of distinct endpoints bound to any of `leaf_ids` that pass
    /// `filter`.
    fn endpoints_under_total(&self, leaf_ids: &[NodeId], filter: &EndpointFilter) -> Result<u64>;

    /// One page of distinct endpoints bound to any of `leaf_ids`, filtered,
    /// ordered by ident then id. An offset past the total yields an empty
    /// page.
    fn endpoints_under_list(
        &self,
        leaf_ids: &[NodeId],
        filter: &EndpointFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Endpoint>>;
}
