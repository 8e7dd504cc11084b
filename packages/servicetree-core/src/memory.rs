use std::collections::{BTreeSet, HashMap};

use crate::error::{Error, Result};
use crate::ids::{EndpointId, NodeId};
use crate::node::{Endpoint, EndpointFilter, Node, NodeSpec, KIND_LOCAL};
use crate::path;
use crate::traits::{BindingStore, EndpointDirectory, TreeStore};

/// HashMap-backed implementation of the store traits for tests, prototyping,
/// and embedding without a durable engine. Semantics match the SQL backends;
/// atomicity is trivial because every mutation runs under `&mut self`.
#[derive(Default)]
pub struct MemoryStore {
    nodes: HashMap<NodeId, Node>,
    by_path: HashMap<String, NodeId>,
    endpoints: HashMap<EndpointId, Endpoint>,
    by_ident: HashMap<String, EndpointId>,
    bindings: HashMap<NodeId, BTreeSet<EndpointId>>,
    next_node_id: i64,
    next_endpoint_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh(&self, node: &Node) -> Result<Node> {
        self.nodes
            .get(&node.id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("no such node: {}", node.path)))
    }

    fn insert_node(&mut self, node: Node) -> Node {
        self.by_path.insert(node.path.clone(), node.id);
        self.nodes.insert(node.id, node.clone());
        node
    }

    fn alloc_node_id(&mut self) -> NodeId {
        self.next_node_id += 1;
        NodeId(self.next_node_id)
    }
}

impl TreeStore for MemoryStore {
    fn get_by_id(&self, id: NodeId) -> Result<Option<Node>> {
        Ok(self.nodes.get(&id).cloned())
    }

    fn get_by_path(&self, path: &str) -> Result<Option<Node>> {
        Ok(self.by_path.get(path).and_then(|id| self.nodes.get(id)).cloned())
    }

    fn get_by_ids(&self, ids: &[NodeId]) -> Result<Vec<Node>> {
        Ok(ids.iter().filter_map(|id| self.nodes.get(id)).cloned().collect())
    }

    fn create_root(&mut self, name: &str, note: &str) -> Result<Node> {
        if !path::is_valid_segment(name) {
            return Err(Error::InvalidArgument(format!(
                "name valid characters: [a-zA-Z0-9] and -, got {name:?}"
            )));
        }
        if self.by_path.contains_key(name) {
            return Err(Error::Conflict(format!("{name} already exists")));
        }
        let id = self.alloc_node_id();
        Ok(self.insert_node(Node {
            id,
            parent_id: None,
            name: name.to_string(),
            path: name.to_string(),
            leaf: false,
            kind: KIND_LOCAL,
            note: note.to_string(),
        }))
    }

    fn create_child(&mut self, parent: &Node, spec: &NodeSpec) -> Result<Node> {
        if !path::is_valid_segment(&spec.name) {
            return Err(Error::InvalidArgument(format!(
                "name valid characters: [a-zA-Z0-9] and -, got {:?}",
                spec.name
            )));
        }
        let parent = self.fresh(parent)?;
        if !parent.locally_managed() {
            return Err(Error::Forbidden(format!(
                "node {} is managed by another subsystem",
                parent.path
            )));
        }
        if parent.leaf {
            return Err(Error::InvalidArgument(format!(
                "leaf node {} cannot have children",
                parent.path
            )));
        }
        let new_path = path::join(&parent.path, &spec.name);
        if self.by_path.contains_key(&new_path) {
            return Err(Error::Conflict(format!("{new_path} already exists")));
        }
        let id = self.alloc_node_id();
        Ok(self.insert_node(Node {
            id,
            parent_id: Some(parent.id),
            name: spec.name.clone(),
            path: new_path,
            leaf: spec.leaf,
            kind: spec.kind,
            note: spec.note.clone(),
        }))
    }

    fn rename(&mut self, node: &Node, new_name: &str) -> Result<Node> {
        let node = self.fresh(node)?;
        if !node.locally_managed() {
            return Err(Error::Forbidden(format!(
                "node {} is managed by another subsystem",
                node.path
            )));
        }
        if !path::is_valid_segment(new_name) {
            return Err(Error::InvalidArgument(format!(
                "name valid characters: [a-zA-Z0-9] and -, got {new_name:?}"
            )));
        }
        let new_path = match path::parent_of(&node.path) {
            Some(parent_path) => path::join(parent_path, new_name),
            None => new_name.to_string(),
        };
        if new_path == node.path {
            return Ok(node);
        }
        if self.by_path.contains_key(&new_path) {
            return Err(Error::Conflict(format!("{new_path} already exists")));
        }

        let old_path = node.path.clone();
        let rewrites: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| path::is_prefix_of(&old_path, &n.path))
            .map(|n| n.id)
            .collect();
        for id in rewrites {
            let n = self.nodes.get_mut(&id).expect("enumerated above");
            self.by_path.remove(&n.path);
            n.path = format!("{new_path}{}", &n.path[old_path.len()..]);
            if id == node.id {
                n.name = new_name.to_string();
            }
            self.by_path.insert(n.path.clone(), id);
        }
        self.get_by_id(node.id)?
            .ok_or_else(|| Error::Storage("renamed node vanished".into()))
    }

    fn delete(&mut self, node: &Node) -> Result<()> {
        let node = self.fresh(node)?;
        if !node.locally_managed() {
            return Err(Error::Forbidden(format!(
                "node {} is managed by another subsystem",
                node.path
            )));
        }
        if self.nodes.values().any(|n| n.parent_id == Some(node.id)) {
            return Err(Error::Conflict(format!("{} still has children", node.path)));
        }
        if self.bindings.get(&node.id).is_some_and(|b| !b.is_empty()) {
            return Err(Error::Conflict(format!(
                "{} still has endpoint bindings",
                node.path
            )));
        }
        self.by_path.remove(&node.path);
        self.bindings.remove(&node.id);
        self.nodes.remove(&node.id);
        Ok(())
    }

    fn query_path(&self, query: &str, limit: usize) -> Result<Vec<Node>> {
        let mut out: Vec<Node> = self
            .nodes
            .values()
            .filter(|n| n.path.contains(query))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        out.truncate(limit);
        Ok(out)
    }

    fn children(&self, node: &Node) -> Result<Vec<Node>> {
        let mut out: Vec<Node> = self
            .nodes
            .values()
            .filter(|n| n.parent_id == Some(node.id))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn leaves_under(&self, prefix: &str) -> Result<Vec<Node>> {
        let mut out: Vec<Node> = self
            .nodes
            .values()
            .filter(|n| n.leaf && path::is_prefix_of(prefix, &n.path))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }
}

impl EndpointDirectory for MemoryStore {
    fn register_endpoint(&mut self, ident: &str, alias: &str) -> Result<Endpoint> {
        if let Some(&id) = self.by_ident.get(ident) {
            let ep = self.endpoints.get_mut(&id).expect("ident index entry");
            ep.alias = alias.to_string();
            return Ok(ep.clone());
        }
        self.next_endpoint_id += 1;
        let ep = Endpoint {
            id: EndpointId(self.next_endpoint_id),
            ident: ident.to_string(),
            alias: alias.to_string(),
        };
        self.by_ident.insert(ident.to_string(), ep.id);
        self.endpoints.insert(ep.id, ep.clone());
        Ok(ep)
    }

    fn endpoint_ids_by_idents(&self, idents: &[&str]) -> Result<Vec<EndpointId>> {
        Ok(idents.iter().filter_map(|i| self.by_ident.get(*i)).copied().collect())
    }

    fn endpoints_by_ids(&self, ids: &[EndpointId]) -> Result<Vec<Endpoint>> {
        Ok(ids.iter().filter_map(|id| self.endpoints.get(id)).cloned().collect())
    }
}

impl MemoryStore {
    fn bound_guard(&self, node: &Node) -> Result<Node> {
        let node = self.fresh(node)?;
        if !node.leaf {
            return Err(Error::InvalidArgument(format!(
                "node {} is not a leaf",
                node.path
            )));
        }
        if !node.locally_managed() {
            return Err(Error::Forbidden(format!(
                "node {} is managed by another subsystem",
                node.path
            )));
        }
        Ok(node)
    }

    fn endpoints_under(&self, leaf_ids: &[NodeId], filter: &EndpointFilter) -> Vec<Endpoint> {
        let mut seen = BTreeSet::new();
        for id in leaf_ids {
            if let Some(set) = self.bindings.get(id) {
                seen.extend(set.iter().copied());
            }
        }
        let mut out: Vec<Endpoint> = seen
            .into_iter()
            .filter_map(|id| self.endpoints.get(&id))
            .filter(|ep| filter.matches(ep))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.ident.cmp(&b.ident).then(a.id.cmp(&b.id)));
        out
    }
}

impl BindingStore for MemoryStore {
    fn bind(&mut self, node: &Node, endpoints: &[EndpointId], del_old: bool) -> Result<()> {
        let node = self.bound_guard(node)?;
        let set = self.bindings.entry(node.id).or_default();
        if del_old {
            set.clear();
        }
        set.extend(endpoints.iter().copied());
        Ok(())
    }

    fn unbind(&mut self, node: &Node, endpoints: &[EndpointId]) -> Result<()> {
        let node = self.bound_guard(node)?;
        if let Some(set) = self.bindings.get_mut(&node.id) {
            for id in endpoints {
                set.remove(id);
            }
        }
        Ok(())
    }

    fn bindings(&self, node: &Node) -> Result<Vec<EndpointId>> {
        Ok(self
            .bindings
            .get(&node.id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default())
    }

    fn endpoints_under_total(&self, leaf_ids: &[NodeId], filter: &EndpointFilter) -> Result<u64> {
        Ok(self.endpoints_under(leaf_ids, filter).len() as u64)
    }

    fn endpoints_under_list(
        &self,
        leaf_ids: &[NodeId],
        filter: &EndpointFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Endpoint>> {
        Ok(self
            .endpoints_under(leaf_ids, filter)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }
}
