#![forbid(unsafe_code)]
//! Core primitives for a hierarchical service tree with pluggable storage.
//! Nodes are addressed by a materialized dotted path; leaf nodes carry
//! endpoint bindings. This crate stays independent of concrete storage
//! engines so backends (SQLite, in-memory, ...) can satisfy the traits
//! defined here.

pub mod error;
pub mod ids;
pub mod memory;
pub mod node;
pub mod path;
pub mod query;
pub mod traits;

pub use error::{Error, Result};
pub use ids::{EndpointId, NodeId};
pub use memory::MemoryStore;
pub use node::{Endpoint, EndpointField, EndpointFilter, Node, NodeSpec, KIND_LOCAL};
pub use query::{ancestor_ids, endpoints_under_list, endpoints_under_total, leaf_ids};
pub use traits::{BindingStore, EndpointDirectory, TreeStore, DEFAULT_QUERY_LIMIT};
