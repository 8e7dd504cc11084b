#![forbid(unsafe_code)]
//! SQLite-backed persistence for `servicetree-core`.
//!
//! Goal: keep all tree semantics and guard logic reachable through the core
//! traits, while storing state in vanilla SQLite so a single file (or an
//! in-memory database in tests) is the whole deployment. The unique index on
//! `node.path` is the authoritative arbiter for concurrent creates/renames;
//! every multi-row mutation runs inside one transaction.

pub mod config;
mod schema;
mod store;

pub use config::{resolve_config_path, Settings, DEFAULT_CONFIG_CANDIDATES};
pub use schema::ensure_schema;
pub use store::SqliteStore;
