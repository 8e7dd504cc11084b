use std::path::Path;

use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::debug;

use servicetree_core::{
    path, BindingStore, Endpoint, EndpointDirectory, EndpointField, EndpointFilter, EndpointId,
    Error, Node, NodeId, NodeSpec, Result, TreeStore,
};

/// SQLite-backed store for nodes, endpoints, and bindings. One instance owns
/// one connection; concurrent callers open their own instances against the
/// same database file and rely on the schema's unique indexes for arbitration.
pub struct SqliteStore {
    conn: Connection,
}

fn storage(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

/// UNIQUE violations surface as `Conflict` (the path index is the arbiter
/// for racing creates/renames); everything else stays a storage error.
fn classify(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::Conflict(e.to_string())
        }
        _ => storage(e),
    }
}

fn row_to_node(row: &Row<'_>) -> rusqlite::Result<Node> {
    Ok(Node {
        id: NodeId(row.get(0)?),
        parent_id: row.get::<_, Option<i64>>(1)?.map(NodeId),
        name: row.get(2)?,
        path: row.get(3)?,
        leaf: row.get::<_, i64>(4)? != 0,
        kind: row.get(5)?,
        note: row.get(6)?,
    })
}

fn row_to_endpoint(row: &Row<'_>) -> rusqlite::Result<Endpoint> {
    Ok(Endpoint {
        id: EndpointId(row.get(0)?),
        ident: row.get(1)?,
        alias: row.get(2)?,
    })
}

const NODE_COLS: &str = "id, pid, name, path, leaf, kind, note";

fn field_column(field: EndpointField) -> &'static str {
    match field {
        EndpointField::Ident => "ident",
        EndpointField::Alias => "alias",
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

impl SqliteStore {
    pub fn new(db: &Path) -> Result<Self> {
        let conn = Connection::open(db).map_err(storage)?;
        crate::schema::ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        crate::schema::ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    fn node_by_id(conn: &Connection, id: NodeId) -> Result<Option<Node>> {
        conn.query_row(
            &format!("SELECT {NODE_COLS} FROM node WHERE id = ?1"),
            params![id.0],
            row_to_node,
        )
        .optional()
        .map_err(storage)
    }

    fn node_by_path(conn: &Connection, node_path: &str) -> Result<Option<Node>> {
        conn.query_row(
            &format!("SELECT {NODE_COLS} FROM node WHERE path = ?1"),
            params![node_path],
            row_to_node,
        )
        .optional()
        .map_err(storage)
    }

    /// Re-read the caller's node inside the current transaction so guards run
    /// against the committed state, not a possibly stale snapshot.
    fn fresh(tx: &Transaction<'_>, node: &Node) -> Result<Node> {
        Self::node_by_id(tx, node.id)?
            .ok_or_else(|| Error::NotFound(format!("no such node: {}", node.path)))
    }

    fn insert_node(
        tx: &Transaction<'_>,
        pid: Option<NodeId>,
        name: &str,
        node_path: &str,
        leaf: bool,
        kind: i32,
        note: &str,
    ) -> Result<Node> {
        if Self::node_by_path(tx, node_path)?.is_some() {
            return Err(Error::Conflict(format!("{node_path} already exists")));
        }
        tx.execute(
            "INSERT INTO node (pid, name, path, leaf, kind, note) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![pid.map(|p| p.0), name, node_path, leaf as i64, kind, note],
        )
        .map_err(classify)?;
        let id = NodeId(tx.last_insert_rowid());
        Self::node_by_id(tx, id)?
            .ok_or_else(|| Error::Storage("inserted node row not readable".into()))
    }

    fn guard_bindable(tx: &Transaction<'_>, node: &Node) -> Result<Node> {
        let node = Self::fresh(tx, node)?;
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

    fn collect_nodes(&self, sql: &str, sql_params: &[&dyn ToSql]) -> Result<Vec<Node>> {
        let mut stmt = self.conn.prepare(sql).map_err(storage)?;
        let rows = stmt.query_map(sql_params, row_to_node).map_err(storage)?;
        let mut out = Vec::new();
        for node in rows {
            out.push(node.map_err(storage)?);
        }
        Ok(out)
    }
}

impl TreeStore for SqliteStore {
    fn get_by_id(&self, id: NodeId) -> Result<Option<Node>> {
        Self::node_by_id(&self.conn, id)
    }

    fn get_by_path(&self, node_path: &str) -> Result<Option<Node>> {
        Self::node_by_path(&self.conn, node_path)
    }

    fn get_by_ids(&self, ids: &[NodeId]) -> Result<Vec<Node>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(node) = self.get_by_id(*id)? {
                out.push(node);
            }
        }
        Ok(out)
    }

    fn create_root(&mut self, name: &str, note: &str) -> Result<Node> {
        if !path::is_valid_segment(name) {
            return Err(Error::InvalidArgument(format!(
                "name valid characters: [a-zA-Z0-9] and -, got {name:?}"
            )));
        }
        let tx = self.conn.transaction().map_err(storage)?;
        let node = Self::insert_node(&tx, None, name, name, false, 0, note)?;
        tx.commit().map_err(storage)?;
        debug!(path = %node.path, id = node.id.0, "created root");
        Ok(node)
    }

    fn create_child(&mut self, parent: &Node, spec: &NodeSpec) -> Result<Node> {
        if !path::is_valid_segment(&spec.name) {
            return Err(Error::InvalidArgument(format!(
                "name valid characters: [a-zA-Z0-9] and -, got {:?}",
                spec.name
            )));
        }
        let tx = self.conn.transaction().map_err(storage)?;
        let parent = Self::fresh(&tx, parent)?;
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
        let node = Self::insert_node(
            &tx,
            Some(parent.id),
            &spec.name,
            &new_path,
            spec.leaf,
            spec.kind,
            &spec.note,
        )?;
        tx.commit().map_err(storage)?;
        debug!(path = %node.path, id = node.id.0, "created child");
        Ok(node)
    }

    fn rename(&mut self, node: &Node, new_name: &str) -> Result<Node> {
        let tx = self.conn.transaction().map_err(storage)?;
        let node = Self::fresh(&tx, node)?;
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
        if Self::node_by_path(&tx, &new_path)?.is_some() {
            return Err(Error::Conflict(format!("{new_path} already exists")));
        }

        let old_path = node.path.clone();
        tx.execute(
            "UPDATE node SET name = ?1, path = ?2 WHERE id = ?3",
            params![new_name, new_path, node.id.0],
        )
        .map_err(classify)?;
        // Rewrite the whole subtree in the same transaction: descendants are
        // exactly the rows whose path starts with the old path plus a dot.
        let moved = tx
            .execute(
                "UPDATE node SET path = ?1 || substr(path, ?2) \
                 WHERE substr(path, 1, ?3) = ?4",
                params![
                    new_path,
                    old_path.len() as i64 + 1,
                    old_path.len() as i64 + 1,
                    format!("{old_path}.")
                ],
            )
            .map_err(classify)?;

        let renamed = Self::node_by_id(&tx, node.id)?
            .ok_or_else(|| Error::Storage("renamed node vanished".into()))?;
        tx.commit().map_err(storage)?;
        debug!(from = %old_path, to = %renamed.path, descendants = moved, "renamed subtree");
        Ok(renamed)
    }

    fn delete(&mut self, node: &Node) -> Result<()> {
        let tx = self.conn.transaction().map_err(storage)?;
        let node = Self::fresh(&tx, node)?;
        if !node.locally_managed() {
            return Err(Error::Forbidden(format!(
                "node {} is managed by another subsystem",
                node.path
            )));
        }
        let children: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM node WHERE pid = ?1",
                params![node.id.0],
                |row| row.get(0),
            )
            .map_err(storage)?;
        if children > 0 {
            return Err(Error::Conflict(format!("{} still has children", node.path)));
        }
        let bound: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM node_endpoint WHERE node_id = ?1",
                params![node.id.0],
                |row| row.get(0),
            )
            .map_err(storage)?;
        if bound > 0 {
            return Err(Error::Conflict(format!(
                "{} still has endpoint bindings",
                node.path
            )));
        }
        tx.execute("DELETE FROM node WHERE id = ?1", params![node.id.0])
            .map_err(storage)?;
        tx.commit().map_err(storage)?;
        debug!(path = %node.path, id = node.id.0, "deleted node");
        Ok(())
    }

    fn query_path(&self, query: &str, limit: usize) -> Result<Vec<Node>> {
        // LIKE is case-insensitive for ASCII in SQLite; instr keeps the
        // substring match case-sensitive.
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.collect_nodes(
            &format!(
                "SELECT {NODE_COLS} FROM node \
                 WHERE ?1 = '' OR instr(path, ?1) > 0 \
                 ORDER BY path LIMIT ?2"
            ),
            &[&query, &limit],
        )
    }

    fn children(&self, node: &Node) -> Result<Vec<Node>> {
        self.collect_nodes(
            &format!("SELECT {NODE_COLS} FROM node WHERE pid = ?1 ORDER BY name"),
            &[&node.id.0],
        )
    }

    fn leaves_under(&self, prefix: &str) -> Result<Vec<Node>> {
        let dotted = format!("{prefix}.");
        let dotted_len = dotted.len() as i64;
        self.collect_nodes(
            &format!(
                "SELECT {NODE_COLS} FROM node \
                 WHERE leaf = 1 AND (path = ?1 OR substr(path, 1, ?2) = ?3) \
                 ORDER BY path"
            ),
            &[&prefix, &dotted_len, &dotted],
        )
    }
}

impl EndpointDirectory for SqliteStore {
    fn register_endpoint(&mut self, ident: &str, alias: &str) -> Result<Endpoint> {
        self.conn
            .execute(
                "INSERT INTO endpoint (ident, alias) VALUES (?1, ?2) \
                 ON CONFLICT(ident) DO UPDATE SET alias = excluded.alias",
                params![ident, alias],
            )
            .map_err(storage)?;
        self.conn
            .query_row(
                "SELECT id, ident, alias FROM endpoint WHERE ident = ?1",
                params![ident],
                row_to_endpoint,
            )
            .map_err(storage)
    }

    fn endpoint_ids_by_idents(&self, idents: &[&str]) -> Result<Vec<EndpointId>> {
        let mut out = Vec::new();
        for ident in idents {
            let id: Option<i64> = self
                .conn
                .query_row(
                    "SELECT id FROM endpoint WHERE ident = ?1",
                    params![ident],
                    |row| row.get(0),
                )
                .optional()
                .map_err(storage)?;
            if let Some(id) = id {
                out.push(EndpointId(id));
            }
        }
        Ok(out)
    }

    fn endpoints_by_ids(&self, ids: &[EndpointId]) -> Result<Vec<Endpoint>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let ep = self
                .conn
                .query_row(
                    "SELECT id, ident, alias FROM endpoint WHERE id = ?1",
                    params![id.0],
                    row_to_endpoint,
                )
                .optional()
                .map_err(storage)?;
            if let Some(ep) = ep {
                out.push(ep);
            }
        }
        Ok(out)
    }
}

impl BindingStore for SqliteStore {
    fn bind(&mut self, node: &Node, endpoints: &[EndpointId], del_old: bool) -> Result<()> {
        let tx = self.conn.transaction().map_err(storage)?;
        let node = Self::guard_bindable(&tx, node)?;
        if del_old {
            tx.execute(
                "DELETE FROM node_endpoint WHERE node_id = ?1",
                params![node.id.0],
            )
            .map_err(storage)?;
        }
        for ep in endpoints {
            tx.execute(
                "INSERT OR IGNORE INTO node_endpoint (node_id, endpoint_id) VALUES (?1, ?2)",
                params![node.id.0, ep.0],
            )
            .map_err(storage)?;
        }
        tx.commit().map_err(storage)?;
        debug!(path = %node.path, endpoints = endpoints.len(), del_old, "bound endpoints");
        Ok(())
    }

    fn unbind(&mut self, node: &Node, endpoints: &[EndpointId]) -> Result<()> {
        let tx = self.conn.transaction().map_err(storage)?;
        let node = Self::guard_bindable(&tx, node)?;
        for ep in endpoints {
            tx.execute(
                "DELETE FROM node_endpoint WHERE node_id = ?1 AND endpoint_id = ?2",
                params![node.id.0, ep.0],
            )
            .map_err(storage)?;
        }
        tx.commit().map_err(storage)?;
        debug!(path = %node.path, endpoints = endpoints.len(), "unbound endpoints");
        Ok(())
    }

    fn bindings(&self, node: &Node) -> Result<Vec<EndpointId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT endpoint_id FROM node_endpoint WHERE node_id = ?1 ORDER BY endpoint_id")
            .map_err(storage)?;
        let rows = stmt
            .query_map(params![node.id.0], |row| row.get::<_, i64>(0))
            .map_err(storage)?;
        let mut out = Vec::new();
        for id in rows {
            out.push(EndpointId(id.map_err(storage)?));
        }
        Ok(out)
    }

    fn endpoints_under_total(&self, leaf_ids: &[NodeId], filter: &EndpointFilter) -> Result<u64> {
        if leaf_ids.is_empty() {
            return Ok(0);
        }
        let (clause, values) = under_filter_clause(leaf_ids, filter);
        let sql = format!("SELECT COUNT(DISTINCT e.id) {clause}");
        let sql_params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
        let total: i64 = self
            .conn
            .query_row(&sql, sql_params.as_slice(), |row| row.get(0))
            .map_err(storage)?;
        Ok(total.max(0) as u64)
    }

    fn endpoints_under_list(
        &self,
        leaf_ids: &[NodeId],
        filter: &EndpointFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Endpoint>> {
        if leaf_ids.is_empty() {
            return Ok(Vec::new());
        }
        let (clause, mut values) = under_filter_clause(leaf_ids, filter);
        let sql = format!(
            "SELECT DISTINCT e.id, e.ident, e.alias {clause} \
             ORDER BY e.ident, e.id LIMIT ? OFFSET ?"
        );
        values.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));
        values.push(Box::new(i64::try_from(offset).unwrap_or(i64::MAX)));
        let sql_params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql).map_err(storage)?;
        let rows = stmt
            .query_map(sql_params.as_slice(), row_to_endpoint)
            .map_err(storage)?;
        let mut out = Vec::new();
        for ep in rows {
            out.push(ep.map_err(storage)?);
        }
        Ok(out)
    }
}

/// Shared FROM/WHERE tail for the endpoints-under count and list queries.
/// All placeholders are positional; the returned values line up with them.
fn under_filter_clause(
    leaf_ids: &[NodeId],
    filter: &EndpointFilter,
) -> (String, Vec<Box<dyn ToSql>>) {
    let column = field_column(filter.field);
    let mut clause = format!(
        "FROM endpoint e JOIN node_endpoint ne ON ne.endpoint_id = e.id \
         WHERE ne.node_id IN ({}) AND (? = '' OR instr(e.{column}, ?) > 0)",
        placeholders(leaf_ids.len())
    );
    let mut values: Vec<Box<dyn ToSql>> = Vec::with_capacity(leaf_ids.len() + 2);
    for id in leaf_ids {
        values.push(Box::new(id.0));
    }
    values.push(Box::new(filter.query.clone()));
    values.push(Box::new(filter.query.clone()));
    if !filter.batch.is_empty() {
        clause.push_str(&format!(" AND e.ident IN ({})", placeholders(filter.batch.len())));
        for ident in &filter.batch {
            values.push(Box::new(ident.clone()));
        }
    }
    (clause, values)
}
