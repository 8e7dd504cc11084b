use rusqlite::Connection;
use servicetree_core::{Error, Result};
use tracing::info;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS node (
  id   INTEGER PRIMARY KEY AUTOINCREMENT,
  pid  INTEGER,
  name TEXT NOT NULL,
  path TEXT NOT NULL,
  leaf INTEGER NOT NULL DEFAULT 0,
  kind INTEGER NOT NULL DEFAULT 0,
  note TEXT NOT NULL DEFAULT ''
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_node_path ON node(path);
CREATE INDEX IF NOT EXISTS idx_node_pid ON node(pid);

CREATE TABLE IF NOT EXISTS endpoint (
  id    INTEGER PRIMARY KEY AUTOINCREMENT,
  ident TEXT NOT NULL,
  alias TEXT NOT NULL DEFAULT ''
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_endpoint_ident ON endpoint(ident);

CREATE TABLE IF NOT EXISTS node_endpoint (
  node_id     INTEGER NOT NULL,
  endpoint_id INTEGER NOT NULL,
  PRIMARY KEY (node_id, endpoint_id)
);
"#;

pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)
        .map_err(|e| Error::Storage(e.to_string()))?;
    info!("service-tree schema ready");
    Ok(())
}
