//! SQLite-backed graph store implementation (persistence).

use async_trait::async_trait;
use rusqlite::{ErrorCode, OptionalExtension};
use social_types::{GraphDirection, GraphNode, GraphStore, GraphStoreError, NodeNeighborhood};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Raw node row: (label, key, properties json).
type NodeRow = (String, i64, String);

const NODE_COLUMNS: &str = "n.label, n.key, n.properties";

/// SQLite-backed graph store for persistence.
///
/// Nodes are unique on `(label, key)` and edges on `(label, from_key, to_key, relation)`, so merges
/// are `INSERT OR IGNORE` inside a transaction.
///
/// Every call runs on the blocking pool, so a caller's deadline can give up on a call that is
/// waiting for the connection. The abandoned statement still runs to completion.
pub struct SqliteGraphStore {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteGraphStore {
    /// Open (or create) a SQLite graph store at the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, GraphStoreError> {
        let path = path.as_ref();
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| GraphStoreError::Unavailable(e.to_string()))?;
        tracing::info!(path = %path.display(), "opened sqlite graph store");
        Self::init(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self, GraphStoreError> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| GraphStoreError::Unavailable(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self, GraphStoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS nodes (
                label TEXT NOT NULL,
                key INTEGER NOT NULL,
                properties TEXT NOT NULL,
                created_at TEXT NOT NULL,
                PRIMARY KEY (label, key)
            );

            CREATE TABLE IF NOT EXISTS edges (
                id TEXT PRIMARY KEY,
                label TEXT NOT NULL,
                from_key INTEGER NOT NULL,
                to_key INTEGER NOT NULL,
                relation TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (label, from_key, to_key, relation),
                FOREIGN KEY (label, from_key) REFERENCES nodes(label, key) ON DELETE CASCADE,
                FOREIGN KEY (label, to_key) REFERENCES nodes(label, key) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(label, from_key, relation);
            CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(label, to_key, relation);
            "#,
        )
        .map_err(map_sqlite_err)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, GraphStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T, rusqlite::Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                GraphStoreError::Unavailable(format!("failed to acquire lock: {}", e))
            })?;
            f(&conn).map_err(map_sqlite_err)
        })
        .await
        .map_err(|e| GraphStoreError::Other(format!("sqlite task failed: {}", e)))?
    }
}

fn map_sqlite_err(e: rusqlite::Error) -> GraphStoreError {
    match e.sqlite_error_code() {
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::SystemIoFailure,
        ) => GraphStoreError::Unavailable(e.to_string()),
        _ => GraphStoreError::Other(e.to_string()),
    }
}

fn read_node_row(row: &rusqlite::Row) -> Result<NodeRow, rusqlite::Error> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_node((label, key, properties): NodeRow) -> Result<GraphNode, GraphStoreError> {
    let properties: HashMap<String, serde_json::Value> = serde_json::from_str(&properties)
        .map_err(|e| GraphStoreError::Decode(format!("properties of {}({}): {}", label, key, e)))?;
    Ok(GraphNode {
        label,
        key,
        properties,
    })
}

fn decode_nodes(rows: Vec<NodeRow>) -> Result<Vec<GraphNode>, GraphStoreError> {
    rows.into_iter().map(decode_node).collect()
}

fn neighbor_rows(
    conn: &rusqlite::Connection,
    label: &str,
    key: i64,
    relation: &str,
    direction: GraphDirection,
) -> Result<Vec<NodeRow>, rusqlite::Error> {
    let join = match direction {
        GraphDirection::Outbound => {
            "e.from_key = ?2 AND n.key = e.to_key"
        }
        GraphDirection::Inbound => {
            "e.to_key = ?2 AND n.key = e.from_key"
        }
        GraphDirection::Both => {
            "((e.from_key = ?2 AND n.key = e.to_key) OR (e.to_key = ?2 AND n.key = e.from_key))"
        }
    };
    let sql = format!(
        "SELECT DISTINCT {} FROM edges e JOIN nodes n ON n.label = e.label
         WHERE e.label = ?1 AND e.relation = ?3 AND {}
         ORDER BY n.key",
        NODE_COLUMNS, join
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params![label, key, relation], read_node_row)?;
    rows.collect()
}

fn node_row(
    conn: &rusqlite::Connection,
    label: &str,
    key: i64,
) -> Result<Option<NodeRow>, rusqlite::Error> {
    conn.query_row(
        &format!(
            "SELECT {} FROM nodes n WHERE n.label = ?1 AND n.key = ?2",
            NODE_COLUMNS
        ),
        rusqlite::params![label, key],
        read_node_row,
    )
    .optional()
}

enum EdgeMerge {
    Merged(bool),
    MissingNode(i64),
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn merge_node(
        &self,
        label: &str,
        key: i64,
        properties: &HashMap<String, serde_json::Value>,
    ) -> Result<bool, GraphStoreError> {
        let properties_json =
            serde_json::to_string(properties).map_err(|e| GraphStoreError::Other(e.to_string()))?;
        let now = chrono::Utc::now().to_rfc3339();
        let label = label.to_string();

        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO nodes (label, key, properties, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![label, key, properties_json, now],
            )?;
            tx.commit()?;
            Ok(inserted > 0)
        })
        .await
    }

    async fn get_node(&self, label: &str, key: i64) -> Result<Option<GraphNode>, GraphStoreError> {
        let label = label.to_string();
        let row = self
            .with_conn(move |conn| node_row(conn, &label, key))
            .await?;
        row.map(decode_node).transpose()
    }

    async fn list_nodes(&self, label: &str, limit: usize) -> Result<Vec<GraphNode>, GraphStoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let label = label.to_string();
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM nodes n WHERE n.label = ?1 ORDER BY n.key LIMIT ?2",
                    NODE_COLUMNS
                ))?;
                let rows = stmt.query_map(rusqlite::params![label, limit], read_node_row)?;
                rows.collect::<Result<Vec<_>, _>>()
            })
            .await?;
        decode_nodes(rows)
    }

    async fn search_nodes(
        &self,
        label: &str,
        property: &str,
        needle: &str,
        limit: usize,
    ) -> Result<Vec<GraphNode>, GraphStoreError> {
        // SQLite's lower() only folds ASCII, so matching happens on decoded properties.
        let needle = needle.to_lowercase();
        let label = label.to_string();
        let property = property.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM nodes n WHERE n.label = ?1 ORDER BY n.key",
                NODE_COLUMNS
            ))?;
            let mut rows = stmt.query(rusqlite::params![label])?;
            let mut hits = Vec::new();
            while hits.len() < limit {
                let Some(row) = rows.next()? else { break };
                let node = match decode_node(read_node_row(row)?) {
                    Ok(node) => node,
                    Err(e) => return Ok(Err(e)),
                };
                let matched = node
                    .str_property(&property)
                    .map(|v| v.to_lowercase().contains(&needle))
                    .unwrap_or(false);
                if matched {
                    hits.push(node);
                }
            }
            Ok(Ok(hits))
        })
        .await?
    }

    async fn merge_edge(
        &self,
        label: &str,
        from: i64,
        to: i64,
        relation: &str,
    ) -> Result<bool, GraphStoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let owned_label = label.to_string();
        let relation = relation.to_string();

        let outcome = self
            .with_conn(move |conn| {
                let tx = conn.unchecked_transaction()?;
                for key in [from, to] {
                    if node_row(&tx, &owned_label, key)?.is_none() {
                        return Ok(EdgeMerge::MissingNode(key));
                    }
                }
                let inserted = tx.execute(
                    "INSERT OR IGNORE INTO edges (id, label, from_key, to_key, relation, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![id, owned_label, from, to, relation, now],
                )?;
                tx.commit()?;
                Ok(EdgeMerge::Merged(inserted > 0))
            })
            .await?;

        match outcome {
            EdgeMerge::Merged(created) => Ok(created),
            EdgeMerge::MissingNode(key) => Err(GraphStoreError::NodeNotFound {
                label: label.to_string(),
                key,
            }),
        }
    }

    async fn delete_edge(
        &self,
        label: &str,
        from: i64,
        to: i64,
        relation: &str,
    ) -> Result<bool, GraphStoreError> {
        let label = label.to_string();
        let relation = relation.to_string();
        self.with_conn(move |conn| {
            let tx = conn.unchecked_transaction()?;
            let deleted = tx.execute(
                "DELETE FROM edges WHERE label = ?1 AND from_key = ?2 AND to_key = ?3 AND relation = ?4",
                rusqlite::params![label, from, to, relation],
            )?;
            tx.commit()?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn get_neighbors(
        &self,
        label: &str,
        key: i64,
        relation: &str,
        direction: GraphDirection,
    ) -> Result<Vec<GraphNode>, GraphStoreError> {
        let label = label.to_string();
        let relation = relation.to_string();
        let rows = self
            .with_conn(move |conn| neighbor_rows(conn, &label, key, &relation, direction))
            .await?;
        decode_nodes(rows)
    }

    async fn get_neighborhood(
        &self,
        label: &str,
        key: i64,
        relation: &str,
    ) -> Result<Option<NodeNeighborhood>, GraphStoreError> {
        let label = label.to_string();
        let relation = relation.to_string();
        let rows = self
            .with_conn(move |conn| {
                // Read transaction so all three reads see one snapshot; dropped without commit.
                let tx = conn.unchecked_transaction()?;
                let Some(node) = node_row(&tx, &label, key)? else {
                    return Ok(None);
                };
                let inbound = neighbor_rows(&tx, &label, key, &relation, GraphDirection::Inbound)?;
                let outbound =
                    neighbor_rows(&tx, &label, key, &relation, GraphDirection::Outbound)?;
                Ok(Some((node, inbound, outbound)))
            })
            .await?;

        let Some((node, inbound, outbound)) = rows else {
            return Ok(None);
        };
        Ok(Some(NodeNeighborhood {
            node: decode_node(node)?,
            inbound: decode_nodes(inbound)?,
            outbound: decode_nodes(outbound)?,
        }))
    }

    async fn ping(&self) -> Result<(), GraphStoreError> {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map(|_| ())
    }
}
