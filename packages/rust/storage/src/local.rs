//! Local graph store on an embedded libSQL database.
//!
//! Nodes are keyed by the sha256 of their identity key, so writing the same
//! entity twice updates one row. Edges are keyed by `(kind, from, to)`.
//! Properties from later writes are merged over earlier ones.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use docgraph_shared::{DocGraphError, Graph, GraphNode, NodeKind, Result};

use crate::migrations;
use crate::{GraphStore, StoreStats};

fn storage_err(e: impl std::fmt::Display) -> DocGraphError {
    DocGraphError::Storage(e.to_string())
}

/// Primary key of a node row.
pub fn node_id(node: &GraphNode) -> String {
    format!("{:x}", Sha256::digest(node.identity().as_bytes()))
}

/// Graph store backed by a local libSQL file.
pub struct LibsqlGraphStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    path: PathBuf,
}

impl LibsqlGraphStore {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DocGraphError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let store = Self {
            db,
            conn,
            path: path.to_path_buf(),
        };
        store.run_migrations().await?;
        info!(path = %path.display(), "opened local graph store");
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    DocGraphError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 before the first migration.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    /// Number of distinct nodes stored.
    pub async fn count_nodes(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM nodes").await
    }

    /// Number of distinct edges stored.
    pub async fn count_edges(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM edges").await
    }

    async fn count(&self, sql: &str) -> Result<u64> {
        let mut rows = self.conn.query(sql, params![]).await.map_err(storage_err)?;
        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(storage_err)?.max(0) as u64),
            None => Ok(0),
        }
    }

    /// Look up a stored node by the identity of `probe`.
    pub async fn get_node(&self, probe: &GraphNode) -> Result<Option<GraphNode>> {
        let id = node_id(probe);
        let mut rows = self
            .conn
            .query(
                "SELECT kind, properties_json FROM nodes WHERE id = ?1",
                params![id.as_str()],
            )
            .await
            .map_err(storage_err)?;

        let Some(row) = rows.next().await.map_err(storage_err)? else {
            return Ok(None);
        };
        let kind = parse_kind(&row.get::<String>(0).map_err(storage_err)?)?;
        let properties: BTreeMap<String, String> =
            serde_json::from_str(&row.get::<String>(1).map_err(storage_err)?)
                .map_err(storage_err)?;
        Ok(Some(GraphNode { kind, properties }))
    }
}

/// Insert or merge one node, returning its row id.
async fn upsert_node(conn: &Connection, node: &GraphNode, now: &str) -> Result<String> {
    let id = node_id(node);
    let properties = serde_json::to_string(&node.properties).map_err(storage_err)?;
    conn.execute(
        "INSERT INTO nodes (id, kind, identity, properties_json, first_seen, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(id) DO UPDATE SET
           properties_json = json_patch(nodes.properties_json, excluded.properties_json),
           updated_at = excluded.updated_at",
        params![
            id.as_str(),
            node.kind.label(),
            node.identity(),
            properties.as_str(),
            now
        ],
    )
    .await
    .map_err(storage_err)?;
    Ok(id)
}

fn parse_kind(label: &str) -> Result<NodeKind> {
    match label {
        "Package" => Ok(NodeKind::Package),
        "Artifact" => Ok(NodeKind::Artifact),
        "Vulnerability" => Ok(NodeKind::Vulnerability),
        other => Err(DocGraphError::Storage(format!("unknown node kind {other:?}"))),
    }
}

#[async_trait]
impl GraphStore for LibsqlGraphStore {
    #[instrument(skip_all, fields(nodes = graph.nodes.len(), edges = graph.edges.len()))]
    async fn store_graph(&self, graph: &Graph) -> Result<StoreStats> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction().await.map_err(storage_err)?;

        for node in &graph.nodes {
            upsert_node(&tx, node, &now).await?;
        }

        for edge in &graph.edges {
            let from = upsert_node(&tx, &edge.from, &now).await?;
            let to = upsert_node(&tx, &edge.to, &now).await?;
            let properties = serde_json::to_string(&edge.properties).map_err(storage_err)?;
            tx.execute(
                "INSERT INTO edges (kind, from_id, to_id, properties_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(kind, from_id, to_id) DO UPDATE SET
                   properties_json = json_patch(edges.properties_json, excluded.properties_json),
                   updated_at = excluded.updated_at",
                params![
                    edge.kind.label(),
                    from.as_str(),
                    to.as_str(),
                    properties.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)?;
        debug!("graph committed");

        Ok(StoreStats {
            nodes: graph.nodes.len(),
            edges: graph.edges.len(),
        })
    }

    fn backend(&self) -> &str {
        "libsql"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgraph_shared::{EdgeKind, GraphEdge};
    use uuid::Uuid;

    async fn test_store() -> LibsqlGraphStore {
        let tmp = std::env::temp_dir().join(format!("docgraph_test_{}.db", Uuid::now_v7()));
        LibsqlGraphStore::open(&tmp).await.expect("open test db")
    }

    fn package(name: &str, version: &str) -> GraphNode {
        GraphNode::new(NodeKind::Package)
            .with_property("name", name)
            .with_property("version", version)
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let store = test_store().await;
        assert_eq!(store.schema_version().await, 1);
        assert_eq!(store.count_nodes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("docgraph_test_{}.db", Uuid::now_v7()));
        let first = LibsqlGraphStore::open(&tmp).await.expect("first open");
        drop(first);
        let second = LibsqlGraphStore::open(&tmp).await.expect("second open");
        assert_eq!(second.schema_version().await, 1);
    }

    #[tokio::test]
    async fn duplicate_nodes_collapse_to_one_row() {
        let store = test_store().await;
        let graph = Graph {
            nodes: vec![package("lodash", "4.17.20"), package("lodash", "4.17.20")],
            edges: vec![],
        };

        let stats = store.store_graph(&graph).await.expect("store");
        assert_eq!(stats.nodes, 2);
        assert_eq!(store.count_nodes().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn later_writes_merge_properties() {
        let store = test_store().await;
        store
            .store_graph(&Graph {
                nodes: vec![package("lodash", "4.17.20")],
                edges: vec![],
            })
            .await
            .unwrap();
        store
            .store_graph(&Graph {
                nodes: vec![package("lodash", "4.17.20").with_property("spdx_id", "SPDXRef-lodash")],
                edges: vec![],
            })
            .await
            .unwrap();

        let stored = store
            .get_node(&package("lodash", "4.17.20"))
            .await
            .unwrap()
            .expect("node exists");
        assert_eq!(stored.kind, NodeKind::Package);
        assert_eq!(stored.property("spdx_id"), Some("SPDXRef-lodash"));
        assert_eq!(stored.property("name"), Some("lodash"));
    }

    #[tokio::test]
    async fn edges_upsert_and_create_endpoints() {
        let store = test_store().await;
        let vuln = GraphNode::new(NodeKind::Vulnerability).with_property("id", "CVE-2021-23337");
        let edge = GraphEdge::new(EdgeKind::Vulnerable, package("lodash", "4.17.20"), vuln);
        let graph = Graph {
            nodes: vec![],
            edges: vec![edge.clone(), edge],
        };

        let stats = store.store_graph(&graph).await.unwrap();
        assert_eq!(stats.edges, 2);
        assert_eq!(store.count_edges().await.unwrap(), 1);
        assert_eq!(store.count_nodes().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn files_without_digest_keep_their_own_rows() {
        let store = test_store().await;
        let file = |name: &str| {
            GraphNode::new(NodeKind::Artifact)
                .with_property("namespace", "https://example.com/app-1.0.0")
                .with_property("name", name)
        };
        let app = package("app", "1.0.0");
        let graph = Graph {
            nodes: vec![app.clone(), file("./a.js"), file("./b.js")],
            edges: vec![
                GraphEdge::new(EdgeKind::Contains, app.clone(), file("./a.js")),
                GraphEdge::new(EdgeKind::Contains, app, file("./b.js")),
            ],
        };

        store.store_graph(&graph).await.unwrap();
        assert_eq!(store.count_nodes().await.unwrap(), 3);
        assert_eq!(store.count_edges().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn missing_node_is_none() {
        let store = test_store().await;
        assert!(store.get_node(&package("ghost", "0.0.0")).await.unwrap().is_none());
    }

    #[test]
    fn node_id_is_stable_hex() {
        let id = node_id(&package("a", "1"));
        assert_eq!(id.len(), 64);
        assert_eq!(id, node_id(&package("a", "1")));
        assert_ne!(id, node_id(&package("a", "2")));
    }
}
