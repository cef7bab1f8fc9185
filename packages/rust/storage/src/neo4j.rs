//! Neo4j graph store over Bolt.
//!
//! Every graph is written in one transaction. Nodes `MERGE` on their
//! identifying properties and `SET` the rest; edges `MERGE` their endpoints
//! first, so an edge never dangles.

use async_trait::async_trait;
use neo4rs::{ConfigBuilder, Query, query};
use tracing::{debug, info, instrument};

use docgraph_shared::{DocGraphError, Graph, GraphEdge, GraphNode, Result};

use crate::{AuthToken, GraphStore, StoreStats};

fn storage_err(e: impl std::fmt::Display) -> DocGraphError {
    DocGraphError::Storage(e.to_string())
}

/// A Cypher statement and its string parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Statement {
    pub cypher: String,
    pub params: Vec<(String, String)>,
}

impl Statement {
    fn into_query(self) -> Query {
        self.params
            .into_iter()
            .fold(query(&self.cypher), |q, (k, v)| q.param(&k, v))
    }
}

/// Graph store backed by a Neo4j database.
pub struct Neo4jGraphStore {
    graph: neo4rs::Graph,
    addr: String,
}

impl Neo4jGraphStore {
    /// Connect to `addr`; the token's realm selects the database.
    pub async fn connect(addr: &str, token: &AuthToken) -> Result<Self> {
        let config = ConfigBuilder::default()
            .uri(addr)
            .user(token.user.as_str())
            .password(token.pass.as_str())
            .db(token.realm.as_str())
            .build()
            .map_err(storage_err)?;
        let graph = neo4rs::Graph::connect(config).await.map_err(storage_err)?;
        info!(addr, realm = %token.realm, "connected to neo4j");
        Ok(Self {
            graph,
            addr: addr.to_string(),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    #[instrument(skip_all, fields(nodes = graph.nodes.len(), edges = graph.edges.len()))]
    async fn store_graph(&self, graph: &Graph) -> Result<StoreStats> {
        let queries: Vec<Query> = graph_statements(graph)
            .into_iter()
            .map(Statement::into_query)
            .collect();

        let mut txn = self.graph.start_txn().await.map_err(storage_err)?;
        txn.run_queries(queries).await.map_err(storage_err)?;
        txn.commit().await.map_err(storage_err)?;
        debug!("graph committed");

        Ok(StoreStats {
            nodes: graph.nodes.len(),
            edges: graph.edges.len(),
        })
    }

    fn backend(&self) -> &str {
        "neo4j"
    }
}

// ---------------------------------------------------------------------------
// Cypher
// ---------------------------------------------------------------------------

/// Statements for a whole graph: nodes first, then edges.
pub(crate) fn graph_statements(graph: &Graph) -> Vec<Statement> {
    graph
        .nodes
        .iter()
        .map(node_statement)
        .chain(graph.edges.iter().map(edge_statement))
        .collect()
}

/// `{key: $prefix0, ...}` over the identifying properties of `node`.
fn merge_pattern(node: &GraphNode, prefix: &str, params: &mut Vec<(String, String)>) -> String {
    let fields: Vec<String> = node
        .identifying_properties()
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let name = format!("{prefix}{i}");
            params.push((name.clone(), node.property(key).unwrap_or_default().to_string()));
            format!("{}: ${name}", quote(key))
        })
        .collect();
    format!("{{{}}}", fields.join(", "))
}

fn node_statement(node: &GraphNode) -> Statement {
    let mut params = Vec::new();
    let pattern = merge_pattern(node, "k", &mut params);
    let mut cypher = format!("MERGE (n:{} {pattern})", node.kind.label());

    let identifying = node.identifying_properties();
    let sets: Vec<String> = node
        .properties
        .iter()
        .filter(|(k, _)| !identifying.contains(&k.as_str()))
        .enumerate()
        .map(|(i, (key, value))| {
            let name = format!("p{i}");
            params.push((name.clone(), value.clone()));
            format!("n.{} = ${name}", quote(key))
        })
        .collect();
    if !sets.is_empty() {
        cypher.push_str(" SET ");
        cypher.push_str(&sets.join(", "));
    }

    Statement { cypher, params }
}

fn edge_statement(edge: &GraphEdge) -> Statement {
    let mut params = Vec::new();
    let from = merge_pattern(&edge.from, "a", &mut params);
    let to = merge_pattern(&edge.to, "b", &mut params);
    let mut cypher = format!(
        "MERGE (a:{} {from}) MERGE (b:{} {to}) MERGE (a)-[r:{}]->(b)",
        edge.from.kind.label(),
        edge.to.kind.label(),
        edge.kind.label(),
    );

    let sets: Vec<String> = edge
        .properties
        .iter()
        .enumerate()
        .map(|(i, (key, value))| {
            let name = format!("e{i}");
            params.push((name.clone(), value.clone()));
            format!("r.{} = ${name}", quote(key))
        })
        .collect();
    if !sets.is_empty() {
        cypher.push_str(" SET ");
        cypher.push_str(&sets.join(", "));
    }

    Statement { cypher, params }
}

/// Backtick-quote a property key.
fn quote(key: &str) -> String {
    format!("`{}`", key.replace('`', "``"))
}
