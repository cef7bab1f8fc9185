//! Graph store backends.
//!
//! [`new_client`] picks a backend from the address scheme:
//! - `neo4j://`, `bolt://` (and their `+s` / `+ssc` variants): [`Neo4jGraphStore`]
//! - `libsql:<path>` or `file:<path>`: [`LibsqlGraphStore`], a local database
//!
//! Both backends deduplicate on node identity, which the in-memory merge
//! step deliberately does not.

mod local;
mod migrations;
mod neo4j;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use url::Url;

use docgraph_shared::{DocGraphError, Graph, Result};

pub use local::{LibsqlGraphStore, node_id};
pub use neo4j::Neo4jGraphStore;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Persistent sink for assembled graphs.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Write a graph, all or nothing.
    async fn store_graph(&self, graph: &Graph) -> Result<StoreStats>;

    /// Short backend name for logs.
    fn backend(&self) -> &str;
}

/// How many items a store write covered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub nodes: usize,
    pub edges: usize,
}

impl std::ops::AddAssign for StoreStats {
    fn add_assign(&mut self, rhs: Self) {
        self.nodes += rhs.nodes;
        self.edges += rhs.edges;
    }
}

// ---------------------------------------------------------------------------
// Client construction
// ---------------------------------------------------------------------------

/// Credentials plus the database (realm) to write into.
#[derive(Clone)]
pub struct AuthToken {
    pub user: String,
    pub pass: String,
    pub realm: String,
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .field("realm", &self.realm)
            .finish()
    }
}

pub fn create_auth_token(
    user: impl Into<String>,
    pass: impl Into<String>,
    realm: impl Into<String>,
) -> AuthToken {
    AuthToken {
        user: user.into(),
        pass: pass.into(),
        realm: realm.into(),
    }
}

/// Open a graph store for `addr`.
pub async fn new_client(addr: &str, token: &AuthToken) -> Result<Arc<dyn GraphStore>> {
    let url = Url::parse(addr)
        .map_err(|e| DocGraphError::config(format!("invalid graph store address {addr:?}: {e}")))?;

    match url.scheme() {
        "neo4j" | "neo4j+s" | "neo4j+ssc" | "bolt" | "bolt+s" | "bolt+ssc" => {
            Ok(Arc::new(Neo4jGraphStore::connect(addr, token).await?))
        }
        scheme @ ("libsql" | "file") => {
            let path = local_path(addr, scheme)?;
            info!(path, "using local graph store; credentials ignored");
            Ok(Arc::new(LibsqlGraphStore::open(Path::new(path)).await?))
        }
        other => Err(DocGraphError::config(format!(
            "unsupported graph store scheme {other:?}"
        ))),
    }
}

/// Filesystem path of a `libsql:` / `file:` address, taken verbatim so
/// relative paths stay relative.
fn local_path<'a>(addr: &'a str, scheme: &str) -> Result<&'a str> {
    let rest = addr
        .get(scheme.len() + 1..)
        .unwrap_or_default();
    let path = rest.strip_prefix("//").unwrap_or(rest);
    if path.is_empty() {
        return Err(DocGraphError::config(format!(
            "graph store address {addr:?} has no path"
        )));
    }
    Ok(path)
}
