//! Graph merging and persistence.
//!
//! Merging is plain concatenation in input order. Duplicate entities are
//! left for the graph store to collapse on identity.

use std::sync::Arc;

use tracing::{debug, instrument};

use docgraph_shared::{Graph, Result};
use docgraph_storage::{GraphStore, StoreStats};

/// Concatenate graphs into one, preserving input order.
pub fn merge_graphs(graphs: impl IntoIterator<Item = Graph>) -> Graph {
    let mut combined = Graph::new();
    for graph in graphs {
        combined.append(graph);
    }
    combined
}

/// Merges ingested graphs and hands them to a [`GraphStore`].
#[derive(Clone)]
pub struct Assembler {
    store: Arc<dyn GraphStore>,
}

impl Assembler {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Name of the backing store.
    pub fn backend(&self) -> &str {
        self.store.backend()
    }

    /// Merge `graphs` and store the result in one write.
    #[instrument(skip_all, fields(graphs = graphs.len(), backend = self.store.backend()))]
    pub async fn assemble(&self, graphs: Vec<Graph>) -> Result<StoreStats> {
        let combined = merge_graphs(graphs);
        self.store(&combined).await
    }

    /// Store an already merged graph.
    pub async fn store(&self, graph: &Graph) -> Result<StoreStats> {
        let stats = self.store.store_graph(graph).await?;
        debug!(nodes = stats.nodes, edges = stats.edges, "graph stored");
        Ok(stats)
    }
}
