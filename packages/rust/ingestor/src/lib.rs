//! Extracts graph facts from processed document trees.
//!
//! SPDX documents yield packages, files and their relationships. CycloneDX
//! BOMs yield components, dependencies and vulnerabilities. Each tree
//! produces exactly one [`Graph`].

mod cyclonedx;
mod spdx;

use tracing::{debug, instrument};

use docgraph_shared::{DocGraphError, DocumentTree, DocumentType, Graph, Result};

/// Second pipeline stage: tree in, graphs out.
pub trait Ingestor: Send + Sync {
    fn ingest(&self, tree: &DocumentTree) -> Result<Vec<Graph>>;
}

/// Default ingestor, dispatching on the tree's document type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentIngestor;

impl DocumentIngestor {
    pub fn new() -> Self {
        Self
    }
}

impl Ingestor for DocumentIngestor {
    #[instrument(skip_all, fields(source = %tree.source.source, doc_type = %tree.doc_type))]
    fn ingest(&self, tree: &DocumentTree) -> Result<Vec<Graph>> {
        let graph = match tree.doc_type {
            DocumentType::Spdx => spdx::ingest(tree)?,
            DocumentType::CycloneDx => cyclonedx::ingest(tree)?,
            DocumentType::Unknown => {
                return Err(DocGraphError::ingest("no ingestor for unknown document type"));
            }
        };
        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            "document ingested"
        );
        Ok(vec![graph])
    }
}
