//! SPDX 2.x JSON documents.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use docgraph_shared::{
    DocGraphError, DocumentTree, EdgeKind, Graph, GraphEdge, GraphNode, NodeKind, Result,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpdxDocument {
    spdx_version: String,
    #[serde(default)]
    document_namespace: Option<String>,
    #[serde(default)]
    packages: Vec<SpdxPackage>,
    #[serde(default)]
    files: Vec<SpdxFile>,
    #[serde(default)]
    relationships: Vec<SpdxRelationship>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpdxPackage {
    #[serde(rename = "SPDXID")]
    spdx_id: String,
    name: String,
    #[serde(default)]
    version_info: Option<String>,
    #[serde(default)]
    external_refs: Vec<ExternalRef>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExternalRef {
    reference_type: String,
    reference_locator: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpdxFile {
    #[serde(rename = "SPDXID")]
    spdx_id: String,
    file_name: String,
    #[serde(default)]
    checksums: Vec<Checksum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Checksum {
    algorithm: String,
    checksum_value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpdxRelationship {
    spdx_element_id: String,
    relationship_type: String,
    related_spdx_element: String,
}

/// Extract packages, files and their relationships.
pub(crate) fn ingest(tree: &DocumentTree) -> Result<Graph> {
    let doc: SpdxDocument = serde_json::from_value(tree.root.clone())
        .map_err(|e| DocGraphError::ingest(format!("malformed spdx document: {e}")))?;
    debug!(
        version = %doc.spdx_version,
        packages = doc.packages.len(),
        files = doc.files.len(),
        "parsed spdx document"
    );

    let mut graph = Graph::new();
    let mut elements: HashMap<&str, GraphNode> = HashMap::new();

    for pkg in &doc.packages {
        let purl = pkg
            .external_refs
            .iter()
            .find(|r| r.reference_type == "purl")
            .map(|r| r.reference_locator.as_str())
            .unwrap_or_default();
        let node = GraphNode::new(NodeKind::Package)
            .with_property("name", &pkg.name)
            .with_property("version", pkg.version_info.as_deref().unwrap_or_default())
            .with_property("spdx_id", &pkg.spdx_id)
            .with_property("purl", purl);
        elements.insert(&pkg.spdx_id, node.clone());
        graph.nodes.push(node);
    }

    for file in &doc.files {
        let digest = file
            .checksums
            .first()
            .map(|c| format!("{}:{}", c.algorithm.to_lowercase(), c.checksum_value))
            .unwrap_or_default();
        let node = GraphNode::new(NodeKind::Artifact).with_property("name", &file.file_name);
        let node = if digest.is_empty() {
            // Without a checksum the file is only unique within its document.
            node.with_property("namespace", doc.document_namespace.as_deref().unwrap_or_default())
        } else {
            node.with_property("digest", digest)
        };
        elements.insert(&file.spdx_id, node.clone());
        graph.nodes.push(node);
    }

    for rel in &doc.relationships {
        let (kind, from, to) = match rel.relationship_type.as_str() {
            "DEPENDS_ON" => (EdgeKind::DependsOn, &rel.spdx_element_id, &rel.related_spdx_element),
            "DEPENDENCY_OF" => (EdgeKind::DependsOn, &rel.related_spdx_element, &rel.spdx_element_id),
            "CONTAINS" => (EdgeKind::Contains, &rel.spdx_element_id, &rel.related_spdx_element),
            "CONTAINED_BY" => (EdgeKind::Contains, &rel.related_spdx_element, &rel.spdx_element_id),
            _ => continue,
        };
        match (elements.get(from.as_str()), elements.get(to.as_str())) {
            (Some(from), Some(to)) => {
                graph.edges.push(GraphEdge::new(kind, from.clone(), to.clone()));
            }
            _ => debug!(from = %from, to = %to, "relationship names an unknown element, skipping"),
        }
    }

    Ok(graph)
}
