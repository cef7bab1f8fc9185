//! Core domain types: documents entering the pipeline and the graphs leaving it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// Serialization format of a document blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Json,
    Unknown,
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// What a document describes, which decides how facts are extracted from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Spdx,
    CycloneDx,
    Unknown,
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spdx => write!(f, "spdx"),
            Self::CycloneDx => write!(f, "cyclonedx"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Where a document came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInformation {
    /// Name of the collector that produced the document.
    pub collector: String,
    /// Collector-specific origin (e.g., a file path).
    pub source: String,
}

/// A raw payload plus the metadata needed to parse it.
///
/// Documents are immutable once emitted; ownership moves to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Raw document bytes.
    pub blob: Vec<u8>,
    /// Blob format (may be `Unknown` until processed).
    pub format: DocumentFormat,
    /// Document type (may be `Unknown` until processed).
    pub doc_type: DocumentType,
    /// Provenance.
    pub source: SourceInformation,
}

impl Document {
    /// Create a document with unknown format and type.
    pub fn new(blob: impl Into<Vec<u8>>, source: impl Into<String>) -> Self {
        Self {
            blob: blob.into(),
            format: DocumentFormat::Unknown,
            doc_type: DocumentType::Unknown,
            source: SourceInformation {
                collector: String::new(),
                source: source.into(),
            },
        }
    }

    /// Set the format.
    pub fn with_format(mut self, format: DocumentFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the type.
    pub fn with_type(mut self, doc_type: DocumentType) -> Self {
        self.doc_type = doc_type;
        self
    }

    /// A printable rendering of at most `max_bytes` of the blob, for logs.
    pub fn preview(&self, max_bytes: usize) -> String {
        let end = self.blob.len().min(max_bytes);
        String::from_utf8_lossy(&self.blob[..end]).into_owned()
    }
}

/// The structured result of processing one [`Document`].
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTree {
    /// Resolved format.
    pub format: DocumentFormat,
    /// Resolved type.
    pub doc_type: DocumentType,
    /// Provenance of the originating document.
    pub source: SourceInformation,
    /// Parsed document body.
    pub root: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Entity kinds extracted from supply-chain documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKind {
    Package,
    Artifact,
    Vulnerability,
}

impl NodeKind {
    /// Label used by graph stores.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Package => "Package",
            Self::Artifact => "Artifact",
            Self::Vulnerability => "Vulnerability",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Relationship kinds between entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EdgeKind {
    DependsOn,
    Contains,
    Vulnerable,
}

impl EdgeKind {
    /// Relationship type used by graph stores.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DependsOn => "DEPENDS_ON",
            Self::Contains => "CONTAINS",
            Self::Vulnerable => "VULNERABLE",
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A domain entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub kind: NodeKind,
    pub properties: BTreeMap<String, String>,
}

impl GraphNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            properties: BTreeMap::new(),
        }
    }

    /// Add a property. Empty values are ignored.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.properties.insert(key.into(), value);
        }
        self
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Names of the properties that identify this node within its kind.
    pub fn identifying_properties(&self) -> &'static [&'static str] {
        match self.kind {
            NodeKind::Package if self.properties.contains_key("purl") => &["purl"],
            NodeKind::Package => &["name", "version"],
            NodeKind::Artifact if self.properties.contains_key("digest") => &["digest"],
            NodeKind::Artifact => &["namespace", "name"],
            NodeKind::Vulnerability => &["id"],
        }
    }

    /// Stable identity key, e.g. `Package:purl=pkg:npm/left-pad@1.3.0`.
    pub fn identity(&self) -> String {
        let parts: Vec<String> = self
            .identifying_properties()
            .iter()
            .map(|k| format!("{k}={}", self.property(k).unwrap_or_default()))
            .collect();
        format!("{}:{}", self.kind, parts.join(","))
    }
}

/// A relationship between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub kind: EdgeKind,
    pub from: GraphNode,
    pub to: GraphNode,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl GraphEdge {
    pub fn new(kind: EdgeKind, from: GraphNode, to: GraphNode) -> Self {
        Self {
            kind,
            from,
            to,
            properties: BTreeMap::new(),
        }
    }
}

/// Facts extracted from one or more documents.
///
/// Combining graphs is plain concatenation: duplicate entities stay
/// duplicated until a store deduplicates them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append another graph's nodes and edges after this graph's own.
    pub fn append(&mut self, other: Graph) {
        self.nodes.extend(other.nodes);
        self.edges.extend(other.edges);
    }

    /// Total number of nodes and edges.
    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_is_bounded() {
        let doc = Document::new(b"{\"spdxVersion\": \"SPDX-2.3\"}".to_vec(), "sbom.json");
        assert_eq!(doc.preview(10), "{\"spdxVers");

        let short = Document::new(b"{}".to_vec(), "tiny.json");
        assert_eq!(short.preview(10), "{}");

        let empty = Document::new(Vec::new(), "empty.json");
        assert_eq!(empty.preview(10), "");
    }

    #[test]
    fn package_identity_prefers_purl() {
        let with_purl = GraphNode::new(NodeKind::Package)
            .with_property("name", "left-pad")
            .with_property("purl", "pkg:npm/left-pad@1.3.0");
        assert_eq!(with_purl.identity(), "Package:purl=pkg:npm/left-pad@1.3.0");

        let without = GraphNode::new(NodeKind::Package)
            .with_property("name", "left-pad")
            .with_property("version", "1.3.0");
        assert_eq!(without.identity(), "Package:name=left-pad,version=1.3.0");
    }

    #[test]
    fn empty_property_values_are_dropped() {
        let node = GraphNode::new(NodeKind::Artifact).with_property("digest", "");
        assert!(node.property("digest").is_none());
    }

    #[test]
    fn artifact_without_digest_is_identified_by_name() {
        let hashed = GraphNode::new(NodeKind::Artifact)
            .with_property("digest", "sha256:abc")
            .with_property("name", "./a.js");
        assert_eq!(hashed.identity(), "Artifact:digest=sha256:abc");

        let a = GraphNode::new(NodeKind::Artifact)
            .with_property("namespace", "https://example.com/sbom-1")
            .with_property("name", "./a.js");
        let b = GraphNode::new(NodeKind::Artifact)
            .with_property("namespace", "https://example.com/sbom-1")
            .with_property("name", "./b.js");
        assert_eq!(
            a.identity(),
            "Artifact:namespace=https://example.com/sbom-1,name=./a.js"
        );
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn append_keeps_duplicates_in_order() {
        let a = GraphNode::new(NodeKind::Vulnerability).with_property("id", "CVE-2024-0001");
        let mut first = Graph {
            nodes: vec![a.clone()],
            edges: vec![],
        };
        first.append(Graph {
            nodes: vec![a.clone()],
            edges: vec![],
        });
        assert_eq!(first.nodes, vec![a.clone(), a]);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn display_labels() {
        assert_eq!(DocumentFormat::Json.to_string(), "json");
        assert_eq!(DocumentType::CycloneDx.to_string(), "cyclonedx");
        assert_eq!(EdgeKind::DependsOn.to_string(), "DEPENDS_ON");
    }
}
