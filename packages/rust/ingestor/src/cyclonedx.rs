//! CycloneDX JSON BOMs.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use docgraph_shared::{
    DocGraphError, DocumentTree, EdgeKind, Graph, GraphEdge, GraphNode, NodeKind, Result,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bom {
    /// Absent when the document type was declared rather than guessed.
    #[serde(default)]
    bom_format: Option<String>,
    #[serde(default)]
    metadata: Option<Metadata>,
    #[serde(default)]
    components: Vec<Component>,
    #[serde(default)]
    dependencies: Vec<Dependency>,
    #[serde(default)]
    vulnerabilities: Vec<Vulnerability>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(default)]
    component: Option<Component>,
}

#[derive(Debug, Deserialize)]
struct Component {
    #[serde(default, rename = "bom-ref")]
    bom_ref: Option<String>,
    name: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    purl: Option<String>,
    #[serde(default)]
    components: Vec<Component>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Dependency {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(default)]
    depends_on: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Vulnerability {
    id: String,
    #[serde(default)]
    affects: Vec<Affect>,
}

#[derive(Debug, Deserialize)]
struct Affect {
    #[serde(rename = "ref")]
    reference: String,
}

/// Extract components, dependencies and vulnerabilities.
pub(crate) fn ingest(tree: &DocumentTree) -> Result<Graph> {
    let bom: Bom = serde_json::from_value(tree.root.clone())
        .map_err(|e| DocGraphError::ingest(format!("malformed cyclonedx document: {e}")))?;
    if let Some(format) = bom.bom_format.as_deref().filter(|f| *f != "CycloneDX") {
        return Err(DocGraphError::ingest(format!("unexpected bomFormat {format:?}")));
    }

    let mut graph = Graph::new();
    let mut refs: HashMap<String, GraphNode> = HashMap::new();

    let root = bom.metadata.as_ref().and_then(|m| m.component.as_ref());
    for component in root.into_iter().chain(bom.components.iter()) {
        add_component(component, &mut graph, &mut refs);
    }

    for dep in &bom.dependencies {
        let Some(from) = refs.get(&dep.reference) else {
            debug!(bom_ref = %dep.reference, "dependency names an unknown component, skipping");
            continue;
        };
        for target in &dep.depends_on {
            match refs.get(target) {
                Some(to) => graph
                    .edges
                    .push(GraphEdge::new(EdgeKind::DependsOn, from.clone(), to.clone())),
                None => debug!(bom_ref = %target, "dependency target unknown, skipping"),
            }
        }
    }

    for vuln in &bom.vulnerabilities {
        let node = GraphNode::new(NodeKind::Vulnerability).with_property("id", &vuln.id);
        graph.nodes.push(node.clone());
        for affect in &vuln.affects {
            match refs.get(&affect.reference) {
                Some(component) => graph.edges.push(GraphEdge::new(
                    EdgeKind::Vulnerable,
                    component.clone(),
                    node.clone(),
                )),
                None => debug!(bom_ref = %affect.reference, "affected component unknown, skipping"),
            }
        }
    }

    Ok(graph)
}

/// Add a component and its nested components, depth first.
fn add_component(component: &Component, graph: &mut Graph, refs: &mut HashMap<String, GraphNode>) {
    let bom_ref = component.bom_ref.as_deref().unwrap_or_default();
    let node = GraphNode::new(NodeKind::Package)
        .with_property("name", &component.name)
        .with_property("version", component.version.as_deref().unwrap_or_default())
        .with_property("purl", component.purl.as_deref().unwrap_or_default())
        .with_property("bom_ref", bom_ref);
    if !bom_ref.is_empty() {
        refs.insert(bom_ref.to_string(), node.clone());
    }
    graph.nodes.push(node);

    for child in &component.components {
        add_component(child, graph, refs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgraph_shared::{DocumentFormat, DocumentType, SourceInformation};
    use serde_json::json;

    fn tree(root: serde_json::Value) -> DocumentTree {
        DocumentTree {
            format: DocumentFormat::Json,
            doc_type: DocumentType::CycloneDx,
            source: SourceInformation::default(),
            root,
        }
    }

    #[test]
    fn components_dependencies_and_vulnerabilities() {
        let graph = ingest(&tree(json!({
            "bomFormat": "CycloneDX",
            "specVersion": "1.5",
            "metadata": {
                "component": {"bom-ref": "app", "name": "app", "version": "1.0.0"}
            },
            "components": [
                {"bom-ref": "pkg:npm/lodash@4.17.20", "name": "lodash", "version": "4.17.20", "purl": "pkg:npm/lodash@4.17.20"}
            ],
            "dependencies": [
                {"ref": "app", "dependsOn": ["pkg:npm/lodash@4.17.20"]}
            ],
            "vulnerabilities": [
                {"id": "CVE-2021-23337", "affects": [{"ref": "pkg:npm/lodash@4.17.20"}]}
            ]
        })))
        .unwrap();

        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes[0].property("name"), Some("app"));
        assert_eq!(graph.nodes[1].property("purl"), Some("pkg:npm/lodash@4.17.20"));
        assert_eq!(graph.nodes[2].kind, NodeKind::Vulnerability);

        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].kind, EdgeKind::DependsOn);
        assert_eq!(graph.edges[0].from.property("name"), Some("app"));
        assert_eq!(graph.edges[1].kind, EdgeKind::Vulnerable);
        assert_eq!(graph.edges[1].to.property("id"), Some("CVE-2021-23337"));
    }

    #[test]
    fn nested_components_are_flattened() {
        let graph = ingest(&tree(json!({
            "bomFormat": "CycloneDX",
            "components": [
                {"bom-ref": "outer", "name": "outer", "components": [
                    {"bom-ref": "inner", "name": "inner"}
                ]}
            ],
            "dependencies": [{"ref": "outer", "dependsOn": ["inner", "ghost"]}]
        })))
        .unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
    }

    #[test]
    fn wrong_bom_format_is_an_error() {
        let err = ingest(&tree(json!({"bomFormat": "SomethingElse"}))).unwrap_err();
        assert!(err.to_string().contains("bomFormat"));
        assert!(matches!(err, DocGraphError::Ingest { .. }));
    }

    #[test]
    fn declared_bom_without_format_marker_is_ingested() {
        let graph = ingest(&tree(json!({
            "components": [{"bom-ref": "lodash", "name": "lodash", "version": "4.17.20"}]
        })))
        .unwrap();
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].property("name"), Some("lodash"));
    }
}
