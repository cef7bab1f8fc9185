//! Files on disk through the real stages into a local libSQL store.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use docgraph_collector::{CancellationToken, CollectorRegistry, FileCollector};
use docgraph_core::{Assembler, Coordinator, Pipeline};
use docgraph_ingestor::DocumentIngestor;
use docgraph_processor::DocumentProcessor;
use docgraph_shared::{GraphNode, MergeMode, NodeKind};
use docgraph_storage::LibsqlGraphStore;

const SPDX: &str = r#"{
  "spdxVersion": "SPDX-2.3",
  "packages": [
    {
      "SPDXID": "SPDXRef-app",
      "name": "app",
      "versionInfo": "1.0.0",
      "externalRefs": [
        {"referenceCategory": "PACKAGE-MANAGER", "referenceType": "purl", "referenceLocator": "pkg:npm/app@1.0.0"}
      ]
    },
    {
      "SPDXID": "SPDXRef-lodash",
      "name": "lodash",
      "versionInfo": "4.17.20",
      "externalRefs": [
        {"referenceCategory": "PACKAGE-MANAGER", "referenceType": "purl", "referenceLocator": "pkg:npm/lodash@4.17.20"}
      ]
    }
  ],
  "relationships": [
    {"spdxElementId": "SPDXRef-app", "relationshipType": "DEPENDS_ON", "relatedSpdxElement": "SPDXRef-lodash"}
  ]
}"#;

const CYCLONEDX: &str = r#"{
  "bomFormat": "CycloneDX",
  "specVersion": "1.5",
  "components": [
    {"bom-ref": "lodash", "name": "lodash", "version": "4.17.20", "purl": "pkg:npm/lodash@4.17.20"}
  ],
  "vulnerabilities": [
    {"id": "CVE-2021-23337", "affects": [{"ref": "lodash"}]}
  ]
}"#;

fn temp_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("docgraph-e2e-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[tokio::test]
async fn sbom_directory_lands_in_local_store() {
    let dir = temp_dir();
    let docs = dir.join("docs");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("app.spdx.json"), SPDX).unwrap();
    std::fs::write(docs.join("app.cdx.json"), CYCLONEDX).unwrap();
    std::fs::write(docs.join("notes.txt"), "not an sbom").unwrap();

    let store = Arc::new(LibsqlGraphStore::open(&dir.join("graph.db")).await.unwrap());
    let pipeline = Pipeline::new(
        Arc::new(DocumentProcessor::new()),
        Arc::new(DocumentIngestor::new()),
        Assembler::new(store.clone()),
        MergeMode::PerDocument,
    );

    let mut registry = CollectorRegistry::new();
    registry
        .register(Arc::new(FileCollector::new(&docs, false, Duration::from_secs(1))))
        .unwrap();
    let cancel = CancellationToken::new();
    let stream = registry.collect(&cancel, 8).unwrap();

    let summary = tokio::time::timeout(
        Duration::from_secs(10),
        Coordinator::new(pipeline).run(stream, cancel),
    )
    .await
    .expect("run finished");

    assert_eq!(summary.documents_received, 3);
    assert_eq!(summary.documents_stored, 2);
    assert_eq!(summary.documents_failed, 1);
    assert_eq!(summary.collectors_failed, 0);

    // lodash appears in both documents under the same purl.
    assert_eq!(store.count_nodes().await.unwrap(), 3);
    assert_eq!(store.count_edges().await.unwrap(), 2);

    let lodash = store
        .get_node(&GraphNode::new(NodeKind::Package).with_property("purl", "pkg:npm/lodash@4.17.20"))
        .await
        .unwrap()
        .expect("lodash stored");
    assert_eq!(lodash.property("spdx_id"), Some("SPDXRef-lodash"));
    assert_eq!(lodash.property("bom_ref"), Some("lodash"));

    std::fs::remove_dir_all(&dir).ok();
}
