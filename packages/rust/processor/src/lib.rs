//! Turns raw documents into parsed document trees.
//!
//! Untagged documents have their format and type guessed: a blob that
//! parses as JSON is JSON, and the top-level keys decide between SPDX and
//! CycloneDX. Anything else is rejected with a process error.

mod guess;

use tracing::{debug, instrument};

use docgraph_shared::{DocGraphError, Document, DocumentFormat, DocumentTree, DocumentType, Result};

/// First pipeline stage: bytes in, structured tree out.
pub trait Processor: Send + Sync {
    fn process(&self, doc: &Document) -> Result<DocumentTree>;
}

/// Default processor for JSON SBOM documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentProcessor;

impl DocumentProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Processor for DocumentProcessor {
    #[instrument(skip_all, fields(source = %doc.source.source, format = %doc.format, doc_type = %doc.doc_type))]
    fn process(&self, doc: &Document) -> Result<DocumentTree> {
        let root: serde_json::Value = match doc.format {
            DocumentFormat::Json => serde_json::from_slice(&doc.blob)
                .map_err(|e| DocGraphError::process(format!("invalid json document: {e}")))?,
            DocumentFormat::Unknown => serde_json::from_slice(&doc.blob)
                .map_err(|_| DocGraphError::process("unable to determine document format"))?,
        };

        let doc_type = match doc.doc_type {
            DocumentType::Unknown => guess::guess_type(&root),
            known => known,
        };
        if doc_type == DocumentType::Unknown {
            return Err(DocGraphError::process("unable to determine document type"));
        }

        debug!(%doc_type, "document processed");
        Ok(DocumentTree {
            format: DocumentFormat::Json,
            doc_type,
            source: doc.source.clone(),
            root,
        })
    }
}
