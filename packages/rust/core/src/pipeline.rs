//! Per-document pipeline: process, ingest, assemble.
//!
//! A [`Pipeline`] owns the three stages and runs one document at a time.
//! In [`MergeMode::PerRun`] the assemble step only buffers, and
//! [`Pipeline::finish`] writes everything collected during the run at once.

use std::sync::Arc;

use tracing::{debug, instrument};

use docgraph_ingestor::Ingestor;
use docgraph_processor::Processor;
use docgraph_shared::{DocGraphError, Document, Graph, MergeMode};
use docgraph_storage::StoreStats;

use crate::assembler::{Assembler, merge_graphs};

/// Which stage a document failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Process,
    Ingest,
    Assemble,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process => write!(f, "process"),
            Self::Ingest => write!(f, "ingest"),
            Self::Assemble => write!(f, "assemble"),
        }
    }
}

/// A failure confined to one document (or, from `finish`, one run's buffer).
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed: {source}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: DocGraphError,
}

impl StageError {
    pub fn new(stage: Stage, source: DocGraphError) -> Self {
        Self { stage, source }
    }
}

/// What happened to a successfully processed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Written to the store immediately.
    Stored(StoreStats),
    /// Held until [`Pipeline::finish`].
    Buffered,
}

/// The three stages wired together.
pub struct Pipeline {
    processor: Arc<dyn Processor>,
    ingestor: Arc<dyn Ingestor>,
    assembler: Assembler,
    mode: MergeMode,
    pending: Graph,
}

impl Pipeline {
    pub fn new(
        processor: Arc<dyn Processor>,
        ingestor: Arc<dyn Ingestor>,
        assembler: Assembler,
        mode: MergeMode,
    ) -> Self {
        Self {
            processor,
            ingestor,
            assembler,
            mode,
            pending: Graph::new(),
        }
    }

    pub fn mode(&self) -> MergeMode {
        self.mode
    }

    /// Run one document through every stage.
    #[instrument(skip_all, fields(source = %doc.source.source, collector = %doc.source.collector))]
    pub async fn run(&mut self, doc: &Document) -> Result<RunOutcome, StageError> {
        let tree = self
            .processor
            .process(doc)
            .map_err(|e| StageError::new(Stage::Process, e))?;

        let graphs = self
            .ingestor
            .ingest(&tree)
            .map_err(|e| StageError::new(Stage::Ingest, e))?;

        match self.mode {
            MergeMode::PerDocument => {
                let stats = self
                    .assembler
                    .assemble(graphs)
                    .await
                    .map_err(|e| StageError::new(Stage::Assemble, e))?;
                Ok(RunOutcome::Stored(stats))
            }
            MergeMode::PerRun => {
                self.pending.append(merge_graphs(graphs));
                debug!(
                    pending_nodes = self.pending.nodes.len(),
                    pending_edges = self.pending.edges.len(),
                    "graph buffered"
                );
                Ok(RunOutcome::Buffered)
            }
        }
    }

    /// Flush the run buffer. `None` when there was nothing to write.
    pub async fn finish(&mut self) -> Result<Option<StoreStats>, StageError> {
        if self.pending.is_empty() {
            return Ok(None);
        }
        let graph = std::mem::take(&mut self.pending);
        self.assembler
            .store(&graph)
            .await
            .map(Some)
            .map_err(|e| StageError::new(Stage::Assemble, e))
    }
}
