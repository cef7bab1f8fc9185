//! Drives a collection run: fan-in, per-document dispatch, drain.
//!
//! The coordinator waits on the shared stream until every collector has
//! reported completion (or cancellation is requested), then drains whatever
//! is still buffered, then flushes the pipeline. Documents are processed one
//! at a time, in arrival order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use docgraph_collector::{CancellationToken, CollectionStream, SourceEvent};
use docgraph_shared::{Document, Result};

use crate::pipeline::{Pipeline, RunOutcome};

/// Bytes of a document shown in log lines.
const PREVIEW_BYTES: usize = 10;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Final tally of a collection run.
#[derive(Debug, Clone)]
pub struct CollectionSummary {
    pub run_id: Uuid,
    pub collectors_total: usize,
    pub collectors_failed: usize,
    pub documents_received: usize,
    pub documents_stored: usize,
    pub documents_failed: usize,
    pub nodes_written: usize,
    pub edges_written: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl CollectionSummary {
    fn new(collectors_total: usize) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            collectors_total,
            collectors_failed: 0,
            documents_received: 0,
            documents_stored: 0,
            documents_failed: 0,
            nodes_written: 0,
            edges_written: 0,
            cancelled: false,
            elapsed: Duration::ZERO,
        }
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a document is handed to the pipeline.
    fn document(&self, source: &str, received: usize);
    /// Called when a collector reports completion.
    fn collector_done(&self, name: &str, ok: bool);
    /// Called when the run completes.
    fn done(&self, summary: &CollectionSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn document(&self, _source: &str, _received: usize) {}
    fn collector_done(&self, _name: &str, _ok: bool) {}
    fn done(&self, _summary: &CollectionSummary) {}
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

pub struct Coordinator {
    pipeline: Pipeline,
    progress: Arc<dyn ProgressReporter>,
    /// Documents accepted in per-run mode, awaiting `finish`.
    buffered: usize,
}

impl Coordinator {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            progress: Arc::new(SilentProgress),
            buffered: 0,
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Consume `stream` until every collector completes or `cancel` fires.
    ///
    /// Never fails: per-document and per-collector errors are logged and
    /// counted in the returned summary.
    #[instrument(skip_all, fields(collectors = stream.expected()))]
    pub async fn run(
        mut self,
        mut stream: CollectionStream,
        cancel: CancellationToken,
    ) -> CollectionSummary {
        let start = Instant::now();
        let expected = stream.expected();
        let mut summary = CollectionSummary::new(expected);
        info!(
            run_id = %summary.run_id,
            collectors = expected,
            mode = %self.pipeline.mode(),
            "collection started"
        );

        let mut completed = 0usize;
        while completed < expected {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(completed, expected, "cancellation requested, draining buffered documents");
                    summary.cancelled = true;
                    break;
                }
                event = stream.next() => match event {
                    Some(SourceEvent::Document(doc)) => self.emit(doc, &mut summary).await,
                    Some(SourceEvent::Completed { collector, result }) => {
                        completed += 1;
                        self.collector_done(&collector, result, &mut summary);
                    }
                    None => {
                        warn!(
                            completed,
                            expected,
                            "collector stream closed before every collector completed"
                        );
                        break;
                    }
                },
            }
        }

        // Refuse new sends, then process everything already buffered.
        stream.close();
        let mut drained = 0usize;
        while let Some(event) = stream.try_next() {
            match event {
                SourceEvent::Document(doc) => {
                    drained += 1;
                    self.emit(doc, &mut summary).await;
                }
                SourceEvent::Completed { collector, result } => {
                    self.collector_done(&collector, result, &mut summary);
                }
            }
        }
        if drained > 0 {
            info!(drained, "drained buffered documents");
        }

        self.finish(&mut summary).await;

        summary.elapsed = start.elapsed();
        info!(
            run_id = %summary.run_id,
            received = summary.documents_received,
            stored = summary.documents_stored,
            failed = summary.documents_failed,
            nodes = summary.nodes_written,
            edges = summary.edges_written,
            collectors_failed = summary.collectors_failed,
            cancelled = summary.cancelled,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "collection finished"
        );
        self.progress.done(&summary);
        summary
    }

    /// Run one document through the pipeline, logging any stage failure.
    async fn emit(&mut self, doc: Document, summary: &mut CollectionSummary) {
        summary.documents_received += 1;
        info!(
            collector = %doc.source.collector,
            source = %doc.source.source,
            preview = %doc.preview(PREVIEW_BYTES),
            format = %doc.format,
            doc_type = %doc.doc_type,
            "emitting document"
        );
        self.progress
            .document(&doc.source.source, summary.documents_received);

        match self.pipeline.run(&doc).await {
            Ok(RunOutcome::Stored(stats)) => {
                summary.documents_stored += 1;
                summary.nodes_written += stats.nodes;
                summary.edges_written += stats.edges;
            }
            Ok(RunOutcome::Buffered) => self.buffered += 1,
            Err(e) => {
                summary.documents_failed += 1;
                error!(
                    stage = %e.stage,
                    error = %e.source,
                    source = %doc.source.source,
                    format = %doc.format,
                    doc_type = %doc.doc_type,
                    "unable to run document through pipeline"
                );
            }
        }
    }

    fn collector_done(
        &self,
        collector: &str,
        result: Result<()>,
        summary: &mut CollectionSummary,
    ) {
        let ok = match result {
            Ok(()) => {
                info!(collector, "collector ended gracefully");
                true
            }
            Err(e) => {
                summary.collectors_failed += 1;
                error!(collector, error = %e, "collector ended with error");
                false
            }
        };
        self.progress.collector_done(collector, ok);
    }

    async fn finish(&mut self, summary: &mut CollectionSummary) {
        let buffered = std::mem::take(&mut self.buffered);
        match self.pipeline.finish().await {
            Ok(stats) => {
                summary.documents_stored += buffered;
                if let Some(stats) = stats {
                    summary.nodes_written += stats.nodes;
                    summary.edges_written += stats.edges;
                }
            }
            Err(e) => {
                summary.documents_failed += buffered;
                error!(
                    stage = %e.stage,
                    error = %e.source,
                    documents = buffered,
                    "unable to store run graph"
                );
            }
        }
    }
}
