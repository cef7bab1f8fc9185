//! Collector registration and fan-in.
//!
//! Every registered collector runs in its own tokio task and writes into one
//! bounded channel. Documents and completions travel on that same channel as
//! [`SourceEvent`]s, so a collector's completion is always observed after
//! every document it emitted.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use docgraph_shared::{DocGraphError, Document, Result};

use crate::cancel::CancellationToken;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A concurrent producer of documents.
///
/// `retrieve` emits documents through the lent emitter and returns when the
/// collector is done. Returning is the completion signal: the emitter cannot
/// outlive the call, so nothing is written after completion.
#[async_trait]
pub trait DocumentCollector: Send + Sync {
    /// Unique name used for registration and logging.
    fn name(&self) -> &str;

    /// Produce documents until exhausted, failed, or cancelled.
    async fn retrieve(&self, emitter: &DocumentEmitter, cancel: &CancellationToken) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// One item on the shared collector channel.
#[derive(Debug)]
pub enum SourceEvent {
    /// A document ready for the pipeline.
    Document(Document),
    /// A collector finished, gracefully (`Ok`) or with an error.
    Completed {
        collector: String,
        result: Result<()>,
    },
}

/// Write handle lent to a collector for the duration of `retrieve`.
#[derive(Debug)]
pub struct DocumentEmitter {
    collector: String,
    tx: mpsc::Sender<SourceEvent>,
}

impl DocumentEmitter {
    fn new(collector: String, tx: mpsc::Sender<SourceEvent>) -> Self {
        Self { collector, tx }
    }

    /// Name of the collector this emitter belongs to.
    pub fn collector(&self) -> &str {
        &self.collector
    }

    /// Send a document, waiting for channel capacity.
    ///
    /// Stamps the document with the collector name. Fails once the
    /// coordinator has stopped listening.
    pub async fn emit(&self, mut doc: Document) -> Result<()> {
        doc.source.collector = self.collector.clone();
        self.tx
            .send(SourceEvent::Document(doc))
            .await
            .map_err(|_| DocGraphError::collector(&self.collector, "document channel closed"))
    }
}

// ---------------------------------------------------------------------------
// Stream
// ---------------------------------------------------------------------------

/// Receiving side of the fan-in, plus the number of completions to expect.
#[derive(Debug)]
pub struct CollectionStream {
    receiver: mpsc::Receiver<SourceEvent>,
    expected: usize,
}

impl CollectionStream {
    /// Wrap an existing receiver fed by `expected` producers.
    pub fn from_parts(receiver: mpsc::Receiver<SourceEvent>, expected: usize) -> Self {
        Self { receiver, expected }
    }

    /// Number of `Completed` events that end the collection.
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Wait for the next event. `None` once every sender is gone and the buffer is empty.
    pub async fn next(&mut self) -> Option<SourceEvent> {
        self.receiver.recv().await
    }

    /// Take a buffered event without waiting.
    pub fn try_next(&mut self) -> Option<SourceEvent> {
        self.receiver.try_recv().ok()
    }

    /// Refuse further sends; buffered events stay readable.
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Holds registered collectors in registration order.
#[derive(Default)]
pub struct CollectorRegistry {
    collectors: Vec<Arc<dyn DocumentCollector>>,
}

impl CollectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collector. Fails if one with the same name exists.
    pub fn register(&mut self, collector: Arc<dyn DocumentCollector>) -> Result<()> {
        let name = collector.name();
        if self.collectors.iter().any(|c| c.name() == name) {
            return Err(DocGraphError::collector(
                name,
                format!("the document collector with name {name} is already registered"),
            ));
        }
        debug!(collector = name, "registered document collector");
        self.collectors.push(collector);
        Ok(())
    }

    /// Number of registered collectors.
    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Start every registered collector and return the shared stream.
    ///
    /// Must be called inside a tokio runtime. A panicking collector is
    /// reported as a failed completion rather than lost.
    pub fn collect(&self, cancel: &CancellationToken, capacity: usize) -> Result<CollectionStream> {
        if self.collectors.is_empty() {
            return Err(DocGraphError::config("no document collectors registered"));
        }

        let (tx, rx) = mpsc::channel(capacity.max(1));

        for collector in &self.collectors {
            let name = collector.name().to_string();
            let collector = Arc::clone(collector);
            let emitter = DocumentEmitter::new(name.clone(), tx.clone());
            let done_tx = tx.clone();
            let cancel = cancel.clone();

            tokio::spawn(async move {
                info!(collector = %name, "collector started");
                let run = tokio::spawn(async move {
                    let result = collector.retrieve(&emitter, &cancel).await;
                    drop(emitter);
                    result
                });

                let result = match run.await {
                    Ok(result) => result,
                    Err(e) => Err(DocGraphError::collector(&name, format!("collector task failed: {e}"))),
                };

                if done_tx
                    .send(SourceEvent::Completed {
                        collector: name.clone(),
                        result,
                    })
                    .await
                    .is_err()
                {
                    debug!(collector = %name, "stream closed before completion was delivered");
                }
            });
        }

        Ok(CollectionStream {
            receiver: rx,
            expected: self.collectors.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ListCollector {
        name: String,
        docs: Vec<&'static str>,
        fail: bool,
    }

    #[async_trait]
    impl DocumentCollector for ListCollector {
        fn name(&self) -> &str {
            &self.name
        }

        async fn retrieve(
            &self,
            emitter: &DocumentEmitter,
            _cancel: &CancellationToken,
        ) -> Result<()> {
            for (i, body) in self.docs.iter().enumerate() {
                emitter
                    .emit(Document::new(body.as_bytes().to_vec(), format!("{}-{i}", self.name)))
                    .await?;
            }
            if self.fail {
                return Err(DocGraphError::collector(&self.name, "source went away"));
            }
            Ok(())
        }
    }

    struct PanickingCollector;

    #[async_trait]
    impl DocumentCollector for PanickingCollector {
        fn name(&self) -> &str {
            "panics"
        }

        async fn retrieve(&self, _: &DocumentEmitter, _: &CancellationToken) -> Result<()> {
            panic!("collector bug");
        }
    }

    fn list(name: &str, docs: Vec<&'static str>, fail: bool) -> Arc<dyn DocumentCollector> {
        Arc::new(ListCollector {
            name: name.into(),
            docs,
            fail,
        })
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut registry = CollectorRegistry::new();
        registry.register(list("files", vec![], false)).expect("first");
        let err = registry.register(list("files", vec![], false)).unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn collect_without_collectors_fails() {
        let registry = CollectorRegistry::new();
        assert!(registry.collect(&CancellationToken::new(), 8).is_err());
    }

    #[tokio::test]
    async fn documents_precede_completion() {
        let mut registry = CollectorRegistry::new();
        registry
            .register(list("a", vec!["one", "two", "three"], false))
            .unwrap();

        let mut stream = registry.collect(&CancellationToken::new(), 1).unwrap();
        assert_eq!(stream.expected(), 1);

        let mut sources = Vec::new();
        loop {
            match stream.next().await.expect("event") {
                SourceEvent::Document(doc) => {
                    assert_eq!(doc.source.collector, "a");
                    sources.push(doc.source.source);
                }
                SourceEvent::Completed { collector, result } => {
                    assert_eq!(collector, "a");
                    assert!(result.is_ok());
                    break;
                }
            }
        }
        assert_eq!(sources, vec!["a-0", "a-1", "a-2"]);
    }

    #[tokio::test]
    async fn failure_is_reported_on_completion() {
        let mut registry = CollectorRegistry::new();
        registry.register(list("broken", vec!["x"], true)).unwrap();

        let mut stream = registry.collect(&CancellationToken::new(), 4).unwrap();
        assert!(matches!(stream.next().await, Some(SourceEvent::Document(_))));
        match stream.next().await {
            Some(SourceEvent::Completed { result, .. }) => {
                assert!(result.unwrap_err().to_string().contains("source went away"));
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn panicking_collector_still_completes() {
        let mut registry = CollectorRegistry::new();
        registry.register(Arc::new(PanickingCollector)).unwrap();

        let mut stream = registry.collect(&CancellationToken::new(), 4).unwrap();
        match stream.next().await {
            Some(SourceEvent::Completed { collector, result }) => {
                assert_eq!(collector, "panics");
                assert!(result.is_err());
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }
}
