//! Filesystem collector: emits every regular file under a directory.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use docgraph_shared::{DocGraphError, Document, Result};

use crate::cancel::CancellationToken;
use crate::registry::{DocumentCollector, DocumentEmitter};

/// Registered name of [`FileCollector`].
pub const FILE_COLLECTOR: &str = "FileCollector";

/// Reads documents from a directory tree (or a single file).
#[derive(Debug, Clone)]
pub struct FileCollector {
    path: PathBuf,
    poll: bool,
    interval: Duration,
}

impl FileCollector {
    /// `poll` keeps re-walking `path` every `interval` until cancelled.
    pub fn new(path: impl Into<PathBuf>, poll: bool, interval: Duration) -> Self {
        Self {
            path: path.into(),
            poll,
            interval,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentCollector for FileCollector {
    fn name(&self) -> &str {
        FILE_COLLECTOR
    }

    #[instrument(skip_all, fields(path = %self.path.display(), poll = self.poll))]
    async fn retrieve(&self, emitter: &DocumentEmitter, cancel: &CancellationToken) -> Result<()> {
        let exists = tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| DocGraphError::io(&self.path, e))?;
        if !exists {
            return Err(DocGraphError::collector(
                FILE_COLLECTOR,
                format!("path does not exist: {}", self.path.display()),
            ));
        }

        let mut since: Option<SystemTime> = None;
        loop {
            let walk_started = SystemTime::now();
            let files = walk(self.path.clone(), since).await?;
            debug!(count = files.len(), "walked directory");

            let mut emitted = 0usize;
            for file in files {
                if cancel.is_cancelled() {
                    info!(emitted, "file collection cancelled");
                    return Ok(());
                }
                let blob = tokio::fs::read(&file)
                    .await
                    .map_err(|e| DocGraphError::io(&file, e))?;
                emitter
                    .emit(Document::new(blob, file.display().to_string()))
                    .await?;
                emitted += 1;
            }
            info!(emitted, "emitted documents");

            if !self.poll {
                return Ok(());
            }
            since = Some(walk_started);

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

/// Regular files under `root`, in file-name order, optionally only those
/// modified at or after `since`.
async fn walk(root: PathBuf, since: Option<SystemTime>) -> Result<Vec<PathBuf>> {
    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                DocGraphError::collector(FILE_COLLECTOR, format!("walk failed: {e}"))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(since) = since {
                match entry.metadata().ok().and_then(|m| m.modified().ok()) {
                    Some(modified) if modified >= since => {}
                    Some(_) => continue,
                    None => {
                        warn!(path = %entry.path().display(), "no modification time, skipping");
                        continue;
                    }
                }
            }
            files.push(entry.into_path());
        }
        Ok(files)
    })
    .await
    .map_err(|e| DocGraphError::collector(FILE_COLLECTOR, format!("walk task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CollectorRegistry, SourceEvent};
    use std::sync::Arc;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("docgraph-files-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn collect_all(collector: FileCollector) -> (Vec<Document>, Result<()>) {
        let mut registry = CollectorRegistry::new();
        registry.register(Arc::new(collector)).unwrap();
        let mut stream = registry.collect(&CancellationToken::new(), 4).unwrap();

        let mut docs = Vec::new();
        loop {
            match stream.next().await.expect("event") {
                SourceEvent::Document(doc) => docs.push(doc),
                SourceEvent::Completed { result, .. } => return (docs, result),
            }
        }
    }

    #[tokio::test]
    async fn emits_every_file_recursively() {
        let dir = temp_dir();
        std::fs::write(dir.join("a.json"), b"{\"a\":1}").unwrap();
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested").join("b.json"), b"{\"b\":2}").unwrap();

        let (docs, result) =
            collect_all(FileCollector::new(&dir, false, Duration::from_secs(1))).await;
        assert!(result.is_ok());
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.source.collector == FILE_COLLECTOR));
        assert!(docs[0].source.source.ends_with("a.json"));
        assert_eq!(docs[0].blob, b"{\"a\":1}");
        assert_eq!(docs[0].doc_type, docgraph_shared::DocumentType::Unknown);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn missing_path_is_an_error() {
        let dir = std::env::temp_dir().join(format!("docgraph-missing-{}", Uuid::now_v7()));
        let (docs, result) =
            collect_all(FileCollector::new(&dir, false, Duration::from_secs(1))).await;
        assert!(docs.is_empty());
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn polling_stops_on_cancel() {
        let dir = temp_dir();
        std::fs::write(dir.join("first.json"), b"{}").unwrap();

        let mut registry = CollectorRegistry::new();
        registry
            .register(Arc::new(FileCollector::new(&dir, true, Duration::from_millis(20))))
            .unwrap();
        let cancel = CancellationToken::new();
        let mut stream = registry.collect(&cancel, 4).unwrap();

        match stream.next().await {
            Some(SourceEvent::Document(doc)) => assert!(doc.source.source.ends_with("first.json")),
            other => panic!("expected document, got {other:?}"),
        }

        cancel.cancel();
        let completion = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match stream.next().await {
                    Some(SourceEvent::Completed { result, .. }) => return result,
                    Some(SourceEvent::Document(_)) => continue,
                    None => panic!("stream closed without completion"),
                }
            }
        })
        .await
        .expect("collector stopped");
        assert!(completion.is_ok());

        std::fs::remove_dir_all(&dir).ok();
    }
}
