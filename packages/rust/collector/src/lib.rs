//! Document collectors and the fan-in that joins them.
//!
//! This crate provides:
//! - [`DocumentCollector`]: the contract concurrent document producers implement
//! - [`CollectorRegistry`]: registers collectors and starts them all at once
//! - [`CollectionStream`]: the single ordered stream of [`SourceEvent`]s they feed
//! - [`FileCollector`]: walks a directory and emits every file as a document

mod cancel;
pub mod file;
mod registry;

pub use cancel::CancellationToken;
pub use file::FileCollector;
pub use registry::{
    CollectionStream, CollectorRegistry, DocumentCollector, DocumentEmitter, SourceEvent,
};
