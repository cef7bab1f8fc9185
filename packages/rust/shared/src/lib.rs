//! Shared types, error model, and configuration for docgraph.
//!
//! This crate is the foundation depended on by all other docgraph crates.
//! It provides:
//! - [`DocGraphError`]: the unified error type
//! - Domain types ([`Document`], [`DocumentTree`], [`Graph`], [`GraphNode`], [`GraphEdge`])
//! - Configuration ([`AppConfig`], [`Options`], flag validation, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CollectorConfig, MergeMode, Options, PipelineConfig, RawFlags, StoreConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, validate_flags,
};
pub use error::{DocGraphError, Result};
pub use types::{
    Document, DocumentFormat, DocumentTree, DocumentType, EdgeKind, Graph, GraphEdge, GraphNode,
    NodeKind, SourceInformation,
};
