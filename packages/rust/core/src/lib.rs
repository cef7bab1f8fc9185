//! Collection orchestration for docgraph.
//!
//! Ties collectors, the processor, the ingestor and a graph store together:
//! the [`Coordinator`] consumes a collector stream and runs each document
//! through a [`Pipeline`].

pub mod assembler;
pub mod coordinator;
pub mod pipeline;

pub use assembler::{Assembler, merge_graphs};
pub use coordinator::{CollectionSummary, Coordinator, ProgressReporter, SilentProgress};
pub use pipeline::{Pipeline, RunOutcome, Stage, StageError};
