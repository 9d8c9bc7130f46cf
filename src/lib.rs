//! runscope - Post-execution introspection of pipeline runs
//!
//! Reconstructs what ran, in what order, with what data, from the records
//! an orchestrator left in its metadata store. Nothing is re-executed and
//! the store is never written to.
//!
//! # Architecture
//!
//! The store holds normalized rows: executions, artifacts, events linking
//! the two, and an artifact type dictionary. This crate joins them into a
//! navigable graph:
//! - A run holds its steps in declaration order
//! - A step lazily resolves its named input and output artifacts
//! - An artifact reads its data through a registered materializer
//!
//! # Modules
//!
//! - `core`: Store interface, run/step/artifact views, client
//! - `domain`: Record types (Execution, Artifact, Event, Run)
//! - `materializers`: Materializer registry and built-in codecs
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # List runs
//! runscope runs
//!
//! # Show a step's inputs and outputs
//! runscope step 42
//!
//! # Print an output artifact
//! runscope read 42 model
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod materializers;

// Re-export main types at crate root for convenience
pub use crate::core::{
    ArtifactView, InMemoryMetadataStore, LineageError, MetadataStore, PipelineRunView,
    PostExecutionClient, SqliteMetadataStore, StepView,
};
pub use domain::{ExecutionState, ExecutionStatus};
pub use materializers::{Materializer, MaterializerRegistry, Payload};
