//! Post-execution resolution logic.
//!
//! This module contains:
//! - MetadataStore: Query interface over recorded metadata, plus
//!   SQLite and in-memory implementations
//! - ArtifactView / StepView / PipelineRunView: The navigable run graph
//! - PostExecutionClient: Entry point tying store and materializers together

pub mod artifact;
pub mod client;
pub mod error;
pub mod memory_store;
pub mod run;
pub mod sqlite_store;
pub mod step;
pub mod store;

// Re-export commonly used types
pub use artifact::ArtifactView;
pub use client::PostExecutionClient;
pub use error::{Direction, LineageError};
pub use memory_store::InMemoryMetadataStore;
pub use run::PipelineRunView;
pub use sqlite_store::SqliteMetadataStore;
pub use step::{ArtifactMap, StepView};
pub use store::MetadataStore;
