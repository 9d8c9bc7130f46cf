//! Record types read from the metadata store.
//!
//! This module contains the raw, normalized rows:
//! - Run: one pipeline invocation
//! - Execution: one step run, with its state code
//! - Artifact: stored data plus the type dictionary
//! - Event: execution ↔ artifact links

pub mod artifact;
pub mod events;
pub mod execution;
pub mod run;

// Re-export commonly used types
pub use artifact::{ArtifactRecord, ArtifactTypeRecord, PropertyValue, MATERIALIZER_PROPERTY_KEY};
pub use events::{EventKind, EventRecord, PathSegment};
pub use execution::{ExecutionRecord, ExecutionState, ExecutionStatus};
pub use run::RunRecord;
