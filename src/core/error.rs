//! Errors surfaced by the post-execution layer.

use std::fmt;

use thiserror::Error;

/// Which side of a step an artifact was bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Errors that can occur while resolving runs, steps and artifacts
#[derive(Debug, Error)]
pub enum LineageError {
    #[error("No {direction} artifact found for name `{name}` in step `{step}`. Available {direction} names: {available:?}")]
    NotFound {
        step: String,
        direction: Direction,
        name: String,
        available: Vec<String>,
    },

    #[error("No step named `{name}` in run `{run}`. Available steps: {available:?}")]
    StepNotFound {
        run: String,
        name: String,
        available: Vec<String>,
    },

    #[error("No run named `{name}`. Available runs: {available:?}")]
    RunNotFound { name: String, available: Vec<String> },

    #[error("No execution with id {id}")]
    ExecutionNotFound { id: i64 },

    #[error("Materializer `{identifier}` is not registered (registered: {registered:?})")]
    MaterializerLookup {
        identifier: String,
        registered: Vec<String>,
    },

    #[error("Failed to materialize artifact {artifact_id} with `{materializer}`")]
    Materialize {
        artifact_id: i64,
        materializer: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Artifact {artifact_id} payload is `{found}`, not `{expected}`")]
    PayloadType {
        artifact_id: i64,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Artifact {artifact_id} of step `{step}` has unknown type id {type_id}")]
    UnknownArtifactType {
        step: String,
        artifact_id: i64,
        type_id: i64,
    },

    #[error("Artifact {artifact_id} of step `{step}` has no materializer property")]
    MissingMaterializer { step: String, artifact_id: i64 },

    #[error("Event linking step `{step}` to artifact {artifact_id} has no parameter name in its path")]
    MalformedEventPath { step: String, artifact_id: i64 },

    #[error("Store returned {artifacts} artifacts for {events} events of step `{step}` (first mismatch at position {position})")]
    EventArtifactMismatch {
        step: String,
        events: usize,
        artifacts: usize,
        position: usize,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type Result<T, E = LineageError> = std::result::Result<T, E>;
