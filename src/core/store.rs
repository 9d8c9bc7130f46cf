//! Query interface over the metadata store.
//!
//! All lookups are batch-oriented: they accept and return ordered
//! sequences even when called with a single id. Callers rely on
//! `get_artifacts_by_id` returning artifacts in the order the ids were
//! given.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{ArtifactRecord, ArtifactTypeRecord, EventRecord, ExecutionRecord, RunRecord};

/// Read-only access to execution metadata
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Executions with the given ids (unknown ids are skipped)
    async fn get_executions_by_id(&self, ids: &[i64]) -> Result<Vec<ExecutionRecord>>;

    /// The full artifact type dictionary
    async fn get_artifact_types(&self) -> Result<Vec<ArtifactTypeRecord>>;

    /// Events of the given executions, in the order they were recorded
    async fn get_events_by_execution_ids(&self, ids: &[i64]) -> Result<Vec<EventRecord>>;

    /// Artifacts with the given ids, in requested order
    async fn get_artifacts_by_id(&self, ids: &[i64]) -> Result<Vec<ArtifactRecord>>;

    /// All runs, oldest first
    async fn get_runs(&self) -> Result<Vec<RunRecord>>;

    /// Executions of one run, in step declaration order
    async fn get_executions_by_run(&self, run_id: i64) -> Result<Vec<ExecutionRecord>>;
}
