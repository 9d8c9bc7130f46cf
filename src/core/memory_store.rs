//! In-memory metadata store.
//!
//! Holds records that are already loaded (fixtures, exported snapshots) and
//! serves them through the same query interface as a real backend.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;

use super::store::MetadataStore;
use crate::domain::{ArtifactRecord, ArtifactTypeRecord, EventRecord, ExecutionRecord, RunRecord};

/// Metadata store backed by vectors of records
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetadataStore {
    runs: Vec<RunRecord>,
    executions: Vec<ExecutionRecord>,
    artifact_types: Vec<ArtifactTypeRecord>,
    artifacts: HashMap<i64, ArtifactRecord>,
    events: Vec<EventRecord>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run(mut self, run: RunRecord) -> Self {
        self.runs.push(run);
        self
    }

    /// Add an execution; executions of a run keep insertion order
    pub fn with_execution(mut self, execution: ExecutionRecord) -> Self {
        self.executions.push(execution);
        self
    }

    pub fn with_artifact_type(mut self, artifact_type: ArtifactTypeRecord) -> Self {
        self.artifact_types.push(artifact_type);
        self
    }

    pub fn with_artifact(mut self, artifact: ArtifactRecord) -> Self {
        self.artifacts.insert(artifact.id, artifact);
        self
    }

    /// Add an event; events are returned in insertion order
    pub fn with_event(mut self, event: EventRecord) -> Self {
        self.events.push(event);
        self
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn get_executions_by_id(&self, ids: &[i64]) -> Result<Vec<ExecutionRecord>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.executions.iter().find(|e| e.id == *id))
            .cloned()
            .collect())
    }

    async fn get_artifact_types(&self) -> Result<Vec<ArtifactTypeRecord>> {
        Ok(self.artifact_types.clone())
    }

    async fn get_events_by_execution_ids(&self, ids: &[i64]) -> Result<Vec<EventRecord>> {
        Ok(self
            .events
            .iter()
            .filter(|event| ids.contains(&event.execution_id))
            .cloned()
            .collect())
    }

    async fn get_artifacts_by_id(&self, ids: &[i64]) -> Result<Vec<ArtifactRecord>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.artifacts.get(id))
            .cloned()
            .collect())
    }

    async fn get_runs(&self) -> Result<Vec<RunRecord>> {
        Ok(self.runs.clone())
    }

    async fn get_executions_by_run(&self, run_id: i64) -> Result<Vec<ExecutionRecord>> {
        Ok(self
            .executions
            .iter()
            .filter(|e| e.run_id == Some(run_id))
            .cloned()
            .collect())
    }
}
