//! Post-execution view of a pipeline run.
//!
//! A run groups the steps of one pipeline invocation in the order they
//! were declared.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::error::{LineageError, Result};
use super::step::StepView;
use super::store::MetadataStore;
use crate::domain::{ExecutionStatus, RunRecord};

/// A single pipeline run and its steps
#[derive(Debug)]
pub struct PipelineRunView {
    record: RunRecord,
    steps: Vec<StepView>,
}

impl PipelineRunView {
    /// Load the steps of a run from the store
    pub async fn load(store: Arc<dyn MetadataStore>, record: RunRecord) -> Result<Self> {
        let executions = store.get_executions_by_run(record.id).await?;
        let steps = executions
            .iter()
            .map(|execution| StepView::from_record(execution, Arc::clone(&store)))
            .collect::<Vec<_>>();

        debug!(run = %record.name, steps = steps.len(), "Loaded run");

        Ok(Self { record, steps })
    }

    pub fn id(&self) -> i64 {
        self.record.id
    }

    pub fn name(&self) -> &str {
        &self.record.name
    }

    pub fn pipeline_name(&self) -> &str {
        &self.record.pipeline_name
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.record.created_at
    }

    /// Steps in declaration order
    pub fn steps(&self) -> &[StepView] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    /// Step with the given name
    pub fn get_step(&self, name: &str) -> Result<&StepView> {
        self.steps
            .iter()
            .find(|s| s.name() == name)
            .ok_or_else(|| LineageError::StepNotFound {
                run: self.record.name.clone(),
                name: name.to_string(),
                available: self.step_names(),
            })
    }

    /// Aggregate status: any failed step fails the run, otherwise any
    /// running step keeps it running.
    pub async fn status(&self) -> Result<ExecutionStatus> {
        let mut status = ExecutionStatus::Completed;
        for step in &self.steps {
            match step.status().await? {
                ExecutionStatus::Failed => return Ok(ExecutionStatus::Failed),
                ExecutionStatus::Running => status = ExecutionStatus::Running,
                ExecutionStatus::Completed => {}
            }
        }
        Ok(status)
    }
}
