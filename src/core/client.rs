//! Entry point for post-execution queries.

use std::sync::Arc;

use tracing::instrument;

use super::error::{LineageError, Result};
use super::run::PipelineRunView;
use super::step::StepView;
use super::store::MetadataStore;
use crate::materializers::MaterializerRegistry;

/// Read-only access to recorded runs, steps and artifacts
#[derive(Clone)]
pub struct PostExecutionClient {
    store: Arc<dyn MetadataStore>,
    registry: Arc<MaterializerRegistry>,
}

impl PostExecutionClient {
    pub fn new(store: Arc<dyn MetadataStore>, registry: Arc<MaterializerRegistry>) -> Self {
        Self { store, registry }
    }

    /// Registry used to materialize artifacts
    pub fn registry(&self) -> &MaterializerRegistry {
        &self.registry
    }

    /// All recorded runs, oldest first
    pub async fn runs(&self) -> Result<Vec<PipelineRunView>> {
        let records = self.store.get_runs().await?;
        let mut runs = Vec::with_capacity(records.len());
        for record in records {
            runs.push(PipelineRunView::load(Arc::clone(&self.store), record).await?);
        }
        Ok(runs)
    }

    /// Run with the given name
    #[instrument(skip(self))]
    pub async fn get_run(&self, name: &str) -> Result<PipelineRunView> {
        let records = self.store.get_runs().await?;
        let available: Vec<String> = records.iter().map(|r| r.name.clone()).collect();

        match records.into_iter().find(|r| r.name == name) {
            Some(record) => PipelineRunView::load(Arc::clone(&self.store), record).await,
            None => Err(LineageError::RunNotFound {
                name: name.to_string(),
                available,
            }),
        }
    }

    /// Step for the given execution id
    #[instrument(skip(self))]
    pub async fn get_step(&self, execution_id: i64) -> Result<StepView> {
        let executions = self.store.get_executions_by_id(&[execution_id]).await?;
        executions
            .first()
            .map(|record| StepView::from_record(record, Arc::clone(&self.store)))
            .ok_or(LineageError::ExecutionNotFound { id: execution_id })
    }
}
