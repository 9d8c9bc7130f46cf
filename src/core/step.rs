//! Post-execution view of a single pipeline step.
//!
//! A step's inputs and outputs are not part of its execution record. They
//! are reconstructed by joining the execution's events against the artifact
//! rows and the artifact type dictionary. The join runs at most once per
//! view, on the first access of either side, and its result is kept for the
//! lifetime of the view.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use super::artifact::ArtifactView;
use super::error::{Direction, LineageError, Result};
use super::store::MetadataStore;
use crate::domain::{EventKind, ExecutionRecord, ExecutionState, ExecutionStatus};

/// Ordered mapping from parameter name to artifact
pub type ArtifactMap = IndexMap<String, ArtifactView>;

#[derive(Debug, Default)]
struct StepArtifacts {
    inputs: ArtifactMap,
    outputs: ArtifactMap,
}

/// A step that was executed as part of a pipeline run
pub struct StepView {
    id: i64,
    name: String,
    parameters: IndexMap<String, serde_json::Value>,
    store: Arc<dyn MetadataStore>,
    artifacts: OnceCell<StepArtifacts>,
}

impl StepView {
    /// Create a step view. Nothing is fetched until it is needed.
    pub fn new(
        id: i64,
        name: impl Into<String>,
        parameters: IndexMap<String, serde_json::Value>,
        store: Arc<dyn MetadataStore>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            parameters,
            store,
            artifacts: OnceCell::new(),
        }
    }

    /// Build a view from an execution record
    pub fn from_record(record: &ExecutionRecord, store: Arc<dyn MetadataStore>) -> Self {
        Self::new(record.id, record.name.clone(), record.parameters.clone(), store)
    }

    /// Execution id of this step
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameters used to run this step
    pub fn parameters(&self) -> &IndexMap<String, serde_json::Value> {
        &self.parameters
    }

    /// Current state as recorded by the orchestrator.
    ///
    /// Queried on every call. A missing execution record reads as
    /// [`ExecutionState::Unknown`].
    pub async fn state(&self) -> Result<ExecutionState> {
        let executions = self.store.get_executions_by_id(&[self.id]).await?;
        match executions.first() {
            Some(execution) => Ok(execution.state()),
            None => {
                warn!(step = %self.name, id = self.id, "Execution record not found");
                Ok(ExecutionState::Unknown)
            }
        }
    }

    /// Current status of the step.
    ///
    /// Unknown and unrecognized states are reported as failed.
    pub async fn status(&self) -> Result<ExecutionStatus> {
        Ok(self.state().await?.status())
    }

    /// Input artifacts, in the order their events were recorded
    pub async fn inputs(&self) -> Result<&ArtifactMap> {
        Ok(&self.ensure_artifacts().await?.inputs)
    }

    /// Output artifacts, in the order their events were recorded
    pub async fn outputs(&self) -> Result<&ArtifactMap> {
        Ok(&self.ensure_artifacts().await?.outputs)
    }

    pub async fn input_names(&self) -> Result<Vec<String>> {
        Ok(self.inputs().await?.keys().cloned().collect())
    }

    pub async fn output_names(&self) -> Result<Vec<String>> {
        Ok(self.outputs().await?.keys().cloned().collect())
    }

    /// Input artifact bound to the parameter `name`
    pub async fn get_input(&self, name: &str) -> Result<&ArtifactView> {
        let inputs = self.inputs().await?;
        self.lookup(inputs, Direction::Input, name)
    }

    /// Output artifact bound to the parameter `name`
    pub async fn get_output(&self, name: &str) -> Result<&ArtifactView> {
        let outputs = self.outputs().await?;
        self.lookup(outputs, Direction::Output, name)
    }

    fn lookup<'a>(
        &self,
        map: &'a ArtifactMap,
        direction: Direction,
        name: &str,
    ) -> Result<&'a ArtifactView> {
        map.get(name).ok_or_else(|| LineageError::NotFound {
            step: self.name.clone(),
            direction,
            name: name.to_string(),
            available: map.keys().cloned().collect(),
        })
    }

    async fn ensure_artifacts(&self) -> Result<&StepArtifacts> {
        self.artifacts.get_or_try_init(|| self.fetch_artifacts()).await
    }

    /// Join events, artifacts and types into input/output maps
    #[instrument(skip(self), fields(step = %self.name, id = self.id))]
    async fn fetch_artifacts(&self) -> Result<StepArtifacts> {
        let type_names: HashMap<i64, String> = self
            .store
            .get_artifact_types()
            .await?
            .into_iter()
            .map(|artifact_type| (artifact_type.id, artifact_type.name))
            .collect();

        let events = self.store.get_events_by_execution_ids(&[self.id]).await?;
        let artifact_ids: Vec<i64> = events.iter().map(|event| event.artifact_id).collect();
        let records = self.store.get_artifacts_by_id(&artifact_ids).await?;

        // The store pairs artifacts with events by position
        if let Some(position) = (0..events.len().max(records.len())).find(|&i| {
            match (events.get(i), records.get(i)) {
                (Some(event), Some(record)) => event.artifact_id != record.id,
                _ => true,
            }
        }) {
            return Err(LineageError::EventArtifactMismatch {
                step: self.name.clone(),
                events: events.len(),
                artifacts: records.len(),
                position,
            });
        }

        let mut artifacts = StepArtifacts::default();

        for (event, record) in events.iter().zip(records) {
            let kind = event.event_kind();
            if !matches!(kind, EventKind::Input | EventKind::Output) {
                continue;
            }

            let artifact_type = type_names.get(&record.type_id).ok_or_else(|| {
                LineageError::UnknownArtifactType {
                    step: self.name.clone(),
                    artifact_id: record.id,
                    type_id: record.type_id,
                }
            })?;

            let materializer = record
                .materializer()
                .ok_or_else(|| LineageError::MissingMaterializer {
                    step: self.name.clone(),
                    artifact_id: record.id,
                })?;

            let name = event
                .parameter_name()
                .ok_or_else(|| LineageError::MalformedEventPath {
                    step: self.name.clone(),
                    artifact_id: record.id,
                })?
                .to_string();

            let artifact = ArtifactView::new(
                record.id,
                artifact_type.as_str(),
                record.uri.as_str(),
                materializer,
            );

            if kind == EventKind::Input {
                artifacts.inputs.insert(name, artifact);
            } else {
                artifacts.outputs.insert(name, artifact);
            }
        }

        debug!(
            "Fetched {} inputs and {} outputs for step '{}'.",
            artifacts.inputs.len(),
            artifacts.outputs.len(),
            self.name
        );

        Ok(artifacts)
    }
}

impl fmt::Debug for StepView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepView")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("fetched", &self.artifacts.initialized())
            .finish()
    }
}

impl fmt::Display for StepView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parameters = serde_json::to_string(&self.parameters).map_err(|_| fmt::Error)?;
        write!(
            f,
            "StepView(id={}, name='{}', parameters={})",
            self.id, self.name, parameters
        )
    }
}
