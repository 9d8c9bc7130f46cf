//! Post-execution view of a single artifact.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};

use tracing::debug;

use super::error::{LineageError, Result};
use crate::materializers::{MaterializerFactory, MaterializerRegistry, Payload};

/// An artifact that was produced or consumed during a pipeline run.
///
/// Views are normally obtained from a [`StepView`](super::step::StepView)
/// rather than built by hand. The view only describes where the data lives;
/// every call to [`read`](Self::read) goes back to storage.
#[derive(Debug, Clone)]
pub struct ArtifactView {
    id: i64,
    artifact_type: String,
    uri: String,
    materializer: String,
}

impl ArtifactView {
    pub fn new(
        id: i64,
        artifact_type: impl Into<String>,
        uri: impl Into<String>,
        materializer: impl Into<String>,
    ) -> Self {
        Self {
            id,
            artifact_type: artifact_type.into(),
            uri: uri.into(),
            materializer: materializer.into(),
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Type name resolved from the artifact type dictionary
    pub fn artifact_type(&self) -> &str {
        &self.artifact_type
    }

    /// Where the artifact data is stored
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Identifier of the materializer that wrote this artifact
    pub fn materializer(&self) -> &str {
        &self.materializer
    }

    /// Materialize the data with the materializer that wrote it.
    ///
    /// Fails with [`LineageError::MaterializerLookup`] if the recorded
    /// identifier is not registered; there is no fallback materializer.
    pub async fn read(&self, registry: &MaterializerRegistry) -> Result<Payload> {
        let factory = registry.resolve(&self.materializer)?;
        self.materialize(&factory, &self.materializer).await
    }

    /// Materialize the data with an explicitly chosen materializer
    pub async fn read_with(&self, factory: &MaterializerFactory) -> Result<Payload> {
        self.materialize(factory, "<override>").await
    }

    /// Materialize and downcast to a concrete type
    pub async fn read_as<T: Any>(&self, registry: &MaterializerRegistry) -> Result<T> {
        let payload = self.read(registry).await?;
        payload
            .downcast::<T>()
            .map_err(|payload| LineageError::PayloadType {
                artifact_id: self.id,
                expected: std::any::type_name::<T>(),
                found: payload.type_name(),
            })
    }

    async fn materialize(&self, factory: &MaterializerFactory, label: &str) -> Result<Payload> {
        debug!(
            "Using '{}' to read '{}' (uri: {})",
            label, self.artifact_type, self.uri
        );

        let materializer = factory(self);
        materializer
            .handle_input()
            .await
            .map_err(|e| LineageError::Materialize {
                artifact_id: self.id,
                materializer: label.to_string(),
                source: e.into(),
            })
    }
}

impl PartialEq for ArtifactView {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ArtifactView {}

impl Hash for ArtifactView {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for ArtifactView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ArtifactView(id={}, type='{}', uri='{}', materializer='{}')",
            self.id, self.artifact_type, self.uri, self.materializer
        )
    }
}
