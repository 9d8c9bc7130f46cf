//! Artifact records as stored in the metadata store.
//!
//! Artifacts are addressable units of data produced or consumed by an
//! execution. The store keeps their location and a property bag; the
//! payload itself lives at `uri` and is only read on demand.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Property key under which the writing materializer is recorded
pub const MATERIALIZER_PROPERTY_KEY: &str = "materializer";

/// A single artifact row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Artifact identity
    pub id: i64,

    /// Identity of the artifact's type (see [`ArtifactTypeRecord`])
    pub type_id: i64,

    /// Storage location of the payload
    pub uri: String,

    /// Arbitrary properties attached when the artifact was written
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

impl ArtifactRecord {
    /// Create an artifact record without properties
    pub fn new(id: i64, type_id: i64, uri: impl Into<String>) -> Self {
        Self {
            id,
            type_id,
            uri: uri.into(),
            properties: HashMap::new(),
        }
    }

    /// Attach a property
    pub fn with_property(mut self, key: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Attach the materializer identifier used to write this artifact
    pub fn with_materializer(self, materializer: impl Into<String>) -> Self {
        self.with_property(
            MATERIALIZER_PROPERTY_KEY,
            PropertyValue::String(materializer.into()),
        )
    }

    /// The materializer identifier, if present and stored as a string
    pub fn materializer(&self) -> Option<&str> {
        match self.properties.get(MATERIALIZER_PROPERTY_KEY) {
            Some(PropertyValue::String(value)) => Some(value.as_str()),
            _ => None,
        }
    }
}

/// Typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Int(i64),
    Double(f64),
    String(String),
}

/// Entry of the artifact type dictionary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactTypeRecord {
    /// Type identity
    pub id: i64,

    /// Human-readable type name (e.g. "Dataset", "Model")
    pub name: String,
}

impl ArtifactTypeRecord {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}
