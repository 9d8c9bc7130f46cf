//! Pipeline run records.
//!
//! A run is one invocation of a pipeline; its executions are the steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single run row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run identity
    pub id: i64,

    /// Unique run name
    pub name: String,

    /// Name of the pipeline that was invoked
    pub pipeline_name: String,

    /// When the run was registered (if recorded)
    pub created_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    pub fn new(id: i64, name: impl Into<String>, pipeline_name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            pipeline_name: pipeline_name.into(),
            created_at: None,
        }
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}
