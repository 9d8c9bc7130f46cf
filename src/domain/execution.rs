//! Execution records and status derivation.
//!
//! An execution is one recorded run of a single pipeline step. The store
//! keeps its last known state as an opaque numeric code; this module turns
//! that code into a closed [`ExecutionState`] and the coarse
//! [`ExecutionStatus`] shown to users.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single execution row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Execution identity
    pub id: i64,

    /// Name of the step this execution ran
    pub name: String,

    /// Run (pipeline invocation) this execution belongs to
    pub run_id: Option<i64>,

    /// Raw state code (see [`ExecutionState`])
    pub last_known_state: i32,

    /// Parameters the step was run with
    #[serde(default)]
    pub parameters: IndexMap<String, serde_json::Value>,
}

impl ExecutionRecord {
    pub fn new(id: i64, name: impl Into<String>, state: ExecutionState) -> Self {
        Self {
            id,
            name: name.into(),
            run_id: None,
            last_known_state: state.code(),
            parameters: IndexMap::new(),
        }
    }

    /// Attach the execution to a run
    pub fn in_run(mut self, run_id: i64) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Add a parameter
    pub fn with_parameter(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Decoded state
    pub fn state(&self) -> ExecutionState {
        ExecutionState::from_code(self.last_known_state)
    }
}

/// Execution state as recorded by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    Unknown,
    New,
    Running,
    Complete,
    Failed,
    Cached,
    Canceled,

    /// Any code outside the known set
    Unrecognized(i32),
}

impl ExecutionState {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::New,
            2 => Self::Running,
            3 => Self::Complete,
            4 => Self::Failed,
            5 => Self::Cached,
            6 => Self::Canceled,
            other => Self::Unrecognized(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::New => 1,
            Self::Running => 2,
            Self::Complete => 3,
            Self::Failed => 4,
            Self::Cached => 5,
            Self::Canceled => 6,
            Self::Unrecognized(code) => code,
        }
    }

    /// Collapse into the user-facing status.
    ///
    /// Anything that is not a terminal success or in progress counts as
    /// failed, including unknown and unrecognized codes.
    pub fn status(self) -> ExecutionStatus {
        match self {
            Self::Complete | Self::Cached => ExecutionStatus::Completed,
            Self::Running => ExecutionStatus::Running,
            _ => ExecutionStatus::Failed,
        }
    }
}

/// User-facing status of a step or run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Completed,
    Running,
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Completed => "completed",
            Self::Running => "running",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}
