//! Event records linking executions to artifacts.
//!
//! Each event says that an execution consumed (INPUT) or produced (OUTPUT)
//! an artifact. The first segment of the event path is the name of the
//! step parameter the artifact was bound to.

use serde::{Deserialize, Serialize};

/// A single event row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Execution this event belongs to
    pub execution_id: i64,

    /// Artifact consumed or produced
    pub artifact_id: i64,

    /// Raw event type code (see [`EventKind`])
    pub kind: i32,

    /// Structured path; the first segment names the step parameter
    #[serde(default)]
    pub path: Vec<PathSegment>,
}

impl EventRecord {
    /// Create an event bound to a single named parameter
    pub fn new(
        execution_id: i64,
        artifact_id: i64,
        kind: EventKind,
        name: impl Into<String>,
    ) -> Self {
        Self {
            execution_id,
            artifact_id,
            kind: kind.code(),
            path: vec![PathSegment::Key(name.into())],
        }
    }

    /// Decoded event type
    pub fn event_kind(&self) -> EventKind {
        EventKind::from_code(self.kind)
    }

    /// Parameter name taken from the first path segment
    pub fn parameter_name(&self) -> Option<&str> {
        match self.path.first() {
            Some(PathSegment::Key(key)) => Some(key.as_str()),
            _ => None,
        }
    }
}

/// One segment of an event path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathSegment {
    Key(String),
    Index(i64),
}

/// Event type, decoded from the store's numeric code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Unknown,
    DeclaredOutput,
    DeclaredInput,
    Input,
    Output,
    InternalInput,
    InternalOutput,

    /// Any code outside the known set
    Unrecognized(i32),
}

impl EventKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Unknown,
            1 => Self::DeclaredOutput,
            2 => Self::DeclaredInput,
            3 => Self::Input,
            4 => Self::Output,
            5 => Self::InternalInput,
            6 => Self::InternalOutput,
            other => Self::Unrecognized(other),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::DeclaredOutput => 1,
            Self::DeclaredInput => 2,
            Self::Input => 3,
            Self::Output => 4,
            Self::InternalInput => 5,
            Self::InternalOutput => 6,
            Self::Unrecognized(code) => code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_codes() {
        for code in 0..=6 {
            assert_eq!(EventKind::from_code(code).code(), code);
        }
        assert_eq!(EventKind::from_code(3), EventKind::Input);
        assert_eq!(EventKind::from_code(4), EventKind::Output);
        assert_eq!(EventKind::from_code(42), EventKind::Unrecognized(42));
    }

    #[test]
    fn test_parameter_name_from_first_segment() {
        let mut event = EventRecord::new(1, 10, EventKind::Input, "data");
        event.path.push(PathSegment::Index(0));
        assert_eq!(event.parameter_name(), Some("data"));

        event.path = vec![PathSegment::Index(0)];
        assert_eq!(event.parameter_name(), None);

        event.path.clear();
        assert_eq!(event.parameter_name(), None);
    }

    #[test]
    fn test_event_path_serialization() {
        let event = EventRecord::new(1, 20, EventKind::Output, "model");

        let json = serde_json::to_string(&event.path).unwrap();
        assert_eq!(json, r#"[{"key":"model"}]"#);
    }
}
