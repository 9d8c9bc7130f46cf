//! SQLite-backed metadata store.
//!
//! Opens the database written by the orchestrator in read-only mode and
//! answers the [`MetadataStore`] queries with plain SQL. Queries run on the
//! blocking thread pool; the connection is shared behind a mutex.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use tracing::debug;

use super::store::MetadataStore;
use crate::domain::{
    ArtifactRecord, ArtifactTypeRecord, EventRecord, ExecutionRecord, PathSegment, PropertyValue,
    RunRecord,
};

/// Tables expected in a metadata database
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS artifact_types (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS artifacts (
    id INTEGER PRIMARY KEY,
    type_id INTEGER NOT NULL,
    uri TEXT NOT NULL,
    properties TEXT NOT NULL DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    pipeline_name TEXT NOT NULL,
    created_at TEXT
);
CREATE TABLE IF NOT EXISTS executions (
    id INTEGER PRIMARY KEY,
    run_id INTEGER,
    position INTEGER NOT NULL DEFAULT 0,
    name TEXT NOT NULL,
    last_known_state INTEGER NOT NULL,
    parameters TEXT NOT NULL DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    execution_id INTEGER NOT NULL,
    artifact_id INTEGER NOT NULL,
    type INTEGER NOT NULL,
    path TEXT NOT NULL DEFAULT '[]'
);
";

const REQUIRED_TABLES: [&str; 5] = ["artifact_types", "artifacts", "runs", "executions", "events"];

/// Ids bound per `IN (...)` list, below SQLite's host parameter limit
const MAX_BATCH: usize = 500;

/// Read-only metadata store over a SQLite database.
///
/// Batch lookups split their ids into chunks of at most 500, so any number
/// of events or artifacts per step can be queried.
#[derive(Clone)]
pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataStore {
    /// Open an existing database without write access
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .with_context(|| format!("Failed to open metadata store: {}", path.display()))?;
        Self::from_connection(conn)
            .with_context(|| format!("Not a metadata store: {}", path.display()))
    }

    /// Wrap an existing connection, checking that the expected tables exist
    pub fn from_connection(conn: Connection) -> Result<Self> {
        for table in REQUIRED_TABLES {
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
                    params![table],
                    |row| row.get(0),
                )
                .context("Failed to inspect schema")?;
            if !exists {
                anyhow::bail!("Missing table `{}`", table);
            }
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn query<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| anyhow!("Metadata store connection poisoned"))?;
            f(&guard)
        })
        .await
        .context("Metadata store query panicked")?
    }
}

fn distinct(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn parse_created_at(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|value| {
        DateTime::parse_from_rfc3339(&value)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("Invalid run timestamp: {}", value))
    })
    .transpose()
}

fn select_executions(conn: &Connection, filter: &str, ids: &[i64]) -> Result<Vec<ExecutionRecord>> {
    let sql = format!(
        "SELECT id, name, run_id, last_known_state, parameters FROM executions WHERE {} ORDER BY position ASC, id ASC",
        filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<i64>>(2)?,
            row.get::<_, i32>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut executions = Vec::new();
    for row in rows {
        let (id, name, run_id, last_known_state, parameters) = row?;
        let parameters = serde_json::from_str(&parameters)
            .with_context(|| format!("Invalid parameters for execution {}", id))?;
        executions.push(ExecutionRecord {
            id,
            name,
            run_id,
            last_known_state,
            parameters,
        });
    }
    Ok(executions)
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn get_executions_by_id(&self, ids: &[i64]) -> Result<Vec<ExecutionRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.query(move |conn| {
            let mut by_id: HashMap<i64, ExecutionRecord> = HashMap::new();
            for chunk in distinct(&ids).chunks(MAX_BATCH) {
                let filter = format!("id IN ({})", placeholders(chunk.len()));
                for execution in select_executions(conn, &filter, chunk)? {
                    by_id.insert(execution.id, execution);
                }
            }
            // Requested order, repeating ids that were asked for more than once
            Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
        })
        .await
    }

    async fn get_artifact_types(&self) -> Result<Vec<ArtifactTypeRecord>> {
        self.query(|conn| {
            let mut stmt = conn.prepare("SELECT id, name FROM artifact_types ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok(ArtifactTypeRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
                .context("Failed to read artifact types")
        })
        .await
    }

    async fn get_events_by_execution_ids(&self, ids: &[i64]) -> Result<Vec<EventRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = distinct(ids);
        self.query(move |conn| {
            let mut events = Vec::new();
            for chunk in ids.chunks(MAX_BATCH) {
                let sql = format!(
                    "SELECT id, execution_id, artifact_id, type, path FROM events WHERE execution_id IN ({})",
                    placeholders(chunk.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i32>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                })?;

                for row in rows {
                    let (id, execution_id, artifact_id, kind, path) = row?;
                    let path: Vec<PathSegment> = serde_json::from_str(&path).with_context(|| {
                        format!(
                            "Invalid event path for execution {} / artifact {}",
                            execution_id, artifact_id
                        )
                    })?;
                    events.push((
                        id,
                        EventRecord {
                            execution_id,
                            artifact_id,
                            kind,
                            path,
                        },
                    ));
                }
            }

            // Recording order across all chunks
            events.sort_by_key(|(id, _)| *id);
            debug!(count = events.len(), "Loaded events");
            Ok(events.into_iter().map(|(_, event)| event).collect())
        })
        .await
    }

    async fn get_artifacts_by_id(&self, ids: &[i64]) -> Result<Vec<ArtifactRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids = ids.to_vec();
        self.query(move |conn| {
            let mut by_id = HashMap::new();
            for chunk in distinct(&ids).chunks(MAX_BATCH) {
                let sql = format!(
                    "SELECT id, type_id, uri, properties FROM artifacts WHERE id IN ({})",
                    placeholders(chunk.len())
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?;

                for row in rows {
                    let (id, type_id, uri, properties) = row?;
                    let properties: HashMap<String, PropertyValue> =
                        serde_json::from_str(&properties)
                            .with_context(|| format!("Invalid properties for artifact {}", id))?;
                    by_id.insert(
                        id,
                        ArtifactRecord {
                            id,
                            type_id,
                            uri,
                            properties,
                        },
                    );
                }
            }

            // Requested order, repeating ids that were asked for more than once
            Ok(ids.iter().filter_map(|id| by_id.get(id).cloned()).collect())
        })
        .await
    }

    async fn get_runs(&self) -> Result<Vec<RunRecord>> {
        self.query(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, pipeline_name, created_at FROM runs ORDER BY id ASC")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?;

            let mut runs = Vec::new();
            for row in rows {
                let (id, name, pipeline_name, created_at) = row?;
                runs.push(RunRecord {
                    id,
                    name,
                    pipeline_name,
                    created_at: parse_created_at(created_at)?,
                });
            }
            Ok(runs)
        })
        .await
    }

    async fn get_executions_by_run(&self, run_id: i64) -> Result<Vec<ExecutionRecord>> {
        self.query(move |conn| select_executions(conn, "run_id = ?", &[run_id]))
            .await
    }
}
