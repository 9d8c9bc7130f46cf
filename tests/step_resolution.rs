//! Step Resolution Integration Tests
//!
//! Tests for the event/artifact join behind step inputs and outputs:
//! memoization, ordering, name lookups and materialization.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use indexmap::IndexMap;
use runscope::core::{InMemoryMetadataStore, LineageError, MetadataStore, StepView};
use runscope::domain::{
    ArtifactRecord, ArtifactTypeRecord, EventKind, EventRecord, ExecutionRecord, ExecutionState,
    ExecutionStatus, RunRecord,
};
use runscope::materializers::MaterializerRegistry;
use tempfile::TempDir;

/// Store wrapper that counts how often each query runs
struct CountingStore {
    inner: InMemoryMetadataStore,
    event_fetches: AtomicUsize,
    type_fetches: AtomicUsize,
    /// Event fetches still to fail before the store recovers
    failing_event_fetches: AtomicUsize,
}

impl CountingStore {
    fn new(inner: InMemoryMetadataStore) -> Arc<Self> {
        Self::failing(inner, 0)
    }

    fn failing(inner: InMemoryMetadataStore, failures: usize) -> Arc<Self> {
        Arc::new(Self {
            inner,
            event_fetches: AtomicUsize::new(0),
            type_fetches: AtomicUsize::new(0),
            failing_event_fetches: AtomicUsize::new(failures),
        })
    }
}

#[async_trait]
impl MetadataStore for CountingStore {
    async fn get_executions_by_id(&self, ids: &[i64]) -> Result<Vec<ExecutionRecord>> {
        self.inner.get_executions_by_id(ids).await
    }

    async fn get_artifact_types(&self) -> Result<Vec<ArtifactTypeRecord>> {
        self.type_fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.get_artifact_types().await
    }

    async fn get_events_by_execution_ids(&self, ids: &[i64]) -> Result<Vec<EventRecord>> {
        self.event_fetches.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failing_event_fetches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            anyhow::bail!("database is locked");
        }
        self.inner.get_events_by_execution_ids(ids).await
    }

    async fn get_artifacts_by_id(&self, ids: &[i64]) -> Result<Vec<ArtifactRecord>> {
        self.inner.get_artifacts_by_id(ids).await
    }

    async fn get_runs(&self) -> Result<Vec<RunRecord>> {
        self.inner.get_runs().await
    }

    async fn get_executions_by_run(&self, run_id: i64) -> Result<Vec<ExecutionRecord>> {
        self.inner.get_executions_by_run(run_id).await
    }
}

/// Store whose artifact lookup ignores the requested order
struct ShuffledArtifactsStore {
    inner: InMemoryMetadataStore,
}

#[async_trait]
impl MetadataStore for ShuffledArtifactsStore {
    async fn get_executions_by_id(&self, ids: &[i64]) -> Result<Vec<ExecutionRecord>> {
        self.inner.get_executions_by_id(ids).await
    }

    async fn get_artifact_types(&self) -> Result<Vec<ArtifactTypeRecord>> {
        self.inner.get_artifact_types().await
    }

    async fn get_events_by_execution_ids(&self, ids: &[i64]) -> Result<Vec<EventRecord>> {
        self.inner.get_events_by_execution_ids(ids).await
    }

    async fn get_artifacts_by_id(&self, ids: &[i64]) -> Result<Vec<ArtifactRecord>> {
        let mut artifacts = self.inner.get_artifacts_by_id(ids).await?;
        artifacts.reverse();
        Ok(artifacts)
    }

    async fn get_runs(&self) -> Result<Vec<RunRecord>> {
        self.inner.get_runs().await
    }

    async fn get_executions_by_run(&self, run_id: i64) -> Result<Vec<ExecutionRecord>> {
        self.inner.get_executions_by_run(run_id).await
    }
}

fn base_store() -> InMemoryMetadataStore {
    InMemoryMetadataStore::new()
        .with_artifact_type(ArtifactTypeRecord::new(1, "Dataset"))
        .with_artifact_type(ArtifactTypeRecord::new(2, "Model"))
        .with_execution(ExecutionRecord::new(1, "trainer", ExecutionState::Complete))
}

fn step_over(store: Arc<dyn MetadataStore>) -> StepView {
    StepView::new(1, "trainer", IndexMap::new(), store)
}

#[tokio::test]
async fn test_round_trip_scenario() {
    let store = base_store()
        .with_artifact(ArtifactRecord::new(10, 1, "/a/10").with_materializer("builtin.json"))
        .with_artifact(ArtifactRecord::new(20, 2, "/a/20").with_materializer("builtin.bytes"))
        .with_event(EventRecord::new(1, 10, EventKind::Input, "data"))
        .with_event(EventRecord::new(1, 20, EventKind::Output, "model"));
    let step = step_over(Arc::new(store));

    assert_eq!(step.status().await.unwrap(), ExecutionStatus::Completed);

    let inputs = step.inputs().await.unwrap();
    assert_eq!(inputs.keys().collect::<Vec<_>>(), vec!["data"]);
    assert_eq!(inputs["data"].id(), 10);
    assert_eq!(inputs["data"].artifact_type(), "Dataset");
    assert_eq!(inputs["data"].uri(), "/a/10");

    let outputs = step.outputs().await.unwrap();
    assert_eq!(outputs.keys().collect::<Vec<_>>(), vec!["model"]);
    assert_eq!(outputs["model"].id(), 20);
    assert_eq!(outputs["model"].artifact_type(), "Model");
    assert_eq!(outputs["model"].uri(), "/a/20");
}

#[tokio::test]
async fn test_join_runs_once_for_any_access_pattern() {
    let inner = base_store()
        .with_artifact(ArtifactRecord::new(10, 1, "/a/10").with_materializer("builtin.json"))
        .with_artifact(ArtifactRecord::new(20, 2, "/a/20").with_materializer("builtin.bytes"))
        .with_event(EventRecord::new(1, 10, EventKind::Input, "data"))
        .with_event(EventRecord::new(1, 20, EventKind::Output, "model"));

    let store = CountingStore::new(inner.clone());
    let step = step_over(store.clone());
    step.inputs().await.unwrap();
    step.outputs().await.unwrap();
    step.get_input("data").await.unwrap();
    step.get_output("model").await.unwrap();
    step.input_names().await.unwrap();
    assert_eq!(store.event_fetches.load(Ordering::SeqCst), 1);
    assert_eq!(store.type_fetches.load(Ordering::SeqCst), 1);

    let store = CountingStore::new(inner);
    let step = step_over(store.clone());
    step.outputs().await.unwrap();
    step.inputs().await.unwrap();
    assert!(step.get_output("missing").await.is_err());
    assert_eq!(store.event_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_step_without_artifacts_is_fetched_once() {
    let store = CountingStore::new(base_store());
    let step = step_over(store.clone());

    assert!(step.inputs().await.unwrap().is_empty());
    assert!(step.outputs().await.unwrap().is_empty());
    assert!(step.inputs().await.unwrap().is_empty());

    assert_eq!(store.event_fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_status_is_not_cached() {
    let store = CountingStore::new(base_store());
    let step = step_over(store.clone());

    // Status goes to the store every time, the join is untouched
    for _ in 0..3 {
        assert_eq!(step.status().await.unwrap(), ExecutionStatus::Completed);
    }
    assert_eq!(store.event_fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_order_follows_store_event_order() {
    // Declared as (a, b, c); the store recorded them as (c, a, b)
    let store = base_store()
        .with_artifact(ArtifactRecord::new(11, 1, "/a/11").with_materializer("builtin.text"))
        .with_artifact(ArtifactRecord::new(12, 1, "/a/12").with_materializer("builtin.text"))
        .with_artifact(ArtifactRecord::new(13, 1, "/a/13").with_materializer("builtin.text"))
        .with_event(EventRecord::new(1, 13, EventKind::Input, "c"))
        .with_event(EventRecord::new(1, 11, EventKind::Input, "a"))
        .with_event(EventRecord::new(1, 12, EventKind::Input, "b"));
    let step = step_over(Arc::new(store));

    assert_eq!(step.input_names().await.unwrap(), vec!["c", "a", "b"]);
    let ids: Vec<i64> = step.inputs().await.unwrap().values().map(|a| a.id()).collect();
    assert_eq!(ids, vec![13, 11, 12]);
}

#[tokio::test]
async fn test_duplicate_name_last_write_wins() {
    let store = base_store()
        .with_artifact(ArtifactRecord::new(20, 2, "/a/20").with_materializer("builtin.bytes"))
        .with_artifact(ArtifactRecord::new(21, 1, "/a/21").with_materializer("builtin.json"))
        .with_artifact(ArtifactRecord::new(22, 2, "/a/22").with_materializer("builtin.bytes"))
        .with_event(EventRecord::new(1, 20, EventKind::Output, "model"))
        .with_event(EventRecord::new(1, 21, EventKind::Output, "metrics"))
        .with_event(EventRecord::new(1, 22, EventKind::Output, "model"));
    let step = step_over(Arc::new(store));

    let outputs = step.outputs().await.unwrap();
    assert_eq!(outputs.keys().collect::<Vec<_>>(), vec!["model", "metrics"]);
    assert_eq!(outputs["model"].id(), 22);
    assert_eq!(outputs["model"].uri(), "/a/22");
}

#[tokio::test]
async fn test_missing_input_lists_known_names() {
    let store = base_store()
        .with_artifact(ArtifactRecord::new(10, 1, "/a/10").with_materializer("builtin.json"))
        .with_artifact(ArtifactRecord::new(11, 1, "/a/11").with_materializer("builtin.json"))
        .with_event(EventRecord::new(1, 10, EventKind::Input, "train"))
        .with_event(EventRecord::new(1, 11, EventKind::Input, "test"));
    let step = step_over(Arc::new(store));

    let err = step.get_input("validation").await.unwrap_err();
    match err {
        LineageError::NotFound { name, available, .. } => {
            assert_eq!(name, "validation");
            assert_eq!(available, vec!["train", "test"]);
        }
        other => panic!("expected NotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pairing_mismatch_is_rejected() {
    let inner = base_store()
        .with_artifact(ArtifactRecord::new(10, 1, "/a/10").with_materializer("builtin.json"))
        .with_artifact(ArtifactRecord::new(20, 2, "/a/20").with_materializer("builtin.bytes"))
        .with_event(EventRecord::new(1, 10, EventKind::Input, "data"))
        .with_event(EventRecord::new(1, 20, EventKind::Output, "model"));
    let step = step_over(Arc::new(ShuffledArtifactsStore { inner }));

    let err = step.inputs().await.unwrap_err();
    assert!(matches!(
        err,
        LineageError::EventArtifactMismatch { events: 2, artifacts: 2, position: 0, .. }
    ));
}

#[tokio::test]
async fn test_missing_artifact_row_is_rejected() {
    let store = base_store()
        .with_artifact(ArtifactRecord::new(10, 1, "/a/10").with_materializer("builtin.json"))
        .with_event(EventRecord::new(1, 10, EventKind::Input, "data"))
        .with_event(EventRecord::new(1, 99, EventKind::Output, "model"));
    let step = step_over(Arc::new(store));

    let err = step.outputs().await.unwrap_err();
    assert!(matches!(
        err,
        LineageError::EventArtifactMismatch { events: 2, artifacts: 1, position: 1, .. }
    ));
}

#[tokio::test]
async fn test_bad_materializer_does_not_affect_siblings() {
    let dir = TempDir::new().unwrap();
    let good_dir = dir.path().join("metrics");
    std::fs::create_dir_all(&good_dir).unwrap();
    std::fs::write(good_dir.join("data.json"), r#"{"accuracy": 0.91}"#).unwrap();

    let store = base_store()
        .with_artifact(
            ArtifactRecord::new(20, 2, dir.path().join("model").to_string_lossy())
                .with_materializer("pytorch.TorchMaterializer"),
        )
        .with_artifact(
            ArtifactRecord::new(21, 1, good_dir.to_string_lossy())
                .with_materializer("builtin.json"),
        )
        .with_event(EventRecord::new(1, 20, EventKind::Output, "model"))
        .with_event(EventRecord::new(1, 21, EventKind::Output, "metrics"));
    let step = step_over(Arc::new(store));
    let registry = MaterializerRegistry::with_builtins();

    let model = step.get_output("model").await.unwrap();
    let err = model.read(&registry).await.unwrap_err();
    assert!(matches!(err, LineageError::MaterializerLookup { .. }));

    let metrics: serde_json::Value = step
        .get_output("metrics")
        .await
        .unwrap()
        .read_as(&registry)
        .await
        .unwrap();
    assert_eq!(metrics["accuracy"], 0.91);
}

#[tokio::test]
async fn test_read_is_not_cached() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("data.txt"), "first").unwrap();

    let store = base_store()
        .with_artifact(
            ArtifactRecord::new(30, 1, dir.path().to_string_lossy())
                .with_materializer("builtin.text"),
        )
        .with_event(EventRecord::new(1, 30, EventKind::Output, "report"));
    let step = step_over(Arc::new(store));
    let registry = MaterializerRegistry::with_builtins();
    let report = step.get_output("report").await.unwrap();

    assert_eq!(report.read_as::<String>(&registry).await.unwrap(), "first");

    std::fs::write(dir.path().join("data.txt"), "second").unwrap();
    assert_eq!(report.read_as::<String>(&registry).await.unwrap(), "second");
}

#[tokio::test]
async fn test_read_as_wrong_type() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("data.txt"), "plain text").unwrap();

    let store = base_store()
        .with_artifact(
            ArtifactRecord::new(30, 1, dir.path().to_string_lossy())
                .with_materializer("builtin.text"),
        )
        .with_event(EventRecord::new(1, 30, EventKind::Output, "report"));
    let step = step_over(Arc::new(store));
    let registry = MaterializerRegistry::with_builtins();

    let err = step
        .get_output("report")
        .await
        .unwrap()
        .read_as::<Vec<u8>>(&registry)
        .await
        .unwrap_err();
    assert!(matches!(err, LineageError::PayloadType { artifact_id: 30, .. }));
}

#[tokio::test]
async fn test_read_with_override() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("data.bin"), b"raw").unwrap();

    let store = base_store()
        .with_artifact(
            ArtifactRecord::new(30, 1, dir.path().to_string_lossy())
                .with_materializer("unregistered.Custom"),
        )
        .with_event(EventRecord::new(1, 30, EventKind::Output, "blob"));
    let step = step_over(Arc::new(store));
    let registry = MaterializerRegistry::with_builtins();
    let blob = step.get_output("blob").await.unwrap();

    assert!(blob.read(&registry).await.is_err());

    let factory = registry.resolve("builtin.bytes").unwrap();
    let payload = blob.read_with(&factory).await.unwrap();
    assert_eq!(payload.downcast::<Vec<u8>>().unwrap(), b"raw".to_vec());
}

#[tokio::test]
async fn test_failed_join_is_retried() {
    let store = CountingStore::failing(
        base_store()
            .with_artifact(ArtifactRecord::new(10, 1, "/a/10").with_materializer("builtin.json"))
            .with_artifact(ArtifactRecord::new(20, 2, "/a/20").with_materializer("builtin.bytes"))
            .with_event(EventRecord::new(1, 10, EventKind::Input, "data"))
            .with_event(EventRecord::new(1, 20, EventKind::Output, "model")),
        1,
    );
    let step = step_over(store.clone());

    let err = step.inputs().await.unwrap_err();
    assert!(matches!(err, LineageError::Store(_)));
    assert!(err.to_string().contains("database is locked"));

    let inputs = step.inputs().await.unwrap();
    assert_eq!(inputs.keys().collect::<Vec<_>>(), vec!["data"]);
    assert_eq!(inputs["data"].id(), 10);
    assert_eq!(step.output_names().await.unwrap(), vec!["model"]);
    assert_eq!(store.event_fetches.load(Ordering::SeqCst), 2);
}
