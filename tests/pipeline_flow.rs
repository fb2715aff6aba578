use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use colorizer_lib::colorize::{ColorizationResult, ColorizationService};
use colorizer_lib::connectivity::{AssumeOnline, Connectivity};
use colorizer_lib::pipeline::OFFLINE_MESSAGE;
use colorizer_lib::store::{ImageRecord, Subscription};
use colorizer_lib::{
    ColorizationPipeline, ColorizerError, ErrorCategory, ObjectStore, PickOutcome, PickedAsset,
    PipelineOptions, PipelineState, RecordKey, RecordSnapshot, RecordStore, Result,
    SnapshotListener, StagedImage, SubmitOutcome, UserSession,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

fn session() -> UserSession {
    UserSession {
        user_id: "u1".into(),
        email: "ada@example.com".into(),
        display_name: Some("Ada Lovelace".into()),
        id_token: "id-token".into(),
        refresh_token: "refresh-token".into(),
        expires_at: Utc::now() + ChronoDuration::hours(1),
    }
}

fn picked(uri: &str) -> PickOutcome {
    PickOutcome::Picked(PickedAsset::new(uri))
}

/// Hands out staged paths from a queue and records every call.
#[derive(Default)]
struct FakeObjects {
    suffixes: Mutex<VecDeque<&'static str>>,
    uploads: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    /// Each upload takes one permit before it proceeds.
    gate: Option<Arc<Semaphore>>,
}

impl FakeObjects {
    fn with_suffixes(suffixes: &[&'static str]) -> Self {
        Self {
            suffixes: Mutex::new(suffixes.iter().copied().collect()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ObjectStore for FakeObjects {
    async fn upload_blob(&self, session: &UserSession, source: &str) -> Result<StagedImage> {
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }
        self.uploads.lock().unwrap().push(source.to_string());
        let suffix = self
            .suffixes
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ColorizerError::storage(None, "no staging slot left"))?;
        let uid = &session.user_id;
        let path = format!("users/{uid}/images/{uid}-{suffix}");
        Ok(StagedImage {
            url: format!("https://store/{path}"),
            path,
        })
    }

    async fn delete_blob(&self, _session: &UserSession, path: &str) -> Result<()> {
        self.deletes.lock().unwrap().push(path.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct MemoryRecords {
    records: Mutex<Vec<(RecordKey, ImageRecord)>>,
    fail_writes: bool,
    creates: AtomicUsize,
}

#[async_trait]
impl RecordStore for MemoryRecords {
    async fn create_image_record(
        &self,
        _session: &UserSession,
        image_url: &str,
        colorization_id: &str,
    ) -> Result<RecordKey> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(ColorizerError::storage(None, "permission denied"));
        }
        let key = format!("-N{n:04}");
        self.records.lock().unwrap().push((
            key.clone(),
            ImageRecord {
                id: colorization_id.to_string(),
                image: image_url.to_string(),
            },
        ));
        Ok(key)
    }

    async fn delete_image_record(&self, _session: &UserSession, key: &str) -> Result<()> {
        self.records.lock().unwrap().retain(|(k, _)| k != key);
        Ok(())
    }

    async fn list_image_records(&self, _session: &UserSession) -> Result<RecordSnapshot> {
        Ok(RecordSnapshot {
            entries: self.records.lock().unwrap().clone(),
        })
    }

    async fn subscribe_to_image_records(
        &self,
        session: &UserSession,
        listener: SnapshotListener,
    ) -> Result<Subscription> {
        listener(&self.list_image_records(session).await?);
        Ok(Subscription::new(tokio::spawn(async {})))
    }
}

enum ModelBehavior {
    Answer(&'static str, &'static str),
    Fail,
    Hang,
}

struct FakeModel {
    behavior: ModelBehavior,
    calls: Mutex<Vec<String>>,
}

impl FakeModel {
    fn new(behavior: ModelBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ColorizationService for FakeModel {
    async fn colorize(&self, image_url: &str) -> Result<ColorizationResult> {
        self.calls.lock().unwrap().push(image_url.to_string());
        match self.behavior {
            ModelBehavior::Answer(output_url, id) => Ok(ColorizationResult {
                output_url: output_url.to_string(),
                id: id.to_string(),
            }),
            ModelBehavior::Fail => Err(ColorizerError::colorization(None, "model unavailable")),
            ModelBehavior::Hang => std::future::pending().await,
        }
    }
}

struct Harness {
    objects: Arc<FakeObjects>,
    records: Arc<MemoryRecords>,
    model: Arc<FakeModel>,
    pipeline: Arc<ColorizationPipeline>,
}

fn harness(
    objects: FakeObjects,
    records: MemoryRecords,
    model: ModelBehavior,
    connectivity: Arc<dyn Connectivity>,
    options: PipelineOptions,
) -> Harness {
    let objects = Arc::new(objects);
    let records = Arc::new(records);
    let model = Arc::new(FakeModel::new(model));
    let pipeline = Arc::new(ColorizationPipeline::new(
        objects.clone(),
        records.clone(),
        model.clone(),
        connectivity,
        options,
    ));
    Harness {
        objects,
        records,
        model,
        pipeline,
    }
}

fn default_harness(model: ModelBehavior) -> Harness {
    harness(
        FakeObjects::with_suffixes(&["42", "77"]),
        MemoryRecords::default(),
        model,
        Arc::new(AssumeOnline(true)),
        PipelineOptions::default(),
    )
}

#[tokio::test]
async fn submission_stages_colorizes_restages_and_records() {
    let h = default_harness(ModelBehavior::Answer("https://model/out1", "c1"));

    let outcome = h
        .pipeline
        .submit(&session(), picked("/tmp/a.jpg"))
        .await
        .expect("submit");

    let SubmitOutcome::Completed(image) = outcome else {
        panic!("expected a completed submission, got {outcome:?}");
    };
    assert_eq!(image.image_url, "https://store/users/u1/images/u1-77");
    assert_eq!(image.id, "c1");
    assert_eq!(h.pipeline.state(), PipelineState::Persisted);

    assert_eq!(
        *h.objects.uploads.lock().unwrap(),
        vec!["/tmp/a.jpg".to_string(), "https://model/out1".to_string()]
    );
    assert_eq!(
        *h.model.calls.lock().unwrap(),
        vec!["https://store/users/u1/images/u1-42".to_string()]
    );

    let snapshot = h.records.list_image_records(&session()).await.unwrap();
    assert_eq!(snapshot.len(), 1);
    let record = snapshot.get(&image.record_key).expect("record under returned key");
    assert_eq!(record.id, "c1");
    assert_eq!(record.image, "https://store/users/u1/images/u1-77");
}

#[tokio::test]
async fn staged_original_is_deleted_after_colorizing() {
    let h = default_harness(ModelBehavior::Answer("https://model/out1", "c1"));

    h.pipeline
        .submit(&session(), picked("/tmp/a.jpg"))
        .await
        .expect("submit");

    assert_eq!(
        *h.objects.deletes.lock().unwrap(),
        vec!["users/u1/images/u1-42".to_string()]
    );
}

#[tokio::test]
async fn staged_original_is_kept_when_discarding_is_disabled() {
    let h = harness(
        FakeObjects::with_suffixes(&["42", "77"]),
        MemoryRecords::default(),
        ModelBehavior::Answer("https://model/out1", "c1"),
        Arc::new(AssumeOnline(true)),
        PipelineOptions {
            discard_staged_originals: false,
            ..PipelineOptions::default()
        },
    );

    h.pipeline
        .submit(&session(), picked("/tmp/a.jpg"))
        .await
        .expect("submit");

    assert!(h.objects.deletes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failed_colorization_errors_without_writing_a_record() {
    let h = default_harness(ModelBehavior::Fail);

    let err = h
        .pipeline
        .submit(&session(), picked("/tmp/a.jpg"))
        .await
        .expect_err("model failure surfaces");

    assert_eq!(err.category(), ErrorCategory::Colorization);
    assert_eq!(h.pipeline.state(), PipelineState::Errored);
    assert_eq!(h.records.creates.load(Ordering::SeqCst), 0);
    assert_eq!(h.objects.uploads.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn blank_model_output_is_an_error() {
    let h = default_harness(ModelBehavior::Answer("  ", "c1"));

    let err = h
        .pipeline
        .submit(&session(), picked("/tmp/a.jpg"))
        .await
        .expect_err("blank output rejected");

    assert_eq!(err.category(), ErrorCategory::Colorization);
    assert_eq!(h.records.creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn record_write_failure_names_the_staged_image() {
    let h = harness(
        FakeObjects::with_suffixes(&["42", "77"]),
        MemoryRecords {
            fail_writes: true,
            ..MemoryRecords::default()
        },
        ModelBehavior::Answer("https://model/out1", "c1"),
        Arc::new(AssumeOnline(true)),
        PipelineOptions::default(),
    );

    let err = h
        .pipeline
        .submit(&session(), picked("/tmp/a.jpg"))
        .await
        .expect_err("record write failure surfaces");

    assert_eq!(err.category(), ErrorCategory::Storage);
    assert!(err
        .to_string()
        .contains("https://store/users/u1/images/u1-77"));
    assert_eq!(h.pipeline.state(), PipelineState::Errored);
}

#[tokio::test]
async fn offline_submission_is_blocked_before_any_upload() {
    let h = harness(
        FakeObjects::with_suffixes(&["42", "77"]),
        MemoryRecords::default(),
        ModelBehavior::Answer("https://model/out1", "c1"),
        Arc::new(AssumeOnline(false)),
        PipelineOptions::default(),
    );

    let outcome = h
        .pipeline
        .submit(&session(), picked("/tmp/a.jpg"))
        .await
        .expect("submit");

    assert_eq!(outcome, SubmitOutcome::Blocked(OFFLINE_MESSAGE.to_string()));
    assert_eq!(h.pipeline.state(), PipelineState::Idle);
    assert!(h.objects.uploads.lock().unwrap().is_empty());
    assert!(h.model.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_pick_changes_nothing() {
    let h = default_harness(ModelBehavior::Answer("https://model/out1", "c1"));

    let outcome = h
        .pipeline
        .submit(&session(), PickOutcome::Cancelled)
        .await
        .expect("submit");

    assert_eq!(outcome, SubmitOutcome::Cancelled);
    assert_eq!(h.pipeline.state(), PipelineState::Idle);
    assert!(h.objects.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn second_submission_is_ignored_while_one_is_running() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        FakeObjects {
            gate: Some(gate.clone()),
            ..FakeObjects::with_suffixes(&["42", "77"])
        },
        MemoryRecords::default(),
        ModelBehavior::Answer("https://model/out1", "c1"),
        Arc::new(AssumeOnline(true)),
        PipelineOptions::default(),
    );

    let mut states = h.pipeline.watch_state();
    let first = tokio::spawn({
        let pipeline = h.pipeline.clone();
        async move { pipeline.submit(&session(), picked("/tmp/a.jpg")).await }
    });
    states
        .wait_for(|state| *state == PipelineState::Staging)
        .await
        .expect("pipeline starts staging");

    let second = h
        .pipeline
        .submit(&session(), picked("/tmp/b.jpg"))
        .await
        .expect("second submit");
    assert_eq!(second, SubmitOutcome::Ignored);

    // Two uploads wait on the gate: the original and the colorized output.
    gate.add_permits(1);
    states
        .wait_for(|state| *state == PipelineState::Restaging)
        .await
        .expect("pipeline restages");
    gate.add_permits(1);

    let first = first.await.expect("join").expect("first submit");
    assert!(matches!(first, SubmitOutcome::Completed(_)));
    assert_eq!(h.records.creates.load(Ordering::SeqCst), 1);
    assert_eq!(
        *h.objects.uploads.lock().unwrap(),
        vec!["/tmp/a.jpg".to_string(), "https://model/out1".to_string()]
    );
}

#[tokio::test]
async fn pipeline_accepts_a_new_submission_after_an_error() {
    let h = harness(
        FakeObjects::with_suffixes(&["1", "2", "3"]),
        MemoryRecords::default(),
        ModelBehavior::Fail,
        Arc::new(AssumeOnline(true)),
        PipelineOptions::default(),
    );

    assert!(h.pipeline.submit(&session(), picked("/tmp/a.jpg")).await.is_err());
    assert!(h.pipeline.submit(&session(), picked("/tmp/a.jpg")).await.is_err());
    assert_eq!(h.model.calls.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn colorize_deadline_turns_a_hung_model_into_an_error() {
    let h = harness(
        FakeObjects::with_suffixes(&["42", "77"]),
        MemoryRecords::default(),
        ModelBehavior::Hang,
        Arc::new(AssumeOnline(true)),
        PipelineOptions {
            colorize_deadline: Some(Duration::from_millis(50)),
            discard_staged_originals: true,
        },
    );

    let err = h
        .pipeline
        .submit(&session(), picked("/tmp/a.jpg"))
        .await
        .expect_err("deadline expires");

    assert_eq!(err.category(), ErrorCategory::Colorization);
    assert_eq!(h.pipeline.state(), PipelineState::Errored);
    assert_eq!(h.records.creates.load(Ordering::SeqCst), 0);
    // The original is still cleaned up after the abandoned call.
    assert_eq!(h.objects.deletes.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn dropped_submission_leaves_the_pipeline_errored_and_reusable() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(
        FakeObjects {
            gate: Some(gate.clone()),
            ..FakeObjects::with_suffixes(&["42", "77"])
        },
        MemoryRecords::default(),
        ModelBehavior::Answer("https://model/out1", "c1"),
        Arc::new(AssumeOnline(true)),
        PipelineOptions::default(),
    );
    let dir = tempfile::TempDir::new().unwrap();
    let scratch = dir.path().join("picked.png");
    std::fs::write(&scratch, b"png").unwrap();
    let temporary = PickOutcome::Picked(PickedAsset {
        uri: scratch.to_string_lossy().into_owned(),
        temporary: true,
    });

    // The upload never gets past the gate, so the caller gives up mid-staging.
    let abandoned =
        tokio::time::timeout(Duration::from_millis(20), h.pipeline.submit(&session(), temporary))
            .await;
    assert!(abandoned.is_err(), "submission should still be staging");

    assert_eq!(h.pipeline.state(), PipelineState::Errored);
    assert!(!scratch.exists(), "picked scratch file is removed");

    gate.add_permits(2);
    let outcome = h
        .pipeline
        .submit(&session(), picked("/tmp/b.jpg"))
        .await
        .expect("next submission runs");
    assert!(matches!(outcome, SubmitOutcome::Completed(_)));
    assert_eq!(h.pipeline.state(), PipelineState::Persisted);
}
