//! End-to-end submission flows over recording in-memory gateways.
//!
//! The recording wrappers capture every gateway call in order so the
//! tests can assert the commit sequencing rules, and they inject put or
//! remove failures to exercise the partial-failure semantics.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use herbarium_blob::{ObjectStore, ObjectStoreError, StorageKey};
use herbarium_blob_memory::MemoryObjectStore;
use herbarium_core::{
    OwnerId, PhotoId, PhotoRef, RecordFields, RecordId, SubmissionPhase, SubmitError,
};
use herbarium_media::{AttachmentSet, ImageCompressor, RawImageInput};
use herbarium_records::{RecordStore, RecordStoreError};
use herbarium_records_memory::MemoryRecordStore;
use herbarium_submit::{SubmissionOrchestrator, SubmitWarning};

#[derive(Debug, Clone, PartialEq)]
enum Call {
    InsertRecord,
    UpdateRecord,
    DeleteRecord,
    InsertPhotoRefs(Vec<String>),
    DeletePhotoRefs(Vec<String>),
    ListPhotoRefs,
    Put(String),
    Remove(Vec<String>),
}

type CallLog = Arc<Mutex<Vec<Call>>>;

struct RecordingObjectStore {
    inner: MemoryObjectStore,
    log: CallLog,
    fail_put_at: Option<usize>,
    fail_removals: AtomicBool,
    puts: AtomicUsize,
}

impl RecordingObjectStore {
    fn new(log: CallLog, fail_put_at: Option<usize>) -> Self {
        Self {
            inner: MemoryObjectStore::new("https://cdn.test/media"),
            log,
            fail_put_at,
            fail_removals: AtomicBool::new(false),
            puts: AtomicUsize::new(0),
        }
    }

    fn fail_removals(&self) {
        self.fail_removals.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for RecordingObjectStore {
    async fn put(&self, key: &StorageKey, data: Bytes) -> Result<(), ObjectStoreError> {
        let seq = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_put_at == Some(seq) {
            return Err(ObjectStoreError::Backend("injected put failure".into()));
        }
        self.log.lock().unwrap().push(Call::Put(key.to_string()));
        self.inner.put(key, data).await
    }

    async fn remove(&self, keys: &[StorageKey]) -> Result<(), ObjectStoreError> {
        self.log.lock().unwrap().push(Call::Remove(
            keys.iter().map(ToString::to_string).collect(),
        ));
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::PartialRemoval {
                failed: keys.len(),
                total: keys.len(),
            });
        }
        self.inner.remove(keys).await
    }

    fn public_url(&self, key: &StorageKey) -> String {
        self.inner.public_url(key)
    }
}

struct RecordingRecordStore {
    inner: MemoryRecordStore,
    log: CallLog,
}

impl RecordingRecordStore {
    fn new(log: CallLog) -> Self {
        Self {
            inner: MemoryRecordStore::new(),
            log,
        }
    }
}

#[async_trait]
impl RecordStore for RecordingRecordStore {
    async fn insert_record(
        &self,
        owner: &OwnerId,
        fields: &RecordFields,
    ) -> Result<RecordId, RecordStoreError> {
        self.log.lock().unwrap().push(Call::InsertRecord);
        self.inner.insert_record(owner, fields).await
    }

    async fn update_record(
        &self,
        id: &RecordId,
        fields: &RecordFields,
    ) -> Result<(), RecordStoreError> {
        self.log.lock().unwrap().push(Call::UpdateRecord);
        self.inner.update_record(id, fields).await
    }

    async fn delete_record(&self, id: &RecordId) -> Result<(), RecordStoreError> {
        self.log.lock().unwrap().push(Call::DeleteRecord);
        self.inner.delete_record(id).await
    }

    async fn get_record(
        &self,
        id: &RecordId,
    ) -> Result<Option<herbarium_core::AggregateRecord>, RecordStoreError> {
        self.inner.get_record(id).await
    }

    async fn insert_photo_refs(
        &self,
        record_id: &RecordId,
        urls: &[String],
    ) -> Result<Vec<PhotoRef>, RecordStoreError> {
        self.log
            .lock()
            .unwrap()
            .push(Call::InsertPhotoRefs(urls.to_vec()));
        self.inner.insert_photo_refs(record_id, urls).await
    }

    async fn delete_photo_refs(&self, ids: &[PhotoId]) -> Result<(), RecordStoreError> {
        self.log.lock().unwrap().push(Call::DeletePhotoRefs(
            ids.iter().map(ToString::to_string).collect(),
        ));
        self.inner.delete_photo_refs(ids).await
    }

    async fn list_photo_refs(
        &self,
        record_id: &RecordId,
    ) -> Result<Vec<PhotoRef>, RecordStoreError> {
        self.log.lock().unwrap().push(Call::ListPhotoRefs);
        self.inner.list_photo_refs(record_id).await
    }
}

fn harness(
    fail_put_at: Option<usize>,
) -> (
    Arc<RecordingObjectStore>,
    Arc<RecordingRecordStore>,
    SubmissionOrchestrator,
    CallLog,
) {
    let log: CallLog = Arc::new(Mutex::new(Vec::new()));
    let objects = Arc::new(RecordingObjectStore::new(Arc::clone(&log), fail_put_at));
    let records = Arc::new(RecordingRecordStore::new(Arc::clone(&log)));
    let orchestrator = SubmissionOrchestrator::new(
        Arc::clone(&objects) as Arc<dyn ObjectStore>,
        Arc::clone(&records) as Arc<dyn RecordStore>,
    );
    (objects, records, orchestrator, log)
}

fn fields() -> RecordFields {
    RecordFields {
        local_name: "kin-bun".into(),
        english_name: "Butterfly pea".into(),
        botanical_name: "Fabaceae".into(),
        scientific_name: "Clitoria ternatea".into(),
        description: "Climbing vine with deep blue flowers".into(),
        location: "Hedgerows and village fences".into(),
        ailments: "Used for hair and skin preparations".into(),
        reference: "Community survey 2025".into(),
    }
}

fn tiny_jpeg() -> Bytes {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([40, 90, 60]));
    let mut buf = Vec::new();
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 80);
    encoder.encode_image(&img).unwrap();
    Bytes::from(buf)
}

async fn staged_set(count: usize) -> AttachmentSet {
    let mut set = AttachmentSet::new(ImageCompressor::default());
    for i in 0..count {
        set.add_new(RawImageInput::new(format!("{i}.jpg"), tiny_jpeg()))
            .await
            .unwrap();
    }
    set
}

#[tokio::test]
async fn create_inserts_record_before_any_put_and_links_each_photo() {
    let (_objects, _records, orchestrator, log) = harness(None);
    let owner = OwnerId::new("user-1");

    let report = orchestrator
        .create(&owner, &fields(), staged_set(3).await)
        .await
        .unwrap();
    assert!(report.is_clean());

    let log = log.lock().unwrap();
    assert_eq!(
        log.iter()
            .filter(|call| matches!(call, Call::InsertRecord))
            .count(),
        1
    );
    assert_eq!(log[0], Call::InsertRecord, "record row must come first");

    // Three upload sub-steps, each a put immediately followed by the
    // matching single-URL link.
    let rest = &log[1..];
    assert_eq!(rest.len(), 6);
    for pair in rest.chunks(2) {
        let Call::Put(key) = &pair[0] else {
            panic!("expected put, got {pair:?}");
        };
        let Call::InsertPhotoRefs(urls) = &pair[1] else {
            panic!("expected link after put, got {pair:?}");
        };
        assert!(key.starts_with("user-1/"), "keys are owner-namespaced");
        assert!(key.ends_with(".jpg"));
        assert_eq!(urls.len(), 1, "one row per upload sub-step");
        assert!(
            urls[0].ends_with(key.as_str()),
            "row must reference the key just uploaded"
        );
    }
}

#[tokio::test]
async fn create_two_photos_succeeds_end_to_end() {
    let (objects, records, orchestrator, _log) = harness(None);
    let rx = orchestrator.subscribe_progress();

    let report = orchestrator
        .create(&OwnerId::new("user-2"), &fields(), staged_set(2).await)
        .await
        .unwrap();

    let progress = *rx.borrow();
    assert_eq!(progress.phase, SubmissionPhase::Done);
    assert_eq!(progress.percent, 100);

    assert_eq!(records.inner.record_count(), 1);
    assert_eq!(objects.inner.len(), 2);
    let refs = records.inner.list_photo_refs(&report.record_id).await.unwrap();
    assert_eq!(refs.len(), 2);
}

#[tokio::test]
async fn create_fails_on_second_put_with_partial_record_kept() {
    let (objects, records, orchestrator, _log) = harness(Some(2));
    let rx = orchestrator.subscribe_progress();

    let err = orchestrator
        .create(&OwnerId::new("user-3"), &fields(), staged_set(3).await)
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Storage(_)));
    assert_eq!(rx.borrow().phase, SubmissionPhase::Failed);

    // No rollback: the record and the first photo survive the failure.
    assert_eq!(records.inner.record_count(), 1);
    assert_eq!(records.inner.photo_count(), 1);
    assert_eq!(objects.inner.len(), 1);
}

#[tokio::test]
async fn create_rejects_incomplete_fields_before_any_gateway_call() {
    let (_objects, _records, orchestrator, log) = harness(None);

    let mut incomplete = fields();
    incomplete.description = String::new();
    let err = orchestrator
        .create(&OwnerId::new("user-4"), &incomplete, staged_set(1).await)
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Validation(_)));
    assert!(log.lock().unwrap().is_empty(), "no gateway calls on validation failure");
}

#[tokio::test]
async fn create_rejects_empty_photo_plan() {
    let (_objects, _records, orchestrator, log) = harness(None);

    let err = orchestrator
        .create(&OwnerId::new("user-5"), &fields(), staged_set(0).await)
        .await
        .unwrap_err();

    assert!(matches!(err, SubmitError::Validation(_)));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn edit_reconciles_removal_and_addition_despite_blob_removal_failure() {
    let (objects, records, orchestrator, log) = harness(None);
    let owner = OwnerId::new("user-6");

    let report = orchestrator
        .create(&owner, &fields(), staged_set(2).await)
        .await
        .unwrap();
    let record_id = report.record_id;
    let seeded = records.inner.list_photo_refs(&record_id).await.unwrap();
    assert_eq!(seeded.len(), 2);

    // The contributor removes the first photo and adds a new one; blob
    // removal is made to fail mid-commit.
    let mut set = AttachmentSet::from_existing(ImageCompressor::default(), seeded.clone());
    assert!(set.mark_removed(&seeded[0].id));
    set.add_new(RawImageInput::new("new.jpg", tiny_jpeg()))
        .await
        .unwrap();
    objects.fail_removals();
    log.lock().unwrap().clear();

    let mut updated = fields();
    updated.description = "Now with fruit details".into();
    let report = orchestrator
        .update(&record_id, &owner, &updated, set)
        .await
        .unwrap();

    // The commit itself succeeds; the failed removal is reported apart.
    assert_eq!(report.warnings.len(), 1);
    assert!(matches!(report.warnings[0], SubmitWarning::BlobRemoval { .. }));

    // The row for the removed photo is gone even though its blob is not.
    let remaining = records.inner.list_photo_refs(&record_id).await.unwrap();
    assert_eq!(remaining.len(), 2, "one kept row plus one new row");
    assert!(remaining.iter().all(|photo| photo.id != seeded[0].id));
    assert_eq!(objects.inner.len(), 3, "failed removal leaves the blob");

    let stored = records.inner.get_record(&record_id).await.unwrap().unwrap();
    assert_eq!(stored.fields.description, "Now with fruit details");

    // Ordering within the edit: record first, uploads next, deletions last.
    let log = log.lock().unwrap();
    assert_eq!(log[0], Call::UpdateRecord);
    let put_pos = log.iter().position(|c| matches!(c, Call::Put(_))).unwrap();
    let remove_pos = log.iter().position(|c| matches!(c, Call::Remove(_))).unwrap();
    let row_delete_pos = log
        .iter()
        .position(|c| matches!(c, Call::DeletePhotoRefs(_)))
        .unwrap();
    assert!(put_pos < remove_pos);
    assert!(remove_pos < row_delete_pos, "blobs are removed before rows");
}

#[tokio::test]
async fn delete_aggregate_removes_blobs_then_cascades_rows() {
    let (objects, records, orchestrator, log) = harness(None);
    let owner = OwnerId::new("user-7");

    let report = orchestrator
        .create(&owner, &fields(), staged_set(4).await)
        .await
        .unwrap();
    let record_id = report.record_id;
    let known = records.inner.list_photo_refs(&record_id).await.unwrap();
    log.lock().unwrap().clear();

    let report = orchestrator
        .delete_aggregate(&record_id, &known)
        .await
        .unwrap();
    assert!(report.is_clean());

    assert_eq!(records.inner.record_count(), 0);
    assert_eq!(records.inner.photo_count(), 0, "cascade removed photo rows");
    assert_eq!(objects.inner.len(), 0, "all four blobs reclaimed");

    let log = log.lock().unwrap();
    let Call::Remove(keys) = &log[0] else {
        panic!("expected blob removal first, got {log:?}");
    };
    assert_eq!(keys.len(), 4);
    assert_eq!(log[1], Call::DeleteRecord);
}

#[tokio::test]
async fn delete_aggregate_proceeds_when_blob_removal_fails() {
    let (objects, records, orchestrator, _log) = harness(None);
    let owner = OwnerId::new("user-8");

    let report = orchestrator
        .create(&owner, &fields(), staged_set(1).await)
        .await
        .unwrap();
    let record_id = report.record_id;
    let known = records.inner.list_photo_refs(&record_id).await.unwrap();
    objects.fail_removals();

    let report = orchestrator
        .delete_aggregate(&record_id, &known)
        .await
        .unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert_eq!(records.inner.record_count(), 0, "row delete still happened");
    assert_eq!(objects.inner.len(), 1, "blob left behind, reported as warning");
}

#[tokio::test]
async fn a_second_commit_is_rejected_while_one_is_in_flight() {
    struct GatedObjectStore {
        inner: MemoryObjectStore,
        gate: Arc<tokio::sync::Semaphore>,
    }

    #[async_trait]
    impl ObjectStore for GatedObjectStore {
        async fn put(&self, key: &StorageKey, data: Bytes) -> Result<(), ObjectStoreError> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;
            permit.forget();
            self.inner.put(key, data).await
        }

        async fn remove(&self, keys: &[StorageKey]) -> Result<(), ObjectStoreError> {
            self.inner.remove(keys).await
        }

        fn public_url(&self, key: &StorageKey) -> String {
            self.inner.public_url(key)
        }
    }

    let gate = Arc::new(tokio::sync::Semaphore::new(0));
    let orchestrator = Arc::new(SubmissionOrchestrator::new(
        Arc::new(GatedObjectStore {
            inner: MemoryObjectStore::default(),
            gate: Arc::clone(&gate),
        }),
        Arc::new(MemoryRecordStore::new()),
    ));
    let owner = OwnerId::new("user-9");

    let gated_set = staged_set(1).await;
    let first = tokio::spawn({
        let orchestrator = Arc::clone(&orchestrator);
        let owner = owner.clone();
        async move { orchestrator.create(&owner, &fields(), gated_set).await }
    });

    // Wait for the first commit to reach its gated upload.
    while !orchestrator.is_committing() {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let err = orchestrator
        .create(&owner, &fields(), staged_set(1).await)
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::CommitInFlight));

    gate.add_permits(8);
    let report = first.await.unwrap().unwrap();
    assert!(report.is_clean());
    assert!(!orchestrator.is_committing());
}

#[tokio::test]
async fn progress_is_monotonic_and_ends_terminal() {
    let (_objects, _records, orchestrator, _log) = harness(None);
    let rx = orchestrator.subscribe_progress();

    let watcher = tokio::spawn(async move {
        let mut rx = rx;
        let mut seen = vec![*rx.borrow()];
        while rx.changed().await.is_ok() {
            let progress = *rx.borrow();
            seen.push(progress);
            if progress.phase.is_terminal() {
                break;
            }
        }
        seen
    });

    orchestrator
        .create(&OwnerId::new("user-10"), &fields(), staged_set(3).await)
        .await
        .unwrap();

    let seen = watcher.await.unwrap();
    for window in seen.windows(2) {
        assert!(
            window[1].percent >= window[0].percent,
            "progress moved backwards: {seen:?}"
        );
    }
    let last = seen.last().unwrap();
    assert_eq!(last.phase, SubmissionPhase::Done);
    assert_eq!(last.percent, 100);
}

#[tokio::test]
async fn abandoned_edit_leaves_stores_untouched() {
    let (objects, records, orchestrator, _log) = harness(None);
    let owner = OwnerId::new("user-11");

    let report = orchestrator
        .create(&owner, &fields(), staged_set(2).await)
        .await
        .unwrap();
    let seeded = records.inner.list_photo_refs(&report.record_id).await.unwrap();

    // Stage removals and additions, then walk away without committing.
    let mut set = AttachmentSet::from_existing(ImageCompressor::default(), seeded.clone());
    set.mark_removed(&seeded[0].id);
    set.add_new(RawImageInput::new("draft.jpg", tiny_jpeg()))
        .await
        .unwrap();
    drop(set);

    assert_eq!(records.inner.photo_count(), 2);
    assert_eq!(objects.inner.len(), 2);
}
