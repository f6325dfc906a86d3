//! Commit sequencing across the object store and the record store.
//!
//! The two stores fail independently and there is no cross-store
//! transaction, so each operation is an ordered sequence of steps with
//! explicit acceptance rules for partial failure. The parent record is
//! written first because every storage key and photo row is namespaced by
//! identifiers it establishes; media uploads follow sequentially, each
//! one linked to its row before the next begins; deletions run last and
//! prefer leaving an orphaned blob over a dangling row.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use herbarium_blob::{ObjectStore, StorageKey};
use herbarium_core::{
    OwnerId, PhotoId, PhotoRef, RecordFields, RecordId, SubmissionPhase, SubmissionProgress,
    SubmitError,
};
use herbarium_media::{AttachmentSet, CompressedImage, SubmissionPlan};
use herbarium_records::RecordStore;

use crate::progress::ProgressReporter;
use crate::report::{SubmitReport, SubmitWarning};

// Progress budgets, matching the production UI constants.
const VALIDATED_PCT: u8 = 5;
const CREATE_RECORD_PCT: u8 = 25;
const UPDATE_RECORD_PCT: u8 = 20;
const UPLOAD_SPAN: u8 = 60;
const UPDATE_DELETED_PCT: u8 = 95;
const DELETE_START_PCT: u8 = 30;
const DELETE_BLOBS_PCT: u8 = 70;

/// Sequences one aggregate commit against the two backing stores.
///
/// A single commit may be in flight per orchestrator at a time; the guard
/// is cooperative and mirrors the UI disabling its submit control while a
/// save runs. There is no mid-flight cancellation and no automatic
/// rollback: a failed create can leave a record with fewer photos than
/// planned, which callers must surface rather than mask.
pub struct SubmissionOrchestrator {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    progress: ProgressReporter,
    in_flight: AtomicBool,
}

impl std::fmt::Debug for SubmissionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionOrchestrator")
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl SubmissionOrchestrator {
    /// Create an orchestrator over the given gateways.
    pub fn new(objects: Arc<dyn ObjectStore>, records: Arc<dyn RecordStore>) -> Self {
        Self::with_reporter(objects, records, ProgressReporter::default())
    }

    /// Create an orchestrator with a custom progress reporter.
    pub fn with_reporter(
        objects: Arc<dyn ObjectStore>,
        records: Arc<dyn RecordStore>,
        progress: ProgressReporter,
    ) -> Self {
        Self {
            objects,
            records,
            progress,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Observe commit progress. One value per sub-step boundary.
    #[must_use]
    pub fn subscribe_progress(&self) -> watch::Receiver<SubmissionProgress> {
        self.progress.subscribe()
    }

    /// Whether a commit is currently in flight. The UI uses this to keep
    /// its submit control disabled and to block navigation away.
    #[must_use]
    pub fn is_committing(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Commit a brand-new aggregate: validate, insert the record, then
    /// upload and link each photo in order.
    #[instrument(skip(self, fields, set), fields(owner = %owner))]
    pub async fn create(
        &self,
        owner: &OwnerId,
        fields: &RecordFields,
        set: AttachmentSet,
    ) -> Result<SubmitReport, SubmitError> {
        let _guard = self.begin_commit()?;
        let plan = set.to_plan();
        let result = self.run_create(owner, fields, &plan).await;
        self.seal(result)
    }

    /// Commit an edit of an existing aggregate: confirm the record, upload
    /// and link additions, then reconcile removals.
    #[instrument(skip(self, fields, set), fields(record = %record_id, owner = %owner))]
    pub async fn update(
        &self,
        record_id: &RecordId,
        owner: &OwnerId,
        fields: &RecordFields,
        set: AttachmentSet,
    ) -> Result<SubmitReport, SubmitError> {
        let _guard = self.begin_commit()?;
        let plan = set.to_plan();
        let result = self.run_update(record_id, owner, fields, &plan).await;
        self.seal(result)
    }

    /// Delete a whole aggregate: its media first, then the parent row,
    /// relying on the record store's cascade for the photo rows.
    #[instrument(skip(self, known), fields(record = %record_id))]
    pub async fn delete_aggregate(
        &self,
        record_id: &RecordId,
        known: &[PhotoRef],
    ) -> Result<SubmitReport, SubmitError> {
        let _guard = self.begin_commit()?;
        let result = self.run_delete(record_id, known).await;
        self.seal(result)
    }

    async fn run_create(
        &self,
        owner: &OwnerId,
        fields: &RecordFields,
        plan: &SubmissionPlan,
    ) -> Result<SubmitReport, SubmitError> {
        self.progress.set(SubmissionPhase::ValidatingInput, 0);
        fields.validate()?;
        if plan.to_upload.is_empty() {
            return Err(SubmitError::Validation(
                "at least one photo is required".into(),
            ));
        }

        self.progress
            .set(SubmissionPhase::CreatingRecord, VALIDATED_PCT);
        let record_id = self
            .records
            .insert_record(owner, fields)
            .await
            .map_err(|e| SubmitError::RecordStore(e.to_string()))?;
        info!(record = %record_id, "record created");

        self.progress
            .set(SubmissionPhase::UploadingMedia, CREATE_RECORD_PCT);
        self.upload_all(owner, &record_id, &plan.to_upload, CREATE_RECORD_PCT)
            .await?;

        Ok(SubmitReport::clean(record_id))
    }

    async fn run_update(
        &self,
        record_id: &RecordId,
        owner: &OwnerId,
        fields: &RecordFields,
        plan: &SubmissionPlan,
    ) -> Result<SubmitReport, SubmitError> {
        self.progress.set(SubmissionPhase::ValidatingInput, 0);

        // Scalar fields go first so the record id is confirmed before any
        // media work references it.
        self.progress
            .set(SubmissionPhase::UpdatingRecord, VALIDATED_PCT);
        self.records
            .update_record(record_id, fields)
            .await
            .map_err(|e| SubmitError::RecordStore(e.to_string()))?;

        self.progress
            .set(SubmissionPhase::UploadingMedia, UPDATE_RECORD_PCT);
        self.upload_all(owner, record_id, &plan.to_upload, UPDATE_RECORD_PCT)
            .await?;

        let mut warnings = Vec::new();
        if !plan.to_delete.is_empty() {
            self.progress
                .set(SubmissionPhase::DeletingMedia, UPDATE_RECORD_PCT + UPLOAD_SPAN);
            self.remove_marked(record_id, &plan.to_delete, &mut warnings)
                .await;
            self.progress
                .set(SubmissionPhase::DeletingMedia, UPDATE_DELETED_PCT);
        }

        Ok(SubmitReport {
            record_id: record_id.clone(),
            warnings,
        })
    }

    async fn run_delete(
        &self,
        record_id: &RecordId,
        known: &[PhotoRef],
    ) -> Result<SubmitReport, SubmitError> {
        self.progress
            .set(SubmissionPhase::DeletingMedia, DELETE_START_PCT);

        let mut warnings = Vec::new();
        let keys: Vec<StorageKey> = known
            .iter()
            .filter_map(|photo| StorageKey::from_public_url(&photo.url))
            .collect();
        self.remove_blobs(&keys, &mut warnings).await;
        self.progress
            .set(SubmissionPhase::DeletingMedia, DELETE_BLOBS_PCT);

        // The parent row goes regardless of blob cleanup; the store's
        // cascade removes the photo rows with it.
        self.records
            .delete_record(record_id)
            .await
            .map_err(|e| SubmitError::RecordStore(e.to_string()))?;
        info!(record = %record_id, "aggregate deleted");

        Ok(SubmitReport {
            record_id: record_id.clone(),
            warnings,
        })
    }

    /// Upload and link each image in order. One image's row is inserted
    /// before the next image's upload begins, so progress and any error
    /// are always attributable to a specific image.
    async fn upload_all(
        &self,
        owner: &OwnerId,
        record_id: &RecordId,
        images: &[CompressedImage],
        base_pct: u8,
    ) -> Result<(), SubmitError> {
        let total = images.len();
        for (index, image) in images.iter().enumerate() {
            self.upload_and_link(owner, record_id, image).await?;
            self.progress.set(
                SubmissionPhase::LinkingMedia,
                stepped(base_pct, UPLOAD_SPAN, index + 1, total),
            );
        }
        Ok(())
    }

    async fn upload_and_link(
        &self,
        owner: &OwnerId,
        record_id: &RecordId,
        image: &CompressedImage,
    ) -> Result<(), SubmitError> {
        let key = StorageKey::generate(owner);

        self.progress.set_phase(SubmissionPhase::UploadingMedia);
        self.objects
            .put(&key, image.bytes.clone())
            .await
            .map_err(|e| SubmitError::Storage(e.to_string()))?;

        let url = self.objects.public_url(&key);
        self.progress.set_phase(SubmissionPhase::LinkingMedia);
        self.records
            .insert_photo_refs(record_id, std::slice::from_ref(&url))
            .await
            .map_err(|e| SubmitError::RecordStore(e.to_string()))?;

        debug!(key = %key, "photo uploaded and linked");
        Ok(())
    }

    /// Deletion leg of an edit: blobs first, then rows. Failures here are
    /// downgraded to warnings, and the rows are deleted even when blob
    /// removal fails, because a dangling blob is invisible to users while
    /// a dangling row would render a broken image.
    async fn remove_marked(
        &self,
        record_id: &RecordId,
        doomed: &[PhotoId],
        warnings: &mut Vec<SubmitWarning>,
    ) {
        match self.records.list_photo_refs(record_id).await {
            Ok(refs) => {
                let keys: Vec<StorageKey> = refs
                    .iter()
                    .filter(|photo| doomed.contains(&photo.id))
                    .filter_map(|photo| StorageKey::from_public_url(&photo.url))
                    .collect();
                self.remove_blobs(&keys, warnings).await;
            }
            Err(err) => {
                warn!(error = %err, "could not resolve photo rows; skipping blob removal");
                warnings.push(SubmitWarning::BlobRemoval {
                    keys: Vec::new(),
                    message: err.to_string(),
                });
            }
        }

        if let Err(err) = self.records.delete_photo_refs(doomed).await {
            warn!(error = %err, "photo row deletion failed");
            warnings.push(SubmitWarning::PhotoRowRemoval {
                ids: doomed.to_vec(),
                message: err.to_string(),
            });
        }
    }

    async fn remove_blobs(&self, keys: &[StorageKey], warnings: &mut Vec<SubmitWarning>) {
        if keys.is_empty() {
            return;
        }
        if let Err(err) = self.objects.remove(keys).await {
            warn!(error = %err, "blob removal failed; continuing");
            warnings.push(SubmitWarning::BlobRemoval {
                keys: keys.iter().map(ToString::to_string).collect(),
                message: err.to_string(),
            });
        }
    }

    fn begin_commit(&self) -> Result<CommitGuard<'_>, SubmitError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SubmitError::CommitInFlight);
        }
        self.progress.begin();
        Ok(CommitGuard {
            flag: &self.in_flight,
        })
    }

    fn seal<T>(&self, result: Result<T, SubmitError>) -> Result<T, SubmitError> {
        match &result {
            Ok(_) => self.progress.finish(SubmissionPhase::Done),
            Err(err) => {
                warn!(error = %err, "submission failed");
                self.progress.finish(SubmissionPhase::Failed);
            }
        }
        result
    }
}

/// Clears the in-flight flag when a commit ends, on any path out.
struct CommitGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for CommitGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Percent after `done` of `total` upload sub-steps, rounded.
fn stepped(base: u8, span: u8, done: usize, total: usize) -> u8 {
    if total == 0 {
        return base;
    }
    let span = usize::from(span);
    let gained = (span * done + total / 2) / total;
    base.saturating_add(gained as u8)
}
