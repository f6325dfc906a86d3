//! Client-side staging of an aggregate's photographs.
//!
//! While a contributor edits a record, every photo action is buffered in
//! an [`AttachmentSet`]; nothing touches the backing stores until the
//! whole edit is committed. A cancelled editing session therefore leaves
//! storage untouched.

use herbarium_core::{PhotoId, PhotoRef};

use crate::compressor::{CompressedImage, ImageCompressor, RawImageInput};
use crate::error::MediaError;

/// Photos allowed per record, counting persisted and pending uploads.
pub const MAX_PHOTOS: usize = 6;

/// One photograph's lifecycle state within an aggregate being edited.
#[derive(Debug, Clone)]
pub enum Attachment {
    /// Already stored; came from the record store.
    Persisted { id: PhotoId, url: String },
    /// Compressed and waiting for the next commit.
    PendingUpload { image: CompressedImage },
    /// Marked for deletion; still displayed struck-through until commit.
    PendingRemoval { id: PhotoId, url: String },
}

/// The gateway work one commit has to perform, derived from the set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionPlan {
    /// Images to upload and link, in display order.
    pub to_upload: Vec<CompressedImage>,
    /// Photo rows to delete (blobs first, then rows).
    pub to_delete: Vec<PhotoId>,
    /// Persisted photos left untouched.
    pub keep: Vec<PhotoId>,
}

/// Ordered collection of attachments for one aggregate.
///
/// Invariant: persisted photos plus pending uploads never exceed
/// [`MAX_PHOTOS`]; removed pending uploads disappear from the set
/// entirely.
#[derive(Debug)]
pub struct AttachmentSet {
    compressor: ImageCompressor,
    entries: Vec<Attachment>,
}

impl AttachmentSet {
    /// Empty set for the create flow.
    #[must_use]
    pub fn new(compressor: ImageCompressor) -> Self {
        Self {
            compressor,
            entries: Vec::new(),
        }
    }

    /// Seed a set from the currently persisted photo rows (edit flow).
    #[must_use]
    pub fn from_existing(compressor: ImageCompressor, photos: Vec<PhotoRef>) -> Self {
        let entries = photos
            .into_iter()
            .map(|photo| Attachment::Persisted {
                id: photo.id,
                url: photo.url,
            })
            .collect();
        Self { compressor, entries }
    }

    /// Compress a newly picked photo and stage it for upload.
    ///
    /// The capacity check runs before any compression work, so an
    /// over-limit add costs nothing. Undecodable input surfaces as
    /// [`MediaError::Decode`] and leaves the set unchanged; the caller may
    /// continue with the remaining files.
    pub async fn add_new(&mut self, raw: RawImageInput) -> Result<&Attachment, MediaError> {
        if self.count() >= MAX_PHOTOS {
            return Err(MediaError::CapacityExceeded { max: MAX_PHOTOS });
        }
        let image = self.compressor.compress(raw).await?;
        self.entries.push(Attachment::PendingUpload { image });
        Ok(self.entries.last().expect("entry was just pushed"))
    }

    /// Mark a persisted photo for removal at the next commit.
    /// Returns `false` when no persisted photo carries the id.
    pub fn mark_removed(&mut self, id: &PhotoId) -> bool {
        for entry in &mut self.entries {
            if let Attachment::Persisted { id: pid, url } = entry {
                if pid == id {
                    let removed = Attachment::PendingRemoval {
                        id: pid.clone(),
                        url: std::mem::take(url),
                    };
                    *entry = removed;
                    return true;
                }
            }
        }
        false
    }

    /// Drop the `index`-th pending upload outright (no state to keep).
    /// Returns `false` when the index is out of range.
    pub fn undo_new(&mut self, index: usize) -> bool {
        let position = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, Attachment::PendingUpload { .. }))
            .map(|(i, _)| i)
            .nth(index);
        match position {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }

    /// Live photo count: persisted plus pending uploads.
    #[must_use]
    pub fn count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Attachment::Persisted { .. } | Attachment::PendingUpload { .. }
                )
            })
            .count()
    }

    /// Whether the set holds no live photos.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// All entries in display order, including pending removals.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.entries
    }

    /// Derive the commit plan. Pure: repeated calls on an unchanged set
    /// yield identical plans.
    #[must_use]
    pub fn to_plan(&self) -> SubmissionPlan {
        let mut plan = SubmissionPlan::default();
        for entry in &self.entries {
            match entry {
                Attachment::Persisted { id, .. } => plan.keep.push(id.clone()),
                Attachment::PendingUpload { image } => plan.to_upload.push(image.clone()),
                Attachment::PendingRemoval { id, .. } => plan.to_delete.push(id.clone()),
            }
        }
        plan
    }
}
