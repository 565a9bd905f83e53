//! The image field: ties an attachment to storage, variations and the
//! resize engine across a record's lifecycle.
//!
//! ```text
//!            upload                      record saved with a key
//! Unset ───────────────▶ UploadedPendingRename ───────────────▶ Canonical
//!   ▲                        img/photo.JPG          img/image_7.jpeg
//!   │                                               img/image_7.thumbnail.jpeg
//!   └──────────────────────── delete ◀──────────────────────────────┘
//! ```
//!
//! Host-side hooks map onto [`ImageField`] methods:
//!
//! - **post_init** ([`ImageField::post_init`]) attaches variation handles to
//!   an attachment loaded with a canonical name.
//! - **form input** ([`ImageField::save_form_data`]) stores an upload under
//!   its original name, or deletes every file for the `"__deleted__"`
//!   sentinel.
//! - **post_save** ([`ImageField::post_save`]) renames the upload to
//!   `{upload_to}/{field}_{pk}{ext}`, saves the record exactly once more, and
//!   renders every variation. Only a fresh upload is processed, so that
//!   extra save does not recurse.

use crate::attachment::{AttachmentState, ImageAttachment, VariationHandle};
use crate::imaging::{CodecError, ImageCodec, ResizeEngine, ResizeOutcome};
use crate::record::{Record, RecordError};
use crate::storage::Storage;
use crate::variation::{VariationSet, derive_filename, split_extension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Form value that requests deletion of the attached image.
pub const DELETE_SENTINEL: &str = "__deleted__";

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Image processing failed: {0}")]
    Codec(#[from] CodecError),
    #[error("Record error: {0}")]
    Record(#[from] RecordError),
    #[error("Record has no primary key; save it before attaching images to `{0}`")]
    MissingPrimaryKey(String),
    #[error("Record has no image field `{0}`")]
    UnknownField(String),
}

pub type Result<T> = std::result::Result<T, LifecycleError>;

/// Form input for an image field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Leave the attachment as it is.
    Unchanged,
    /// Attach the file at this path.
    Upload(PathBuf),
    /// Remove the attached file and its variations.
    Delete,
}

impl Submission {
    /// Interpret a plain form value: the delete sentinel or nothing.
    pub fn from_form_value(value: &str) -> Self {
        if value == DELETE_SENTINEL {
            Submission::Delete
        } else {
            Submission::Unchanged
        }
    }
}

/// One variation written during a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedVariation {
    pub variation: String,
    /// Storage name of the written file.
    pub name: String,
    pub outcome: ResizeOutcome,
}

/// What [`ImageField::post_save`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing to do: no file, or the file is already canonical.
    Unchanged,
    /// The upload was renamed and its variations rendered.
    Renamed {
        from: String,
        to: String,
        rendered: Vec<RenderedVariation>,
    },
    /// The upload already had its canonical name; only variations were
    /// rendered.
    Rendered {
        name: String,
        rendered: Vec<RenderedVariation>,
    },
}

/// An image field declared on a record type.
#[derive(Debug)]
pub struct ImageField<C> {
    name: String,
    upload_to: String,
    variations: VariationSet,
    storage: Arc<dyn Storage>,
    engine: Arc<ResizeEngine<C>>,
}

impl<C: ImageCodec> ImageField<C> {
    pub fn new(
        name: impl Into<String>,
        upload_to: impl Into<String>,
        variations: VariationSet,
        storage: Arc<dyn Storage>,
        engine: Arc<ResizeEngine<C>>,
    ) -> Self {
        Self {
            name: name.into(),
            upload_to: upload_to.into().trim_matches('/').to_string(),
            variations,
            storage,
            engine,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn upload_to(&self) -> &str {
        &self.upload_to
    }

    pub fn variations(&self) -> &VariationSet {
        &self.variations
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    fn in_upload_dir(&self, filename: &str) -> String {
        if self.upload_to.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", self.upload_to, filename)
        }
    }

    /// Canonical storage name for a file currently named `current` on the
    /// record with key `pk`.
    ///
    /// The extension is lowercased and `.jpg` becomes `.jpeg`.
    pub fn canonical_name(&self, pk: &str, current: &str) -> String {
        let ext = split_extension(current).1.to_lowercase();
        let ext = if ext == ".jpg" { ".jpeg" } else { ext.as_str() };
        self.in_upload_dir(&format!("{}_{}{}", self.name, pk, ext))
    }

    /// Lifecycle state of this field's attachment on `record`.
    pub fn state<R: Record + ?Sized>(&self, record: &R) -> AttachmentState {
        let Some(attachment) = record.attachment(&self.name) else {
            return AttachmentState::Unset;
        };
        let Some(current) = attachment.name() else {
            return AttachmentState::Unset;
        };
        if attachment.is_pending() {
            return AttachmentState::UploadedPendingRename;
        }
        match record.primary_key() {
            Some(pk) if self.canonical_name(&pk, current) == current => AttachmentState::Canonical,
            _ => AttachmentState::UploadedPendingRename,
        }
    }

    /// Persisted value of this field on `record`; `""` when unset.
    pub fn db_value<R: Record + ?Sized>(&self, record: &R) -> String {
        record
            .attachment(&self.name)
            .map(ImageAttachment::to_db_value)
            .unwrap_or_default()
    }

    /// Handles for every derived variation of `canonical`.
    pub fn variation_handles(&self, canonical: &str) -> BTreeMap<String, VariationHandle> {
        self.variations
            .derived()
            .map(|spec| {
                let handle =
                    VariationHandle::new(derive_filename(canonical, spec), self.storage.clone());
                (spec.name().to_string(), handle)
            })
            .collect()
    }

    fn attachment_mut<'r, R: Record + ?Sized>(
        &self,
        record: &'r mut R,
    ) -> Result<&'r mut ImageAttachment> {
        record
            .attachment_mut(&self.name)
            .ok_or_else(|| LifecycleError::UnknownField(self.name.clone()))
    }

    /// Attach variation handles to a freshly loaded record.
    ///
    /// Only a canonical attachment gets handles; an unset or pending one is
    /// left as it is.
    pub fn post_init<R: Record + ?Sized>(&self, record: &mut R) -> Result<()> {
        if self.state(record) != AttachmentState::Canonical {
            return Ok(());
        }
        let attachment = self.attachment_mut(record)?;
        if let Some(current) = attachment.name().map(str::to_owned) {
            attachment.set_variations(self.variation_handles(&current));
        }
        Ok(())
    }

    /// Apply form input to the attachment before the record is saved.
    pub fn save_form_data<R: Record + ?Sized>(
        &self,
        record: &mut R,
        submission: &Submission,
    ) -> Result<()> {
        match submission {
            Submission::Unchanged => Ok(()),
            Submission::Delete => self.delete(record),
            Submission::Upload(source) => self.upload(record, source),
        }
    }

    /// Store `source` under its own filename and point the attachment at it.
    /// A previously attached file and its variations are removed.
    fn upload<R: Record + ?Sized>(&self, record: &mut R, source: &Path) -> Result<()> {
        self.attachment_mut(record)?;
        let filename = source
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("not a file: {}", source.display()),
                )
            })?;
        let stored = self.storage.save(&self.in_upload_dir(&filename), source)?;
        // The new file never shares a name with the old one, so this only
        // removes what it replaces.
        self.delete(record)?;
        debug!(field = %self.name, name = %stored, "upload stored, rename pending");
        self.attachment_mut(record)?.set_upload(stored);
        Ok(())
    }

    /// Remove the attached file and every derived variation, then unset the
    /// attachment. Does nothing when no file is attached.
    pub fn delete<R: Record + ?Sized>(&self, record: &mut R) -> Result<()> {
        let attachment = self.attachment_mut(record)?;
        let Some(current) = attachment.name().map(str::to_owned) else {
            return Ok(());
        };

        self.storage.delete(&current)?;
        for spec in self.variations.derived() {
            self.storage.delete(&derive_filename(&current, spec))?;
        }
        attachment.clear();

        info!(field = %self.name, name = %current, "deleted image and variations");
        Ok(())
    }

    /// Rename a pending upload to its canonical name and render variations.
    ///
    /// Call after the record has been saved. When there is an upload to
    /// process, the record is saved once more with the canonical name before
    /// any variation is rendered, so a failed render still leaves the record
    /// pointing at the file on disk. Without an upload the record is not
    /// saved again.
    pub fn post_save<R: Record + ?Sized>(&self, record: &mut R) -> Result<SaveOutcome> {
        let Some((current, pending)) = record
            .attachment(&self.name)
            .and_then(|a| a.name().map(|n| (n.to_owned(), a.is_pending())))
        else {
            return Ok(SaveOutcome::Unchanged);
        };
        let pk = record
            .primary_key()
            .ok_or_else(|| LifecycleError::MissingPrimaryKey(self.name.clone()))?;

        let canonical = self.canonical_name(&pk, &current);
        if canonical == current && !pending {
            return Ok(SaveOutcome::Unchanged);
        }

        if canonical != current {
            self.storage.rename(&current, &canonical)?;
            debug!(field = %self.name, from = %current, to = %canonical, "renamed upload");
        }
        self.attachment_mut(record)?.set_name(canonical.clone());
        record.save()?;

        let rendered = self.render(&canonical)?;
        self.attachment_mut(record)?
            .set_variations(self.variation_handles(&canonical));

        info!(
            field = %self.name,
            name = %canonical,
            variations = rendered.len(),
            "image attached"
        );
        if canonical == current {
            Ok(SaveOutcome::Rendered {
                name: canonical,
                rendered,
            })
        } else {
            Ok(SaveOutcome::Renamed {
                from: current,
                to: canonical,
                rendered,
            })
        }
    }

    /// Rebuild every variation of the canonical file `canonical`.
    ///
    /// The in-place `size` variation runs first, so derived files are copied
    /// from the already-resized canonical.
    pub fn render(&self, canonical: &str) -> Result<Vec<RenderedVariation>> {
        let mut rendered = Vec::with_capacity(self.variations.len());

        if let Some(spec) = self.variations.in_place() {
            let outcome = self
                .engine
                .resize_in_place(&self.storage.path(canonical), spec)?;
            rendered.push(RenderedVariation {
                variation: spec.name().to_string(),
                name: canonical.to_string(),
                outcome,
            });
        }

        for spec in self.variations.derived() {
            let derived = derive_filename(canonical, spec);
            self.storage.copy(canonical, &derived)?;
            let outcome = self
                .engine
                .resize_in_place(&self.storage.path(&derived), spec)?;
            rendered.push(RenderedVariation {
                variation: spec.name().to_string(),
                name: derived,
                outcome,
            });
        }

        Ok(rendered)
    }

    /// Re-render variations of an attachment that is already canonical.
    /// Returns an empty list for an unset attachment.
    pub fn regenerate(&self, attachment: &ImageAttachment) -> Result<Vec<RenderedVariation>> {
        match attachment.name() {
            Some(current) => self.render(current),
            None => Ok(Vec::new()),
        }
    }
}
