//! The per-record value of an image field.
//!
//! An [`ImageAttachment`] holds the storage name of the attached file (or
//! nothing) and, once the file has its canonical name, one
//! [`VariationHandle`] per derived variation. Handles are cheap views: they
//! carry the variation's storage name and answer `path`, `url` and `size`
//! from storage on demand.
//!
//! The persisted form is just the storage name; an empty attachment
//! persists as the empty string.

use crate::storage::Storage;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Accessor for one derived variation file.
#[derive(Clone)]
pub struct VariationHandle {
    name: String,
    storage: Arc<dyn Storage>,
}

impl VariationHandle {
    pub fn new(name: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        Self {
            name: name.into(),
            storage,
        }
    }

    /// Storage name of the variation file.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> PathBuf {
        self.storage.path(&self.name)
    }

    pub fn url(&self) -> String {
        self.storage.url(&self.name)
    }

    pub fn size(&self) -> io::Result<u64> {
        self.storage.size(&self.name)
    }

    pub fn exists(&self) -> bool {
        self.storage.exists(&self.name)
    }
}

impl fmt::Debug for VariationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("VariationHandle").field(&self.name).finish()
    }
}

impl PartialEq for VariationHandle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Where an attachment is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentState {
    /// No file.
    Unset,
    /// A file is stored under its upload name and awaits the post-save rename.
    UploadedPendingRename,
    /// The file has its canonical name and variations exist.
    Canonical,
}

/// Value of an image field on one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageAttachment {
    name: Option<String>,
    variations: BTreeMap<String, VariationHandle>,
    /// Set by an upload, cleared once post-save has processed the file.
    pending: bool,
}

impl ImageAttachment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a persisted value. The empty string means no file.
    pub fn from_db_value(value: &str) -> Self {
        Self {
            name: (!value.is_empty()).then(|| value.to_string()),
            variations: BTreeMap::new(),
            pending: false,
        }
    }

    /// Persisted form: the storage name, or `""` when no file is attached.
    pub fn to_db_value(&self) -> String {
        self.name.clone().unwrap_or_default()
    }

    /// Storage name of the attached file.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.name.is_some()
    }

    /// Point at a new file. Handles for the previous file are dropped.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
        self.variations.clear();
        self.pending = false;
    }

    /// Point at a freshly uploaded file that post-save has not processed yet.
    pub(crate) fn set_upload(&mut self, name: impl Into<String>) {
        self.set_name(name);
        self.pending = true;
    }

    /// Whether the attached file is an upload awaiting post-save, even when
    /// its name already happens to be canonical.
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Detach the file and every handle.
    pub fn clear(&mut self) {
        self.name = None;
        self.variations.clear();
        self.pending = false;
    }

    /// Handle for variation `name`, present only once the file is canonical.
    pub fn variation(&self, name: &str) -> Option<&VariationHandle> {
        self.variations.get(name)
    }

    /// Handles keyed by variation name, in name order.
    pub fn variations(&self) -> impl Iterator<Item = (&str, &VariationHandle)> {
        self.variations.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn has_variations(&self) -> bool {
        !self.variations.is_empty()
    }

    pub(crate) fn set_variations(&mut self, handles: BTreeMap<String, VariationHandle>) {
        self.variations = handles;
    }
}
