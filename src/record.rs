//! Records that own image attachments, and a JSON-file store for them.
//!
//! The lifecycle only needs three things from a record: its primary key, its
//! attachments by field name, and a way to persist itself. That contract is
//! the [`Record`] trait. [`RecordStore`] is the implementation the CLI uses:
//! every record is a map of field name → persisted attachment value, kept in
//! a single pretty-printed JSON file.
//!
//! ```json
//! {
//!   "version": 1,
//!   "next_id": 3,
//!   "records": {
//!     "1": { "image": "img/image_1.jpeg" },
//!     "2": { "image": "" }
//!   }
//! }
//! ```

use crate::attachment::ImageAttachment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Version of the store file format.
const STORE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Record store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Record store version {0} is not supported")]
    UnsupportedVersion(u32),
    #[error("No record with id {0}")]
    NotFound(u64),
}

/// A persistent record with image fields.
pub trait Record {
    /// Primary key, `None` until the record has been saved once.
    fn primary_key(&self) -> Option<String>;

    fn attachment(&self, field: &str) -> Option<&ImageAttachment>;

    fn attachment_mut(&mut self, field: &str) -> Option<&mut ImageAttachment>;

    /// Persist the record, assigning a primary key if it has none.
    fn save(&mut self) -> Result<(), RecordError>;
}

/// Field values of every record, optionally backed by a JSON file.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordStore {
    version: u32,
    next_id: u64,
    records: BTreeMap<u64, BTreeMap<String, String>>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            next_id: 1,
            records: BTreeMap::new(),
            path: None,
        }
    }
}

impl RecordStore {
    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the store at `path`, or start an empty one if the file is absent.
    /// Saves write back to `path`.
    pub fn open(path: &Path) -> Result<Self, RecordError> {
        let mut store = match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str::<Self>(&content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        if store.version != STORE_VERSION {
            return Err(RecordError::UnsupportedVersion(store.version));
        }
        store.path = Some(path.to_path_buf());
        Ok(store)
    }

    /// Write the store to its file, if it has one.
    pub fn flush(&self) -> Result<(), RecordError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn ids(&self) -> Vec<u64> {
        self.records.keys().copied().collect()
    }

    /// Persisted attachment of one field, without borrowing the store.
    pub fn attachment(&self, id: u64, field: &str) -> Result<ImageAttachment, RecordError> {
        let values = self.records.get(&id).ok_or(RecordError::NotFound(id))?;
        Ok(values
            .get(field)
            .map(|v| ImageAttachment::from_db_value(v))
            .unwrap_or_default())
    }

    /// A new, unsaved record with an empty attachment for each field.
    pub fn create(&mut self, fields: &[&str]) -> StoredRecord<'_> {
        let attachments = fields
            .iter()
            .map(|f| (f.to_string(), ImageAttachment::new()))
            .collect();
        StoredRecord {
            store: self,
            id: None,
            attachments,
        }
    }

    /// Load record `id` with attachments for `fields`.
    pub fn load(&mut self, id: u64, fields: &[&str]) -> Result<StoredRecord<'_>, RecordError> {
        let attachments = fields
            .iter()
            .map(|f| Ok((f.to_string(), self.attachment(id, f)?)))
            .collect::<Result<_, RecordError>>()?;
        Ok(StoredRecord {
            store: self,
            id: Some(id),
            attachments,
        })
    }

    /// Drop record `id` and write the store.
    pub fn remove(&mut self, id: u64) -> Result<(), RecordError> {
        self.records.remove(&id).ok_or(RecordError::NotFound(id))?;
        self.flush()
    }
}

/// A record loaded from, and saved into, a [`RecordStore`].
#[derive(Debug)]
pub struct StoredRecord<'a> {
    store: &'a mut RecordStore,
    id: Option<u64>,
    attachments: BTreeMap<String, ImageAttachment>,
}

impl StoredRecord<'_> {
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn attachments(&self) -> impl Iterator<Item = (&str, &ImageAttachment)> {
        self.attachments.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl Record for StoredRecord<'_> {
    fn primary_key(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }

    fn attachment(&self, field: &str) -> Option<&ImageAttachment> {
        self.attachments.get(field)
    }

    fn attachment_mut(&mut self, field: &str) -> Option<&mut ImageAttachment> {
        self.attachments.get_mut(field)
    }

    fn save(&mut self) -> Result<(), RecordError> {
        let id = match self.id {
            Some(id) => id,
            None => {
                let id = self.store.next_id;
                self.store.next_id += 1;
                self.id = Some(id);
                id
            }
        };
        let values = self
            .attachments
            .iter()
            .map(|(field, attachment)| (field.clone(), attachment.to_db_value()))
            .collect();
        self.store.records.insert(id, values);
        self.store.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_assigns_sequential_ids() {
        let mut store = RecordStore::in_memory();

        let mut first = store.create(&["image"]);
        assert_eq!(first.primary_key(), None);
        first.save().unwrap();
        assert_eq!(first.primary_key().as_deref(), Some("1"));

        let mut second = store.create(&["image"]);
        second.save().unwrap();
        assert_eq!(second.id(), Some(2));

        assert_eq!(store.ids(), vec![1, 2]);
    }

    #[test]
    fn resave_keeps_id() {
        let mut store = RecordStore::in_memory();
        let mut record = store.create(&["image"]);
        record.save().unwrap();
        record.save().unwrap();
        assert_eq!(record.id(), Some(1));
        assert_eq!(store.ids(), vec![1]);
    }

    #[test]
    fn empty_attachment_persists_as_empty_string() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("records.json");
        let mut store = RecordStore::open(&path).unwrap();
        store.create(&["image"]).save().unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["records"]["1"]["image"], "");
    }

    #[test]
    fn attachment_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data/records.json");
        {
            let mut store = RecordStore::open(&path).unwrap();
            let mut record = store.create(&["image"]);
            record
                .attachment_mut("image")
                .unwrap()
                .set_name("img/image_1.jpeg");
            record.save().unwrap();
        }

        let mut store = RecordStore::open(&path).unwrap();
        let record = store.load(1, &["image", "avatar"]).unwrap();
        assert_eq!(
            record.attachment("image").unwrap().name(),
            Some("img/image_1.jpeg")
        );
        // Fields the record was saved without load as empty
        assert!(!record.attachment("avatar").unwrap().is_set());
    }

    #[test]
    fn load_missing_record_is_not_found() {
        let mut store = RecordStore::in_memory();
        assert!(matches!(
            store.load(7, &["image"]),
            Err(RecordError::NotFound(7))
        ));
    }

    #[test]
    fn corrupt_store_is_json_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("records.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(RecordStore::open(&path), Err(RecordError::Json(_))));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("records.json");
        std::fs::write(&path, r#"{"version": 99, "next_id": 1, "records": {}}"#).unwrap();
        assert!(matches!(
            RecordStore::open(&path),
            Err(RecordError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn remove_drops_record() {
        let mut store = RecordStore::in_memory();
        store.create(&["image"]).save().unwrap();
        store.remove(1).unwrap();
        assert!(store.ids().is_empty());
        assert!(matches!(store.remove(1), Err(RecordError::NotFound(1))));
    }
}
