//! Shared test utilities for the image-attach test suite.
//!
//! Provides synthetic image fixtures, a quick way to build variation sets,
//! and an in-memory [`Record`] that counts its saves.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! create_test_image(&tmp.path().join("photo.jpg"), 1000, 1000);
//!
//! let set = variation_set(&[("thumbnail", 100, 75, true)]);
//! let mut record = TestRecord::new(&["image"]);
//! ```

use crate::attachment::ImageAttachment;
use crate::record::{Record, RecordError};
use crate::variation::{VariationSet, VariationSpec};
use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::collections::BTreeMap;
use std::path::Path;

// =========================================================================
// Image fixtures
// =========================================================================

/// Write a gradient image of the given size, in the format implied by the
/// extension. Parent directories are created.
pub fn create_test_image(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let format = ImageFormat::from_path(path).unwrap();
    match format {
        ImageFormat::Jpeg | ImageFormat::Bmp => {
            let img = RgbImage::from_fn(width, height, |x, y| {
                Rgb([(x % 256) as u8, (y % 256) as u8, 128])
            });
            img.save_with_format(path, format).unwrap();
        }
        _ => {
            let img = RgbaImage::from_fn(width, height, |x, y| {
                Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
            });
            img.save_with_format(path, format).unwrap();
        }
    }
}

// =========================================================================
// Variations
// =========================================================================

/// Build a set from `(name, width, height, force)` tuples. Panics on
/// invalid input.
pub fn variation_set(specs: &[(&str, u32, u32, bool)]) -> VariationSet {
    let specs = specs
        .iter()
        .map(|&(name, w, h, force)| VariationSpec::new(name, w, h, force).unwrap())
        .collect();
    VariationSet::new(specs).unwrap()
}

// =========================================================================
// Records
// =========================================================================

/// In-memory record. The first save assigns id 1.
#[derive(Debug, Default)]
pub struct TestRecord {
    id: Option<u64>,
    attachments: BTreeMap<String, ImageAttachment>,
    saves: usize,
}

impl TestRecord {
    /// Unsaved record with an empty attachment per field.
    pub fn new(fields: &[&str]) -> Self {
        Self {
            attachments: fields
                .iter()
                .map(|f| (f.to_string(), ImageAttachment::new()))
                .collect(),
            ..Self::default()
        }
    }

    /// Saved record loaded with persisted `(field, value)` pairs.
    pub fn with_id(id: u64, values: &[(&str, &str)]) -> Self {
        Self {
            id: Some(id),
            attachments: values
                .iter()
                .map(|(f, v)| (f.to_string(), ImageAttachment::from_db_value(v)))
                .collect(),
            saves: 0,
        }
    }

    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl Record for TestRecord {
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
        self.id.get_or_insert(1);
        self.saves += 1;
        Ok(())
    }
}
