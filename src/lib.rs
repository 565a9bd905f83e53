//! # image-attach
//!
//! Image attachments for persistent records: a file uploaded to a record's
//! image field is renamed to a canonical name the first time the record is
//! saved, resized copies ("variations") are written next to it, and deleting
//! the image removes every file it owns.
//!
//! # Lifecycle
//!
//! ```text
//! 1. Upload     photo.JPG      →  media/img/photo.JPG          (original name)
//! 2. Save       record gets id 7
//! 3. Post-save  rename         →  media/img/image_7.jpeg
//!               variations     →  media/img/image_7.thumbnail.jpeg
//! 4. Delete     "__deleted__"  →  both files removed, field persists ""
//! ```
//!
//! Each step is an explicit call on [`lifecycle::ImageField`] (or on
//! [`model::ImageModel`] for every field of a record at once). There is no
//! event bus: the host calls the hooks from its own load/save paths.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`variation`] | Variation specs, normalization of config forms, derived filenames |
//! | [`imaging`] | Codec trait + `image`-crate codec, resize geometry, the resize engine |
//! | [`storage`] | Named-file storage: paths, urls, rename/copy/delete |
//! | [`attachment`] | Per-record attachment value and variation handles |
//! | [`lifecycle`] | The image field: upload, rename-on-save, render, delete |
//! | [`record`] | The `Record` contract and a JSON-file record store |
//! | [`model`] | All image fields of a record type, driven together |
//! | [`config`] | `config.toml` loading, validation, merging with stock defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Never Upscale, Never Re-encode Needlessly
//!
//! A file that already fits a variation's box is left byte-for-byte as it
//! was. Only files that are too large are decoded, resized and encoded again.
//!
//! ## Exact Boxes by Cropping
//!
//! A `force` variation is center-cropped to the box's aspect ratio before the
//! final resample, so its output is always exactly the box. Other variations
//! keep the source aspect ratio and fit inside the box.
//!
//! ## Canonical Names Are Derived, Not Stored
//!
//! Only the canonical storage name is persisted. Variation names, paths and
//! urls are recomputed from it and the field's configuration whenever a
//! record is loaded, so changing storage settings never leaves stale paths
//! in the records.

pub mod attachment;
pub mod config;
pub mod imaging;
pub mod lifecycle;
pub mod model;
pub mod output;
pub mod record;
pub mod storage;
pub mod variation;

#[cfg(test)]
pub(crate) mod test_helpers;
