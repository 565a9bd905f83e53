//! Image codec trait and shared types.
//!
//! The [`ImageCodec`] trait defines the five primitives the resize engine is
//! built from: open, dimensions, resample, crop, and save. Images are opaque
//! in-memory handles owned by the caller; every operation except `save`
//! returns a new handle and leaves its input untouched.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_codec::RustCodec), built on the `image` crate.

use super::params::{CropRegion, Filter};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },
    #[error("Invalid crop region {region:?} for a {}x{} image", .bounds.width, .bounds.height)]
    InvalidRegion {
        region: CropRegion,
        bounds: Dimensions,
    },
    #[error("Failed to encode {}: {reason}", .path.display())]
    Encode { path: PathBuf, reason: String },
    #[error("Unsupported image format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Trait for raster image codecs.
///
/// `Send + Sync` so one codec can be shared by every field of a model and
/// across regenerate workers.
pub trait ImageCodec: Send + Sync {
    /// Decoded in-memory image.
    type Image;

    /// Decode an image file. Fails with [`CodecError::Decode`] for corrupt or
    /// unsupported files.
    fn open(&self, path: &Path) -> Result<Self::Image, CodecError>;

    /// Pixel dimensions of a decoded image.
    fn dimensions(&self, image: &Self::Image) -> Dimensions;

    /// Scale to exactly `width` x `height` with the given filter.
    fn resample(
        &self,
        image: &Self::Image,
        width: u32,
        height: u32,
        filter: Filter,
    ) -> Result<Self::Image, CodecError>;

    /// Cut out `region`. Fails with [`CodecError::InvalidRegion`] when the
    /// region is empty or leaves the image bounds.
    fn crop(&self, image: &Self::Image, region: CropRegion) -> Result<Self::Image, CodecError>;

    /// Encode to `path` in the format implied by its extension.
    fn save(&self, image: &Self::Image, path: &Path) -> Result<(), CodecError>;
}
