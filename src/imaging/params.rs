//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the pure [`calculations`](super::calculations) (which
//! decide the geometry), the [`operations`](super::operations) module (which
//! runs a plan) and the [`codec`](super::codec) (which does the actual
//! pixel work). This separation allows swapping codecs (e.g. for testing with
//! a mock) without changing the resize algorithm.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 90). Clamped on construction.
//! - [`Filter`]: Resampling algorithm: cheap [`Filter::Nearest`] or high-quality [`Filter::Lanczos3`].
//! - [`CropRegion`]: A `left, top, right, bottom` rectangle in pixel coordinates.
//! - [`ResizeStep`] / [`ResizePlan`]: The ordered steps that turn a source into a variation.

use super::codec::Dimensions;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(90)
    }
}

/// Resampling algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter {
    /// Fast, low quality. Only used to pre-shrink very large sources.
    Nearest,
    /// Antialiased, used for every final resample.
    #[default]
    Lanczos3,
}

/// Crop rectangle. `right` and `bottom` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRegion {
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// True when the region has positive extent and lies inside `bounds`.
    pub fn fits_within(&self, bounds: Dimensions) -> bool {
        self.left < self.right
            && self.top < self.bottom
            && self.right <= bounds.width
            && self.bottom <= bounds.height
    }
}

/// A single pixel operation in a resize plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeStep {
    Resample {
        width: u32,
        height: u32,
        filter: Filter,
    },
    Crop(CropRegion),
}

/// Ordered steps that turn a decoded source into the requested variation.
///
/// An empty plan means the source already fits and must be left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResizePlan {
    pub steps: Vec<ResizeStep>,
}

impl ResizePlan {
    pub fn is_noop(&self) -> bool {
        self.steps.is_empty()
    }

    /// Dimensions after every step has run on an image of `source` size.
    pub fn output_dimensions(&self, source: Dimensions) -> Dimensions {
        self.steps.iter().fold(source, |_, step| match *step {
            ResizeStep::Resample { width, height, .. } => Dimensions { width, height },
            ResizeStep::Crop(region) => Dimensions {
                width: region.width(),
                height: region.height(),
            },
        })
    }
}
