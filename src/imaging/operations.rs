//! The resize engine: plan a variation, then run the plan through a codec.
//!
//! Planning is pure ([`plan_resize`]) so the geometry can be tested without
//! images. [`ResizeEngine`] opens the file, executes the plan step by step
//! and writes the result back over the same path.
//!
//! A file that already fits its box is never re-encoded.

use super::calculations::{crop_to_aspect, fit_dimensions, needs_resize, predownscale_dimensions};
use super::codec::{CodecError, Dimensions, ImageCodec};
use super::params::{Filter, ResizePlan, ResizeStep};
use crate::variation::VariationSpec;
use std::path::Path;
use tracing::{debug, error};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// What happened to a file passed through [`ResizeEngine::resize_in_place`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// Already within the box; the file was not rewritten.
    Skipped { dimensions: Dimensions },
    /// Rewritten at new dimensions.
    Resized { from: Dimensions, to: Dimensions },
}

impl ResizeOutcome {
    /// Dimensions of the file after the operation.
    pub fn final_dimensions(&self) -> Dimensions {
        match *self {
            ResizeOutcome::Skipped { dimensions } => dimensions,
            ResizeOutcome::Resized { to, .. } => to,
        }
    }
}

/// Plan the steps that bring a `source`-sized image to `spec`.
///
/// 1. Nothing, if the source already fits the box.
/// 2. Halve with [`Filter::Nearest`] while more than twice the box on both axes.
/// 3. `force`: center-crop to the box aspect, then resample to the exact box.
///    Otherwise: resample to the largest size with the *original* aspect that
///    fits the box.
pub fn plan_resize(source: Dimensions, spec: &VariationSpec) -> ResizePlan {
    let target = spec.target();
    if !needs_resize(source.as_tuple(), target) {
        return ResizePlan::default();
    }

    let mut steps = Vec::new();
    let mut current = source.as_tuple();

    if let Some((width, height)) = predownscale_dimensions(current, target) {
        steps.push(ResizeStep::Resample {
            width,
            height,
            filter: Filter::Nearest,
        });
        current = (width, height);
    }

    let (width, height) = if spec.force() {
        if let Some(region) = crop_to_aspect(current, target) {
            steps.push(ResizeStep::Crop(region));
            current = (region.width(), region.height());
        }
        target
    } else {
        fit_dimensions(source.as_tuple(), target)
    };

    if current != (width, height) {
        steps.push(ResizeStep::Resample {
            width,
            height,
            filter: Filter::Lanczos3,
        });
    }

    ResizePlan { steps }
}

/// Runs [`plan_resize`] plans against files through an [`ImageCodec`].
#[derive(Debug, Default)]
pub struct ResizeEngine<C> {
    codec: C,
}

impl<C: ImageCodec> ResizeEngine<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Resize the file at `path` to `spec`, overwriting it in the same format.
    ///
    /// A decode failure is returned before anything is written. A crop that
    /// leaves the image bounds is logged and returned as
    /// [`CodecError::InvalidRegion`]; the file is left as it was.
    pub fn resize_in_place(&self, path: &Path, spec: &VariationSpec) -> Result<ResizeOutcome> {
        let source = self.codec.open(path)?;
        let from = self.codec.dimensions(&source);
        let plan = plan_resize(from, spec);

        if plan.is_noop() {
            debug!(
                path = %path.display(),
                variation = spec.name(),
                width = from.width,
                height = from.height,
                "fits inside box, left untouched"
            );
            return Ok(ResizeOutcome::Skipped { dimensions: from });
        }

        let mut current: Option<C::Image> = None;
        for step in &plan.steps {
            let input = current.as_ref().unwrap_or(&source);
            let next = match *step {
                ResizeStep::Resample {
                    width,
                    height,
                    filter,
                } => self.codec.resample(input, width, height, filter)?,
                ResizeStep::Crop(region) => self.codec.crop(input, region).inspect_err(|e| {
                    error!(path = %path.display(), variation = spec.name(), "{e}");
                })?,
            };
            current = Some(next);
        }

        let output = current.as_ref().unwrap_or(&source);
        self.codec.save(output, path)?;
        let to = self.codec.dimensions(output);

        debug!(
            path = %path.display(),
            variation = spec.name(),
            from = ?from.as_tuple(),
            to = ?to.as_tuple(),
            "resized"
        );
        Ok(ResizeOutcome::Resized { from, to })
    }
}
