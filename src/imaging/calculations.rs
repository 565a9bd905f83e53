//! Pure calculation functions for variation geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Intermediate values are `f64` and are truncated to whole pixels only when a
//! crop boundary or a resample size is produced. Every produced dimension is
//! at least 1 pixel.

use super::params::CropRegion;

/// Truncate a floating point size to whole pixels, never below 1.
fn to_pixels(value: f64) -> u32 {
    (value as u32).max(1)
}

/// Whether a source needs resizing to fit the target box.
///
/// A source that already fits in both dimensions is never touched, so
/// images are never upscaled.
///
/// # Examples
/// ```
/// # use image_attach::imaging::calculations::needs_resize;
/// assert!(!needs_resize((100, 100), (640, 480)));
/// assert!(needs_resize((641, 100), (640, 480)));
/// ```
pub fn needs_resize(source: (u32, u32), target: (u32, u32)) -> bool {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;
    src_w > tgt_w || src_h > tgt_h
}

/// Dimensions after the cheap pre-downscale pass, if any halving applies.
///
/// The source is halved repeatedly while it is more than twice the target
/// box in *both* dimensions. Returns `None` when no halving happens.
pub fn predownscale_dimensions(source: (u32, u32), target: (u32, u32)) -> Option<(u32, u32)> {
    let (tgt_w, tgt_h) = (target.0 as f64, target.1 as f64);
    let mut w = source.0 as f64;
    let mut h = source.1 as f64;
    let mut halvings = 0;

    while w > 2.0 * tgt_w && h > 2.0 * tgt_h {
        w /= 2.0;
        h /= 2.0;
        halvings += 1;
    }

    if halvings == 0 {
        None
    } else {
        Some((to_pixels(w), to_pixels(h)))
    }
}

/// Calculate contain-fit dimensions: the largest size with the source aspect
/// ratio that fits inside the target box.
///
/// The constraining axis equals its bound exactly; the other axis is
/// truncated and never exceeds its bound.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Bounding box (width, height)
pub fn fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    // Compare src_w/src_h against tgt_w/tgt_h without dividing
    if src_w as u64 * tgt_h as u64 >= src_h as u64 * tgt_w as u64 {
        // Source is relatively wider: width hits the bound
        let h = to_pixels(src_h as f64 * tgt_w as f64 / src_w as f64);
        (tgt_w, h.min(tgt_h))
    } else {
        // Source is relatively taller: height hits the bound
        let w = to_pixels(src_w as f64 * tgt_h as f64 / src_h as f64);
        (w.min(tgt_w), tgt_h)
    }
}

/// Calculate the centered crop window that gives `current` the aspect ratio
/// of `target`.
///
/// Only the axis with excess content is trimmed. Margins are split with
/// integer division; an odd pixel goes to the trailing (right/bottom) side.
/// Returns `None` when the aspect ratios already match.
///
/// # Examples
/// ```
/// # use image_attach::imaging::calculations::crop_to_aspect;
/// // Square source, 4:3 target: 93 rows kept, 16 trimmed top and bottom
/// let region = crop_to_aspect((125, 125), (100, 75)).unwrap();
/// assert_eq!((region.top, region.bottom), (16, 109));
/// ```
pub fn crop_to_aspect(current: (u32, u32), target: (u32, u32)) -> Option<CropRegion> {
    let (cur_w, cur_h) = current;
    let (tgt_w, tgt_h) = target;

    let source_side = cur_w as u64 * tgt_h as u64;
    let target_side = tgt_w as u64 * cur_h as u64;

    if source_side > target_side {
        // Wider than the target: trim left and right
        let keep = to_pixels(cur_h as f64 * tgt_w as f64 / tgt_h as f64).min(cur_w);
        let excess = cur_w - keep;
        if excess == 0 {
            return None;
        }
        let left = excess / 2;
        Some(CropRegion {
            left,
            top: 0,
            right: left + keep,
            bottom: cur_h,
        })
    } else if source_side < target_side {
        // Taller than the target: trim top and bottom
        let keep = to_pixels(cur_w as f64 * tgt_h as f64 / tgt_w as f64).min(cur_h);
        let excess = cur_h - keep;
        if excess == 0 {
            return None;
        }
        let top = excess / 2;
        Some(CropRegion {
            left: 0,
            top,
            right: cur_w,
            bottom: top + keep,
        })
    } else {
        None
    }
}
