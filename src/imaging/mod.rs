//! Image processing for variations, built on the `image` crate.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (format sniffed from content) |
//! | **Pre-shrink** | `resize_exact` with `Nearest` |
//! | **Crop** | `crop_imm` |
//! | **Final resample** | `resize_exact` with `Lanczos3` |
//! | **Encode** | optimized PNG/JPEG encoder, plain encoder fallback |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing a resize plan
//! - **Codec**: [`ImageCodec`] trait + [`RustCodec`]
//! - **Operations**: [`ResizeEngine`], which plans and runs a variation

pub mod calculations;
pub mod codec;
pub mod operations;
pub mod params;
pub mod rust_codec;

pub use codec::{CodecError, Dimensions, ImageCodec};
pub use operations::{ResizeEngine, ResizeOutcome, plan_resize};
pub use params::{Filter, Quality};
pub use rust_codec::{RustCodec, is_supported, supported_extensions};
