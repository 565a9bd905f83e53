//! Pure Rust image codec built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, BMP, TIFF, WebP) | `image::ImageReader` (content-sniffed) |
//! | Resample | `DynamicImage::resize_exact` with `Nearest` or `Lanczos3` |
//! | Crop | `DynamicImage::crop_imm` |
//! | Encode, optimized | `PngEncoder` (best compression, adaptive filter), `JpegEncoder` (quality) |
//! | Encode, plain | `DynamicImage::write_to` |
//!
//! Encoding always goes to an in-memory buffer first and the file is written
//! once, so a failed optimized attempt never leaves a truncated file behind.

use super::codec::{CodecError, Dimensions, ImageCodec};
use super::params::{CropRegion, Filter, Quality};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageError, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Extensions mapped to the formats whose codecs are compiled in.
const FORMAT_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    FORMAT_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled() && fmt.writing_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the image file extensions that can be both decoded and re-encoded.
pub fn supported_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether `path` has an extension this codec can both decode and re-encode.
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|ext| supported_extensions().contains(&ext.as_str()))
}

/// Output format implied by a path's extension.
fn format_for(path: &Path) -> Result<ImageFormat, CodecError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    FORMAT_CANDIDATES
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, fmt)| *fmt)
        .ok_or_else(|| CodecError::UnsupportedFormat(path.to_path_buf()))
}

fn filter_type(filter: Filter) -> FilterType {
    match filter {
        Filter::Nearest => FilterType::Nearest,
        Filter::Lanczos3 => FilterType::Lanczos3,
    }
}

/// Convert to a color type the target encoder accepts.
fn prepare_for(img: &DynamicImage, format: ImageFormat) -> Cow<'_, DynamicImage> {
    match (format, img.color()) {
        (ImageFormat::Jpeg, ColorType::L8 | ColorType::Rgb8) => Cow::Borrowed(img),
        // JPEG has no alpha channel
        (ImageFormat::Jpeg, _) => Cow::Owned(DynamicImage::ImageRgb8(img.to_rgb8())),
        (ImageFormat::Png | ImageFormat::Tiff, _) => Cow::Borrowed(img),
        (ImageFormat::WebP, ColorType::Rgb8 | ColorType::Rgba8) => Cow::Borrowed(img),
        (ImageFormat::WebP, _) => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
        (_, ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8) => {
            Cow::Borrowed(img)
        }
        _ => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
    }
}

/// Encode with the format's size-optimizing settings.
///
/// Returns `Ok(None)` when the format has no optimized encoder.
fn encode_optimized(
    img: &DynamicImage,
    format: ImageFormat,
    quality: Quality,
) -> Result<Option<Vec<u8>>, ImageError> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive);
            img.write_with_encoder(encoder)?;
        }
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.value() as u8);
            img.write_with_encoder(encoder)?;
        }
        _ => return Ok(None),
    }
    Ok(Some(buf))
}

/// Encode with the format's default settings.
fn encode_plain(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ImageError> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, format)?;
    Ok(cursor.into_inner())
}

/// Take the optimized bytes, or run `plain` when there are none or the
/// optimized attempt failed. Only a failing plain encode is an error.
fn with_plain_fallback(
    path: &Path,
    optimized: Result<Option<Vec<u8>>, ImageError>,
    plain: impl FnOnce() -> Result<Vec<u8>, ImageError>,
) -> Result<Vec<u8>, CodecError> {
    match optimized {
        Ok(Some(bytes)) => Ok(bytes),
        Ok(None) => plain().map_err(|e| encode_error(path, e)),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "optimized encode failed, falling back to plain encode"
            );
            plain().map_err(|e| encode_error(path, e))
        }
    }
}

fn encode_error(path: &Path, err: ImageError) -> CodecError {
    CodecError::Encode {
        path: PathBuf::from(path),
        reason: err.to_string(),
    }
}

/// Codec backed by the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Clone, Default)]
pub struct RustCodec {
    quality: Quality,
}

impl RustCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec encoding lossy formats at `quality`.
    pub fn with_quality(quality: Quality) -> Self {
        Self { quality }
    }
}

impl ImageCodec for RustCodec {
    type Image = DynamicImage;

    fn open(&self, path: &Path) -> Result<DynamicImage, CodecError> {
        ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| CodecError::Decode {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn dimensions(&self, image: &DynamicImage) -> Dimensions {
        Dimensions::new(image.width(), image.height())
    }

    fn resample(
        &self,
        image: &DynamicImage,
        width: u32,
        height: u32,
        filter: Filter,
    ) -> Result<DynamicImage, CodecError> {
        Ok(image.resize_exact(width, height, filter_type(filter)))
    }

    fn crop(&self, image: &DynamicImage, region: CropRegion) -> Result<DynamicImage, CodecError> {
        let bounds = self.dimensions(image);
        if !region.fits_within(bounds) {
            return Err(CodecError::InvalidRegion { region, bounds });
        }
        Ok(image.crop_imm(region.left, region.top, region.width(), region.height()))
    }

    fn save(&self, image: &DynamicImage, path: &Path) -> Result<(), CodecError> {
        let format = format_for(path)?;
        let prepared = prepare_for(image, format);

        let bytes = with_plain_fallback(
            path,
            encode_optimized(&prepared, format, self.quality),
            || encode_plain(&prepared, format),
        )?;

        std::fs::write(path, &bytes)?;
        debug!(path = %path.display(), bytes = bytes.len(), "saved image");
        Ok(())
    }
}
