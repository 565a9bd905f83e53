//! Variation specs: named target boxes and the filenames derived from them.
//!
//! A variation is a resized copy of the canonical image. Each one is
//! described by a [`VariationSpec`] (`name`, `width`, `height`, `force`) and
//! lives next to the canonical file with `.{name}` inserted before the
//! extension:
//!
//! ```text
//! img/image_1.jpeg            canonical
//! img/image_1.thumbnail.jpeg  variation "thumbnail"
//! ```
//!
//! ## Raw forms
//!
//! Configuration may describe variations in any of these shapes; all of them
//! [`normalize`] into one [`VariationSet`]:
//!
//! ```toml
//! variations = [640, 480]                 # single unnamed variation → "size"
//! variations = { large = [1024, 768, true] }
//! size = [640, 480]                       # legacy field key → "size"
//! thumbnail_size = [100, 75, true]        # legacy field key → "thumbnail"
//! square = { width = 200, height = 200, force = true }
//! ```
//!
//! ## The `size` variation
//!
//! A variation named [`IN_PLACE`] resizes the canonical file itself. It has
//! no derived file and no handle.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the variation applied to the canonical file in place.
pub const IN_PLACE: &str = "size";

/// Name the legacy `thumbnail_size` key normalizes to.
pub const THUMBNAIL: &str = "thumbnail";

/// A validated, immutable variation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VariationSpec {
    name: String,
    width: u32,
    height: u32,
    force: bool,
}

impl VariationSpec {
    /// Build a spec, rejecting empty boxes and names that would break the
    /// `{stem}.{name}{ext}` filename contract.
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        force: bool,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        validate_name(&name)?;
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidVariation {
                name,
                reason: format!("width and height must be positive, got {width}x{height}"),
            });
        }
        Ok(Self {
            name,
            width,
            height,
            force,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Crop to exactly `width` x `height` instead of fitting inside it.
    pub fn force(&self) -> bool {
        self.force
    }

    pub fn target(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether this spec resizes the canonical file instead of a copy.
    pub fn is_in_place(&self) -> bool {
        self.name == IN_PLACE
    }
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    let reason = if name.is_empty() {
        "name must not be empty"
    } else if name.contains(['.', '/', '\\']) {
        "name must not contain '.', '/' or '\\'"
    } else if name.chars().any(char::is_whitespace) {
        "name must not contain whitespace"
    } else {
        return Ok(());
    };
    Err(ConfigError::InvalidVariation {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// A target box as written in configuration, before validation.
///
/// Sizes are signed so non-positive values reach validation and produce a
/// [`ConfigError`] instead of a type mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSize {
    /// `[width, height, force]`
    Forced(i64, i64, bool),
    /// `[width, height]`
    Box(i64, i64),
    /// `{ width = .., height = .., force = .. }`
    Table {
        width: i64,
        height: i64,
        #[serde(default)]
        force: bool,
    },
}

impl RawSize {
    fn parts(&self) -> (i64, i64, bool) {
        match *self {
            RawSize::Forced(w, h, force) => (w, h, force),
            RawSize::Box(w, h) => (w, h, false),
            RawSize::Table {
                width,
                height,
                force,
            } => (width, height, force),
        }
    }

    /// Validate into a spec called `name`.
    pub fn resolve(&self, name: &str) -> Result<VariationSpec, ConfigError> {
        let (w, h, force) = self.parts();
        let dimension = |value: i64| {
            u32::try_from(value)
                .ok()
                .filter(|v| *v > 0)
                .ok_or_else(|| ConfigError::InvalidVariation {
                    name: name.to_string(),
                    reason: format!("width and height must be positive, got {w}x{h}"),
                })
        };
        VariationSpec::new(name, dimension(w)?, dimension(h)?, force)
    }
}

/// The variations entry of a field: one unnamed box or a name → box table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawVariations {
    Single(RawSize),
    Named(BTreeMap<String, RawSize>),
}

impl RawVariations {
    /// Named entries; the unnamed form is called [`IN_PLACE`].
    pub fn entries(&self) -> Vec<(String, RawSize)> {
        match self {
            RawVariations::Single(size) => vec![(IN_PLACE.to_string(), size.clone())],
            RawVariations::Named(map) => map
                .iter()
                .map(|(name, size)| (name.clone(), size.clone()))
                .collect(),
        }
    }
}

/// An ordered set of variations with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariationSet {
    specs: Vec<VariationSpec>,
}

impl VariationSet {
    /// Build a set, failing on the first repeated name.
    pub fn new(specs: Vec<VariationSpec>) -> Result<Self, ConfigError> {
        for (i, spec) in specs.iter().enumerate() {
            if specs[..i].iter().any(|earlier| earlier.name == spec.name) {
                return Err(ConfigError::DuplicateVariation(spec.name.clone()));
            }
        }
        Ok(Self { specs })
    }

    pub fn get(&self, name: &str) -> Option<&VariationSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariationSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// The variation applied to the canonical file itself, if configured.
    pub fn in_place(&self) -> Option<&VariationSpec> {
        self.specs.iter().find(|s| s.is_in_place())
    }

    /// Specs that produce a derived file, in declaration order.
    pub fn derived(&self) -> impl Iterator<Item = &VariationSpec> {
        self.specs.iter().filter(|s| !s.is_in_place())
    }
}

/// Validate raw `(name, size)` entries into a [`VariationSet`].
///
/// Fails with a [`ConfigError`] before any file is touched if a box is
/// non-positive, a name is malformed, or two entries share a name.
pub fn normalize_entries(
    entries: impl IntoIterator<Item = (String, RawSize)>,
) -> Result<VariationSet, ConfigError> {
    let specs = entries
        .into_iter()
        .map(|(name, size)| size.resolve(&name))
        .collect::<Result<Vec<_>, _>>()?;
    VariationSet::new(specs)
}

/// Validate a raw variations entry into a [`VariationSet`].
pub fn normalize(raw: &RawVariations) -> Result<VariationSet, ConfigError> {
    normalize_entries(raw.entries())
}

/// Split a path into `(stem, extension)`, where the extension includes the
/// dot and comes from the last dot of the final component.
///
/// Leading dots of the final component do not start an extension, so
/// `img/.hidden` has none.
pub fn split_extension(path: &str) -> (&str, &str) {
    let base_start = path.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let base = &path[base_start..];
    let leading_dots = base.len() - base.trim_start_matches('.').len();

    match base[leading_dots..].rfind('.') {
        Some(i) => path.split_at(base_start + leading_dots + i),
        None => (path, ""),
    }
}

/// Filename of a variation of `canonical`: `.{name}` inserted before the
/// extension.
///
/// # Examples
/// ```
/// # use image_attach::variation::{VariationSpec, derive_filename};
/// let thumb = VariationSpec::new("thumbnail", 100, 75, true).unwrap();
/// assert_eq!(derive_filename("img/picture_1.jpeg", &thumb), "img/picture_1.thumbnail.jpeg");
/// ```
pub fn derive_filename(canonical: &str, spec: &VariationSpec) -> String {
    let (stem, ext) = split_extension(canonical);
    format!("{}.{}{}", stem, spec.name, ext)
}
