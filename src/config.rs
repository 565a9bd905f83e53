//! Project configuration module.
//!
//! Handles loading, validating, and merging the project's `config.toml`.
//! Stock defaults are the base layer; the user file only needs the keys it
//! wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! media_root = "media"          # Storage root, relative to the project
//! media_url = "/media/"         # URL prefix for variation urls
//! records_file = "records.json" # JSON record store used by the CLI
//!
//! [images]
//! quality = 90                  # JPEG encoding quality (1-100)
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//!
//! # One table per image field (none by default)
//! [fields.image]
//! upload_to = "img"             # Directory under media_root
//! size = [640, 480]             # Resize the canonical file in place
//! thumbnail_size = [100, 75, true]
//!
//! [fields.image.variations]     # Or a single unnamed box: variations = [640, 480]
//! large = [1024, 768]
//! square = { width = 200, height = 200, force = true }
//! ```
//!
//! Variation boxes are `[width, height]`, `[width, height, force]` or a
//! `{ width, height, force }` table. `force = true` crops to exactly the box;
//! otherwise the image is fitted inside it. All field variations are
//! normalized into one [`VariationSet`] when the config is validated, so a
//! bad box fails at load time, before any file is touched.
//!
//! Unknown keys are rejected to catch typos early.

use crate::variation::{
    IN_PLACE, RawSize, RawVariations, THUMBNAIL, VariationSet, normalize_entries,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path};
use thiserror::Error;

/// Name of the configuration file inside the project directory.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Invalid variation `{name}`: {reason}")]
    InvalidVariation { name: String, reason: String },
    #[error("Variation `{0}` is defined more than once")]
    DuplicateVariation(String),
}

/// Project configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AttachConfig {
    /// Storage root directory, relative to the project directory.
    pub media_root: String,
    /// URL prefix under which `media_root` is served.
    pub media_url: String,
    /// JSON record store, relative to the project directory.
    pub records_file: String,
    /// Encoding settings.
    pub images: ImagesConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Image fields by name.
    pub fields: BTreeMap<String, FieldConfig>,
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            media_root: "media".to_string(),
            media_url: "/media/".to_string(),
            records_file: "records.json".to_string(),
            images: ImagesConfig::default(),
            processing: ProcessingConfig::default(),
            fields: BTreeMap::new(),
        }
    }
}

impl AttachConfig {
    /// Validate config values and every field's variations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.images.quality) {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.media_root.is_empty() {
            return Err(ConfigError::Validation(
                "media_root must not be empty".into(),
            ));
        }
        if self.records_file.is_empty() {
            return Err(ConfigError::Validation(
                "records_file must not be empty".into(),
            ));
        }
        for (name, field) in &self.fields {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(ConfigError::Validation(format!(
                    "field name `{name}` may only contain letters, digits and '_'"
                )));
            }
            if !is_relative_inside(&field.upload_to) {
                return Err(ConfigError::Validation(format!(
                    "fields.{name}.upload_to must be a relative path inside media_root"
                )));
            }
            field.variation_set()?;
        }
        Ok(())
    }
}

/// Whether `path` stays under the directory it is joined to.
fn is_relative_inside(path: &str) -> bool {
    Path::new(path)
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Encoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// JPEG encoding quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self { quality: 90 }
    }
}

/// Worker settings for `regenerate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Upper bound on records rendered at once; unset means one per core.
    pub max_processes: Option<usize>,
}

/// Number of `regenerate` workers: `max_processes`, never more than the
/// machine's cores.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism().map_or(1, |n| n.get());
    config
        .max_processes
        .map_or(cores, |n| n.clamp(1, cores))
}

/// One image field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldConfig {
    /// Directory under the media root for this field's files.
    pub upload_to: String,
    /// Legacy box applied to the canonical file in place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<RawSize>,
    /// Legacy box for the `thumbnail` variation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_size: Option<RawSize>,
    /// Named variations, or one unnamed box resizing in place.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variations: Option<RawVariations>,
}

impl FieldConfig {
    /// Normalize the legacy keys and `variations` into one set.
    ///
    /// A legacy key and a `variations` entry with the same name is an error,
    /// not an override.
    pub fn variation_set(&self) -> Result<VariationSet, ConfigError> {
        let legacy = [(IN_PLACE, &self.size), (THUMBNAIL, &self.thumbnail_size)]
            .into_iter()
            .filter_map(|(name, size)| size.clone().map(|s| (name.to_string(), s)));
        let named = self
            .variations
            .as_ref()
            .map(RawVariations::entries)
            .unwrap_or_default();
        normalize_entries(legacy.chain(named))
    }
}

// =============================================================================
// Stock defaults + project file
// =============================================================================

/// Stock settings as a TOML table: `media_root`, `media_url`,
/// `records_file`, `[images]`, `[processing]` and an empty `[fields]`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AttachConfig::default())?)
}

/// Layer a project's `config.toml` over the stock settings.
///
/// Tables merge per key, so a file that only sets `[images] quality` keeps the
/// stock `media_root`, and a `[fields.image]` table lands next to any other
/// field. Everything else the project sets (strings, numbers, and arrays
/// such as a `[width, height]` box) replaces the stock value whole.
pub fn merge_toml(stock: toml::Value, project: toml::Value) -> toml::Value {
    match (stock, project) {
        (toml::Value::Table(mut merged), toml::Value::Table(project)) => {
            for (key, value) in project {
                let value = match merged.remove(&key) {
                    Some(stock_value) => merge_toml(stock_value, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            toml::Value::Table(merged)
        }
        (_, project) => project,
    }
}

/// Parse the project's `config.toml` without interpreting it.
///
/// A project without the file is `Ok(None)`; malformed TOML is an error.
pub fn load_raw_config(project: &Path) -> Result<Option<toml::Value>, ConfigError> {
    match fs::read_to_string(project.join(CONFIG_FILENAME)) {
        Ok(content) => Ok(Some(toml::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Build the effective [`AttachConfig`] from the stock table and an optional
/// project table. Field variations are normalized as part of validation.
pub fn resolve_config(
    stock: toml::Value,
    project: Option<toml::Value>,
) -> Result<AttachConfig, ConfigError> {
    let merged = match project {
        Some(project) => merge_toml(stock, project),
        None => stock,
    };
    let config: AttachConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Effective configuration of the project in `project`: stock settings with
/// its `config.toml` on top, checked before any image is touched.
pub fn load_config(project: &Path) -> Result<AttachConfig, ConfigError> {
    resolve_config(stock_defaults_value()?, load_raw_config(project)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# image-attach Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Storage root for attached images, relative to the project directory.
media_root = "media"

# URL prefix under which media_root is served. Variation urls start with it.
media_url = "/media/"

# JSON file holding the records the CLI manages.
records_file = "records.json"

# ---------------------------------------------------------------------------
# Encoding
# ---------------------------------------------------------------------------
[images]
# JPEG encoding quality (1 = worst, 100 = best). PNG is always lossless.
quality = 90

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for `regenerate`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Image fields
# ---------------------------------------------------------------------------
# No fields are defined by default. Each [fields.<name>] table declares one.
# A file attached to field `image` of record 7 is stored as
#   <media_root>/<upload_to>/image_7.<ext>
# and each variation next to it as image_7.<variation>.<ext>.
#
# Boxes are [width, height], [width, height, force] or
# { width = .., height = .., force = .. }. With force = true the image is
# cropped to exactly the box; otherwise it is fitted inside it. Images that
# already fit are never resized.
#
# [fields.image]
# upload_to = "img"
#
# Resize the canonical file itself (no extra file):
# size = [640, 480]
#
# Shorthand for a variation named "thumbnail":
# thumbnail_size = [100, 75, true]
#
# [fields.image.variations]
# large = [1024, 768]
# square = { width = 200, height = 200, force = true }
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = AttachConfig::default();
        assert_eq!(config.media_root, "media");
        assert_eq!(config.media_url, "/media/");
        assert_eq!(config.records_file, "records.json");
        assert_eq!(config.images.quality, 90);
        assert!(config.fields.is_empty());
    }

    #[test]
    fn parse_field_with_legacy_keys() {
        let toml = r#"
[fields.image]
upload_to = "img"
size = [640, 480]
thumbnail_size = [100, 75, true]
"#;
        let config: AttachConfig = toml::from_str(toml).unwrap();
        let set = config.fields["image"].variation_set().unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.in_place().unwrap().target(), (640, 480));
        let thumb = set.get("thumbnail").unwrap();
        assert_eq!(thumb.target(), (100, 75));
        assert!(thumb.force());
    }

    #[test]
    fn parse_field_with_named_variations() {
        let toml = r#"
[fields.image.variations]
large = [1024, 768]
square = { width = 200, height = 200, force = true }
"#;
        let config: AttachConfig = toml::from_str(toml).unwrap();
        let set = config.fields["image"].variation_set().unwrap();
        let names: Vec<&str> = set.derived().map(|s| s.name()).collect();
        assert_eq!(names, vec!["large", "square"]);
        assert_eq!(config.fields["image"].upload_to, "");
    }

    #[test]
    fn single_variations_box_resizes_in_place() {
        let toml = r#"
[fields.image]
variations = [640, 480]
"#;
        let config: AttachConfig = toml::from_str(toml).unwrap();
        let set = config.fields["image"].variation_set().unwrap();
        assert!(set.in_place().is_some());
        assert_eq!(set.derived().count(), 0);
    }

    #[test]
    fn legacy_and_named_thumbnail_conflict() {
        let field = FieldConfig {
            thumbnail_size: Some(RawSize::Box(100, 75)),
            variations: Some(RawVariations::Named(BTreeMap::from([(
                "thumbnail".to_string(),
                RawSize::Box(50, 50),
            )]))),
            ..FieldConfig::default()
        };
        assert!(matches!(
            field.variation_set(),
            Err(ConfigError::DuplicateVariation(n)) if n == "thumbnail"
        ));
    }

    // =========================================================================
    // Regenerate workers
    // =========================================================================

    fn cores() -> usize {
        std::thread::available_parallelism().map_or(1, |n| n.get())
    }

    #[test]
    fn unset_max_processes_uses_every_core() {
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores());
    }

    #[test]
    fn max_processes_never_exceeds_cores() {
        let processing: ProcessingConfig = toml::from_str("max_processes = 4096").unwrap();
        assert_eq!(effective_threads(&processing), cores());
    }

    #[test]
    fn max_processes_limits_workers() {
        for (requested, expected) in [(Some(1), 1), (Some(0), 1)] {
            let processing = ProcessingConfig {
                max_processes: requested,
            };
            assert_eq!(effective_threads(&processing), expected, "{requested:?}");
        }
    }

    // =========================================================================
    // Layering config.toml over stock settings
    // =========================================================================

    #[test]
    fn project_quality_keeps_stock_storage_settings() {
        let stock = stock_defaults_value().unwrap();
        let project: toml::Value = toml::from_str("[images]\nquality = 70").unwrap();

        let merged = merge_toml(stock, project);

        assert_eq!(merged["images"]["quality"].as_integer(), Some(70));
        assert_eq!(merged["media_root"].as_str(), Some("media"));
        assert_eq!(merged["records_file"].as_str(), Some("records.json"));
    }

    #[test]
    fn project_fields_join_existing_fields() {
        let stock: toml::Value =
            toml::from_str("[fields.avatar]\nupload_to = \"faces\"").unwrap();
        let project: toml::Value =
            toml::from_str("[fields.image]\nupload_to = \"img\"").unwrap();

        let merged = merge_toml(stock, project);

        assert_eq!(merged["fields"]["avatar"]["upload_to"].as_str(), Some("faces"));
        assert_eq!(merged["fields"]["image"]["upload_to"].as_str(), Some("img"));
    }

    #[test]
    fn merge_toml_array_replaces_whole_box() {
        let base: toml::Value = toml::from_str("[fields.image]\nsize = [640, 480]").unwrap();
        let overlay: toml::Value =
            toml::from_str("[fields.image]\nsize = [320, 240, true]").unwrap();
        let merged = merge_toml(base, overlay);
        let size = merged["fields"]["image"]["size"].as_array().unwrap();
        assert_eq!(size.len(), 3);
    }

    // =========================================================================
    // Unknown keys and validation
    // =========================================================================

    #[test]
    fn misspelled_images_key_rejected() {
        let result: Result<AttachConfig, _> = toml::from_str("[images]\nqualty = 90");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_field_key_rejected() {
        let result: Result<AttachConfig, _> =
            toml::from_str("[fields.image]\nthumb_size = [1, 1]");
        assert!(result.is_err());
    }

    #[test]
    fn validate_quality_bounds() {
        let mut config = AttachConfig::default();
        config.images.quality = 100;
        assert!(config.validate().is_ok());
        config.images.quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.images.quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_escaping_upload_dir() {
        let mut config = AttachConfig::default();
        config.fields.insert(
            "image".into(),
            FieldConfig {
                upload_to: "../outside".into(),
                ..FieldConfig::default()
            },
        );
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_odd_field_name() {
        let mut config = AttachConfig::default();
        config
            .fields
            .insert("my-image".into(), FieldConfig::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_surfaces_bad_variation() {
        let mut config = AttachConfig::default();
        config.fields.insert(
            "image".into(),
            FieldConfig {
                size: Some(RawSize::Box(0, 480)),
                ..FieldConfig::default()
            },
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidVariation { .. })
        ));
    }

    // =========================================================================
    // load_config / resolve_config
    // =========================================================================

    #[test]
    fn project_without_config_file_gets_stock_settings() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.media_root, "media");
        assert!(config.fields.is_empty());
    }

    #[test]
    fn project_file_overrides_only_what_it_sets() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
media_url = "https://cdn.example.com/"

[fields.image]
upload_to = "img"
thumbnail_size = [100, 75, true]
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.media_url, "https://cdn.example.com/");
        // Unspecified values keep their defaults
        assert_eq!(config.media_root, "media");
        assert_eq!(config.images.quality, 90);
        assert!(config.fields.contains_key("image"));
    }

    #[test]
    fn malformed_config_file_is_toml_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "media_root = ").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_rejects_bad_variation_before_use() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[fields.image]\nthumbnail_size = [-5, 75]",
        )
        .unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::InvalidVariation { .. })
        ));
    }

    #[test]
    fn out_of_range_quality_fails_resolution() {
        let project: toml::Value = toml::from_str("[images]\nquality = 200").unwrap();
        let result = resolve_config(stock_defaults_value().unwrap(), Some(project));
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // stock config
    // =========================================================================

    #[test]
    fn generated_config_parses_to_stock_settings() {
        let config: AttachConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config.media_root, "media");
        assert_eq!(config.media_url, "/media/");
        assert_eq!(config.images.quality, 90);
        assert_eq!(config.processing.max_processes, None);
        assert!(config.fields.is_empty());
    }

    #[test]
    fn stock_example_field_is_valid_when_uncommented() {
        let uncommented: String = stock_config_toml()
            .lines()
            .map(|line| match line.strip_prefix("# ") {
                Some(rest) if rest.starts_with('[') => rest,
                Some(rest)
                    if rest.split_once(" = ").is_some_and(|(key, _)| {
                        key.chars().all(|c| c.is_ascii_lowercase() || c == '_')
                    }) =>
                {
                    rest
                }
                _ => line,
            })
            .filter(|line| !line.starts_with("max_processes"))
            .collect::<Vec<_>>()
            .join("\n");
        let config: AttachConfig = toml::from_str(&uncommented).unwrap();
        config.validate().unwrap();
        let set = config.fields["image"].variation_set().unwrap();
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn stock_table_has_every_section() {
        let val = stock_defaults_value().unwrap();
        assert!(val.is_table());
        assert!(val.get("images").is_some());
        assert!(val.get("processing").is_some());
        assert!(val.get("media_root").is_some());
    }
}
