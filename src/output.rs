//! CLI output formatting for every command.
//!
//! # Record-First Display
//!
//! Output is grouped by record, then by field. Each field shows its storage
//! name first, with variations indented beneath it:
//!
//! ## Attach
//!
//! ```text
//! Record 1
//!     image → img/image_1.jpeg
//!         Source: img/photo.JPG
//!         thumbnail: 1000x1000 → 100x75 (img/image_1.thumbnail.jpeg)
//!         size: kept 100x100
//! ```
//!
//! ## Show
//!
//! ```text
//! Record 1
//!     image: img/image_1.jpeg
//!         URL: /media/img/image_1.jpeg
//!         thumbnail: /media/img/image_1.thumbnail.jpeg (2.1 KB)
//!     avatar: (none)
//! ```
//!
//! ## Regenerate
//!
//! ```text
//! Record 1
//!     image: img/image_1.jpeg
//!         thumbnail: 1000x1000 → 100x75 (img/image_1.thumbnail.jpeg)
//!
//! Regenerated 1 variation across 1 record
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability; [`print_lines`] writes them to stdout. Format functions are
//! pure apart from reading file sizes through storage in
//! [`format_record`].

use crate::attachment::ImageAttachment;
use crate::imaging::{Dimensions, ResizeOutcome};
use crate::lifecycle::{RenderedVariation, SaveOutcome};
use crate::storage::Storage;
use serde::Serialize;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn dims(d: Dimensions) -> String {
    format!("{}x{}", d.width, d.height)
}

/// Human-readable byte count with one decimal above 1 KB.
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn outcome_line(depth: usize, rendered: &RenderedVariation) -> String {
    match rendered.outcome {
        ResizeOutcome::Skipped { dimensions } => format!(
            "{}{}: kept {}",
            indent(depth),
            rendered.variation,
            dims(dimensions)
        ),
        ResizeOutcome::Resized { from, to } => format!(
            "{}{}: {} → {} ({})",
            indent(depth),
            rendered.variation,
            dims(from),
            dims(to),
            rendered.name
        ),
    }
}

/// Header for one record.
fn record_header(id: Option<u64>) -> String {
    match id {
        Some(id) => format!("Record {id}"),
        None => "Record (unsaved)".to_string(),
    }
}

// ============================================================================
// attach / delete
// ============================================================================

/// Format the fields changed by a save.
pub fn format_save_output(id: Option<u64>, changes: &[(String, SaveOutcome)]) -> Vec<String> {
    let mut lines = vec![record_header(id)];
    if changes.is_empty() {
        lines.push(format!("{}(no changes)", indent(1)));
    }
    for (field, outcome) in changes {
        match outcome {
            SaveOutcome::Unchanged => {
                lines.push(format!("{}{}: unchanged", indent(1), field));
            }
            SaveOutcome::Renamed { from, to, rendered } => {
                lines.push(format!("{}{} → {}", indent(1), field, to));
                lines.push(format!("{}Source: {}", indent(2), from));
                lines.extend(rendered.iter().map(|r| outcome_line(2, r)));
            }
            SaveOutcome::Rendered { name, rendered } => {
                lines.push(format!("{}{} → {} (already canonical)", indent(1), field, name));
                lines.extend(rendered.iter().map(|r| outcome_line(2, r)));
            }
        }
    }
    lines
}

/// Format the result of removing a whole record.
pub fn format_remove_output(id: u64) -> Vec<String> {
    vec![
        record_header(Some(id)),
        format!("{}removed with all attached images", indent(1)),
    ]
}

/// Format the result of clearing one field.
pub fn format_delete_output(id: u64, field: &str, previous: Option<&str>) -> Vec<String> {
    let detail = match previous {
        Some(name) => format!("deleted {name} and its variations"),
        None => "nothing attached".to_string(),
    };
    vec![
        record_header(Some(id)),
        format!("{}{}: {}", indent(1), field, detail),
    ]
}

// ============================================================================
// show
// ============================================================================

/// Format every attachment of a record with urls and sizes.
pub fn format_record(
    id: u64,
    attachments: &[(&str, &ImageAttachment)],
    storage: &dyn Storage,
) -> Vec<String> {
    let mut lines = vec![record_header(Some(id))];
    for (field, attachment) in attachments {
        let Some(name) = attachment.name() else {
            lines.push(format!("{}{}: (none)", indent(1), field));
            continue;
        };
        lines.push(format!("{}{}: {}", indent(1), field, name));
        lines.push(format!("{}URL: {}", indent(2), storage.url(name)));
        for (variation, handle) in attachment.variations() {
            let size = match handle.size() {
                Ok(bytes) => format_bytes(bytes),
                Err(_) => "missing".to_string(),
            };
            lines.push(format!(
                "{}{}: {} ({})",
                indent(2),
                variation,
                handle.url(),
                size
            ));
        }
    }
    lines
}

/// JSON shape of one record for `show --json`.
#[derive(Debug, Serialize)]
pub struct RecordSummary {
    pub id: u64,
    pub fields: Vec<FieldSummary>,
}

#[derive(Debug, Serialize)]
pub struct FieldSummary {
    pub field: String,
    /// Persisted value; empty when nothing is attached.
    pub name: String,
    pub url: Option<String>,
    pub variations: Vec<VariationSummary>,
}

#[derive(Debug, Serialize)]
pub struct VariationSummary {
    pub variation: String,
    pub name: String,
    pub url: String,
    pub bytes: Option<u64>,
}

pub fn record_summary(
    id: u64,
    attachments: &[(&str, &ImageAttachment)],
    storage: &dyn Storage,
) -> RecordSummary {
    let fields = attachments
        .iter()
        .map(|(field, attachment)| FieldSummary {
            field: field.to_string(),
            name: attachment.to_db_value(),
            url: attachment.name().map(|n| storage.url(n)),
            variations: attachment
                .variations()
                .map(|(variation, handle)| VariationSummary {
                    variation: variation.to_string(),
                    name: handle.name().to_string(),
                    url: handle.url(),
                    bytes: handle.size().ok(),
                })
                .collect(),
        })
        .collect();
    RecordSummary { id, fields }
}

// ============================================================================
// regenerate / resize
// ============================================================================

/// One record's regenerate result for one field.
#[derive(Debug)]
pub struct RegeneratedField {
    pub id: u64,
    pub field: String,
    pub name: String,
    pub rendered: Vec<RenderedVariation>,
}

pub fn format_regenerate_output(results: &[RegeneratedField]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<u64> = None;
    for result in results {
        if current != Some(result.id) {
            lines.push(record_header(Some(result.id)));
            current = Some(result.id);
        }
        lines.push(format!("{}{}: {}", indent(1), result.field, result.name));
        lines.extend(result.rendered.iter().map(|r| outcome_line(2, r)));
    }

    let variations: usize = results.iter().map(|r| r.rendered.len()).sum();
    let mut records: Vec<u64> = results.iter().map(|r| r.id).collect();
    records.dedup();
    if !lines.is_empty() {
        lines.push(String::new());
    }
    lines.push(format!(
        "Regenerated {} across {}",
        plural(variations, "variation"),
        plural(records.len(), "record")
    ));
    lines
}

pub fn format_resize_output(path: &Path, outcome: &ResizeOutcome) -> Vec<String> {
    let detail = match *outcome {
        ResizeOutcome::Skipped { dimensions } => {
            format!("already fits ({}), left untouched", dims(dimensions))
        }
        ResizeOutcome::Resized { from, to } => format!("{} → {}", dims(from), dims(to)),
    };
    vec![format!("{}: {}", path.display(), detail)]
}

/// Write formatted lines to stdout.
pub fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{}", line);
    }
}
