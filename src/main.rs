use clap::{Parser, Subcommand};
use image_attach::config::{self, AttachConfig};
use image_attach::imaging::{self, Quality, ResizeEngine, RustCodec};
use image_attach::lifecycle::{ImageField, Submission};
use image_attach::model::ImageModel;
use image_attach::output::{self, RegeneratedField};
use image_attach::record::{Record, RecordStore};
use image_attach::storage::FileSystemStorage;
use image_attach::variation::{IN_PLACE, VariationSpec};
use rayon::prelude::*;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "image-attach")]
#[command(version)]
#[command(about = "Attach images to records, with resized variations")]
#[command(long_about = "\
Attach images to records, with resized variations

Images are stored under the project's media root. On the first save of a
record, an upload is renamed to <field>_<record id>.<ext> and every
configured variation is written next to it:

  media/img/image_7.jpeg              canonical file
  media/img/image_7.thumbnail.jpeg    variation \"thumbnail\"

Fields and their variations are declared in config.toml in the project
directory. Records live in a JSON file there as well.

Run 'image-attach gen-config' to generate a documented config.toml.")]
struct Cli {
    /// Project directory holding config.toml, the media root and the records
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Attach an image file to a field of a new or existing record
    Attach {
        /// Image field to attach to
        #[arg(long)]
        field: String,
        /// Existing record id (omit to create a record)
        #[arg(long)]
        record: Option<u64>,
        /// Image file to upload
        file: PathBuf,
    },
    /// Delete a field's image and all its variations
    Delete {
        #[arg(long)]
        field: String,
        #[arg(long)]
        record: u64,
    },
    /// Delete a record together with the files of every image field
    Remove {
        #[arg(long)]
        record: u64,
    },
    /// List records and their attachments
    Show {
        /// Only this record
        #[arg(long)]
        record: Option<u64>,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Resize one image file in place
    Resize {
        file: PathBuf,
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        /// Crop to exactly width x height instead of fitting inside
        #[arg(long)]
        force: bool,
    },
    /// Re-render every variation of every attached image
    Regenerate {
        /// Only this field
        #[arg(long)]
        field: Option<String>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

/// Everything a command needs from the project directory.
struct Project {
    config: AttachConfig,
    storage: Arc<FileSystemStorage>,
    model: ImageModel<RustCodec>,
    records_path: PathBuf,
}

impl Project {
    fn open(dir: &Path) -> Result<Self, Box<dyn Error>> {
        let config = config::load_config(dir)?;
        let storage = Arc::new(FileSystemStorage::new(
            dir.join(&config.media_root),
            config.media_url.clone(),
        ));
        let model = ImageModel::from_config(&config, storage.clone(), engine(&config))?;
        let records_path = dir.join(&config.records_file);
        debug!(
            project = %dir.display(),
            fields = ?model.field_names(),
            "loaded project"
        );
        Ok(Self {
            config,
            storage,
            model,
            records_path,
        })
    }

    fn records(&self) -> Result<RecordStore, Box<dyn Error>> {
        Ok(RecordStore::open(&self.records_path)?)
    }

    fn require_field(&self, name: &str) -> Result<&ImageField<RustCodec>, Box<dyn Error>> {
        if self.model.fields().is_empty() {
            return Err(format!(
                "no image fields configured; add a [fields.{name}] table to {}",
                config::CONFIG_FILENAME
            )
            .into());
        }
        Ok(self.model.field(name)?)
    }
}

fn engine(config: &AttachConfig) -> Arc<ResizeEngine<RustCodec>> {
    Arc::new(ResizeEngine::new(RustCodec::with_quality(Quality::new(
        config.images.quality,
    ))))
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Attach {
            field,
            record,
            file,
        } => {
            let project = Project::open(&cli.project)?;
            project.require_field(&field)?;
            if !file.is_file() {
                return Err(format!("not a file: {}", file.display()).into());
            }
            if !imaging::is_supported(&file) {
                return Err(format!(
                    "unsupported image type: {} (expected one of: {})",
                    file.display(),
                    imaging::supported_extensions().join(", ")
                )
                .into());
            }

            let mut store = project.records()?;
            let names = project.model.field_names();
            let mut record = match record {
                Some(id) => store.load(id, &names)?,
                None => store.create(&names),
            };
            project.model.init(&mut record)?;
            let changes = project
                .model
                .save(&mut record, &[(field.as_str(), Submission::Upload(file))])?;
            output::print_lines(&output::format_save_output(record.id(), &changes));
        }
        Command::Delete { field, record } => {
            let project = Project::open(&cli.project)?;
            project.require_field(&field)?;

            let mut store = project.records()?;
            let names = project.model.field_names();
            let mut loaded = store.load(record, &names)?;
            project.model.init(&mut loaded)?;
            let previous = loaded
                .attachment(&field)
                .and_then(|a| a.name())
                .map(str::to_owned);
            project
                .model
                .save(&mut loaded, &[(field.as_str(), Submission::Delete)])?;
            output::print_lines(&output::format_delete_output(
                record,
                &field,
                previous.as_deref(),
            ));
        }
        Command::Remove { record } => {
            let project = Project::open(&cli.project)?;
            let mut store = project.records()?;
            let names = project.model.field_names();
            {
                let mut loaded = store.load(record, &names)?;
                project.model.delete(&mut loaded)?;
            }
            store.remove(record)?;
            output::print_lines(&output::format_remove_output(record));
        }
        Command::Show { record, json } => {
            let project = Project::open(&cli.project)?;
            let mut store = project.records()?;
            let names = project.model.field_names();
            let ids = match record {
                Some(id) => vec![id],
                None => store.ids(),
            };

            let mut summaries = Vec::new();
            for id in ids {
                let mut loaded = store.load(id, &names)?;
                project.model.init(&mut loaded)?;
                let attachments: Vec<_> = loaded.attachments().collect();
                if json {
                    summaries.push(output::record_summary(
                        id,
                        &attachments,
                        project.storage.as_ref(),
                    ));
                } else {
                    output::print_lines(&output::format_record(
                        id,
                        &attachments,
                        project.storage.as_ref(),
                    ));
                }
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            }
        }
        Command::Resize {
            file,
            width,
            height,
            force,
        } => {
            let config = config::load_config(&cli.project)?;
            let spec = VariationSpec::new(IN_PLACE, width, height, force)?;
            let outcome = engine(&config).resize_in_place(&file, &spec)?;
            output::print_lines(&output::format_resize_output(&file, &outcome));
        }
        Command::Regenerate { field } => {
            let project = Project::open(&cli.project)?;
            init_thread_pool(&project.config.processing);
            let fields: Vec<&ImageField<RustCodec>> = match &field {
                Some(name) => vec![project.require_field(name)?],
                None => project.model.fields().iter().collect(),
            };

            let store = project.records()?;
            let mut work = Vec::new();
            for id in store.ids() {
                for field in &fields {
                    let attachment = store.attachment(id, field.name())?;
                    let Some(name) = attachment.name() else {
                        continue;
                    };
                    if field.canonical_name(&id.to_string(), name) != name {
                        warn!(
                            record = id,
                            field = field.name(),
                            stored = name,
                            "not canonical, skipped"
                        );
                        continue;
                    }
                    work.push((id, *field, attachment));
                }
            }

            let results = work
                .par_iter()
                .map(|(id, field, attachment)| {
                    field.regenerate(attachment).map(|rendered| RegeneratedField {
                        id: *id,
                        field: field.name().to_string(),
                        name: attachment.to_db_value(),
                        rendered,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            output::print_lines(&output::format_regenerate_output(&results));
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the tracing/logging subsystem.
///
/// `RUST_LOG` wins over the verbosity flag when set.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_attach=debug"
    } else {
        "image_attach=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
