//! A record type's image fields, driven together.
//!
//! [`ImageModel`] is what a host calls from its own load/save/delete paths.
//! It holds one [`ImageField`] per configured field and runs each lifecycle
//! hook across all of them in field-name order.

use crate::config::{AttachConfig, ConfigError};
use crate::imaging::{ImageCodec, ResizeEngine};
use crate::lifecycle::{ImageField, LifecycleError, SaveOutcome, Submission};
use crate::record::Record;
use crate::storage::Storage;
use std::sync::Arc;

pub struct ImageModel<C> {
    fields: Vec<ImageField<C>>,
}

impl<C: ImageCodec> ImageModel<C> {
    pub fn new(fields: Vec<ImageField<C>>) -> Self {
        Self { fields }
    }

    /// One field per `[fields.<name>]` table, sharing `storage` and `engine`.
    pub fn from_config(
        config: &AttachConfig,
        storage: Arc<dyn Storage>,
        engine: Arc<ResizeEngine<C>>,
    ) -> Result<Self, ConfigError> {
        let fields = config
            .fields
            .iter()
            .map(|(name, field)| {
                Ok(ImageField::new(
                    name.as_str(),
                    field.upload_to.as_str(),
                    field.variation_set()?,
                    storage.clone(),
                    engine.clone(),
                ))
            })
            .collect::<Result<_, ConfigError>>()?;
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[ImageField<C>] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Result<&ImageField<C>, LifecycleError> {
        self.fields
            .iter()
            .find(|f| f.name() == name)
            .ok_or_else(|| LifecycleError::UnknownField(name.to_string()))
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name()).collect()
    }

    /// Attach variation handles after loading a record.
    pub fn init<R: Record + ?Sized>(&self, record: &mut R) -> Result<(), LifecycleError> {
        for field in &self.fields {
            field.post_init(record)?;
        }
        Ok(())
    }

    /// Apply form input, save the record, then run every field's post-save.
    ///
    /// Returns the post-save outcome of each field that changed.
    pub fn save<R: Record + ?Sized>(
        &self,
        record: &mut R,
        submissions: &[(&str, Submission)],
    ) -> Result<Vec<(String, SaveOutcome)>, LifecycleError> {
        for (name, submission) in submissions {
            self.field(name)?.save_form_data(record, submission)?;
        }
        record.save()?;

        let mut changed = Vec::new();
        for field in &self.fields {
            let outcome = field.post_save(record)?;
            if outcome != SaveOutcome::Unchanged {
                changed.push((field.name().to_string(), outcome));
            }
        }
        Ok(changed)
    }

    /// Remove every field's files before the record itself is deleted.
    pub fn delete<R: Record + ?Sized>(&self, record: &mut R) -> Result<(), LifecycleError> {
        for field in &self.fields {
            field.delete(record)?;
        }
        Ok(())
    }
}
