//! File storage behind attachments.
//!
//! Attachments refer to files by *storage name*: a relative path with `/`
//! separators such as `img/image_1.jpeg`. A [`Storage`] maps names to
//! filesystem paths and public URLs, and performs the few file operations the
//! lifecycle needs. [`FileSystemStorage`] keeps everything under one media
//! root directory.

use crate::variation::split_extension;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Named-file storage used by image fields.
pub trait Storage: Send + Sync + fmt::Debug {
    /// Filesystem path of `name`.
    fn path(&self, name: &str) -> PathBuf;

    /// Public URL of `name`.
    fn url(&self, name: &str) -> String;

    fn exists(&self, name: &str) -> bool;

    /// Size of `name` in bytes.
    fn size(&self, name: &str) -> io::Result<u64>;

    /// Copy an external file into storage under `name`, or under a free
    /// variant of it if `name` is taken. Returns the name actually used.
    fn save(&self, name: &str, source: &Path) -> io::Result<String>;

    /// Move `from` to `to`, replacing any file already at `to`.
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;

    /// Copy `from` to `to`, replacing any file already at `to`.
    fn copy(&self, from: &str, to: &str) -> io::Result<()>;

    /// Remove `name`. Removing a missing file succeeds.
    fn delete(&self, name: &str) -> io::Result<()>;
}

/// Storage rooted at a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    root: PathBuf,
    base_url: String,
}

impl FileSystemStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// First of `name`, `{stem}_1{ext}`, `{stem}_2{ext}`, ... not present.
    fn available_name(&self, name: &str) -> String {
        if !self.exists(name) {
            return name.to_string();
        }
        let (stem, ext) = split_extension(name);
        (1..)
            .map(|n| format!("{stem}_{n}{ext}"))
            .find(|candidate| !self.exists(candidate))
            .unwrap_or_else(|| name.to_string())
    }
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

impl Storage for FileSystemStorage {
    fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn url(&self, name: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), name)
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).is_file()
    }

    fn size(&self, name: &str) -> io::Result<u64> {
        Ok(fs::metadata(self.path(name))?.len())
    }

    fn save(&self, name: &str, source: &Path) -> io::Result<String> {
        let name = self.available_name(name);
        let dest = self.path(&name);
        ensure_parent(&dest)?;
        fs::copy(source, &dest)?;
        debug!(source = %source.display(), name = %name, "stored upload");
        Ok(name)
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let dest = self.path(to);
        ensure_parent(&dest)?;
        fs::rename(self.path(from), &dest)
    }

    fn copy(&self, from: &str, to: &str) -> io::Result<()> {
        let dest = self.path(to);
        ensure_parent(&dest)?;
        fs::copy(self.path(from), &dest).map(|_| ())
    }

    fn delete(&self, name: &str) -> io::Result<()> {
        match fs::remove_file(self.path(name)) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            result => result,
        }
    }
}
