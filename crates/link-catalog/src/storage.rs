//! Catalog persistence.
//!
//! Storage deals in raw catalog text keyed by provider. Parsing lives in
//! [`crate::format`] so alternative backends only move bytes.

use crate::{CatalogError, CatalogResult};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

const CATALOG_EXTENSION: &str = "links";
const BACKUP_SUFFIX: &str = ".backup";

/// Backend holding one catalog document per provider.
pub trait CatalogStorage: Send + Sync {
    /// Raw document for a provider, or `None` when it has no catalog.
    fn read(&self, provider: &str) -> CatalogResult<Option<String>>;

    /// Replace a provider's document. Readers see either the old or the new
    /// content, never a partial write.
    fn write(&self, provider: &str, content: &str) -> CatalogResult<()>;

    /// Move the current document aside. Returns whether one existed.
    fn backup(&self, provider: &str) -> CatalogResult<bool>;

    /// Put a previous backup back in place. Returns whether one existed.
    fn restore(&self, provider: &str) -> CatalogResult<bool>;

    /// Provider keys that currently have a document, sorted.
    fn list(&self) -> CatalogResult<Vec<String>>;
}

/// Normalize a provider name into a storage key.
///
/// Keys are lowercase and limited to `[a-z0-9_-]` so they map to plain file
/// names.
pub fn provider_key(provider: &str) -> CatalogResult<String> {
    let key = provider.trim().to_lowercase();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(key)
    } else {
        Err(CatalogError::LinkFile(format!(
            "invalid provider name '{provider}'"
        )))
    }
}

/// Catalog documents stored as `<provider>.links` files in one directory.
#[derive(Debug, Clone)]
pub struct FsCatalogStorage {
    dir: PathBuf,
}

impl FsCatalogStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, provider: &str) -> CatalogResult<PathBuf> {
        let key = provider_key(provider)?;
        Ok(self.dir.join(format!("{key}.{CATALOG_EXTENSION}")))
    }

    fn backup_path(&self, provider: &str) -> CatalogResult<PathBuf> {
        let key = provider_key(provider)?;
        Ok(self
            .dir
            .join(format!("{key}.{CATALOG_EXTENSION}{BACKUP_SUFFIX}")))
    }
}

impl CatalogStorage for FsCatalogStorage {
    fn read(&self, provider: &str) -> CatalogResult<Option<String>> {
        let path = self.file_path(provider)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, provider: &str, content: &str) -> CatalogResult<()> {
        let path = self.file_path(provider)?;
        fs::create_dir_all(&self.dir)?;
        atomic_write(&path, content)?;
        debug!(path = %path.display(), bytes = content.len(), "Catalog written");
        Ok(())
    }

    fn backup(&self, provider: &str) -> CatalogResult<bool> {
        let path = self.file_path(provider)?;
        if !path.exists() {
            return Ok(false);
        }
        let backup = self.backup_path(provider)?;
        fs::rename(&path, &backup)?;
        debug!(path = %backup.display(), "Catalog backed up");
        Ok(true)
    }

    fn restore(&self, provider: &str) -> CatalogResult<bool> {
        let backup = self.backup_path(provider)?;
        if !backup.exists() {
            return Ok(false);
        }
        let path = self.file_path(provider)?;
        fs::rename(&backup, &path)?;
        warn!(path = %path.display(), "Catalog restored from backup");
        Ok(true)
    }

    fn list(&self) -> CatalogResult<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut providers = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(CATALOG_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if provider_key(stem).is_ok() {
                    providers.push(stem.to_string());
                }
            }
        }
        providers.sort();
        Ok(providers)
    }
}

/// Write through a sibling temp file and rename over the target.
fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid file name"))?;

    let tmp_path = dir.join(format!(
        ".{}.tmp.{}",
        file_name,
        std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ));

    let result = (|| -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}
