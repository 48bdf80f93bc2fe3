//! File system paths for linkcourier.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Catalog files live here unless the config says otherwise.
const CATALOG_DIR_NAME: &str = "catalogs";
/// Reply spool read by the outbound MTA.
const OUTBOX_DIR_NAME: &str = "outbox";
/// Raw copies of messages whose reply could not be sent.
const ARCHIVE_DIR_NAME: &str = "archive";

/// Manages file system paths.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.linkcourier)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.linkcourier`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".linkcourier"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.linkcourier).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.linkcourier/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the database file path (~/.linkcourier/linkcourier.sqlite).
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("linkcourier.sqlite")
    }

    /// Get the catalog directory (~/.linkcourier/catalogs).
    pub fn catalog_dir(&self) -> PathBuf {
        self.base_dir.join(CATALOG_DIR_NAME)
    }

    /// Get the reply spool directory (~/.linkcourier/outbox).
    pub fn outbox_dir(&self) -> PathBuf {
        self.base_dir.join(OUTBOX_DIR_NAME)
    }

    /// Get the failed-message archive directory (~/.linkcourier/archive).
    pub fn archive_dir(&self) -> PathBuf {
        self.base_dir.join(ARCHIVE_DIR_NAME)
    }

    /// Get the logs directory (~/.linkcourier/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Get the JSONL log file path (~/.linkcourier/logs/linkcourier.jsonl).
    pub fn log_file(&self) -> PathBuf {
        self.logs_dir().join("linkcourier.jsonl")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.catalog_dir())?;
        std::fs::create_dir_all(self.outbox_dir())?;
        std::fs::create_dir_all(self.archive_dir())?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
