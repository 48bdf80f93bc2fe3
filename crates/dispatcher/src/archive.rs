//! Copies of messages whose reply could not be delivered.

use std::io;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

const ARCHIVE_EXTENSION: &str = "msg";

/// New diagnostic reference, also used as the archive file stem.
pub fn new_diagnostic_ref() -> String {
    Uuid::new_v4().to_string()
}

/// Directory of raw messages kept for manual inspection.
#[derive(Debug, Clone)]
pub struct MessageArchive {
    dir: PathBuf,
}

impl MessageArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a message with this reference is archived at.
    pub fn path_for(&self, diagnostic_ref: &str) -> PathBuf {
        self.dir.join(format!("{diagnostic_ref}.{ARCHIVE_EXTENSION}"))
    }

    /// Write a raw message under its diagnostic reference.
    pub async fn store(&self, diagnostic_ref: &str, raw: &str) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(diagnostic_ref);
        tokio::fs::write(&path, raw).await?;
        info!(diagnostic_ref, path = %path.display(), "Message archived");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn store_writes_named_file() {
        let dir = tempdir().unwrap();
        let archive = MessageArchive::new(dir.path().join("archive"));
        let diagnostic_ref = new_diagnostic_ref();

        let path = archive.store(&diagnostic_ref, "From: a@b.c\n\nlinux").await.unwrap();
        assert_eq!(path, archive.path_for(&diagnostic_ref));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "From: a@b.c\n\nlinux");
    }
}
