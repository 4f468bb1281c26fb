//! Filesystem-backed content store
//!
//! The document lives in a single JSON file. Writes go to a temporary file in
//! the same directory and are renamed into place; the previous document is
//! copied to `content-backup-<timestamp>.json` first.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::ContentError;

use super::{ContentStore, SaveReceipt};

const MAX_BACKUPS_PER_STAMP: u32 = 1000;

/// Content store writing to a local JSON file
#[derive(Debug, Clone)]
pub struct FileContentStore {
    path: PathBuf,
    backup_dir: PathBuf,
}

impl FileContentStore {
    /// Creates a store for `path`, writing backups into `backup_dir`
    pub fn new(path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    /// Path of the content file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Backup file path for a save at `now`
    pub fn backup_path(&self, now: DateTime<Utc>) -> PathBuf {
        self.numbered_backup_path(now, 0)
    }

    // Saves within the same millisecond get `-1`, `-2`, ... appended.
    fn numbered_backup_path(&self, now: DateTime<Utc>, n: u32) -> PathBuf {
        let stamp = now
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        if n == 0 {
            self.backup_dir.join(format!("content-backup-{}.json", stamp))
        } else {
            self.backup_dir
                .join(format!("content-backup-{}-{}.json", stamp, n))
        }
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "content.json".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    async fn backup_current(&self, now: DateTime<Utc>) -> Result<Option<PathBuf>, ContentError> {
        let current = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        fs::create_dir_all(&self.backup_dir).await?;

        for n in 0..MAX_BACKUPS_PER_STAMP {
            let backup_path = self.numbered_backup_path(now, n);
            let mut file = match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&backup_path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };
            file.write_all(&current).await?;
            file.flush().await?;
            return Ok(Some(backup_path));
        }

        Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "too many backups for one timestamp",
        )
        .into())
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn load(&self) -> Result<Value, ContentError> {
        let raw = fs::read_to_string(&self.path).await?;
        serde_json::from_str(&raw).map_err(|e| ContentError::Serialization(e.to_string()))
    }

    async fn save(&self, content: Value, now: DateTime<Utc>) -> Result<SaveReceipt, ContentError> {
        match self.backup_current(now).await {
            Ok(Some(backup)) => {
                tracing::debug!(backup = %backup.display(), "Content backup written");
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Could not create content backup");
            }
        }

        let serialized = serde_json::to_vec_pretty(&content)
            .map_err(|e| ContentError::Serialization(e.to_string()))?;

        let temp_path = self.temp_path();
        fs::write(&temp_path, &serialized).await?;
        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        tracing::info!(
            path = %self.path.display(),
            bytes = serialized.len(),
            "Content saved"
        );

        Ok(SaveReceipt { timestamp: now })
    }
}
