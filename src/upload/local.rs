//! Local directory image storage

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;

use crate::error::UploadError;

use super::{ImageSink, StoredImage};

/// Writes images into a local directory served under `url_prefix`
#[derive(Debug, Clone)]
pub struct LocalImageSink {
    dir: PathBuf,
    url_prefix: String,
}

impl LocalImageSink {
    pub fn new(dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            url_prefix: url_prefix.into().trim_matches('/').to_string(),
        }
    }

    fn url_for(&self, filename: &str) -> String {
        if self.url_prefix.is_empty() {
            format!("/{}", filename)
        } else {
            format!("/{}/{}", self.url_prefix, filename)
        }
    }
}

#[async_trait]
impl ImageSink for LocalImageSink {
    async fn store(
        &self,
        filename: &str,
        bytes: &[u8],
        _kind: &str,
    ) -> Result<StoredImage, UploadError> {
        fs::create_dir_all(&self.dir).await?;
        fs::write(self.dir.join(filename), bytes).await?;

        Ok(StoredImage {
            filename: filename.to_string(),
            url: self.url_for(filename),
        })
    }
}
