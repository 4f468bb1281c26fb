//! GitHub repository image storage

use async_trait::async_trait;

use crate::error::UploadError;
use crate::github::GitHubClient;

use super::{ImageSink, StoredImage};

/// Repository directory receiving uploads
pub const UPLOAD_DIR: &str = "uploads";

/// Commits images to `uploads/` in a GitHub repository
///
/// Without a client every upload fails with [`UploadError::NotConfigured`].
#[derive(Debug, Clone)]
pub struct GitHubImageSink {
    client: Option<GitHubClient>,
}

impl GitHubImageSink {
    pub fn new(client: Option<GitHubClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageSink for GitHubImageSink {
    async fn store(
        &self,
        filename: &str,
        bytes: &[u8],
        kind: &str,
    ) -> Result<StoredImage, UploadError> {
        let client = self.client.as_ref().ok_or(UploadError::NotConfigured)?;
        let path = format!("{}/{}", UPLOAD_DIR, filename);

        // A missing file is fine here; the upload creates it.
        let sha = client.get_sha(&path).await?;
        let message = format!("Upload {} via admin panel", kind);
        client
            .put_file(&path, bytes, &message, sha.as_deref())
            .await?;

        Ok(StoredImage {
            filename: filename.to_string(),
            url: format!("/{}", path),
        })
    }
}
