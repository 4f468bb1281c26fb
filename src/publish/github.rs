//! Publishing through the GitHub contents API

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::PublishMode;
use crate::content::ContentStore;
use crate::error::{ContentError, GitHubError, PublishError};
use crate::github::GitHubClient;

use super::{PublishOutcome, PublishRequest, Publisher};

/// Replaces the content file in a GitHub repository
pub struct GitHubPublisher {
    client: GitHubClient,
    content_path: String,
    store: Arc<dyn ContentStore>,
}

impl GitHubPublisher {
    /// Create a publisher writing to `content_path`
    ///
    /// `store` supplies the content when a request carries none.
    pub fn new(
        client: GitHubClient,
        content_path: impl Into<String>,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            client,
            content_path: content_path.into(),
            store,
        }
    }
}

#[async_trait]
impl Publisher for GitHubPublisher {
    fn mode(&self) -> PublishMode {
        PublishMode::Github
    }

    async fn publish(&self, request: PublishRequest) -> Result<PublishOutcome, PublishError> {
        let content = match request.content {
            Some(content) => content,
            None => self.store.load().await?,
        };
        let bytes = serde_json::to_vec_pretty(&content)
            .map_err(|e| ContentError::Serialization(e.to_string()))?;

        // The content file must already exist in the repository.
        let sha = self
            .client
            .get_sha(&self.content_path)
            .await?
            .ok_or_else(|| GitHubError::Status {
                status: 404,
                message: format!("{} not found in {}", self.content_path, self.client.repo()),
            })?;

        let commit = self
            .client
            .put_file(&self.content_path, &bytes, &request.message, Some(&sha))
            .await?;

        info!(
            repo = %self.client.repo(),
            commit = %commit.sha,
            "Content published to GitHub"
        );

        Ok(PublishOutcome {
            message: "Content successfully published to GitHub".to_string(),
            deployed: true,
            commit: Some(commit),
        })
    }
}
