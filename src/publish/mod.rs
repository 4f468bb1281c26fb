//! Content publishing
//!
//! A [`Publisher`] pushes the site content to wherever the live site is built
//! from. The mode is chosen by configuration:
//! - `disabled`: nothing is published, content changes stay local
//! - `git`: the working tree is committed and pushed with the `git` binary
//! - `github`: `content.json` is replaced through the GitHub contents API

pub mod git;
pub mod github;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::PublishMode;
use crate::error::PublishError;
use crate::github::CommitInfo;

pub use git::GitPublisher;
pub use github::GitHubPublisher;

/// Commit message used when the request does not carry one
pub const DEFAULT_COMMIT_MESSAGE: &str = "Update content via admin panel";

/// A publish request
#[derive(Debug, Clone, PartialEq)]
pub struct PublishRequest {
    /// Content to publish; the stored content is used when absent
    pub content: Option<Value>,

    /// Commit message
    pub message: String,
}

impl PublishRequest {
    pub fn new(content: Option<Value>, message: Option<String>) -> Self {
        Self {
            content,
            message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_COMMIT_MESSAGE.to_string()),
        }
    }
}

/// Result of a publish
#[derive(Debug, Clone, PartialEq)]
pub struct PublishOutcome {
    /// Human-readable summary
    pub message: String,

    /// Whether anything left this server
    pub deployed: bool,

    /// Commit created remotely, when known
    pub commit: Option<CommitInfo>,
}

/// Publishes site content
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Configured publishing mode
    fn mode(&self) -> PublishMode;

    /// Publish content
    async fn publish(&self, request: PublishRequest) -> Result<PublishOutcome, PublishError>;
}

/// Publisher used when publishing is switched off
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPublisher;

#[async_trait]
impl Publisher for DisabledPublisher {
    fn mode(&self) -> PublishMode {
        PublishMode::Disabled
    }

    async fn publish(&self, _request: PublishRequest) -> Result<PublishOutcome, PublishError> {
        Ok(PublishOutcome {
            message: "Content updated (publishing disabled)".to_string(),
            deployed: false,
            commit: None,
        })
    }
}
