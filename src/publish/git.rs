//! Publishing by committing and pushing with the local `git` binary

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{GitPublishConfig, PublishMode};
use crate::error::PublishError;

use super::{PublishOutcome, PublishRequest, Publisher};

/// Commits the working tree and pushes it to a remote
///
/// Commands are run with argument vectors; no shell is involved, so the
/// commit message is passed through verbatim.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    repo_dir: PathBuf,
    remote: String,
    branch: String,
}

impl GitPublisher {
    pub fn new(
        repo_dir: impl Into<PathBuf>,
        remote: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            remote: remote.into(),
            branch: branch.into(),
        }
    }

    pub fn from_config(config: &GitPublishConfig) -> Self {
        Self::new(&config.repo_dir, &config.remote, &config.branch)
    }

    /// The git invocations for one publish, in order
    pub fn commands(&self, message: &str) -> Vec<Vec<String>> {
        vec![
            vec!["add".to_string(), ".".to_string()],
            vec!["commit".to_string(), "-m".to_string(), message.to_string()],
            vec!["push".to_string(), self.remote.clone(), self.branch.clone()],
        ]
    }

    async fn run(&self, args: &[String]) -> Result<(), PublishError> {
        debug!(repo_dir = %self.repo_dir.display(), command = %args[0], "Running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .output()
            .await
            .map_err(|e| PublishError::Git(format!("git {}: {}", args[0], e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(PublishError::Git(format!("git {}: {}", args[0], detail)));
        }

        Ok(())
    }
}

#[async_trait]
impl Publisher for GitPublisher {
    fn mode(&self) -> PublishMode {
        PublishMode::Git
    }

    async fn publish(&self, request: PublishRequest) -> Result<PublishOutcome, PublishError> {
        for args in self.commands(&request.message) {
            self.run(&args).await?;
        }

        info!(
            remote = %self.remote,
            branch = %self.branch,
            "Content committed and pushed"
        );

        Ok(PublishOutcome {
            message: "Content published and deployed successfully".to_string(),
            deployed: true,
            commit: None,
        })
    }
}
