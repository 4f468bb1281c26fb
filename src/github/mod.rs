//! Minimal GitHub REST client for the repository contents API
//!
//! Only the two calls needed to replace a file are supported: looking up
//! the current blob SHA of a path and writing new content to it.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GitHubConfig;
use crate::error::GitHubError;

const ACCEPT_GITHUB_V3: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = "site-cms";

/// Commit created by a contents update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitInfo {
    pub sha: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ContentsEntry {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    commit: UpdateCommit,
}

#[derive(Debug, Deserialize)]
struct UpdateCommit {
    sha: String,
    html_url: String,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// GitHub contents API client bound to one repository and branch
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_url: String,
    repo: String,
    branch: String,
}

impl GitHubClient {
    /// Create a client authenticating with `token`
    pub fn new(
        api_url: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        token: &str,
    ) -> Result<Self, GitHubError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| GitHubError::InvalidResponse("token is not a valid header".into()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_GITHUB_V3));

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| GitHubError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            repo: repo.into(),
            branch: branch.into(),
        })
    }

    /// Create a client from configuration
    ///
    /// Returns `None` when no token or repository is configured.
    pub fn from_config(config: &GitHubConfig) -> Result<Option<Self>, GitHubError> {
        match (config.token.as_deref(), config.repo.as_deref()) {
            (Some(token), Some(repo)) if !token.is_empty() && !repo.is_empty() => {
                Self::new(&config.api_url, repo, &config.branch, token).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Repository as `owner/name`
    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.api_url,
            self.repo,
            path.trim_start_matches('/')
        )
    }

    /// Look up the blob SHA of `path` on the configured branch
    ///
    /// Returns `None` if the file does not exist.
    pub async fn get_sha(&self, path: &str) -> Result<Option<String>, GitHubError> {
        let url = format!("{}?ref={}", self.contents_url(path), self.branch);
        debug!(url = %url, "Fetching GitHub file SHA");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let entry: ContentsEntry = response
                    .json()
                    .await
                    .map_err(|e| GitHubError::InvalidResponse(e.to_string()))?;
                Ok(Some(entry.sha))
            }
            status => Err(status_error(status, response).await),
        }
    }

    /// Create or replace `path` with `content`
    ///
    /// `sha` must be the current blob SHA when the file already exists.
    pub async fn put_file(
        &self,
        path: &str,
        content: &[u8],
        message: &str,
        sha: Option<&str>,
    ) -> Result<CommitInfo, GitHubError> {
        let url = self.contents_url(path);
        let body = UpdateRequest {
            message,
            content: STANDARD.encode(content),
            branch: &self.branch,
            sha,
        };

        debug!(url = %url, bytes = content.len(), "Updating GitHub file");

        let response = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GitHubError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let err = status_error(status, response).await;
            warn!(url = %url, error = %err, "GitHub update failed");
            return Err(err);
        }

        let update: UpdateResponse = response
            .json()
            .await
            .map_err(|e| GitHubError::InvalidResponse(e.to_string()))?;

        Ok(CommitInfo {
            sha: update.commit.sha,
            url: update.commit.html_url,
        })
    }
}

async fn status_error(status: StatusCode, response: reqwest::Response) -> GitHubError {
    let message = match response.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };
    GitHubError::Status {
        status: status.as_u16(),
        message,
    }
}
