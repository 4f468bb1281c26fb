//! Configuration management for site-cms
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::manager::{MAX_PASSWORD_CHARS, MAX_USERNAME_CHARS};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Content store configuration
    #[serde(default)]
    pub content: ContentConfig,

    /// Publishing configuration
    #[serde(default)]
    pub publish: PublishConfig,

    /// Image upload configuration
    #[serde(default)]
    pub upload: UploadConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // First, expand environment variables in the YAML string
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables
    ///
    /// Reads `SITE_CMS_*` variables, plus the deployment variables `PORT`,
    /// `SECRET_KEY`, `ADMIN_USER`, `ADMIN_PASS`, `GIT_ENABLED`, `GITHUB_TOKEN`
    /// and `GITHUB_REPO`. Prefixed variables win when both are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Server config from env
        if let Some(host) = env_var(&["SITE_CMS_SERVER_HOST"]) {
            config.server.host = host;
        }
        if let Some(port) = env_var(&["SITE_CMS_SERVER_PORT", "PORT"]) {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }

        // Auth config from env
        if let Some(user) = env_var(&["SITE_CMS_AUTH_ADMIN_USERNAME", "ADMIN_USER"]) {
            config.auth.admin_username = user;
        }
        if let Some(password) = env_var(&["SITE_CMS_AUTH_ADMIN_PASSWORD", "ADMIN_PASS"]) {
            config.auth.admin_password = Some(password);
        }
        if let Some(secret) = env_var(&["SITE_CMS_AUTH_SECRET_KEY", "SECRET_KEY"]) {
            config.auth.secret_key = Some(secret);
        }
        if let Some(trust) = env_var(&["SITE_CMS_AUTH_TRUST_FORWARDED_FOR"]) {
            config.auth.trust_forwarded_for = trust.parse().map_err(|_| {
                ConfigError::Parse(format!("Invalid SITE_CMS_AUTH_TRUST_FORWARDED_FOR: {}", trust))
            })?;
        }

        // Content config from env
        if let Some(path) = env_var(&["SITE_CMS_CONTENT_PATH"]) {
            config.content.path = path;
        }
        if let Some(dir) = env_var(&["SITE_CMS_CONTENT_BACKUP_DIR"]) {
            config.content.backup_dir = dir;
        }

        // Publish config from env
        if env_var(&["GIT_ENABLED"]).as_deref() == Some("true") {
            config.publish.mode = PublishMode::Git;
        }
        if let Some(mode) = env_var(&["SITE_CMS_PUBLISH_MODE"]) {
            config.publish.mode = mode.parse()?;
        }
        if let Some(dir) = env_var(&["SITE_CMS_PUBLISH_GIT_REPO_DIR"]) {
            config.publish.git.repo_dir = dir;
        }
        if let Some(token) = env_var(&["SITE_CMS_GITHUB_TOKEN", "GITHUB_TOKEN"]) {
            config.publish.github.token = Some(token);
        }
        if let Some(repo) = env_var(&["SITE_CMS_GITHUB_REPO", "GITHUB_REPO"]) {
            config.publish.github.repo = Some(repo);
        }
        if let Some(branch) = env_var(&["SITE_CMS_GITHUB_BRANCH"]) {
            config.publish.github.branch = branch;
        }

        // Upload config from env
        if let Some(storage) = env_var(&["SITE_CMS_UPLOAD_STORAGE"]) {
            config.upload.storage = storage.parse()?;
        }
        if let Some(dir) = env_var(&["SITE_CMS_UPLOAD_DIR"]) {
            config.upload.dir = dir;
        }

        // Logging config from env
        if let Some(level) = env_var(&["SITE_CMS_LOG_LEVEL"]) {
            config.logging.level = level;
        }
        if let Some(format) = env_var(&["SITE_CMS_LOG_FORMAT"]) {
            config.logging.format = format;
        }

        Ok(config)
    }

    /// Check startup requirements
    ///
    /// There are no fallback secrets or credentials: a missing or empty
    /// secret key or admin password is an error.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let auth = &self.auth;

        if auth.secret_key.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingRequired("auth.secret_key".to_string()));
        }
        if auth.admin_password.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingRequired(
                "auth.admin_password".to_string(),
            ));
        }
        if auth.admin_username.is_empty() {
            return Err(ConfigError::InvalidValue(
                "auth.admin_username must not be empty".to_string(),
            ));
        }
        if auth.admin_username.chars().count() > MAX_USERNAME_CHARS {
            return Err(ConfigError::InvalidValue(format!(
                "auth.admin_username must be at most {} characters",
                MAX_USERNAME_CHARS
            )));
        }
        if auth
            .admin_password
            .as_deref()
            .is_some_and(|p| p.chars().count() > MAX_PASSWORD_CHARS)
        {
            return Err(ConfigError::InvalidValue(format!(
                "auth.admin_password must be at most {} characters",
                MAX_PASSWORD_CHARS
            )));
        }
        if auth.failure_delay_ms < MIN_FAILURE_DELAY_MS {
            return Err(ConfigError::InvalidValue(format!(
                "auth.failure_delay_ms must be at least {}",
                MIN_FAILURE_DELAY_MS
            )));
        }
        if auth.token_validity_secs == 0 || auth.token_validity_secs > MAX_DURATION_SECS {
            return Err(ConfigError::InvalidValue(
                "auth.token_validity_secs out of range".to_string(),
            ));
        }
        if auth.rate_limit.max_requests == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.rate_limit.max_requests must be positive".to_string(),
            ));
        }
        if auth.rate_limit.window_secs == 0 || auth.rate_limit.window_secs > MAX_DURATION_SECS {
            return Err(ConfigError::InvalidValue(
                "auth.rate_limit.window_secs out of range".to_string(),
            ));
        }
        if auth.rate_limit.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.rate_limit.sweep_interval_secs must be positive".to_string(),
            ));
        }

        let github_needed = self.publish.mode == PublishMode::Github
            || self.upload.storage == UploadStorage::Github;
        if github_needed && self.publish.github.repo.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingRequired(
                "publish.github.repo".to_string(),
            ));
        }
        if self.publish.mode == PublishMode::Github && self.publish.github.token.is_none() {
            return Err(ConfigError::MissingRequired(
                "publish.github.token".to_string(),
            ));
        }

        if self.upload.max_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "upload.max_bytes must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Build the authentication manager configuration
    pub fn auth_manager_config(&self) -> Result<crate::auth::AuthConfig, ConfigError> {
        self.validate()?;

        let auth = &self.auth;
        let mut config = crate::auth::AuthConfig::new(
            auth.admin_username.clone(),
            auth.admin_password.clone().unwrap_or_default(),
            auth.secret_key.clone().unwrap_or_default().into_bytes(),
        );
        config.token_validity = seconds(auth.token_validity_secs, "auth.token_validity_secs")?;
        config.failure_delay = std::time::Duration::from_millis(auth.failure_delay_ms);
        config.rate_limit = crate::auth::RateLimitConfig {
            max_requests: auth.rate_limit.max_requests,
            window: seconds(auth.rate_limit.window_secs, "auth.rate_limit.window_secs")?,
        };

        Ok(config)
    }
}

/// Smallest accepted login failure delay
pub const MIN_FAILURE_DELAY_MS: u64 = 500;

// One year; keeps durations well inside chrono's range.
const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

fn seconds(secs: u64, field: &str) -> Result<chrono::Duration, ConfigError> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| ConfigError::InvalidValue(format!("{} out of range", field)))
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_body_limit() -> usize {
    16 * 1024 * 1024
}

/// Authentication configuration
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// Admin username
    #[serde(default = "default_admin_username")]
    pub admin_username: String,

    /// Admin password
    pub admin_password: Option<String>,

    /// Token signing key
    pub secret_key: Option<String>,

    /// Token lifetime in seconds
    #[serde(default = "default_token_validity")]
    pub token_validity_secs: u64,

    /// Delay before answering a failed login, in milliseconds
    #[serde(default = "default_failure_delay")]
    pub failure_delay_ms: u64,

    /// Use the first `X-Forwarded-For` entry as the client address
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: AuthRateLimitConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_username: default_admin_username(),
            admin_password: None,
            secret_key: None,
            token_validity_secs: default_token_validity(),
            failure_delay_ms: default_failure_delay(),
            trust_forwarded_for: false,
            rate_limit: AuthRateLimitConfig::default(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("AuthConfig")
            .field("admin_username", &self.admin_username)
            .field("admin_password", &redact(&self.admin_password))
            .field("secret_key", &redact(&self.secret_key))
            .field("token_validity_secs", &self.token_validity_secs)
            .field("failure_delay_ms", &self.failure_delay_ms)
            .field("trust_forwarded_for", &self.trust_forwarded_for)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_token_validity() -> u64 {
    2 * 60 * 60
}

fn default_failure_delay() -> u64 {
    1000
}

/// Rate limiting configuration for login attempts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthRateLimitConfig {
    /// Maximum number of attempts per client inside the window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// Window length in seconds
    #[serde(default = "default_window")]
    pub window_secs: u64,

    /// How often idle clients are swept from memory, in seconds
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for AuthRateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_max_requests() -> usize {
    10
}

fn default_window() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

/// Content store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentConfig {
    /// Path of the site's content file
    #[serde(default = "default_content_path")]
    pub path: String,

    /// Directory receiving `content-backup-<timestamp>.json` files
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            path: default_content_path(),
            backup_dir: default_backup_dir(),
        }
    }
}

fn default_content_path() -> String {
    "content.json".to_string()
}

fn default_backup_dir() -> String {
    ".".to_string()
}

/// How content is published
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// Content is only saved locally
    #[default]
    Disabled,

    /// Commit and push with the local `git` binary
    Git,

    /// Update the file through the GitHub contents API
    Github,
}

impl PublishMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishMode::Disabled => "disabled",
            PublishMode::Git => "git",
            PublishMode::Github => "github",
        }
    }
}

impl std::str::FromStr for PublishMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "disabled" => Ok(PublishMode::Disabled),
            "git" => Ok(PublishMode::Git),
            "github" => Ok(PublishMode::Github),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown publish mode: {}",
                other
            ))),
        }
    }
}

/// Publishing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PublishConfig {
    /// Publishing mode
    #[serde(default)]
    pub mode: PublishMode,

    /// Local git settings
    #[serde(default)]
    pub git: GitPublishConfig,

    /// GitHub API settings, shared with GitHub upload storage
    #[serde(default)]
    pub github: GitHubConfig,
}

/// Local git publishing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitPublishConfig {
    /// Working tree to commit in
    #[serde(default = "default_repo_dir")]
    pub repo_dir: String,

    /// Remote to push to
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Branch to push
    #[serde(default = "default_branch")]
    pub branch: String,
}

impl Default for GitPublishConfig {
    fn default() -> Self {
        Self {
            repo_dir: default_repo_dir(),
            remote: default_remote(),
            branch: default_branch(),
        }
    }
}

fn default_repo_dir() -> String {
    ".".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

/// GitHub API configuration
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct GitHubConfig {
    /// Personal access token
    pub token: Option<String>,

    /// Repository as `owner/name`
    pub repo: Option<String>,

    /// Target branch
    #[serde(default = "default_branch")]
    pub branch: String,

    /// API base URL
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Repository path of the content file
    #[serde(default = "default_content_path")]
    pub content_path: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            repo: None,
            branch: default_branch(),
            api_url: default_github_api_url(),
            content_path: default_content_path(),
        }
    }
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("api_url", &self.api_url)
            .field("content_path", &self.content_path)
            .finish()
    }
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

/// Where uploaded images are stored
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UploadStorage {
    /// Local directory
    #[default]
    Local,

    /// `uploads/` in the GitHub repository
    Github,
}

impl std::str::FromStr for UploadStorage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(UploadStorage::Local),
            "github" => Ok(UploadStorage::Github),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown upload storage: {}",
                other
            ))),
        }
    }
}

/// Image upload configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadConfig {
    /// Storage backend
    #[serde(default)]
    pub storage: UploadStorage,

    /// Directory for local storage
    #[serde(default = "default_upload_dir")]
    pub dir: String,

    /// URL prefix under which locally stored images are served
    #[serde(default = "default_upload_dir")]
    pub url_prefix: String,

    /// Maximum decoded image size in bytes
    #[serde(default = "default_upload_max_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            storage: UploadStorage::default(),
            dir: default_upload_dir(),
            url_prefix: default_upload_dir(),
            max_bytes: default_upload_max_bytes(),
        }
    }
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

fn default_upload_max_bytes() -> usize {
    10 * 1024 * 1024
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (`json` or `pretty`)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// First non-empty value among `names`
fn env_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|value| !value.is_empty())
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax; unknown variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
