//! HTTP router for site-cms
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks and login (no auth required)
//! - Content read/write, publishing, image upload and status (bearer token)
//!
//! Login and the write endpoints share one per-client rate limit.

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{AuthManager, Clock};
use crate::config::{Config, PublishMode, UploadStorage};
use crate::content::{sanitize_content, validate_structure, ContentStore, FileContentStore};
use crate::error::{AppError, AuthError, UploadError};
use crate::github::GitHubClient;
use crate::publish::{
    DisabledPublisher, GitHubPublisher, GitPublisher, PublishRequest, Publisher,
};
use crate::upload::{GitHubImageSink, ImageSink, ImageUploader, LocalImageSink};

use super::middleware::{
    auth_middleware, client_address, logging_middleware, rate_limit_middleware, AuthResponse,
    AuthenticatedPrincipal,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Authentication manager
    pub auth_manager: Arc<AuthManager>,

    /// Time source for tokens, rate limiting and timestamps
    pub clock: Arc<dyn Clock>,

    /// Site content storage
    pub content_store: Arc<dyn ContentStore>,

    /// Configured publisher
    pub publisher: Arc<dyn Publisher>,

    /// Image uploader
    pub uploader: Arc<ImageUploader>,

    /// Use `X-Forwarded-For` as the rate limit key
    pub trust_forwarded_for: bool,

    /// Maximum request body size in bytes
    pub body_limit: usize,
}

impl AppState {
    /// Wire up the application from a validated configuration
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        let auth_config = config
            .auth_manager_config()
            .map_err(|e| AppError::Config(e.to_string()))?;
        let auth_manager = Arc::new(AuthManager::new(auth_config));

        let content_store: Arc<dyn ContentStore> = Arc::new(FileContentStore::new(
            &config.content.path,
            &config.content.backup_dir,
        ));

        let github = GitHubClient::from_config(&config.publish.github)
            .map_err(|e| AppError::Config(e.to_string()))?;

        let publisher: Arc<dyn Publisher> = match config.publish.mode {
            PublishMode::Disabled => Arc::new(DisabledPublisher),
            PublishMode::Git => Arc::new(GitPublisher::from_config(&config.publish.git)),
            PublishMode::Github => {
                let client = github.clone().ok_or_else(|| {
                    AppError::Config("GitHub publishing requires a token and repo".to_string())
                })?;
                Arc::new(GitHubPublisher::new(
                    client,
                    &config.publish.github.content_path,
                    Arc::clone(&content_store),
                ))
            }
        };

        let sink: Arc<dyn ImageSink> = match config.upload.storage {
            UploadStorage::Local => Arc::new(LocalImageSink::new(
                &config.upload.dir,
                &config.upload.url_prefix,
            )),
            UploadStorage::Github => Arc::new(GitHubImageSink::new(github)),
        };

        Ok(Self {
            auth_manager,
            clock,
            content_store,
            publisher,
            uploader: Arc::new(ImageUploader::new(sink, config.upload.max_bytes)),
            trust_forwarded_for: config.auth.trust_forwarded_for,
            body_limit: config.server.body_limit_bytes,
        })
    }
}

/// Login request body
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Publish request body
#[derive(Debug, Default, Deserialize)]
pub struct PublishBody {
    pub content: Option<Value>,
    pub message: Option<String>,
}

/// Upload request body
#[derive(Debug, Default, Deserialize)]
pub struct UploadBody {
    pub image: Option<String>,
    pub filename: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Build the main application router
///
/// # Arguments
///
/// * `state` - Application state containing the managers and stores
///
/// # Returns
///
/// An axum Router configured with all endpoints
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.body_limit;

    // Runs after the auth check on each write route
    let write_limit = middleware::from_fn_with_state(state.clone(), rate_limit_middleware);

    let protected = Router::new()
        .route(
            "/api/content",
            get(get_content_handler)
                .merge(post(save_content_handler).route_layer(write_limit.clone())),
        )
        .route(
            "/api/publish",
            post(publish_handler).route_layer(write_limit.clone()),
        )
        .route("/api/upload", post(upload_handler).route_layer(write_limit))
        .route("/api/status", get(status_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        // Public endpoints
        .route("/api/health", get(health_handler))
        .route("/api/auth", post(auth_handler))
        .merge(protected)
        .method_not_allowed_fallback(method_not_allowed_handler)
        .fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(logging_middleware))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Render a token lifetime the way clients display it, e.g. `2h`
fn format_validity(validity: chrono::Duration) -> String {
    let secs = validity.num_seconds();
    if secs > 0 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs > 0 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

// =============================================================================
// Public Handlers
// =============================================================================

/// Health check endpoint handler
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": timestamp(state.clock.now()),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Login endpoint handler
///
/// Unparseable bodies are treated as empty credentials so they still count
/// against the client's rate limit.
async fn auth_handler(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AuthResponse> {
    let request = payload.map(|Json(r)| r).unwrap_or_default();
    let client = client_address(connect_info.as_ref(), &headers, state.trust_forwarded_for);
    let now = state.clock.now();

    match state
        .auth_manager
        .login(&request.username, &request.password, &client, now)
        .await
    {
        Ok(issued) => Ok(Json(json!({
            "success": true,
            "token": issued.token,
            "user": issued.subject,
            "expiresIn": format_validity(state.auth_manager.token_validity()),
            "expiresAt": timestamp(issued.expires_at),
        }))),
        Err(AuthError::RateLimited) => Err(AuthResponse::from_error(AuthError::RateLimited)
            .with_retry_after(state.auth_manager.retry_after(&client, now))),
        Err(e) => Err(AuthResponse::from_error(e)),
    }
}

/// Fallback for unknown paths
async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
}

/// Fallback for known paths called with the wrong method
async fn method_not_allowed_handler() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}

// =============================================================================
// Content Handlers
// =============================================================================

/// Return the current content document
async fn get_content_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.content_store.load().await {
        Ok(content) => (StatusCode::OK, Json(content)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read content");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Could not read content" })),
            )
        }
    }
}

/// Sanitize, validate and store a new content document
async fn save_content_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    payload: Result<Json<Value>, JsonRejection>,
) -> impl IntoResponse {
    let Ok(Json(content)) = payload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid JSON" })),
        );
    };

    let content = sanitize_content(content);
    if let Err(e) = validate_structure(&content) {
        tracing::debug!(error = %e, "Rejected content update");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid content structure" })),
        );
    }

    match state.content_store.save(content, state.clock.now()).await {
        Ok(receipt) => {
            tracing::info!(user = %principal.0.subject, "Content updated");
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "message": "Content updated successfully",
                    "timestamp": timestamp(receipt.timestamp),
                })),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to save content");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Could not save content" })),
            )
        }
    }
}

// =============================================================================
// Publish and Upload Handlers
// =============================================================================

/// Publish content through the configured publisher
async fn publish_handler(
    State(state): State<AppState>,
    payload: Result<Json<PublishBody>, JsonRejection>,
) -> impl IntoResponse {
    let body = payload.map(|Json(b)| b).unwrap_or_default();
    let request = PublishRequest::new(body.content.map(sanitize_content), body.message);

    match state.publisher.publish(request).await {
        Ok(outcome) => {
            let mut response = json!({
                "success": true,
                "message": outcome.message,
                "deployed": outcome.deployed,
            });
            if let Some(commit) = outcome.commit {
                response["commit"] = json!(commit);
            }
            (StatusCode::OK, Json(response))
        }
        Err(e) => {
            tracing::error!(error = %e, mode = %state.publisher.mode().as_str(), "Publish failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Could not publish content",
                    "details": e.to_string(),
                })),
            )
        }
    }
}

/// Store an uploaded image
async fn upload_handler(
    State(state): State<AppState>,
    payload: Result<Json<UploadBody>, JsonRejection>,
) -> impl IntoResponse {
    let body = payload.map(|Json(b)| b).unwrap_or_default();

    match state
        .uploader
        .upload(
            body.image.as_deref(),
            body.filename.as_deref(),
            body.kind.as_deref(),
            state.clock.now(),
        )
        .await
    {
        Ok(stored) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "filename": stored.filename,
                "url": stored.url,
            })),
        ),
        Err(e) => upload_error_response(e),
    }
}

fn upload_error_response(error: UploadError) -> (StatusCode, Json<Value>) {
    match error {
        UploadError::MissingField | UploadError::InvalidFormat | UploadError::TooLarge { .. } => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": error.to_string() })),
        ),
        UploadError::NotConfigured => (
            StatusCode::NOT_IMPLEMENTED,
            Json(json!({ "error": error.to_string() })),
        ),
        UploadError::Io(_) | UploadError::GitHub(_) => {
            tracing::error!(error = %error, "Image upload failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Could not upload image",
                    "details": error.to_string(),
                })),
            )
        }
    }
}

// =============================================================================
// Status Handler
// =============================================================================

/// Report server status for the signed-in user
async fn status_handler(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
) -> impl IntoResponse {
    Json(json!({
        "server": "running",
        "publish_mode": state.publisher.mode().as_str(),
        "timestamp": timestamp(state.clock.now()),
        "user": principal.0.subject,
    }))
}
