//! HTTP server components for site-cms
//!
//! This module provides the HTTP server infrastructure including:
//! - Router configuration and route handlers
//! - Authentication and logging middleware
//! - Server lifecycle management

pub mod middleware;
pub mod router;

pub use middleware::{auth_middleware, client_address, AuthResponse, AuthenticatedPrincipal};
pub use router::{build_router, AppState};

use std::future::Future;
use std::net::{IpAddr, SocketAddr};

use tokio::net::TcpListener;

use crate::config::ServerConfig;

/// HTTP Server for site-cms
///
/// Manages the axum server lifecycle, including:
/// - Binding to configured address
/// - Applying middleware layers
/// - Graceful shutdown handling
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server instance
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> Result<SocketAddr, ServerError> {
        let host: IpAddr = self
            .config
            .host
            .parse()
            .map_err(|_| ServerError::Config(format!("invalid host: {}", self.config.host)))?;
        Ok(SocketAddr::new(host, self.config.port))
    }

    /// Run the server until shutdown signal is received
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Future that resolves when the server should shut down
    ///
    /// # Returns
    ///
    /// Ok(()) if server shuts down gracefully, Err if there was an error
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = self.bind_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(e.to_string()))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let app = build_router(self.state);

        // Apply middleware layers
        let app = app
            .layer(tower_http::trace::TraceLayer::new_for_http())
            .layer(tower_http::compression::CompressionLayer::new());

        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(e.to_string()))?;
        tracing::info!("Server listening on {}", addr);

        // Peer addresses key the login rate limiter.
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to address
    #[error("Failed to bind to address: {0}")]
    Bind(String),

    /// Failed to serve requests
    #[error("Server error: {0}")]
    Serve(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthConfig, AuthManager, SystemClock};
    use crate::content::MockContentStore;
    use crate::publish::DisabledPublisher;
    use crate::upload::{ImageUploader, LocalImageSink};
    use std::sync::Arc;
    use std::time::Duration;

    fn create_test_state() -> AppState {
        AppState {
            auth_manager: Arc::new(AuthManager::new(AuthConfig::new(
                "admin",
                "hunter2",
                b"server-test-secret".to_vec(),
            ))),
            clock: Arc::new(SystemClock),
            content_store: Arc::new(MockContentStore::new()),
            publisher: Arc::new(DisabledPublisher),
            uploader: Arc::new(ImageUploader::new(
                Arc::new(LocalImageSink::new("uploads", "uploads")),
                1024,
            )),
            trust_forwarded_for: false,
            body_limit: 1024 * 1024,
        }
    }

    // Test 1: Server can be created with config
    #[test]
    fn test_server_new() {
        let config = ServerConfig::default();
        let state = create_test_state();
        let server = Server::new(config, state);
        assert_eq!(server.bind_addr().unwrap().port(), 3000);
    }

    // Test 2: Server bind address calculation
    #[test]
    fn test_server_bind_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 9090,
            ..Default::default()
        };
        let state = create_test_state();
        let server = Server::new(config, state);
        assert_eq!(server.bind_addr().unwrap().to_string(), "127.0.0.1:9090");
    }

    // Test 3: Invalid host is a configuration error
    #[test]
    fn test_server_bind_addr_invalid_host() {
        let config = ServerConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        let server = Server::new(config, create_test_state());

        assert!(matches!(server.bind_addr(), Err(ServerError::Config(_))));
    }

    // Test 4: Server graceful shutdown
    #[tokio::test]
    async fn test_server_graceful_shutdown() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign a port
            ..Default::default()
        };
        let state = create_test_state();
        let server = Server::new(config, state);

        // Create a shutdown signal that triggers shortly
        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
        };

        // Start server in background
        let handle = tokio::spawn(async move { server.run(shutdown).await });

        // Wait for the server to complete
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }

    // Test 5: Served router sees the peer address and answers requests
    #[tokio::test]
    async fn test_server_serves_health() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::new(ServerConfig::default(), create_test_state());
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            server
                .serve(listener, async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let response = reqwest::get(format!("http://{}/api/health", addr))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let _ = shutdown_tx.send(());
        assert!(handle.await.unwrap().is_ok());
    }

    // Test 6: ServerError display messages
    #[test]
    fn test_server_error_display() {
        let bind_err = ServerError::Bind("address in use".to_string());
        assert_eq!(
            bind_err.to_string(),
            "Failed to bind to address: address in use"
        );

        let serve_err = ServerError::Serve("connection reset".to_string());
        assert_eq!(serve_err.to_string(), "Server error: connection reset");

        let config_err = ServerError::Config("missing field".to_string());
        assert_eq!(config_err.to_string(), "Configuration error: missing field");
    }
}
