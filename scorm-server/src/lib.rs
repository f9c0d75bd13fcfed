//! scorm-server - HTTP and WebSocket server for the SCORM runtime
//!
//! This crate serves the runtime channel SCORM content talks to, the HTTP
//! fallback for clients that cannot hold a socket, and the admin routes that
//! trigger grade reporting. Compaction and completion handling run as
//! background services next to the router.

mod error;
pub mod http;
pub mod middleware;
mod services;
mod state;
pub mod ws;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub use error::ServerError;
pub use http::create_router;
pub use middleware::{AuthLayer, SESSION_COOKIE, auth_middleware};
pub use state::{AppState, Collaborators};

/// The SCORM runtime server
pub struct ScormServer {
    config: ServerConfig,
    state: Arc<AppState>,
    auth: AuthLayer,
    shutdown: CancellationToken,
}

impl ScormServer {
    /// Create a server over the given state with authentication disabled
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self {
            config,
            state,
            auth: AuthLayer::disabled(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Create a server over an in-memory store (for testing)
    pub fn for_testing(config: ServerConfig) -> Result<Self, ServerError> {
        Ok(Self::new(config, Arc::new(AppState::new_for_testing()?)))
    }

    /// Resolve sessions with the given layer
    #[must_use]
    pub fn with_auth(mut self, auth: AuthLayer) -> Self {
        self.auth = auth;
        self
    }

    /// Stop serving and stop background services when `token` is cancelled
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get the shared application state
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Run the server, binding to the configured address
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.config.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                source: e,
            })?;

        tracing::info!("scorm server listening on {}", addr);
        self.run_with_listener(listener).await
    }

    /// Run the server on an already bound listener
    pub async fn run_with_listener(self, listener: TcpListener) -> Result<(), ServerError> {
        let services = self.shutdown.child_token();
        self.start_services(services.clone());

        let router = create_router(self.state, self.auth);
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(self.shutdown.cancelled_owned())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));

        services.cancel();
        result
    }

    /// Start the compaction schedule and the completion watcher
    fn start_services(&self, shutdown: CancellationToken) {
        services::spawn_compaction(&self.state, shutdown.clone());
        services::spawn_completion_watcher((*self.state).clone(), shutdown);
        tracing::info!("Background services started");
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7433,
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig with the specified host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Returns the socket address string (e.g., "0.0.0.0:7433")
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 7433);
    }

    #[test]
    fn test_server_config_addr() {
        let config = ServerConfig::new("127.0.0.1", 8080);
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_scorm_server_for_testing() {
        let config = ServerConfig::new("127.0.0.1", 9000);
        let server = ScormServer::for_testing(config).unwrap();
        assert_eq!(server.config().port, 9000);
        assert_eq!(server.state().open_connections(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_server_returns() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let shutdown = CancellationToken::new();
        let server = ScormServer::for_testing(ServerConfig::default())
            .unwrap()
            .with_shutdown(shutdown.clone());

        let handle = tokio::spawn(server.run_with_listener(listener));
        shutdown.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("server should stop after cancellation")
            .unwrap()
            .unwrap();
    }
}
