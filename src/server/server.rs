//! Server instance management

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

use crate::config::TchallerConfig;
use crate::server::error::ApiError;
use crate::server::handlers::{build_app, AppState};
use crate::storage::PlaceStore;

/// Tchaller HTTP server
///
/// Manages the axum server lifecycle: startup, request serving and
/// graceful shutdown on Ctrl+C or SIGTERM.
pub struct TchallerServer {
    /// Full configuration; the engine is wired from its ranking and response sections
    config: TchallerConfig,

    /// Place store shared with the handlers
    store: Arc<PlaceStore>,
}

impl TchallerServer {
    /// Create new server instance
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    ///
    /// # Returns
    ///
    /// `Result<TchallerServer, ApiError>` - Server or error
    pub fn new(config: TchallerConfig) -> Result<Self, ApiError> {
        if let Err(e) = config.validate() {
            return Err(ApiError::internal(format!("Invalid config: {}", e)));
        }

        let store = PlaceStore::from_config(config.storage.clone()).map_err(|e| {
            error!("Failed to open storage: {}", e);
            ApiError::internal(format!("Failed to open storage: {}", e))
        })?;

        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Create a server over an already opened store
    pub fn with_store(config: TchallerConfig, store: Arc<PlaceStore>) -> Self {
        Self { config, store }
    }

    /// Get socket address for binding
    pub fn socket_addr(&self) -> Result<SocketAddr, ApiError> {
        self.config
            .server
            .socket_addr()
            .map_err(|e| ApiError::internal(format!("Failed to parse address: {}", e)))
    }

    /// Start server and serve until a shutdown signal arrives
    pub async fn start(&self) -> Result<(), ApiError> {
        let addr = self.socket_addr()?;
        let state = AppState::new_from_arc(Arc::clone(&self.store), self.config.clone());
        let app = build_app(state);

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind to {}: {:?}", addr, e);
            ApiError::internal(format!("Failed to bind to {}: {}", addr, e))
        })?;

        info!("Server listening on: {}", self.server_url());

        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_shutdown())
            .await
            .map_err(|e| ApiError::internal(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get store reference
    #[must_use]
    pub fn store(&self) -> Arc<PlaceStore> {
        Arc::clone(&self.store)
    }

    /// Get server URL
    #[must_use]
    pub fn server_url(&self) -> String {
        self.config.server.server_url()
    }
}

/// Wait for Ctrl+C or SIGTERM
pub async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix;
        match unix::signal(unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received TERM signal");
            }
            Err(e) => {
                error!("Failed to install TERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> TchallerConfig {
        let mut config = TchallerConfig::default();
        config.storage.db_path = dir.path().join("tchaller.db").to_string_lossy().into_owned();
        config
    }

    #[test]
    fn test_server_opens_configured_store() {
        let dir = TempDir::new().unwrap();
        let server = TchallerServer::new(config_in(&dir)).unwrap();

        assert_eq!(server.store().count_places().unwrap(), 0);
        assert_eq!(server.server_url(), "http://127.0.0.1:8000");
        assert_eq!(server.socket_addr().unwrap().port(), 8000);
        assert!(dir.path().join("tchaller.db").exists());
    }

    #[test]
    fn test_server_rejects_invalid_config() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.server.port = 0;

        assert!(TchallerServer::new(config).is_err());
    }
}
