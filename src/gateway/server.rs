//! HTTP server hosting the queue API next to health and metrics routes

use anyhow::{Context, Result};
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Port to bind to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Serves a router until told to stop
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
    shutdown_tx: broadcast::Sender<()>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, router: Router) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            router,
            shutdown_tx,
        }
    }

    pub fn address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid HTTP listen address")
    }

    /// Bind and serve until `stop` is called
    pub async fn start(&self) -> Result<()> {
        let addr = self.address()?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind HTTP listener on {}", addr))?;

        info!("HTTP server listening on http://{}", addr);
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, self.router.clone())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP server shutdown signal received");
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }

    /// Ask a running server to finish in-flight requests and stop
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping HTTP server...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to HTTP server: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_address_parsing() {
        let server = HttpServer::new(HttpServerConfig::default(), Router::new());
        assert_eq!(server.address().unwrap().port(), 8080);

        let bad = HttpServer::new(
            HttpServerConfig {
                port: 80,
                host: "not a host".to_string(),
            },
            Router::new(),
        );
        assert!(bad.address().is_err());
    }

    #[tokio::test]
    async fn test_serve_stops_on_signal() {
        let server = Arc::new(HttpServer::new(HttpServerConfig::default(), Router::new()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

        let running = server.clone();
        let task = tokio::spawn(async move { running.serve(listener).await });

        // Give the server a moment to subscribe
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        server.stop().await.unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
