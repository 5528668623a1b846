use std::net::SocketAddr;

use tokio::signal;
use tracing::info;
use vibe_core::{Result, Settings, VibeError};

use crate::{create_router, AppState};

pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    pub fn new(settings: Settings) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
            .parse()
            .map_err(|e| VibeError::Config(format!("invalid server address: {}", e)))?;
        let state = AppState::new(settings)?;
        Ok(Self { state, addr })
    }

    pub async fn run(self) -> Result<()> {
        let router = create_router(self.state);

        info!("Starting Vibe Assistant API server on {}", self.addr);
        let listener = tokio::net::TcpListener::bind(self.addr).await?;

        info!("Server listening on http://{}", self.addr);
        info!("  GET  /api/health - Health check");
        info!("  POST /api/enhance-prompt - Prompt enhancement");
        info!("  POST /api/stream-response - Streaming enhancement");
        info!("  GET  /api/graph - Architecture graph");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(VibeError::Io)?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
