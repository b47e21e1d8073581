//! Relay server listener
//!
//! Binds the TCP listener, serves the router, and owns the shutdown order:
//! stop accepting, cancel every producer/viewer loop, then stop the encoder.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::server::config::RelayConfig;
use crate::server::routes::create_router;
use crate::server::state::AppState;
use crate::snapshot::spawn_snapshot_writer;
use crate::transcode::TranscodeSupervisor;

/// JPEG relay server
pub struct RelayServer {
    state: AppState,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: RelayConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }

    /// Create a server around a custom transcode supervisor
    pub fn with_supervisor(config: RelayConfig, supervisor: Arc<TranscodeSupervisor>) -> Self {
        Self {
            state: AppState::with_supervisor(config, supervisor),
        }
    }

    /// Shared handler state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Cancelling this token shuts the server down
    pub fn cancel_token(&self) -> CancellationToken {
        self.state.cancel.clone()
    }

    /// Bind the listener without serving yet
    pub async fn bind(self) -> Result<BoundServer> {
        let listener = TcpListener::bind(self.state.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        Ok(BoundServer {
            listener,
            local_addr,
            state: self.state,
        })
    }

    /// Bind and run until `shutdown` resolves
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.bind().await?.run_until(shutdown).await
    }
}

/// A server with its listener bound
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: AppState,
}

impl BoundServer {
    /// Actual bound address (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve until `shutdown` resolves or the cancel token fires
    ///
    /// The transcoder is fully stopped before this returns.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            listener,
            local_addr,
            state,
        } = self;

        tracing::info!(addr = %local_addr, "Relay listening");
        tracing::info!(
            transcode = state.config.transcode.enabled,
            hls_dir = %state.config.transcode.output_dir.display(),
            snapshot_dir = ?state.config.snapshot_dir,
            "Relay configured"
        );

        let snapshot = state.config.snapshot_dir.clone().map(|dir| {
            spawn_snapshot_writer(Arc::clone(&state.buffer), dir, state.cancel.clone())
        });

        let cancel = state.cancel.clone();
        let router = create_router(state.clone());

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = shutdown => tracing::info!("Shutdown signal received"),
                    _ = cancel.cancelled() => {}
                }
                // Ends the producer and viewer loops so connections can drain
                cancel.cancel();
            })
            .await;

        state.cancel.cancel();

        if let Some(handle) = snapshot {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Snapshot writer task failed");
            }
        }

        state.supervisor.shutdown().await;
        tracing::info!("Relay stopped");

        result.map_err(Into::into)
    }
}
