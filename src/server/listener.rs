//! TCP accept loop
//!
//! Every accepted socket is wrapped in a `TcpChannel` and handed to the lobby
//! as a worker pool task. If the pool is saturated the client is told the
//! server is busy and the socket is closed.

use crate::channel::{PlayerChannel, TcpChannel};
use crate::lobby::{Lobby, SERVER_BUSY};
use crate::metrics::MetricsCollector;
use crate::worker::WorkerPool;
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Pause after a failed accept, e.g. when out of file descriptors
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts game connections
pub struct GameListener {
    listener: TcpListener,
    lobby: Lobby,
    pool: WorkerPool,
    metrics_collector: Arc<MetricsCollector>,
}

impl GameListener {
    /// Bind the listening socket
    pub async fn bind(
        addr: &str,
        lobby: Lobby,
        pool: WorkerPool,
        metrics_collector: Arc<MetricsCollector>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind game listener to {}", addr))?;

        Ok(Self {
            listener,
            lobby,
            pool,
            metrics_collector,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) {
        match self.listener.local_addr() {
            Ok(addr) => info!("Game listener accepting connections on {}", addr),
            Err(e) => warn!("Game listener started without a local address: {}", e),
        }

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.dispatch(stream, peer).await,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Game listener stopped");
    }

    async fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        info!("Connection accepted - peer: {}", peer);
        let channel: Arc<dyn PlayerChannel> = Arc::new(TcpChannel::new(stream, peer));

        let lobby = self.lobby.clone();
        let task_channel = channel.clone();
        let submitted = self
            .pool
            .submit(&format!("connection:{}", peer), async move {
                lobby.handle_connection(task_channel).await
            });

        match submitted {
            Ok(_handle) => debug!("Connection task for {} scheduled", peer),
            Err(e) => {
                warn!("Turning away {}: {}", peer, e);
                self.metrics_collector.record_pool_rejection("listener");
                if let Err(e) = channel.send(SERVER_BUSY).await {
                    debug!("Could not send busy notice to {}: {}", peer, e);
                }
                channel.close().await;
            }
        }
    }
}
