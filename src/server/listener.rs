use super::connection::serve_connection;
use crate::common::ServerConfig;
use crate::{EchoError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, warn};

/// HTTP echo server: one catch-all route, one task per connection
///
/// # Examples
///
/// ```no_run
/// use http_echo::{EchoServer, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = EchoServer::bind(ServerConfig::default()).await?;
///     let shutdown = server.shutdown_token();
///
///     tokio::spawn(async move {
///         http_echo::server::shutdown_signal().await;
///         shutdown.cancel();
///     });
///
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct EchoServer {
    listener: TcpListener,
    config: ServerConfig,
    shutdown: CancellationToken,
}

impl EchoServer {
    /// Binds the listening socket; nothing is accepted until [`EchoServer::run`]
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await.map_err(|e| {
            EchoError::Config(format!("Could not listen on {}: {e}", config.bind_addr))
        })?;

        Ok(Self {
            listener,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    /// Address the listener is actually bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Token that starts a graceful shutdown when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accepts connections until shutdown is requested, then gives in-flight
    /// requests `shutdown_timeout` to finish.
    ///
    /// Returns [`EchoError::ShutdownTimeout`] if they do not.
    pub async fn run(self) -> Result<()> {
        let Self {
            listener,
            config,
            shutdown,
        } = self;

        info!(address = %listener.local_addr()?, "Server is ready to handle requests");

        let tracker = TaskTracker::new();
        let connection_count = Arc::new(AtomicUsize::new(0));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Server is shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let current_count = connection_count.load(Ordering::SeqCst);
                            if current_count >= config.max_connections {
                                warn!(%addr, current = current_count, limit = config.max_connections, "Connection rejected: limit reached");
                                continue;
                            }

                            if let Err(e) = stream.set_nodelay(true) {
                                debug!(%addr, error = %e, "Failed to set TCP_NODELAY");
                            }

                            let new_count = connection_count.fetch_add(1, Ordering::SeqCst) + 1;
                            debug!(%addr, current = new_count, "Accepted connection");

                            let config = config.clone();
                            let shutdown = shutdown.clone();
                            let connection_count = connection_count.clone();
                            let span = tracing::info_span!("connection", %addr);

                            tracker.spawn(async move {
                                serve_connection(stream, addr, config, shutdown)
                                    .instrument(span)
                                    .await;
                                let final_count = connection_count.fetch_sub(1, Ordering::SeqCst) - 1;
                                debug!(%addr, current = final_count, "Connection closed");
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        drop(listener);
        tracker.close();

        let in_flight = connection_count.load(Ordering::SeqCst);
        if in_flight > 0 {
            info!(connections = in_flight, timeout = ?config.shutdown_timeout, "Waiting for in-flight requests");
        }

        match timeout(config.shutdown_timeout, tracker.wait()).await {
            Ok(()) => {
                info!("Server exiting");
                Ok(())
            }
            Err(_) => Err(EchoError::ShutdownTimeout(config.shutdown_timeout)),
        }
    }
}
