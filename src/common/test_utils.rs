use crate::common::ServerConfig;
use crate::server::EchoServer;
use crate::Result;
use std::net::SocketAddr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A server running on an ephemeral loopback port, for integration tests
pub struct TestServer {
    /// Address the server is bound to
    pub addr: SocketAddr,
    /// Cancelling this token starts a graceful shutdown
    pub shutdown: CancellationToken,
    /// Resolves with the result of [`EchoServer::run`]
    pub handle: JoinHandle<Result<()>>,
}

impl TestServer {
    /// Triggers a graceful shutdown and waits for the server to stop
    pub async fn stop(self) -> Result<()> {
        self.shutdown.cancel();
        self.handle
            .await
            .map_err(|e| crate::EchoError::Config(format!("Server task failed: {e}")))?
    }
}

/// Spawns a server with default limits on `127.0.0.1:0`
pub async fn spawn_test_server() -> Result<TestServer> {
    spawn_test_server_with_config(ServerConfig::default()).await
}

/// Spawns a server with the given configuration, forcing a loopback ephemeral port
///
/// The listener is bound before this returns, so clients can connect
/// immediately without racing the server task.
pub async fn spawn_test_server_with_config(config: ServerConfig) -> Result<TestServer> {
    let config = config.with_bind_addr("127.0.0.1:0".parse().map_err(|e| {
        crate::EchoError::Config(format!("Invalid loopback address: {e}"))
    })?);

    let server = EchoServer::bind(config).await?;
    let addr = server.local_addr()?;
    let shutdown = server.shutdown_token();

    let handle = tokio::spawn(async move { server.run().await });

    Ok(TestServer {
        addr,
        shutdown,
        handle,
    })
}
