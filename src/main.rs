use color_eyre::eyre::{Result, WrapErr};
use http_echo::server::shutdown_signal;
use http_echo::{EchoServer, ServerConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("http_echo=info")),
        )
        .init();

    info!("== Start App ==");

    let config = ServerConfig::default();
    let server = EchoServer::bind(config)
        .await
        .wrap_err("Failed to start HTTP echo server")?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.cancel();
    });

    if let Err(e) = server.run().await {
        error!(error = %e, "Server forced to shutdown");
        return Err::<(), _>(e).wrap_err("HTTP echo server did not shut down cleanly");
    }

    info!("== End App ==");
    Ok(())
}
