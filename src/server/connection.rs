use crate::common::ServerConfig;
use crate::echo::{self, EchoFailure};
use crate::http::{Conn, HttpProtocolError, Outgoing, plain_text};
use http::{Method, Version};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Serves requests on one connection until the peer leaves, an error forces a
/// close, or shutdown is requested while the connection is idle.
pub async fn serve_connection<S>(
    stream: S,
    addr: SocketAddr,
    config: ServerConfig,
    shutdown: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let mut conn = Conn::new(stream, &config);

    loop {
        let head = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!(%addr, "Closing idle connection for shutdown");
                break;
            }
            head = conn.read_head() => head,
        };

        let head = match head {
            Ok(Some(head)) => head,
            Ok(None) => {
                debug!(%addr, "Client closed connection");
                break;
            }
            Err(e) => {
                reject(&mut conn, addr, e).await;
                break;
            }
        };

        let keep_alive = head.keep_alive();
        let head_request = head.method == Method::HEAD;
        let request_version = head.version;

        let framing = match head.framing() {
            Ok(framing) => framing,
            Err(e) => {
                reject(&mut conn, addr, e).await;
                break;
            }
        };

        let response = echo::handle(conn.begin_request(head, framing)).await;
        let body_released = conn.release_body().await;

        let outgoing = Outgoing {
            response,
            request_version,
            head_request,
            close: !keep_alive || !body_released || shutdown.is_cancelled(),
        };

        match conn.write_response(outgoing).await {
            Ok(false) => continue,
            Ok(true) => break,
            Err(e) => {
                error!(%addr, error = %e, "Error writing JSON response");
                let failure = Outgoing {
                    response: EchoFailure::WriteResponse.into_response(),
                    request_version,
                    head_request,
                    close: true,
                };
                if let Err(e) = conn.write_response(failure).await {
                    debug!(%addr, error = %e, "Could not report write failure to client");
                }
                break;
            }
        }
    }

    if let Err(e) = conn.shutdown().await {
        debug!(%addr, error = %e, "Error closing connection");
    }
}

/// Answers a malformed request with its status, if it has one, and gives up on the connection
async fn reject<S>(conn: &mut Conn<S>, addr: SocketAddr, err: HttpProtocolError)
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    let Some(status) = err.status_code() else {
        match err {
            HttpProtocolError::IncompleteRequest => {
                debug!(%addr, "Client closed connection mid-request")
            }
            HttpProtocolError::Io(e) => debug!(%addr, error = %e, "Closing connection"),
            other => info!(%addr, error = %other, "Dropping connection"),
        }
        return;
    };

    warn!(%addr, %status, error = %err, "Rejecting malformed request");
    let outgoing = Outgoing {
        response: plain_text(status, status.canonical_reason().unwrap_or("Bad Request")),
        request_version: Version::HTTP_11,
        head_request: false,
        close: true,
    };
    if let Err(e) = conn.write_response(outgoing).await {
        debug!(%addr, error = %e, "Could not send rejection");
    }
}
