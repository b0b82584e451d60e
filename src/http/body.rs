use super::conn::Conn;
use super::error::BodyError;
use super::request::BodyFraming;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

/// Where the connection stands with the current request body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyState {
    /// No request in progress
    Idle,
    /// Body not touched yet
    Pending {
        framing: BodyFraming,
        expect_continue: bool,
    },
    /// Body read to its end
    Consumed,
    /// A read was attempted and failed; the stream position is unknown
    Failed,
}

/// Request body stream borrowed from its connection
///
/// Dropping a `Body` without reading it is fine: the connection drains or
/// discards the remainder once the handler returns.
pub struct Body<'a, S> {
    conn: &'a mut Conn<S>,
}

impl<'a, S> Body<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub(super) fn new(conn: &'a mut Conn<S>) -> Self {
        Self { conn }
    }

    /// Reads the whole body, sending `100 Continue` first when the client asked for it
    pub async fn read_to_end(&mut self) -> Result<Bytes, BodyError> {
        self.conn.read_body().await.map(|body| body.freeze())
    }

    /// Whether the body has been read to its end
    pub fn is_consumed(&self) -> bool {
        self.conn.body == BodyState::Consumed
    }
}

impl<S> std::fmt::Debug for Body<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Body")
            .field("state", &self.conn.body)
            .finish()
    }
}
