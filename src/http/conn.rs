use super::body::{Body, BodyState};
use super::error::{BodyError, HttpProtocolError};
use super::request::{BodyFraming, RequestHead};
use super::response::{self, Outgoing};
use crate::common::ServerConfig;
use bytes::{Buf, BytesMut};
use http::{Request, StatusCode};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

/// Unread request bodies up to this size are drained to keep the connection
const DRAIN_LIMIT: usize = 256 * 1024;

/// Longest chunk-size line (size, extensions and CRLF) or trailer line accepted
const MAX_CHUNK_LINE: usize = 4096;

/// One server-side HTTP/1.1 connection: a stream plus its read buffer
///
/// The connection owns the framing state of the current request body.
/// Handlers only borrow it through [`Body`], and [`Conn::release_body`]
/// settles whatever they left behind.
pub struct Conn<S> {
    stream: S,
    buffer: BytesMut,
    pub(super) body: BodyState,
    read_size: usize,
    read_timeout: Duration,
    write_timeout: Duration,
    max_header_bytes: usize,
    max_headers: usize,
    max_body_size: usize,
}

impl<S> Conn<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, config: &ServerConfig) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(config.buffer_size),
            body: BodyState::Idle,
            read_size: config.buffer_size.max(1),
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
            max_header_bytes: config.max_header_bytes,
            max_headers: config.max_headers,
            max_body_size: config.max_body_size,
        }
    }

    /// Reads the next request head; `None` means the peer closed between requests
    pub async fn read_head(&mut self) -> Result<Option<RequestHead>, HttpProtocolError> {
        loop {
            if !self.buffer.is_empty() {
                let mut headers = vec![httparse::EMPTY_HEADER; self.max_headers];
                let mut req = httparse::Request::new(&mut headers);
                match req.parse(&self.buffer) {
                    Ok(httparse::Status::Complete(parsed_len)) => {
                        if parsed_len > self.max_header_bytes {
                            return Err(HttpProtocolError::HeadersTooLarge(self.max_header_bytes));
                        }
                        let head = RequestHead::from_parsed(&req)?;
                        self.buffer.advance(parsed_len);
                        return Ok(Some(head));
                    }
                    Ok(httparse::Status::Partial) => {}
                    Err(httparse::Error::TooManyHeaders) => {
                        return Err(HttpProtocolError::HeadersTooLarge(self.max_header_bytes));
                    }
                    Err(e) => {
                        return Err(HttpProtocolError::HttpParse(format!(
                            "Failed to parse headers: {e}"
                        )));
                    }
                }
            }

            if self.buffer.len() >= self.max_header_bytes {
                return Err(HttpProtocolError::HeadersTooLarge(self.max_header_bytes));
            }

            if self.fill_buf().await? == 0 {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(HttpProtocolError::IncompleteRequest)
                };
            }
        }
    }

    /// Binds the body of `head`, framed as `framing`, to this connection and
    /// hands out the request
    pub fn begin_request(
        &mut self,
        head: RequestHead,
        framing: BodyFraming,
    ) -> Request<Body<'_, S>> {
        self.body = BodyState::Pending {
            framing,
            expect_continue: head.expects_continue() && framing != BodyFraming::Empty,
        };

        let RequestHead {
            method,
            target,
            uri,
            version,
            headers,
        } = head;
        let mut request = Request::new(Body::new(self));
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.version_mut() = version;
        *request.headers_mut() = headers;
        request.extensions_mut().insert(target);
        request
    }

    /// Settles the current body after the handler is done with it.
    ///
    /// Returns `false` when the connection can no longer carry another
    /// request: the read failed, the client is still waiting for
    /// `100 Continue`, or the leftover is too large to drain.
    pub async fn release_body(&mut self) -> bool {
        match std::mem::replace(&mut self.body, BodyState::Idle) {
            BodyState::Idle | BodyState::Consumed => true,
            BodyState::Failed => false,
            BodyState::Pending {
                expect_continue: true,
                ..
            } => false,
            BodyState::Pending { framing, .. } => {
                match self.read_framed_body(framing, DRAIN_LIMIT).await {
                    Ok(drained) => {
                        tracing::debug!(size = drained.len(), "Drained unread request body");
                        true
                    }
                    Err(e) => {
                        tracing::debug!(error = %e, "Could not drain request body");
                        false
                    }
                }
            }
        }
    }

    /// Reads the pending body to its end, honouring `Expect: 100-continue`
    pub(super) async fn read_body(&mut self) -> Result<BytesMut, BodyError> {
        let (framing, expect_continue) = match self.body {
            BodyState::Pending {
                framing,
                expect_continue,
            } => (framing, expect_continue),
            BodyState::Idle | BodyState::Consumed | BodyState::Failed => {
                return Err(BodyError::AlreadyRead);
            }
        };

        self.body = BodyState::Failed;
        if expect_continue {
            let mut interim = BytesMut::new();
            response::encode_interim(StatusCode::CONTINUE, &mut interim);
            self.write_all(&interim).await?;
        }

        let body = self.read_framed_body(framing, self.max_body_size).await?;
        self.body = BodyState::Consumed;
        Ok(body)
    }

    /// Encodes and writes a response, returning whether the connection must close
    pub async fn write_response(&mut self, outgoing: Outgoing) -> io::Result<bool> {
        let mut dst = BytesMut::new();
        let close = response::encode(outgoing, &mut dst);
        self.write_all(&dst).await?;
        Ok(close)
    }

    /// Best-effort close of the write half
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }

    async fn read_framed_body(
        &mut self,
        framing: BodyFraming,
        limit: usize,
    ) -> Result<BytesMut, BodyError> {
        match framing {
            BodyFraming::Empty => Ok(BytesMut::new()),
            BodyFraming::Length(length) => {
                let length = usize::try_from(length)
                    .ok()
                    .filter(|length| *length <= limit)
                    .ok_or(BodyError::TooLarge(limit))?;
                let mut body = BytesMut::with_capacity(length);
                self.read_exact_into(length, &mut body).await?;
                Ok(body)
            }
            BodyFraming::Chunked => self.read_chunked(limit).await,
        }
    }

    async fn read_chunked(&mut self, limit: usize) -> Result<BytesMut, BodyError> {
        let mut body = BytesMut::new();
        loop {
            let size = self.read_chunk_size().await?;
            if size == 0 {
                break;
            }

            let size = usize::try_from(size)
                .ok()
                .filter(|size| body.len().saturating_add(*size) <= limit)
                .ok_or(BodyError::TooLarge(limit))?;
            self.read_exact_into(size, &mut body)
                .await
                .map_err(|e| match e {
                    BodyError::Truncated { .. } => BodyError::TruncatedChunked,
                    other => other,
                })?;

            let line = self.read_line().await?;
            if !line.is_empty() {
                return Err(BodyError::MalformedChunk(
                    "chunk data not followed by CRLF".to_string(),
                ));
            }
        }

        // Trailers are read and dropped
        while !self.read_line().await?.is_empty() {}
        Ok(body)
    }

    async fn read_chunk_size(&mut self) -> Result<u64, BodyError> {
        loop {
            match httparse::parse_chunk_size(&self.buffer) {
                Ok(httparse::Status::Complete((consumed, size))) => {
                    self.buffer.advance(consumed);
                    return Ok(size);
                }
                Ok(httparse::Status::Partial) => {
                    if self.buffer.len() > MAX_CHUNK_LINE {
                        return Err(BodyError::MalformedChunk(
                            "chunk size line too long".to_string(),
                        ));
                    }
                    if self.fill_buf().await? == 0 {
                        return Err(BodyError::TruncatedChunked);
                    }
                }
                Err(_) => {
                    return Err(BodyError::MalformedChunk("invalid chunk size".to_string()));
                }
            }
        }
    }

    /// Reads one line and strips its terminator (CRLF or bare LF)
    async fn read_line(&mut self) -> Result<BytesMut, BodyError> {
        loop {
            if let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
                let mut line = self.buffer.split_to(end + 1);
                line.truncate(end);
                if line.last() == Some(&b'\r') {
                    line.truncate(end - 1);
                }
                return Ok(line);
            }
            if self.buffer.len() > MAX_CHUNK_LINE {
                return Err(BodyError::MalformedChunk("line too long".to_string()));
            }
            if self.fill_buf().await? == 0 {
                return Err(BodyError::TruncatedChunked);
            }
        }
    }

    async fn read_exact_into(&mut self, length: usize, out: &mut BytesMut) -> Result<(), BodyError> {
        let mut remaining = length;
        while remaining > 0 {
            if self.buffer.is_empty() && self.fill_buf().await? == 0 {
                return Err(BodyError::Truncated {
                    expected: length,
                    received: length - remaining,
                });
            }
            let take = remaining.min(self.buffer.len());
            out.extend_from_slice(&self.buffer.split_to(take));
            remaining -= take;
        }
        Ok(())
    }

    async fn fill_buf(&mut self) -> io::Result<usize> {
        self.buffer.reserve(self.read_size);
        match timeout(self.read_timeout, self.stream.read_buf(&mut self.buffer)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out")),
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let write = async {
            self.stream.write_all(data).await?;
            self.stream.flush().await
        };
        match timeout(self.write_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
        }
    }
}
