use super::error::HttpProtocolError;
use crate::{EchoError, Result};
use bytes::{Buf, Bytes, BytesMut};
use http::header::CONTENT_LENGTH;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// A response as seen by [`HttpEchoClient`]
#[derive(Debug, Clone)]
pub struct ClientResponse {
    /// Interim (1xx) statuses received before the final response
    pub informational: Vec<StatusCode>,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ClientResponse {
    /// Body decoded as UTF-8 (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body decoded as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// First value of a header, if it is valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Minimal HTTP/1.1 client for driving the echo server in tests
///
/// Requests go out over one keep-alive connection. Responses are framed by
/// `Content-Length`, or by connection close when it is missing.
///
/// # Examples
///
/// ```no_run
/// use http_echo::http::HttpEchoClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = HttpEchoClient::connect("127.0.0.1:8080".parse()?).await?;
///
///     let response = client.get("/foo?status=201").await?;
///     assert_eq!(response.status.as_u16(), 201);
///     Ok(())
/// }
/// ```
pub struct HttpEchoClient {
    stream: TcpStream,
    buffer: BytesMut,
    addr: SocketAddr,
    read_timeout: Duration,
}

impl HttpEchoClient {
    /// Connects to a server
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = timeout(Duration::from_secs(10), TcpStream::connect(addr))
            .await
            .map_err(|_| EchoError::Timeout("Connection timeout".to_string()))??;
        Ok(Self {
            stream,
            buffer: BytesMut::with_capacity(8192),
            addr,
            read_timeout: Duration::from_secs(30),
        })
    }

    /// Sets how long to wait for each chunk of a response
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Sends a GET request with no body
    pub async fn get(&mut self, target: &str) -> Result<ClientResponse> {
        self.request("GET", target, &[], b"").await
    }

    /// Sends a request, adding `Host` and `Content-Length`, and reads the response
    pub async fn request(
        &mut self,
        method: &str,
        target: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<ClientResponse> {
        let mut raw = format!("{method} {target} HTTP/1.1\r\nHost: {}\r\n", self.addr);
        for (name, value) in headers {
            raw.push_str(&format!("{name}: {value}\r\n"));
        }
        let framed = headers.iter().any(|(name, _)| {
            name.eq_ignore_ascii_case("content-length")
                || name.eq_ignore_ascii_case("transfer-encoding")
        });
        if !framed && (!body.is_empty() || method != "GET") {
            raw.push_str(&format!("Content-Length: {}\r\n", body.len()));
        }
        raw.push_str("\r\n");

        let mut bytes = raw.into_bytes();
        bytes.extend_from_slice(body);
        self.send_raw(&bytes).await?;
        self.read_response(method == "HEAD").await
    }

    /// Writes bytes to the connection as-is
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Closes the write half, signalling end of request data
    pub async fn finish_sending(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    /// Reads interim responses and then one final response
    pub async fn read_response(&mut self, head_request: bool) -> Result<ClientResponse> {
        let mut informational = Vec::new();
        loop {
            let (status, headers) = self.read_head().await?;
            if status.is_informational() && status != StatusCode::SWITCHING_PROTOCOLS {
                informational.push(status);
                continue;
            }

            let bodiless = head_request
                || status == StatusCode::SWITCHING_PROTOCOLS
                || status == StatusCode::NO_CONTENT
                || status == StatusCode::NOT_MODIFIED;
            let body = if bodiless {
                Bytes::new()
            } else if let Some(length) = content_length(&headers)? {
                self.read_exact(length).await?
            } else {
                self.read_to_close().await?
            };

            return Ok(ClientResponse {
                informational,
                status,
                headers,
                body,
            });
        }
    }

    async fn read_head(&mut self) -> Result<(StatusCode, HeaderMap)> {
        loop {
            if !self.buffer.is_empty() {
                let mut headers = [httparse::EMPTY_HEADER; 64];
                let mut response = httparse::Response::new(&mut headers);
                match response.parse(&self.buffer) {
                    Ok(httparse::Status::Complete(parsed_len)) => {
                        let code = response.code.ok_or_else(|| {
                            HttpProtocolError::InvalidResponse("missing status code".to_string())
                        })?;
                        let status = StatusCode::from_u16(code).map_err(|e| {
                            HttpProtocolError::InvalidResponse(format!("status {code}: {e}"))
                        })?;
                        let mut map = HeaderMap::new();
                        for header in response.headers.iter() {
                            let name = HeaderName::from_bytes(header.name.as_bytes())
                                .map_err(|e| HttpProtocolError::InvalidResponse(e.to_string()))?;
                            let value = HeaderValue::from_bytes(header.value)
                                .map_err(|e| HttpProtocolError::InvalidResponse(e.to_string()))?;
                            map.append(name, value);
                        }
                        self.buffer.advance(parsed_len);
                        return Ok((status, map));
                    }
                    Ok(httparse::Status::Partial) => {}
                    Err(e) => {
                        return Err(HttpProtocolError::InvalidResponse(e.to_string()).into());
                    }
                }
            }

            if self.fill_buf().await? == 0 {
                return Err(HttpProtocolError::InvalidResponse(
                    "connection closed before response head".to_string(),
                )
                .into());
            }
        }
    }

    async fn read_exact(&mut self, length: usize) -> Result<Bytes> {
        while self.buffer.len() < length {
            if self.fill_buf().await? == 0 {
                return Err(HttpProtocolError::InvalidResponse(format!(
                    "body ended after {} of {length} bytes",
                    self.buffer.len()
                ))
                .into());
            }
        }
        Ok(self.buffer.split_to(length).freeze())
    }

    async fn read_to_close(&mut self) -> Result<Bytes> {
        while self.fill_buf().await? > 0 {}
        Ok(self.buffer.split().freeze())
    }

    async fn fill_buf(&mut self) -> Result<usize> {
        self.buffer.reserve(4096);
        timeout(self.read_timeout, self.stream.read_buf(&mut self.buffer))
            .await
            .map_err(|_| EchoError::Timeout("Read timeout".to_string()))?
            .map_err(EchoError::from)
    }
}

fn content_length(headers: &HeaderMap) -> Result<Option<usize>> {
    headers
        .get(CONTENT_LENGTH)
        .map(|value| {
            value
                .to_str()
                .ok()
                .and_then(|value| value.trim().parse::<usize>().ok())
                .ok_or_else(|| {
                    EchoError::from(HttpProtocolError::InvalidResponse(
                        "bad Content-Length".to_string(),
                    ))
                })
        })
        .transpose()
}
