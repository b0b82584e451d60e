use http::StatusCode;
use std::io;

/// Errors raised while reading a request head or framing a request body
#[derive(Debug, thiserror::Error)]
pub enum HttpProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP parsing error: {0}")]
    HttpParse(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Incomplete request")]
    IncompleteRequest,
    #[error("Request head exceeds {0} bytes or too many headers")]
    HeadersTooLarge(usize),
    #[error("Unsupported transfer encoding: {0}")]
    UnsupportedTransferEncoding(String),
    #[error("Malformed response: {0}")]
    InvalidResponse(String),
}

impl HttpProtocolError {
    /// Status to answer with before closing, if the peer should get one
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            HttpProtocolError::HttpParse(_) | HttpProtocolError::InvalidRequest(_) => {
                Some(StatusCode::BAD_REQUEST)
            }
            HttpProtocolError::HeadersTooLarge(_) => {
                Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE)
            }
            HttpProtocolError::UnsupportedTransferEncoding(_) => Some(StatusCode::NOT_IMPLEMENTED),
            HttpProtocolError::Io(_)
            | HttpProtocolError::IncompleteRequest
            | HttpProtocolError::InvalidResponse(_) => None,
        }
    }
}

/// Errors raised while reading a request body
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Body ended after {received} of {expected} bytes")]
    Truncated { expected: usize, received: usize },
    #[error("Body ended inside chunked framing")]
    TruncatedChunked,
    #[error("Body exceeds the {0} byte limit")]
    TooLarge(usize),
    #[error("Malformed chunked body: {0}")]
    MalformedChunk(String),
    #[error("Body was already read")]
    AlreadyRead,
}
