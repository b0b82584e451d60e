use crate::http::HttpProtocolError;
use std::time::Duration;
use thiserror::Error;

/// Error types for the http-echo library
#[derive(Error, Debug)]
pub enum EchoError {
    /// Socket-level errors (bind, accept, connect, read, write)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unsupported HTTP traffic
    #[error("HTTP error: {0}")]
    Http(#[from] HttpProtocolError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// In-flight requests outlived the graceful shutdown window
    #[error("Server forced to shutdown: requests still running after {0:?}")]
    ShutdownTimeout(Duration),

    /// JSON decoding errors (client side)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for the http-echo library
pub type Result<T> = std::result::Result<T, EchoError>;

pub mod common;
pub mod echo;
pub mod http;
pub mod server;

// Re-export main types for convenience
pub use common::ServerConfig;
pub use echo::{EchoFailure, RequestDetails};
pub use crate::http::{ClientResponse, HttpEchoClient};
pub use server::EchoServer;
