//! HTTP/1.1 plumbing for the echo server
//!
//! Request heads are parsed with `httparse` out of a growable buffer, bodies
//! are framed by `Content-Length` or chunked encoding, and responses are
//! encoded straight from `http::Response` values. A small client lives here
//! too, for driving the server in tests.

pub mod body;
pub mod client;
pub mod conn;
pub mod error;
pub mod request;
pub mod response;

#[cfg(test)]
mod tests;

pub use body::Body;
pub use client::{ClientResponse, HttpEchoClient};
pub use conn::Conn;
pub use error::{BodyError, HttpProtocolError};
pub use request::{BodyFraming, RequestHead, RequestTarget};
pub use response::{Outgoing, plain_text};
