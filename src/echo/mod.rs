//! The echo handler
//!
//! One stateless routine per request: capture method and target, honour the
//! `sleep` and `status` query parameters, read the body and answer with a
//! JSON [`RequestDetails`].

pub mod details;
pub mod failure;
pub mod handler;

pub use details::{RequestDetails, canonical_header_name, header_values};
pub use failure::EchoFailure;
pub use handler::{STATUS_RANGE, handle, parse_sleep, parse_status, query_param};
