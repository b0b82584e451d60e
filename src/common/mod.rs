//! Configuration and test helpers shared across the http-echo library

pub mod config;
pub mod test_utils;

pub use config::{DEFAULT_PORT, ServerConfig};
pub use test_utils::{TestServer, spawn_test_server, spawn_test_server_with_config};
