//! Listener, per-connection loop and process signals

pub mod connection;
pub mod listener;
pub mod signal;


pub use connection::serve_connection;
pub use listener::EchoServer;
pub use signal::shutdown_signal;
