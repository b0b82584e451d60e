use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Port the server listens on when no other address is given
pub const DEFAULT_PORT: u16 = 8080;

/// Configuration for the HTTP echo server
///
/// The binary always runs with [`ServerConfig::default`]; the setters exist so
/// tests can bind to an ephemeral port and shrink the timeouts.
///
/// # Examples
///
/// ```
/// use http_echo::common::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::default()
///     .with_bind_addr("127.0.0.1:0".parse().unwrap())
///     .with_shutdown_timeout(Duration::from_millis(500));
///
/// assert_eq!(config.max_headers, 100);
/// assert_eq!(config.shutdown_timeout, Duration::from_millis(500));
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the listener to
    pub bind_addr: SocketAddr,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// Size of each socket read
    pub buffer_size: usize,
    /// Bound on every head or body read, including keep-alive idle time
    pub read_timeout: Duration,
    /// Bound on writing one response
    pub write_timeout: Duration,
    /// Grace period given to in-flight requests on shutdown
    pub shutdown_timeout: Duration,
    /// Largest accepted request head (request line plus headers)
    pub max_header_bytes: usize,
    /// Largest accepted number of request headers
    pub max_headers: usize,
    /// Largest request body the handler will read
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 1000,
            buffer_size: 8192,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(5),
            max_header_bytes: 1024 * 1024, // 1MB
            max_headers: 100,
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

impl ServerConfig {
    /// Set the listen address
    pub fn with_bind_addr(mut self, bind_addr: SocketAddr) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    /// Set the connection limit
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Set the read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the graceful shutdown window
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the request body limit
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Set the request head limit
    pub fn with_max_header_bytes(mut self, size: usize) -> Self {
        self.max_header_bytes = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listens_on_all_interfaces() {
        let config = ServerConfig::default();
        assert!(config.bind_addr.ip().is_unspecified());
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_setters() {
        let config = ServerConfig::default()
            .with_max_connections(2)
            .with_read_timeout(Duration::from_millis(250))
            .with_write_timeout(Duration::from_millis(300))
            .with_max_body_size(16)
            .with_max_header_bytes(512);

        assert_eq!(config.max_connections, 2);
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.write_timeout, Duration::from_millis(300));
        assert_eq!(config.max_body_size, 16);
        assert_eq!(config.max_header_bytes, 512);
    }
}
