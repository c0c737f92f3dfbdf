//! Server configuration

use crate::protocol::constants::{DEFAULT_PORT, MAX_FRAME_RECIPIENTS, READ_BUFFER_SIZE};
use crate::registry::RegistryConfig;

/// Streaming server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port the listening socket binds to (0 picks an ephemeral port)
    pub port: u16,

    /// Maximum streaming connections served per published frame;
    /// connections beyond the bound are skipped for that frame
    pub max_frame_recipients: usize,

    /// Enable TCP_NODELAY on accepted connections
    pub tcp_nodelay: bool,

    /// Size of each connection's inbound read buffer
    pub read_buffer_size: usize,

    /// Answer `403 Forbidden` to request chunks that do not yet carry
    /// the blank-line terminator, as the legacy streamer did. Off by
    /// default: slow-arriving requests keep accumulating instead.
    pub reject_partial_requests: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_frame_recipients: MAX_FRAME_RECIPIENTS,
            tcp_nodelay: true,
            read_buffer_size: READ_BUFFER_SIZE,
            reject_partial_requests: false,
        }
    }
}

impl ServerConfig {
    /// Create a config bound to a specific port
    pub fn with_port(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the per-frame recipient bound
    pub fn max_frame_recipients(mut self, max: usize) -> Self {
        self.max_frame_recipients = max;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set the read buffer size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Reproduce the legacy reject-on-partial-request behavior
    pub fn reject_partial_requests(mut self, enabled: bool) -> Self {
        self.reject_partial_requests = enabled;
        self
    }

    /// Registry configuration derived from the server options
    pub(crate) fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::default()
            .read_buffer_size(self.read_buffer_size)
            .tcp_nodelay(self.tcp_nodelay)
    }
}
