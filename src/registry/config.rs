//! Registry configuration

use crate::protocol::constants::READ_BUFFER_SIZE;

/// Connection registry configuration options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Size of each connection's inbound read buffer
    pub read_buffer_size: usize,

    /// Enable TCP_NODELAY on accepted connections
    pub tcp_nodelay: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: READ_BUFFER_SIZE,
            tcp_nodelay: true, // Important for low latency
        }
    }
}

impl RegistryConfig {
    /// Set the read buffer size
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}
