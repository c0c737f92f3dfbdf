//! Server statistics

use std::time::Duration;

/// Server-wide statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Total connections ever accepted
    pub total_connections: u64,
    /// Currently live connections
    pub active_connections: u64,
    /// Frames published
    pub frames_published: u64,
    /// Streaming connections skipped by the per-frame fan-out bound
    pub recipients_skipped: u64,
    /// Total payload bytes sent
    pub bytes_sent: u64,
    /// Time since the server started
    pub uptime: Duration,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_stats_new() {
        let stats = ServerStats::new();

        assert_eq!(stats.total_connections, 0);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.frames_published, 0);
        assert_eq!(stats.recipients_skipped, 0);
        assert_eq!(stats.bytes_sent, 0);
        assert_eq!(stats.uptime, Duration::ZERO);
    }
}
