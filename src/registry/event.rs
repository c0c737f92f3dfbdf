//! Registry lifecycle events
//!
//! The registry reports everything that happens on the wire through one
//! typed event mailbox: the receiver returned by
//! [`ConnectionRegistry::new`](super::ConnectionRegistry::new). The
//! streaming server consumes it to drive handshakes; embedding
//! applications can fan lines out further from there.

use std::net::SocketAddr;
use std::path::PathBuf;

use bytes::Bytes;

use super::error::RegistryError;

/// Lifecycle event emitted by the connection registry
///
/// Cheap to clone: received data is reference-counted `Bytes`.
#[derive(Debug, Clone)]
pub enum RegistryEvent {
    /// The listening socket is bound and accepting
    Listening { port: u16 },

    /// A connection was accepted and registered
    Connected {
        id: u64,
        peer_addr: SocketAddr,
        /// Live connection count after the insert
        active: usize,
    },

    /// A connection was closed and removed; emitted exactly once per connection
    Disconnected {
        id: u64,
        /// Live connection count after the removal
        active: usize,
    },

    /// Bytes arrived on a connection
    DataReceived { id: u64, data: Bytes },

    /// A send was accepted by the transport in full
    DataSent { id: u64, bytes: usize },

    /// A scheduled file transfer completed
    FileSent { id: u64, path: PathBuf },

    /// A non-fatal fault, tied to one connection when the fault had one
    Error {
        id: Option<u64>,
        error: RegistryError,
    },
}
