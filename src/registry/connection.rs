//! Per-connection entry
//!
//! One entry per accepted socket. The identifier is assigned once at
//! accept time and never reused; lookups go through it, never through a
//! position in a list.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, Notify};

/// Handle to one accepted socket
///
/// The write half sits behind a mutex so the segments of one logical
/// message are never interleaved on the wire. The read half lives in
/// the connection's receive loop and is cancelled through `closing`.
pub(crate) struct ConnectionEntry {
    /// Stable identifier, assigned at accept time and never reused
    pub id: u64,

    /// Remote peer address captured at accept time
    pub peer_addr: SocketAddr,

    /// Write half of the socket
    pub writer: Mutex<OwnedWriteHalf>,

    /// Cancels the receive loop
    pub closing: Notify,

    /// Set once on close; gates the single disconnect event
    closed: AtomicBool,
}

impl ConnectionEntry {
    pub fn new(id: u64, peer_addr: SocketAddr, writer: OwnedWriteHalf) -> Self {
        Self {
            id,
            peer_addr,
            writer: Mutex::new(writer),
            closing: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Mark the entry closed; `true` only for the caller that won the transition
    pub fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }
}
