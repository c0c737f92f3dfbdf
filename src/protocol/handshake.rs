//! Handshake state machine
//!
//! The handshake is deliberately trivial: any byte stream counts as a
//! request once it contains a blank line. Method, path and headers are
//! never inspected.
//!
//! ```text
//! Client                                   Server
//!   |                                        |
//!   |------ request bytes (any) ----------->|  AwaitingRequest
//!   |------ ... \r\n\r\n ------------------>|
//!   |                                        |
//!   |<----- 200 OK + multipart headers -----|  Streaming (terminal)
//!   |<----- frame envelope -----------------|
//!   |<----- frame envelope -----------------|
//! ```
//!
//! Each connection owns its accumulator; concurrent clients never share
//! request bytes. A chunk that does not yet carry the terminator leaves
//! the state untouched and nothing is sent.

use super::constants::REQUEST_TERMINATOR;

/// Handshake phase of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakePhase {
    /// Accumulating request bytes, nothing sent yet
    AwaitingRequest,
    /// Terminator seen, response sent, frames may be delivered
    Streaming,
}

/// Per-connection handshake state
#[derive(Debug)]
pub struct HandshakeState {
    phase: HandshakePhase,
    request: String,
}

impl HandshakeState {
    /// Create a fresh state with an empty accumulator
    pub fn new() -> Self {
        Self {
            phase: HandshakePhase::AwaitingRequest,
            request: String::new(),
        }
    }

    /// Current phase
    pub fn phase(&self) -> HandshakePhase {
        self.phase
    }

    /// Whether the connection has completed its handshake
    pub fn is_streaming(&self) -> bool {
        self.phase == HandshakePhase::Streaming
    }

    /// Feed received bytes into the accumulator
    ///
    /// Bytes are decoded permissively (lossy UTF-8, embedded NULs
    /// stripped); only the line terminators matter. Returns `true` on
    /// the single transition to `Streaming`. `Streaming` is terminal:
    /// further data is discarded and never re-triggers the transition.
    pub fn advance(&mut self, data: &[u8]) -> bool {
        if self.phase == HandshakePhase::Streaming {
            return false;
        }

        self.request.push_str(&permissive_text(data));

        if self.request.contains(REQUEST_TERMINATOR) {
            self.phase = HandshakePhase::Streaming;
            self.request.clear();
            return true;
        }

        false
    }
}

impl Default for HandshakeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Lossy text decode with embedded NUL bytes stripped
fn permissive_text(data: &[u8]) -> String {
    String::from_utf8_lossy(data).replace('\0', "")
}
