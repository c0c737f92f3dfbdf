//! MJPEG-over-HTTP wire protocol
//!
//! The protocol recognizes exactly one request shape (any byte stream
//! terminated by a blank line) and one response shape (a
//! `multipart/x-mixed-replace` streaming body). This module holds the
//! fixed literals, the per-connection handshake state machine, and the
//! frame envelope builder. Everything here is a synchronous
//! transformation over bytes; no I/O.

pub mod constants;
pub mod envelope;
pub mod handshake;

pub use envelope::{frame_segments, FORBIDDEN_RESPONSE, HANDSHAKE_RESPONSE};
pub use handshake::{HandshakePhase, HandshakeState};
