//! Protocol constants
//!
//! Fixed literals of the MJPEG-over-HTTP wire format. The boundary token
//! and the timestamp placeholder are exact byte-for-byte values; clients
//! interoperating with mjpg-streamer expect them verbatim.

/// Default port for the streaming endpoint
pub const DEFAULT_PORT: u16 = 8080;

/// Multipart boundary token separating successive frames
pub const BOUNDARY: &str = "boundarydonotcross";

/// Maximum number of streaming connections served by one publish call
pub const MAX_FRAME_RECIPIENTS: usize = 6;

/// Size of each connection's inbound read buffer
pub const READ_BUFFER_SIZE: usize = 1024;

/// A blank line ends the one-shot handshake request
pub const REQUEST_TERMINATOR: &str = "\r\n\r\n";
