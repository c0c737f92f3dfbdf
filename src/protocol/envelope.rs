//! Multipart frame envelope
//!
//! Every published frame travels inside a `multipart/x-mixed-replace`
//! part: the boundary and content headers up to a decimal length field,
//! a fixed timestamp placeholder, a blank line, then the raw frame
//! bytes. The two template blocks are static; only the length and the
//! frame itself vary per call.

use bytes::Bytes;

/// Response block sent exactly once, on the upgrade to streaming
pub const HANDSHAKE_RESPONSE: &str = "HTTP/1.0 200 OK\r\n\
    Connection: close\r\n\
    Server: MJPG-Streamer/0.2\r\n\
    Cache-Control: no-store, no-cache, must-revalidate, pre-check=0, post-check=0, max-age=0\r\n\
    Pragma: no-cache\r\n\
    Expires: Mon, 3 Jan 2000 12:34:56 GMT\r\n\
    Content-Type: multipart/x-mixed-replace;boundary=boundarydonotcross\r\n\
    \r\n";

/// Refusal sent by the legacy reject-partial-requests mode
pub const FORBIDDEN_RESPONSE: &str = "HTTP/1.0 403 Forbidden";

/// Part header block up to the decimal length field
const PART_HEADER: &str =
    "\r\n--boundarydonotcross\r\nContent-Type: image/jpeg\r\nContent-Length: ";

/// Timestamp block between the length field and the frame bytes
const PART_TRAILER: &str = "\r\nX-Timestamp: 0000000000.000000\r\n\r\n";

/// Build the four ordered wire segments for one frame
///
/// The segments must reach the transport in order, with nothing
/// interleaved: header block, decimal byte count, timestamp block,
/// frame bytes. The frame is reference-counted, not copied.
pub fn frame_segments(frame: &Bytes) -> [Bytes; 4] {
    [
        Bytes::from_static(PART_HEADER.as_bytes()),
        Bytes::from(frame.len().to_string()),
        Bytes::from_static(PART_TRAILER.as_bytes()),
        frame.clone(),
    ]
}
