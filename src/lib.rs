//! MJPEG-over-HTTP streaming server
//!
//! A minimal single-endpoint streaming server: it accepts TCP
//! connections, performs a one-shot HTTP-like handshake (any request
//! terminated by a blank line), and then pushes encoded JPEG frames to
//! every handshaken client as a `multipart/x-mixed-replace` byte
//! stream — the format browsers and players know as MJPEG-over-HTTP.
//!
//! The crate does not capture or encode images. The capture side hands
//! in ready-made frames as opaque bytes through
//! [`MjpegServer::publish_frame`]; each call fans the frame out to a
//! bounded set of streaming connections.
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use mjpeg_rs::{MjpegServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> mjpeg_rs::Result<()> {
//!     let server = MjpegServer::new(ServerConfig::default().port(8080));
//!     server.start().await?;
//!
//!     // The capture subsystem hands in encoded frames on its own cadence:
//!     let frame = Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]);
//!     server.publish_frame(frame).await;
//!
//!     server.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod stats;

pub use error::{Error, Result};
pub use registry::{ConnectionRegistry, RegistryConfig, RegistryError, RegistryEvent};
pub use server::{LogSink, MjpegServer, ServerConfig};
pub use stats::ServerStats;
