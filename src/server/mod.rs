//! MJPEG streaming server
//!
//! The public face of the crate: configuration, the streaming server
//! itself, and log sink registration for embedding applications.

pub mod config;
pub mod sink;
pub mod stream;

pub use config::ServerConfig;
pub use sink::LogSink;
pub use stream::MjpegServer;
