//! File-replay MJPEG streaming demo
//!
//! Replays the JPEG files in a directory as a live MJPEG stream, taking
//! the place of a real capture device:
//!
//!   cargo run --example file_streamer [DIR] [PORT] [FPS]
//!
//! Examples:
//!   cargo run --example file_streamer pics            # port 8080, 10 fps
//!   cargo run --example file_streamer pics 8090 2
//!
//! Watch the stream with a browser at http://localhost:8080/, or:
//!   ffplay http://localhost:8080/
//!   vlc http://localhost:8080/

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing_subscriber::EnvFilter;

use mjpeg_rs::{MjpegServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let dir = args.next().unwrap_or_else(|| "pics".to_string());
    let port: u16 = args.next().as_deref().unwrap_or("8080").parse()?;
    let fps: u64 = args.next().as_deref().unwrap_or("10").parse()?;

    let mut frames = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        let is_jpeg = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("jpg") || ext.eq_ignore_ascii_case("jpeg"))
            .unwrap_or(false);
        if is_jpeg {
            frames.push(Bytes::from(std::fs::read(&path)?));
        }
    }
    if frames.is_empty() {
        return Err(format!("no .jpg files in {}", dir).into());
    }
    println!("loaded {} image(s) from {}", frames.len(), dir);

    let server = MjpegServer::new(ServerConfig::default().port(port));
    server
        .register_log_sink(|line: &str| println!("{}", line))
        .await;

    let port = server.start().await?;
    println!("streaming on http://localhost:{}/", port);

    // Stand-in for the capture device: publish frames on a fixed cadence.
    let publisher = {
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(1000 / fps.max(1)));
            let mut i = 0usize;
            loop {
                ticker.tick().await;
                server.publish_frame(frames[i % frames.len()].clone()).await;
                i += 1;
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    publisher.abort();
    server.shutdown().await;

    Ok(())
}
