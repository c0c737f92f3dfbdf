//! MJPEG streaming server
//!
//! Turns the raw connection registry into a one-shot-handshake,
//! continuous-broadcast streaming endpoint. The server consumes the
//! registry's event mailbox to drive each connection's handshake, and
//! exposes `publish_frame` to the capture side: every call wraps one
//! encoded frame in the multipart envelope and fans it out to a bounded
//! set of handshaken connections.
//!
//! `publish_frame` runs on the capture collaborator's own task and
//! therefore concurrently with the accept and receive loops; the
//! connection map and handshake table are both safe for that, and a
//! broadcast mutex keeps successive frames from interleaving on any one
//! connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::protocol::handshake::HandshakeState;
use crate::protocol::{frame_segments, FORBIDDEN_RESPONSE, HANDSHAKE_RESPONSE};
use crate::registry::{ConnectionRegistry, RegistryEvent};
use crate::server::config::ServerConfig;
use crate::server::sink::LogSink;
use crate::stats::ServerStats;

/// MJPEG-over-HTTP streaming server
pub struct MjpegServer {
    config: ServerConfig,
    registry: Arc<ConnectionRegistry>,

    /// Handshake state per connection, keyed by registry id.
    /// Each entry owns its accumulator; nothing is shared across peers.
    states: RwLock<HashMap<u64, HandshakeState>>,

    /// Mailbox receiver, taken by the event pump on start
    events: Mutex<Option<mpsc::UnboundedReceiver<RegistryEvent>>>,

    /// Serializes broadcasts so frame N+1 never interleaves with frame N
    broadcast_lock: Mutex<()>,

    /// Handle to the event pump, aborted on shutdown
    pump_task: Mutex<Option<JoinHandle<()>>>,

    /// Registered log sinks
    sinks: RwLock<Vec<Box<dyn LogSink>>>,

    started_at: Instant,
    total_connections: AtomicU64,
    frames_published: AtomicU64,
    recipients_skipped: AtomicU64,
    bytes_sent: AtomicU64,
}

impl MjpegServer {
    /// Create a server with the given configuration
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let (registry, events) = ConnectionRegistry::new(config.registry_config());

        Arc::new(Self {
            config,
            registry,
            states: RwLock::new(HashMap::new()),
            events: Mutex::new(Some(events)),
            broadcast_lock: Mutex::new(()),
            pump_task: Mutex::new(None),
            sinks: RwLock::new(Vec::new()),
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            frames_published: AtomicU64::new(0),
            recipients_skipped: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
        })
    }

    /// Bind the listening socket and start serving
    ///
    /// Returns the bound port. Calling `start` on an already-started
    /// server is a no-op that returns the existing port.
    pub async fn start(self: &Arc<Self>) -> Result<u16> {
        let mut slot = self.events.lock().await;
        let Some(events) = slot.take() else {
            return Ok(self.registry.local_port());
        };

        let port = match self.registry.listen(self.config.port).await {
            Ok(port) => port,
            Err(e) => {
                // Leave the mailbox in place so a later start can retry.
                *slot = Some(events);
                return Err(e.into());
            }
        };
        drop(slot);

        let server = Arc::clone(self);
        let handle = tokio::spawn(async move { server.event_pump(events).await });
        *self.pump_task.lock().await = Some(handle);

        self.emit_log(&format!("listening on port {}", port)).await;
        Ok(port)
    }

    /// Get a reference to the underlying connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Register a sink for human-readable log lines
    pub async fn register_log_sink(&self, sink: impl LogSink + 'static) {
        self.sinks.write().await.push(Box::new(sink));
    }

    /// Broadcast one encoded frame to handshaken connections
    ///
    /// The frame is opaque; only its length is read. At most
    /// `max_frame_recipients` streaming connections are served per
    /// call, in ascending-id order; the rest are skipped for this
    /// frame, never queued. One recipient's send failure does not
    /// affect delivery to the others.
    pub async fn publish_frame(&self, frame: Bytes) {
        let _guard = self.broadcast_lock.lock().await;
        let started = Instant::now();

        let streaming: Vec<u64> = {
            let states = self.states.read().await;
            let mut ids: Vec<u64> = states
                .iter()
                .filter(|(_, state)| state.is_streaming())
                .map(|(id, _)| *id)
                .collect();
            ids.sort_unstable();
            ids
        };

        if streaming.is_empty() {
            return;
        }

        let bound = self.config.max_frame_recipients;
        let skipped = streaming.len().saturating_sub(bound);
        let segments = frame_segments(&frame);
        let mut delivered = 0usize;

        'recipients: for &id in streaming.iter().take(bound) {
            for segment in &segments {
                if self.registry.send_bytes(id, segment).await.is_err() {
                    // Already reported through the mailbox; next recipient.
                    continue 'recipients;
                }
            }
            delivered += 1;
        }

        self.frames_published.fetch_add(1, Ordering::Relaxed);
        self.recipients_skipped
            .fetch_add(skipped as u64, Ordering::Relaxed);

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            frame_bytes = frame.len(),
            delivered = delivered,
            skipped = skipped,
            "frame published"
        );
        self.emit_log(&format!(
            "frame sent to {} client(s) in {:.1}ms",
            delivered, elapsed_ms
        ))
        .await;
    }

    /// Close every connection, regardless of handshake state
    pub async fn disconnect_all(&self) {
        for id in self.registry.connection_ids().await {
            let _ = self.registry.close_connection(id).await;
        }
    }

    /// Stop accepting, close the listening socket and every connection
    pub async fn shutdown(&self) {
        self.registry.deactivate_all().await;

        if let Some(handle) = self.pump_task.lock().await.take() {
            handle.abort();
        }
        self.states.write().await.clear();

        self.emit_log("server shut down").await;
    }

    /// Number of live connections (handshaken or not)
    pub async fn connection_count(&self) -> usize {
        self.registry.connection_count().await
    }

    /// Number of connections currently streaming
    pub async fn streaming_count(&self) -> usize {
        self.states
            .read()
            .await
            .values()
            .filter(|state| state.is_streaming())
            .count()
    }

    /// Snapshot of server statistics
    pub async fn stats(&self) -> ServerStats {
        ServerStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.registry.connection_count().await as u64,
            frames_published: self.frames_published.load(Ordering::Relaxed),
            recipients_skipped: self.recipients_skipped.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }

    /// Consume registry events until the mailbox closes or shutdown aborts us
    async fn event_pump(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<RegistryEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
    }

    async fn handle_event(&self, event: RegistryEvent) {
        match event {
            RegistryEvent::Listening { port } => {
                tracing::info!(port = port, "streaming endpoint up");
            }
            RegistryEvent::Connected {
                id,
                peer_addr,
                active,
            } => {
                self.states.write().await.insert(id, HandshakeState::new());
                self.total_connections.fetch_add(1, Ordering::Relaxed);
                tracing::info!(conn_id = id, peer = %peer_addr, active = active, "client connected");
                self.emit_log(&format!("client connected. id: {}, conns: {}", id, active))
                    .await;
            }
            RegistryEvent::Disconnected { id, active } => {
                self.states.write().await.remove(&id);
                tracing::info!(conn_id = id, active = active, "client disconnected");
                self.emit_log(&format!(
                    "client disconnected. id: {}, conns: {}",
                    id, active
                ))
                .await;
            }
            RegistryEvent::DataReceived { id, data } => {
                self.on_data(id, &data).await;
            }
            RegistryEvent::DataSent { id, bytes } => {
                self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
                tracing::trace!(conn_id = id, bytes = bytes, "data sent");
            }
            RegistryEvent::FileSent { id, path } => {
                tracing::debug!(conn_id = id, path = %path.display(), "file sent");
            }
            RegistryEvent::Error { id, error } => {
                tracing::warn!(conn_id = ?id, error = %error, "registry error");
                self.emit_log(&format!("error: {}", error)).await;
            }
        }
    }

    /// Drive one connection's handshake with newly received bytes
    async fn on_data(&self, id: u64, data: &[u8]) {
        let upgraded = {
            let mut states = self.states.write().await;
            match states.get_mut(&id) {
                // The client channel is write-only after the handshake.
                Some(state) if state.is_streaming() => return,
                Some(state) => state.advance(data),
                None => return,
            }
        };

        if upgraded {
            tracing::debug!(conn_id = id, "handshake complete");
            // A failed response send is already reported through the
            // mailbox; the connection stays in the streaming set and
            // will drop out when its socket closes.
            let _ = self.registry.send_text(id, HANDSHAKE_RESPONSE).await;
        } else if self.config.reject_partial_requests {
            // Legacy behavior: refuse a request before it fully arrived.
            let _ = self.registry.send_text(id, FORBIDDEN_RESPONSE).await;
        }
    }

    async fn emit_log(&self, line: &str) {
        let sinks = self.sinks.read().await;
        if sinks.is_empty() {
            return;
        }

        let line = format!("{:.3} - {}", self.started_at.elapsed().as_secs_f64(), line);
        for sink in sinks.iter() {
            sink.log(&line);
        }
    }
}
