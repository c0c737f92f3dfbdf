//! Connection registry implementation
//!
//! Owns the listening socket, accepts incoming connections, runs one
//! receive loop per connection, and provides addressed send primitives.
//! Every lifecycle transition and fault is reported through the event
//! mailbox; no per-connection fault ever takes the server down.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use super::config::RegistryConfig;
use super::connection::ConnectionEntry;
use super::error::RegistryError;
use super::event::RegistryEvent;

/// Registry of live TCP connections
///
/// Thread-safe via `RwLock`: the accept loop inserts, receive/close
/// paths remove, and broadcast enumeration reads concurrently.
pub struct ConnectionRegistry {
    /// Map of connection id to entry
    connections: RwLock<HashMap<u64, Arc<ConnectionEntry>>>,

    /// Next identifier to assign; ids are never reused
    next_connection_id: AtomicU64,

    /// Event mailbox sender
    events: mpsc::UnboundedSender<RegistryEvent>,

    /// Whether the listening socket is accepting
    listening: AtomicBool,

    /// Port the listening socket is bound to (0 before `listen`)
    local_port: AtomicU16,

    /// Handle to the accept loop, aborted on deactivation
    accept_task: Mutex<Option<JoinHandle<()>>>,

    /// Configuration
    config: RegistryConfig,
}

impl ConnectionRegistry {
    /// Create a registry and the mailbox its events are delivered on
    pub fn new(config: RegistryConfig) -> (Arc<Self>, mpsc::UnboundedReceiver<RegistryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let registry = Arc::new(Self {
            connections: RwLock::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
            events: tx,
            listening: AtomicBool::new(false),
            local_port: AtomicU16::new(0),
            accept_task: Mutex::new(None),
            config,
        });

        (registry, rx)
    }

    /// Bind the listening socket and start accepting
    ///
    /// Returns the bound port (useful with port 0). On bind failure the
    /// fault is reported through the mailbox, the registry stays
    /// inactive, and there is no automatic retry.
    pub async fn listen(self: &Arc<Self>, port: u16) -> Result<u16, RegistryError> {
        let listener = match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => listener,
            Err(e) => {
                let error = RegistryError::bind(&e);
                tracing::error!(port = port, error = %e, "failed to bind");
                self.emit(RegistryEvent::Error {
                    id: None,
                    error: error.clone(),
                });
                return Err(error);
            }
        };

        let local_port = listener.local_addr().map(|a| a.port()).unwrap_or(port);
        self.local_port.store(local_port, Ordering::SeqCst);
        self.listening.store(true, Ordering::SeqCst);

        tracing::info!(port = local_port, "registry listening");
        self.emit(RegistryEvent::Listening { port: local_port });

        let registry = Arc::clone(self);
        let handle = tokio::spawn(async move { registry.accept_loop(listener).await });
        if let Some(old) = self.accept_task.lock().await.replace(handle) {
            old.abort();
        }

        Ok(local_port)
    }

    /// Accept connections until the registry is deactivated
    ///
    /// Accept failures are reported and acceptance continues.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    if !self.is_active() {
                        break;
                    }
                    self.register(socket, peer_addr).await;
                }
                Err(e) => {
                    if !self.is_active() {
                        break;
                    }
                    tracing::warn!(error = %e, "failed to accept connection");
                    self.emit(RegistryEvent::Error {
                        id: None,
                        error: RegistryError::accept(&e),
                    });
                }
            }
        }
    }

    /// Register an accepted socket and spawn its receive loop
    async fn register(self: &Arc<Self>, socket: TcpStream, peer_addr: SocketAddr) {
        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::debug!(error = %e, "failed to set TCP_NODELAY");
            }
        }

        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (reader, writer) = socket.into_split();
        let entry = Arc::new(ConnectionEntry::new(id, peer_addr, writer));

        let active = {
            let mut connections = self.connections.write().await;
            connections.insert(id, Arc::clone(&entry));
            connections.len()
        };

        let registry = Arc::clone(self);
        tokio::spawn(async move { registry.receive_loop(entry, reader).await });

        tracing::debug!(conn_id = id, peer = %peer_addr, active = active, "connection accepted");
        self.emit(RegistryEvent::Connected {
            id,
            peer_addr,
            active,
        });
    }

    /// Receive loop for one connection
    ///
    /// Re-arms after every read. A zero-length read is a graceful peer
    /// close; a transport fault force-closes the connection with the
    /// disconnect event followed by the error event.
    async fn receive_loop(self: Arc<Self>, entry: Arc<ConnectionEntry>, mut reader: OwnedReadHalf) {
        let mut buf = vec![0u8; self.config.read_buffer_size];

        loop {
            tokio::select! {
                _ = entry.closing.notified() => break,
                result = reader.read(&mut buf) => match result {
                    Ok(0) => {
                        tracing::debug!(conn_id = entry.id, "peer closed connection");
                        self.close_entry(&entry).await;
                        break;
                    }
                    Ok(n) => {
                        self.emit(RegistryEvent::DataReceived {
                            id: entry.id,
                            data: Bytes::copy_from_slice(&buf[..n]),
                        });
                    }
                    Err(e) => {
                        tracing::debug!(conn_id = entry.id, error = %e, "read fault");
                        let error = RegistryError::receive(entry.id, &e);
                        self.close_entry(&entry).await;
                        self.emit(RegistryEvent::Error {
                            id: Some(entry.id),
                            error,
                        });
                        break;
                    }
                }
            }
        }
    }

    /// Close one entry and emit `Disconnected` exactly once
    async fn close_entry(&self, entry: &ConnectionEntry) {
        {
            self.connections.write().await.remove(&entry.id);
        }

        if !entry.mark_closed() {
            return;
        }

        entry.closing.notify_one();

        // Shut the write half down when no send holds it; an in-flight
        // send owns the socket and will fail or complete on its own.
        if let Ok(mut writer) = entry.writer.try_lock() {
            let _ = writer.shutdown().await;
        }

        let active = self.connections.read().await.len();
        tracing::debug!(conn_id = entry.id, active = active, "connection closed");
        self.emit(RegistryEvent::Disconnected {
            id: entry.id,
            active,
        });
    }

    /// Look an entry up by id, reporting unknown ids through the mailbox
    async fn lookup(&self, id: u64) -> Result<Arc<ConnectionEntry>, RegistryError> {
        match self.connections.read().await.get(&id) {
            Some(entry) => Ok(Arc::clone(entry)),
            None => {
                let error = RegistryError::UnknownConnection(id);
                self.emit(RegistryEvent::Error {
                    id: Some(id),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Send raw bytes to one connection
    ///
    /// Success means the transport accepted the full byte count in this
    /// call. A failed send is lost: callers that need at-least-once
    /// delivery must re-issue.
    pub async fn send_bytes(&self, id: u64, data: &[u8]) -> Result<(), RegistryError> {
        let entry = self.lookup(id).await?;

        let result = {
            let mut writer = entry.writer.lock().await;
            writer.write_all(data).await
        };

        match result {
            Ok(()) => {
                self.emit(RegistryEvent::DataSent {
                    id,
                    bytes: data.len(),
                });
                Ok(())
            }
            Err(e) => {
                tracing::debug!(conn_id = id, error = %e, "send failed");
                let error = RegistryError::send(id, &e);
                self.emit(RegistryEvent::Error {
                    id: Some(id),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Send text to one connection; same contract as [`send_bytes`](Self::send_bytes)
    pub async fn send_text(&self, id: u64, text: &str) -> Result<(), RegistryError> {
        self.send_bytes(id, text.as_bytes()).await
    }

    /// Schedule a file transfer to one connection
    ///
    /// Returns once the transfer is scheduled. The optional preamble and
    /// postamble bracket the file bytes as one logical operation: the
    /// connection's write lock is held for the whole transfer.
    /// Completion emits `FileSent`; missing files and transport faults
    /// are reported through the mailbox, not this call's return value.
    pub async fn send_file(
        self: &Arc<Self>,
        id: u64,
        path: impl Into<PathBuf>,
        preamble: Option<Bytes>,
        postamble: Option<Bytes>,
    ) -> Result<(), RegistryError> {
        let entry = self.lookup(id).await?;
        let path = path.into();
        let registry = Arc::clone(self);

        tokio::spawn(async move {
            let result = {
                let mut writer = entry.writer.lock().await;
                stream_file(&mut *writer, &path, preamble, postamble).await
            };

            match result {
                Ok(bytes) => {
                    tracing::debug!(conn_id = id, path = %path.display(), bytes = bytes, "file sent");
                    registry.emit(RegistryEvent::FileSent { id, path });
                }
                Err(e) => {
                    tracing::debug!(conn_id = id, path = %path.display(), error = %e, "file transfer failed");
                    registry.emit(RegistryEvent::Error {
                        id: Some(id),
                        error: RegistryError::file(id, &e),
                    });
                }
            }
        });

        Ok(())
    }

    /// Close one connection immediately
    ///
    /// In-flight sends on the connection are not guaranteed to complete.
    pub async fn close_connection(&self, id: u64) -> Result<(), RegistryError> {
        let entry = self.lookup(id).await?;
        self.close_entry(&entry).await;
        Ok(())
    }

    /// Stop accepting, close the listening socket, and close every connection
    ///
    /// Best-effort: in-flight sends are not flushed and already-closed
    /// sockets are tolerated.
    pub async fn deactivate_all(&self) {
        self.listening.store(false, Ordering::SeqCst);

        if let Some(handle) = self.accept_task.lock().await.take() {
            handle.abort();
        }

        let entries: Vec<Arc<ConnectionEntry>> =
            self.connections.read().await.values().cloned().collect();
        for entry in entries {
            self.close_entry(&entry).await;
        }

        tracing::info!("registry deactivated");
    }

    /// Number of live connections
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether the identifier refers to a live connection
    pub async fn is_live(&self, id: u64) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Ids of all live connections, ascending
    pub async fn connection_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.connections.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Remote address of a connection; `None` when the id is not live
    pub async fn remote_addr(&self, id: u64) -> Option<SocketAddr> {
        self.connections
            .read()
            .await
            .get(&id)
            .map(|entry| entry.peer_addr)
    }

    /// Whether the registry is accepting connections
    pub fn is_active(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Port the listening socket is bound to (0 before `listen`)
    pub fn local_port(&self) -> u16 {
        self.local_port.load(Ordering::SeqCst)
    }

    fn emit(&self, event: RegistryEvent) {
        // Observers may come and go; a dropped mailbox is not a fault.
        let _ = self.events.send(event);
    }
}

/// Write preamble, file contents, and postamble to one writer
///
/// Returns the number of file bytes copied.
async fn stream_file<W>(
    writer: &mut W,
    path: &PathBuf,
    preamble: Option<Bytes>,
    postamble: Option<Bytes>,
) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut file = tokio::fs::File::open(path).await?;

    if let Some(preamble) = preamble {
        writer.write_all(&preamble).await?;
    }
    let bytes = tokio::io::copy(&mut file, writer).await?;
    if let Some(postamble) = postamble {
        writer.write_all(&postamble).await?;
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt as _;
    use tokio::net::TcpStream;
    use tokio_test::assert_ok;

    use super::*;

    async fn setup() -> (
        Arc<ConnectionRegistry>,
        mpsc::UnboundedReceiver<RegistryEvent>,
        u16,
    ) {
        let (registry, events) = ConnectionRegistry::new(RegistryConfig::default());
        let port = registry.listen(0).await.expect("listen failed");
        (registry, events, port)
    }

    async fn connect(port: u16) -> TcpStream {
        TcpStream::connect(("127.0.0.1", port))
            .await
            .expect("connect failed")
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<RegistryEvent>) -> RegistryEvent {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    async fn wait_for(
        events: &mut mpsc::UnboundedReceiver<RegistryEvent>,
        pred: impl Fn(&RegistryEvent) -> bool,
    ) -> RegistryEvent {
        loop {
            let event = next_event(events).await;
            if pred(&event) {
                return event;
            }
        }
    }

    async fn wait_connected(events: &mut mpsc::UnboundedReceiver<RegistryEvent>) -> u64 {
        match wait_for(events, |e| matches!(e, RegistryEvent::Connected { .. })).await {
            RegistryEvent::Connected { id, .. } => id,
            _ => unreachable!(),
        }
    }

    async fn read_exact(stream: &mut TcpStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        tokio::time::timeout(Duration::from_secs(2), stream.read_exact(&mut buf))
            .await
            .expect("timed out reading")
            .expect("read failed");
        buf
    }

    #[tokio::test]
    async fn test_listen_reports_bound_port() {
        let (registry, mut events, port) = setup().await;

        assert_ne!(port, 0);
        assert!(registry.is_active());
        assert_eq!(registry.local_port(), port);

        match next_event(&mut events).await {
            RegistryEvent::Listening { port: p } => assert_eq!(p, port),
            other => panic!("expected Listening, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bind_failure_reports_error() {
        // Occupy a port, then try to bind it again.
        let taken = TcpListener::bind(("0.0.0.0", 0)).await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let (registry, mut events) = ConnectionRegistry::new(RegistryConfig::default());
        let result = registry.listen(port).await;

        assert!(matches!(result, Err(RegistryError::Bind { .. })));
        assert!(!registry.is_active());
        match next_event(&mut events).await {
            RegistryEvent::Error { id: None, error } => {
                assert!(matches!(error, RegistryError::Bind { .. }));
            }
            other => panic!("expected Error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_accept_registers_connection() {
        let (registry, mut events, port) = setup().await;

        let _client = connect(port).await;
        let id = wait_connected(&mut events).await;

        assert_eq!(registry.connection_count().await, 1);
        assert!(registry.is_live(id).await);
        assert!(registry.remote_addr(id).await.is_some());
    }

    #[tokio::test]
    async fn test_identifiers_are_not_reused() {
        let (registry, mut events, port) = setup().await;

        let client_a = connect(port).await;
        let id_a = wait_connected(&mut events).await;

        drop(client_a);
        wait_for(&mut events, |e| {
            matches!(e, RegistryEvent::Disconnected { .. })
        })
        .await;

        let _client_b = connect(port).await;
        let id_b = wait_connected(&mut events).await;

        assert_ne!(id_a, id_b);
        assert!(!registry.is_live(id_a).await);
        assert!(registry.is_live(id_b).await);
    }

    #[tokio::test]
    async fn test_data_received() {
        let (_registry, mut events, port) = setup().await;

        let mut client = connect(port).await;
        let id = wait_connected(&mut events).await;

        client.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();

        match wait_for(&mut events, |e| {
            matches!(e, RegistryEvent::DataReceived { .. })
        })
        .await
        {
            RegistryEvent::DataReceived { id: got, data } => {
                assert_eq!(got, id);
                assert_eq!(&data[..], b"GET / HTTP/1.0\r\n\r\n");
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_peer_close_disconnects_exactly_once() {
        let (registry, mut events, port) = setup().await;

        let client = connect(port).await;
        let id = wait_connected(&mut events).await;
        drop(client);

        match wait_for(&mut events, |e| {
            matches!(e, RegistryEvent::Disconnected { .. })
        })
        .await
        {
            RegistryEvent::Disconnected { id: got, active } => {
                assert_eq!(got, id);
                assert_eq!(active, 0);
            }
            _ => unreachable!(),
        }

        assert_eq!(registry.connection_count().await, 0);
        assert!(!registry.is_live(id).await);

        // No second disconnect for the same connection.
        let extra = tokio::time::timeout(Duration::from_millis(200), events.recv()).await;
        assert!(extra.is_err(), "unexpected event: {:?}", extra);
    }

    #[tokio::test]
    async fn test_send_bytes_roundtrip() {
        let (registry, mut events, port) = setup().await;

        let mut client = connect(port).await;
        let id = wait_connected(&mut events).await;

        tokio_test::assert_ok!(registry.send_bytes(id, b"hello").await);

        let got = read_exact(&mut client, 5).await;
        assert_eq!(got, b"hello");

        match wait_for(&mut events, |e| matches!(e, RegistryEvent::DataSent { .. })).await {
            RegistryEvent::DataSent { id: got, bytes } => {
                assert_eq!(got, id);
                assert_eq!(bytes, 5);
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_send_text() {
        let (registry, mut events, port) = setup().await;

        let mut client = connect(port).await;
        let id = wait_connected(&mut events).await;

        tokio_test::assert_ok!(registry.send_text(id, "HTTP/1.0 403 Forbidden").await);

        let got = read_exact(&mut client, 22).await;
        assert_eq!(got, b"HTTP/1.0 403 Forbidden");
    }

    #[tokio::test]
    async fn test_send_to_unknown_id() {
        let (registry, mut events, _port) = setup().await;

        let result = registry.send_bytes(99, b"nope").await;
        assert!(matches!(result, Err(RegistryError::UnknownConnection(99))));

        match wait_for(&mut events, |e| matches!(e, RegistryEvent::Error { .. })).await {
            RegistryEvent::Error { id, error } => {
                assert_eq!(id, Some(99));
                assert!(matches!(error, RegistryError::UnknownConnection(99)));
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_send_file_brackets_and_completion() {
        use std::io::Write as _;

        let (registry, mut events, port) = setup().await;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"FILEBODY").unwrap();
        file.flush().unwrap();

        let mut client = connect(port).await;
        let id = wait_connected(&mut events).await;

        tokio_test::assert_ok!(
            registry
                .send_file(
                    id,
                    file.path(),
                    Some(Bytes::from_static(b"PRE-")),
                    Some(Bytes::from_static(b"-POST")),
                )
                .await
        );

        let got = read_exact(&mut client, 17).await;
        assert_eq!(got, b"PRE-FILEBODY-POST");

        match wait_for(&mut events, |e| matches!(e, RegistryEvent::FileSent { .. })).await {
            RegistryEvent::FileSent { id: got, path } => {
                assert_eq!(got, id);
                assert_eq!(path, file.path());
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_send_file_missing_file_reports_error() {
        let (registry, mut events, port) = setup().await;

        let _client = connect(port).await;
        let id = wait_connected(&mut events).await;

        // Scheduling succeeds; the fault arrives through the mailbox.
        tokio_test::assert_ok!(
            registry
                .send_file(id, "/definitely/not/a/real/file.jpg", None, None)
                .await
        );

        match wait_for(&mut events, |e| matches!(e, RegistryEvent::Error { .. })).await {
            RegistryEvent::Error { id: got, error } => {
                assert_eq!(got, Some(id));
                assert!(matches!(error, RegistryError::File { .. }));
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_close_connection() {
        let (registry, mut events, port) = setup().await;

        let mut client = connect(port).await;
        let id = wait_connected(&mut events).await;

        tokio_test::assert_ok!(registry.close_connection(id).await);

        wait_for(&mut events, |e| {
            matches!(e, RegistryEvent::Disconnected { .. })
        })
        .await;
        assert!(!registry.is_live(id).await);
        assert_eq!(registry.connection_count().await, 0);

        // The peer observes EOF.
        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .expect("timed out")
            .expect("read failed");
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_deactivate_all() {
        let (registry, mut events, port) = setup().await;

        let _client_a = connect(port).await;
        let _client_b = connect(port).await;
        wait_connected(&mut events).await;
        wait_connected(&mut events).await;
        assert_eq!(registry.connection_count().await, 2);

        registry.deactivate_all().await;

        wait_for(&mut events, |e| {
            matches!(e, RegistryEvent::Disconnected { .. })
        })
        .await;
        wait_for(&mut events, |e| {
            matches!(e, RegistryEvent::Disconnected { .. })
        })
        .await;

        assert_eq!(registry.connection_count().await, 0);
        assert!(!registry.is_active());

        // Deactivating again is tolerated.
        registry.deactivate_all().await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_connection_ids_ascending() {
        let (registry, mut events, port) = setup().await;

        let _a = connect(port).await;
        let _b = connect(port).await;
        let _c = connect(port).await;
        for _ in 0..3 {
            wait_connected(&mut events).await;
        }

        let ids = registry.connection_ids().await;
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }
}
