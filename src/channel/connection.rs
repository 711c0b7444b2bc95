//! Live channel connection to one node.
//!
//! # Responsibilities
//! - Dial TCP and complete the mutual-TLS handshake
//! - Run one writer task (outbound queue + heartbeat) and one reader task
//! - Correlate responses to requests by `seq`
//! - Drop the connection after `HEARTBEAT_MISSES` heartbeat intervals without any inbound frame
//! - Signal closure so the pool supervisor can reconnect
//!
//! # Design Decisions
//! - The reader never holds the handle, so dropping the last handle ends both tasks
//! - Pending requests are released by an RAII guard on completion, timeout or cancellation
//! - Closing the connection drops every pending sender, failing waiters fast

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_rustls::TlsConnector;

use crate::channel::endpoint::Endpoint;
use crate::channel::message::{ChannelMessage, MAX_FRAME_LEN};
use crate::config::ChannelConfig;
use crate::error::{LedgerError, LedgerResult};

/// Global atomic counter for connection IDs.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Outbound frames buffered per connection.
const OUTBOUND_QUEUE: usize = 256;

type PendingMap = DashMap<String, oneshot::Sender<ChannelMessage>>;

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle to an open channel connection.
pub struct ConnectionHandle {
    id: ConnectionId,
    endpoint: Endpoint,
    outbound: mpsc::Sender<ChannelMessage>,
    pending: Arc<PendingMap>,
    closed: Arc<watch::Sender<bool>>,
}

impl ConnectionHandle {
    /// Dial `endpoint`, complete the TLS handshake and start the I/O tasks.
    pub(crate) async fn open(
        endpoint: &Endpoint,
        connector: &TlsConnector,
        settings: &ChannelConfig,
    ) -> LedgerResult<Arc<Self>> {
        let server_name = endpoint.server_name()?;
        let tcp = TcpStream::connect((endpoint.host(), endpoint.port()))
            .await
            .map_err(|e| LedgerError::Connectivity(format!("connect to {} failed: {}", endpoint, e)))?;
        if let Err(e) = tcp.set_nodelay(true) {
            tracing::debug!(endpoint = %endpoint, error = %e, "Could not disable Nagle");
        }

        let stream = connector.connect(server_name, tcp).await.map_err(|e| {
            LedgerError::Connectivity(format!("TLS handshake with {} failed: {}", endpoint, e))
        })?;

        Ok(Self::spawn(
            endpoint.clone(),
            stream,
            settings.heartbeat_interval(),
            settings.idle_timeout(),
        ))
    }

    /// Start the I/O tasks over an established stream.
    ///
    /// The connection closes itself when nothing arrives for `idle_timeout`.
    pub(crate) fn spawn<S>(
        endpoint: Endpoint,
        stream: S,
        heartbeat: Duration,
        idle_timeout: Duration,
    ) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (closed, _) = watch::channel(false);

        let handle = Arc::new(Self {
            id: ConnectionId::new(),
            endpoint,
            outbound,
            pending: Arc::new(DashMap::new()),
            closed: Arc::new(closed),
        });

        tokio::spawn(write_loop(
            handle.id,
            handle.endpoint.clone(),
            writer,
            outbound_rx,
            heartbeat,
            handle.closed.clone(),
        ));
        tokio::spawn(read_loop(
            handle.id,
            handle.endpoint.clone(),
            reader,
            idle_timeout,
            handle.pending.clone(),
            handle.closed.clone(),
        ));

        tracing::debug!(connection_id = %handle.id, endpoint = %handle.endpoint, "Channel I/O started");
        handle
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Ask both I/O tasks to stop.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    /// Resolves once the connection has closed for any reason.
    pub async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        wait_closed(&mut rx).await;
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Send a frame and wait for the correlated response.
    pub(crate) async fn request(
        &self,
        operation: &'static str,
        message: ChannelMessage,
        timeout: Duration,
    ) -> LedgerResult<ChannelMessage> {
        if message.encoded_len() > MAX_FRAME_LEN {
            return Err(LedgerError::Protocol(format!(
                "{} frame of {} bytes exceeds the {}-byte limit",
                operation,
                message.encoded_len(),
                MAX_FRAME_LEN
            )));
        }

        let (tx, rx) = oneshot::channel();
        let _pending = PendingGuard::register(&self.pending, message.seq().to_string(), tx);
        if self.is_closed() {
            return Err(self.closed_error());
        }

        let exchange = async {
            self.outbound
                .send(message)
                .await
                .map_err(|_| self.closed_error())?;
            rx.await.map_err(|_| self.closed_error())
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    connection_id = %self.id,
                    endpoint = %self.endpoint,
                    operation,
                    "Channel request timed out"
                );
                Err(LedgerError::Timeout {
                    operation,
                    millis: timeout.as_millis() as u64,
                })
            }
        }
    }

    fn closed_error(&self) -> LedgerError {
        LedgerError::Connectivity(format!("connection to {} closed", self.endpoint))
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("endpoint", &self.endpoint)
            .field("closed", &self.is_closed())
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Removes a pending entry when the request finishes or is abandoned.
struct PendingGuard {
    pending: Arc<PendingMap>,
    seq: String,
}

impl PendingGuard {
    fn register(pending: &Arc<PendingMap>, seq: String, waiter: oneshot::Sender<ChannelMessage>) -> Self {
        pending.insert(seq.clone(), waiter);
        Self {
            pending: Arc::clone(pending),
            seq,
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.remove(&self.seq);
    }
}

async fn wait_closed(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

async fn write_loop<W>(
    id: ConnectionId,
    endpoint: Endpoint,
    mut writer: W,
    mut outbound: mpsc::Receiver<ChannelMessage>,
    heartbeat: Duration,
    closed: Arc<watch::Sender<bool>>,
) where
    W: AsyncWrite + Unpin,
{
    let mut closed_rx = closed.subscribe();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + heartbeat, heartbeat);

    loop {
        let message = tokio::select! {
            next = outbound.recv() => match next {
                Some(message) => message,
                None => break,
            },
            _ = ticker.tick() => ChannelMessage::heartbeat(),
            _ = wait_closed(&mut closed_rx) => break,
        };

        if let Err(e) = message.write_to(&mut writer).await {
            tracing::warn!(connection_id = %id, endpoint = %endpoint, error = %e, "Channel write failed");
            break;
        }
    }

    closed.send_replace(true);
    let _ = writer.shutdown().await;
    tracing::trace!(connection_id = %id, "Writer stopped");
}

async fn read_loop<R>(
    id: ConnectionId,
    endpoint: Endpoint,
    mut reader: R,
    idle_timeout: Duration,
    pending: Arc<PendingMap>,
    closed: Arc<watch::Sender<bool>>,
) where
    R: AsyncRead + Unpin,
{
    let mut closed_rx = closed.subscribe();

    loop {
        // a healthy node answers every heartbeat, so silence means the peer is gone
        let frame = tokio::select! {
            frame = tokio::time::timeout(idle_timeout, ChannelMessage::read_from(&mut reader)) => match frame {
                Ok(frame) => frame,
                Err(_) => {
                    tracing::warn!(
                        connection_id = %id,
                        endpoint = %endpoint,
                        idle_ms = idle_timeout.as_millis() as u64,
                        "Node stopped answering, dropping channel"
                    );
                    break;
                }
            },
            _ = wait_closed(&mut closed_rx) => break,
        };

        match frame {
            Ok(Some(message)) => {
                if let Some((_, waiter)) = pending.remove(message.seq()) {
                    let _ = waiter.send(message);
                } else if message.is_heartbeat() {
                    tracing::trace!(connection_id = %id, "Heartbeat acknowledged");
                } else {
                    tracing::debug!(
                        connection_id = %id,
                        seq = %message.seq(),
                        kind = message.kind,
                        "Dropping uncorrelated frame"
                    );
                }
            }
            Ok(None) => {
                tracing::info!(connection_id = %id, endpoint = %endpoint, "Node closed channel");
                break;
            }
            Err(e) => {
                tracing::warn!(connection_id = %id, endpoint = %endpoint, error = %e, "Channel read failed");
                break;
            }
        }
    }

    closed.send_replace(true);
    pending.clear();
    tracing::trace!(connection_id = %id, "Reader stopped");
}
