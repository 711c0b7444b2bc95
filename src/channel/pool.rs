//! Channel connection pool.
//!
//! # Responsibilities
//! - Own the connection set (endpoints + TLS material) for one group
//! - Run one supervisor task per endpoint that connects, watches and reconnects
//! - Bound `start` by the connect timeout; one live endpoint is enough
//! - Route requests round-robin over live connections
//! - Expose per-endpoint connectivity status

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;

use crate::channel::connection::ConnectionHandle;
use crate::channel::message::ChannelMessage;
use crate::channel::state::{EndpointSlot, EndpointState, EndpointStatus};
use crate::channel::tls::ChannelConnectionSet;
use crate::config::ChannelConfig;
use crate::error::{LedgerError, LedgerResult};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::resilience::backoff::reconnect_delay;

/// State shared between the pool and its supervisors.
struct PoolShared {
    group_id: u32,
    connector: TlsConnector,
    settings: ChannelConfig,
    slots: Vec<Arc<EndpointSlot>>,
    cursor: AtomicUsize,
    live: watch::Sender<usize>,
}

impl std::fmt::Debug for PoolShared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolShared")
            .field("group_id", &self.group_id)
            .field("slots", &self.slots)
            .field("live", &*self.live.borrow())
            .finish_non_exhaustive()
    }
}

impl PoolShared {
    fn connection_up(&self) {
        self.live.send_modify(|n| *n += 1);
        metrics::record_live_connections(*self.live.borrow());
    }

    fn connection_down(&self) {
        self.live.send_modify(|n| *n = n.saturating_sub(1));
        metrics::record_live_connections(*self.live.borrow());
    }
}

/// Pool of mutually authenticated channel connections to the nodes of one group.
#[derive(Debug)]
pub struct ConnectionPool {
    shared: Arc<PoolShared>,
    shutdown: Shutdown,
    supervisors: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
}

impl ConnectionPool {
    /// Build a pool from a connection set. No connection is opened yet.
    pub fn build(set: ChannelConnectionSet, settings: ChannelConfig) -> LedgerResult<Self> {
        let connector = TlsConnector::from(set.tls().client_config()?);
        let slots = set
            .endpoints()
            .iter()
            .cloned()
            .map(|endpoint| Arc::new(EndpointSlot::new(endpoint)))
            .collect();
        let (live, _) = watch::channel(0);

        Ok(Self {
            shared: Arc::new(PoolShared {
                group_id: set.group_id(),
                connector,
                settings,
                slots,
                cursor: AtomicUsize::new(0),
                live,
            }),
            shutdown: Shutdown::new(),
            supervisors: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
        })
    }

    /// Connect to every endpoint and wait until at least one is live.
    ///
    /// Fails with a connectivity error when no endpoint connects within the
    /// connect timeout. Supervisors keep retrying in the background either way.
    pub async fn start(&self) -> LedgerResult<()> {
        if self.shutdown.is_triggered() {
            return Err(LedgerError::Connectivity(format!(
                "channel pool for group {} is shut down",
                self.shared.group_id
            )));
        }
        if !self.started.swap(true, Ordering::SeqCst) {
            self.spawn_supervisors();
        }

        let deadline = self.shared.settings.connect_timeout();
        let started_at = Instant::now();
        let mut live = self.shared.live.subscribe();
        let connected = matches!(
            tokio::time::timeout(deadline, live.wait_for(|n| *n > 0)).await,
            Ok(Ok(_))
        );

        if connected {
            tracing::info!(
                group_id = self.shared.group_id,
                live = self.live_connections(),
                configured = self.shared.slots.len(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "Channel pool started"
            );
            Ok(())
        } else {
            tracing::error!(
                group_id = self.shared.group_id,
                configured = self.shared.slots.len(),
                timeout_secs = deadline.as_secs(),
                "No ledger node reachable"
            );
            Err(LedgerError::Connectivity(format!(
                "none of {} configured nodes reachable within {}s",
                self.shared.slots.len(),
                deadline.as_secs()
            )))
        }
    }

    fn spawn_supervisors(&self) {
        let Ok(mut supervisors) = self.supervisors.lock() else {
            return;
        };
        for slot in &self.shared.slots {
            let shutdown = self.shutdown.subscribe();
            supervisors.push(tokio::spawn(supervise(
                Arc::clone(&self.shared),
                Arc::clone(slot),
                shutdown,
            )));
        }
    }

    /// Send a frame over a live connection and wait up to `timeout` for its response.
    pub async fn request(
        &self,
        operation: &'static str,
        message: ChannelMessage,
        timeout: Duration,
    ) -> LedgerResult<ChannelMessage> {
        let handle = self.next_live().ok_or_else(|| {
            LedgerError::Connectivity(format!(
                "no live channel connection for group {}",
                self.shared.group_id
            ))
        })?;
        handle.request(operation, message, timeout).await
    }

    fn next_live(&self) -> Option<Arc<ConnectionHandle>> {
        let slots = &self.shared.slots;
        let start = self.shared.cursor.fetch_add(1, Ordering::Relaxed);
        (0..slots.len()).find_map(|i| slots[(start + i) % slots.len()].live_handle())
    }

    pub fn group_id(&self) -> u32 {
        self.shared.group_id
    }

    pub fn settings(&self) -> &ChannelConfig {
        &self.shared.settings
    }

    pub fn live_connections(&self) -> usize {
        *self.shared.live.borrow()
    }

    /// Connectivity of every configured endpoint, in configuration order.
    pub fn status(&self) -> Vec<EndpointStatus> {
        self.shared.slots.iter().map(|slot| slot.status()).collect()
    }

    /// Stop all supervisors and close every connection.
    pub async fn shutdown(&self) {
        self.shutdown.trigger();
        let supervisors = match self.supervisors.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => Vec::new(),
        };
        for task in supervisors {
            let _ = task.await;
        }
        tracing::info!(group_id = self.shared.group_id, "Channel pool stopped");
    }
}

impl Drop for ConnectionPool {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Connect, watch and reconnect one endpoint until shutdown.
async fn supervise(
    shared: Arc<PoolShared>,
    slot: Arc<EndpointSlot>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let endpoint = slot.endpoint().clone();
    let spacing_ms = shared.settings.connect_sleep_per_millis;
    let max_delay_ms = shared.settings.max_reconnect_delay_ms;
    let mut attempt: u32 = 0;

    loop {
        slot.set_state(EndpointState::Connecting);
        let connect = tokio::time::timeout(
            shared.settings.handshake_timeout(),
            ConnectionHandle::open(&endpoint, &shared.connector, &shared.settings),
        );
        let outcome = tokio::select! {
            _ = shutdown.recv() => break,
            outcome = connect => outcome,
        };

        match outcome {
            Ok(Ok(handle)) => {
                attempt = 0;
                metrics::record_connect_attempt(&endpoint, true);
                slot.attach(Arc::clone(&handle));
                shared.connection_up();
                tracing::info!(
                    connection_id = %handle.id(),
                    endpoint = %endpoint,
                    group_id = shared.group_id,
                    "Channel connected"
                );

                let stop = tokio::select! {
                    _ = shutdown.recv() => true,
                    _ = handle.closed() => false,
                };

                handle.close();
                slot.detach();
                shared.connection_down();
                if stop {
                    break;
                }
                tracing::warn!(connection_id = %handle.id(), endpoint = %endpoint, "Channel connection lost, reconnecting");
            }
            Ok(Err(e)) => {
                metrics::record_connect_attempt(&endpoint, false);
                let failures = slot.mark_failure();
                tracing::warn!(endpoint = %endpoint, failures, error = %e, "Channel connect failed");
            }
            Err(_) => {
                metrics::record_connect_attempt(&endpoint, false);
                let failures = slot.mark_failure();
                tracing::warn!(
                    endpoint = %endpoint,
                    failures,
                    timeout_ms = shared.settings.handshake_timeout_ms,
                    "Channel handshake timed out"
                );
            }
        }

        attempt = attempt.saturating_add(1);
        let delay = reconnect_delay(attempt, spacing_ms, max_delay_ms);
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    slot.set_state(EndpointState::Closed);
    tracing::debug!(endpoint = %endpoint, "Channel supervisor stopped");
}
