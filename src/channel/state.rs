//! Per-endpoint connection state.
//!
//! # Responsibilities
//! - Track connectivity of one node (Idle → Connecting → Connected ⇄ Disconnected)
//! - Hold the live connection handle, if any
//! - Count consecutive failed connection attempts
//! - Produce status snapshots for callers

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::channel::connection::ConnectionHandle;
use crate::channel::endpoint::Endpoint;

/// Connectivity state of one endpoint.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    Idle = 0,
    Connecting = 1,
    Connected = 2,
    Disconnected = 3,
    Closed = 4,
}

impl From<u8> for EndpointState {
    fn from(val: u8) -> Self {
        match val {
            1 => EndpointState::Connecting,
            2 => EndpointState::Connected,
            3 => EndpointState::Disconnected,
            4 => EndpointState::Closed,
            _ => EndpointState::Idle,
        }
    }
}

/// Point-in-time view of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointStatus {
    pub endpoint: Endpoint,
    pub state: EndpointState,
    pub consecutive_failures: usize,
}

/// One configured node and its (optional) live connection.
#[derive(Debug)]
pub struct EndpointSlot {
    endpoint: Endpoint,
    state: AtomicU8,
    consecutive_failures: AtomicUsize,
    handle: RwLock<Option<Arc<ConnectionHandle>>>,
}

impl EndpointSlot {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            state: AtomicU8::new(EndpointState::Idle as u8),
            consecutive_failures: AtomicUsize::new(0),
            handle: RwLock::new(None),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> EndpointState {
        EndpointState::from(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: EndpointState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn consecutive_failures(&self) -> usize {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Install a freshly opened connection.
    pub(crate) fn attach(&self, handle: Arc<ConnectionHandle>) {
        if let Ok(mut slot) = self.handle.write() {
            *slot = Some(handle);
        }
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.set_state(EndpointState::Connected);
    }

    /// Remove the current connection, returning it.
    pub(crate) fn detach(&self) -> Option<Arc<ConnectionHandle>> {
        let previous = self.handle.write().ok().and_then(|mut slot| slot.take());
        self.set_state(EndpointState::Disconnected);
        previous
    }

    /// Record a failed connection attempt.
    pub fn mark_failure(&self) -> usize {
        self.set_state(EndpointState::Disconnected);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The live connection, if one is attached and still open.
    pub(crate) fn live_handle(&self) -> Option<Arc<ConnectionHandle>> {
        let slot = self.handle.read().ok()?;
        slot.as_ref().filter(|h| !h.is_closed()).cloned()
    }

    pub fn status(&self) -> EndpointStatus {
        EndpointStatus {
            endpoint: self.endpoint.clone(),
            state: self.state(),
            consecutive_failures: self.consecutive_failures(),
        }
    }
}
