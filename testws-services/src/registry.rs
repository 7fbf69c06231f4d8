//! Connection registry for live WebSocket clients
//!
//! Tracks every accepted connection and fans quote payloads out to the
//! ones that are still open.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use testws_core::{ClientId, ConnectionState, QuoteTick};

/// Payloads buffered per connection before sends start failing
const OUTBOUND_BUFFER: usize = 100;

const STATE_OPEN: u8 = 0;
const STATE_CLOSING: u8 = 1;
const STATE_CLOSED: u8 = 2;

/// A single accepted WebSocket connection
///
/// Holds the connection's identity, its lifecycle state, and the sending
/// half of the queue drained by the connection's writer task.
pub struct ClientConnection {
    id: ClientId,
    state: AtomicU8,
    outbound: mpsc::Sender<String>,
}

impl ClientConnection {
    /// Create a connection along with the receiving half of its outbound queue
    pub fn channel(id: ClientId) -> (Arc<Self>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        let connection = Arc::new(Self {
            id,
            state: AtomicU8::new(STATE_OPEN),
            outbound: tx,
        });
        (connection, rx)
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        match self.state.load(Ordering::SeqCst) {
            STATE_OPEN => ConnectionState::Open,
            STATE_CLOSING => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state().is_open()
    }

    /// Record that the peer started a close handshake
    ///
    /// Only an open connection moves to closing; a closed connection stays
    /// closed.
    pub fn mark_closing(&self) {
        let _ = self.state.compare_exchange(
            STATE_OPEN,
            STATE_CLOSING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Record that the connection is finished; safe to call more than once
    pub fn mark_closed(&self) {
        self.state.store(STATE_CLOSED, Ordering::SeqCst);
    }

    /// Queue a payload for the writer task
    ///
    /// Returns false when the queue is full or the writer is gone. Never
    /// blocks.
    pub fn send(&self, payload: String) -> bool {
        self.outbound.try_send(payload).is_ok()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Tracks the set of live connections
///
/// Membership changes only on connect and on teardown; broadcasts never
/// remove entries.
pub struct ConnectionRegistry {
    /// Next client ID to assign
    next_client_id: AtomicU64,
    connections: DashMap<ClientId, Arc<ClientConnection>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            next_client_id: AtomicU64::new(1),
            connections: DashMap::new(),
        }
    }

    /// Generate a new unique client ID
    pub fn next_client_id(&self) -> ClientId {
        ClientId(self.next_client_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Add a connection to the registry
    ///
    /// Registering an id that is already present keeps the existing entry.
    pub fn register(&self, connection: Arc<ClientConnection>) {
        let id = connection.id();
        self.connections.entry(id).or_insert(connection);
        debug!("Registered {}", id);
    }

    /// Remove a connection; returns false when the id was not present
    pub fn unregister(&self, id: ClientId) -> bool {
        let removed = self.connections.remove(&id).is_some();
        if removed {
            debug!("Unregistered {}", id);
        }
        removed
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Fan a quote out to every open connection
    ///
    /// The payload is serialized once for the whole fan-out. Connections
    /// observed in a non-open state are skipped but stay registered, and a
    /// failed send is logged and otherwise ignored; removal belongs to the
    /// connection handler. Returns the number of delivery attempts.
    pub fn broadcast(&self, tick: &QuoteTick) -> usize {
        let payload = match serde_json::to_string(tick) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize quote: {}", e);
                return 0;
            }
        };

        // Snapshot the membership so handler-driven removals cannot
        // interleave with the fan-out.
        let targets: Vec<Arc<ClientConnection>> = self
            .connections
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut attempts = 0;
        for connection in targets {
            if !connection.is_open() {
                continue;
            }
            attempts += 1;
            if !connection.send(payload.clone()) {
                debug!("Dropped quote for {}: outbound queue unavailable", connection.id());
            }
        }

        attempts
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("connections", &self.connections.len())
            .finish()
    }
}
