//! Connection identity and lifecycle types

/// Unique identifier for a WebSocket client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Lifecycle state of a client connection
///
/// The connection handler owns all transitions: `Open -> Closing` when the
/// peer starts a close handshake, and any state `-> Closed` on teardown.
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted and eligible for broadcasts
    Open,
    /// Close handshake observed, no longer eligible for broadcasts
    Closing,
    /// Torn down
    Closed,
}

impl ConnectionState {
    /// Whether broadcasts should still be delivered to this connection
    pub fn is_open(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }
}
