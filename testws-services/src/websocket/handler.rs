//! WebSocket connection handler
//!
//! Owns the lifecycle of an individual client connection: registration,
//! quote delivery, inbound logging, and teardown.

use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info};

use testws_core::ClientId;

use crate::registry::{ClientConnection, ConnectionRegistry};

/// Shared state for WebSocket handlers
#[derive(Clone)]
pub struct WebSocketState {
    /// Live connection registry
    pub registry: Arc<ConnectionRegistry>,
}

impl WebSocketState {
    /// Create new WebSocket state with an empty registry
    pub fn new() -> Self {
        Self {
            registry: Arc::new(ConnectionRegistry::new()),
        }
    }

    /// Create WebSocket state over an existing registry
    pub fn with_registry(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// Handle a new WebSocket connection
    ///
    /// This is called when a WebSocket upgrade is successful. It registers
    /// the connection, drains queued quote payloads to the socket, and logs
    /// inbound traffic until the peer goes away.
    pub async fn handle_connection<S>(&self, socket: S)
    where
        S: futures_util::Stream<
                Item = Result<
                    tokio_tungstenite::tungstenite::Message,
                    tokio_tungstenite::tungstenite::Error,
                >,
            > + futures_util::Sink<
                tokio_tungstenite::tungstenite::Message,
                Error = tokio_tungstenite::tungstenite::Error,
            > + Send
            + 'static,
    {
        let client_id = self.registry.next_client_id();
        let (connection, mut outgoing_rx) = ClientConnection::channel(client_id);
        self.registry.register(Arc::clone(&connection));
        info!("A client connected through the socket: {}", client_id);

        let (mut ws_sender, mut ws_receiver) = socket.split();

        // Task: forward queued quote payloads to the socket
        let send_task = tokio::spawn(async move {
            while let Some(payload) = outgoing_rx.recv().await {
                if ws_sender
                    .send(tokio_tungstenite::tungstenite::Message::Text(payload.into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        // Task: receive and log incoming messages
        let recv_task = {
            let registry = Arc::clone(&self.registry);
            let connection = Arc::clone(&connection);
            async move {
                while let Some(result) = ws_receiver.next().await {
                    match result {
                        Ok(msg) => {
                            if !Self::handle_message(client_id, msg, &connection) {
                                break;
                            }
                        }
                        Err(e) => {
                            error!("WebSocket error for {}: {}", client_id, e);
                            connection.mark_closed();
                            registry.unregister(client_id);
                            break;
                        }
                    }
                }
            }
        };

        // Wait for either task to complete (connection closed)
        tokio::select! {
            _ = send_task => {}
            _ = recv_task => {}
        }

        // Runs on every exit path; after a transport error the unregister
        // repeats and the repeat is a no-op.
        connection.mark_closed();
        self.registry.unregister(client_id);
        info!("A client disconnected from the socket: {}", client_id);
    }

    /// Log one incoming message
    ///
    /// Inbound traffic is never parsed or answered. Returns false when the
    /// connection should wind down.
    fn handle_message(
        client_id: ClientId,
        msg: tokio_tungstenite::tungstenite::Message,
        connection: &ClientConnection,
    ) -> bool {
        use tokio_tungstenite::tungstenite::Message;

        match msg {
            Message::Text(text) => {
                info!(
                    "A client sent a message to the socket: {} [{}]",
                    client_id, &*text
                );
            }
            Message::Binary(data) => {
                info!(
                    "A client sent a message to the socket: {} [{}]",
                    client_id,
                    String::from_utf8_lossy(&data)
                );
            }
            Message::Ping(_) => {
                // Handled automatically by the transport
                debug!("Received ping from {}", client_id);
            }
            Message::Pong(_) => {
                debug!("Received pong from {}", client_id);
            }
            Message::Close(_) => {
                debug!("Received close from {}", client_id);
                connection.mark_closing();
                return false;
            }
            Message::Frame(_) => {
                // Raw frames not supported
            }
        }

        true
    }
}

impl Default for WebSocketState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WebSocketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketState")
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use testws_core::QuoteTick;
    use tokio::sync::mpsc;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite;

    /// In-memory stand-in for a client socket
    struct TestSocket {
        incoming: mpsc::Receiver<Result<tungstenite::Message, tungstenite::Error>>,
        outgoing: mpsc::UnboundedSender<tungstenite::Message>,
    }

    impl TestSocket {
        fn pair() -> (
            Self,
            mpsc::Sender<Result<tungstenite::Message, tungstenite::Error>>,
            mpsc::UnboundedReceiver<tungstenite::Message>,
        ) {
            let (in_tx, in_rx) = mpsc::channel(16);
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let socket = Self {
                incoming: in_rx,
                outgoing: out_tx,
            };
            (socket, in_tx, out_rx)
        }
    }

    impl futures_util::Stream for TestSocket {
        type Item = Result<tungstenite::Message, tungstenite::Error>;

        fn poll_next(
            mut self: std::pin::Pin<&mut Self>,
            cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Option<Self::Item>> {
            self.incoming.poll_recv(cx)
        }
    }

    impl futures_util::Sink<tungstenite::Message> for TestSocket {
        type Error = tungstenite::Error;

        fn poll_ready(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Result<(), Self::Error>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn start_send(
            self: std::pin::Pin<&mut Self>,
            item: tungstenite::Message,
        ) -> Result<(), Self::Error> {
            let _ = self.outgoing.send(item);
            Ok(())
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Result<(), Self::Error>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_close(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<Result<(), Self::Error>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    async fn wait_for_len(registry: &ConnectionRegistry, len: usize) {
        for _ in 0..100 {
            if registry.len() == len {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("registry never reached {} connection(s)", len);
    }

    #[tokio::test]
    async fn test_connection_registers_and_tears_down() {
        let state = WebSocketState::new();
        let (socket, in_tx, _out_rx) = TestSocket::pair();

        let task = {
            let state = state.clone();
            tokio::spawn(async move { state.handle_connection(socket).await })
        };

        wait_for_len(&state.registry, 1).await;

        // Peer goes away without a close frame
        drop(in_tx);
        timeout(Duration::from_secs(1), task)
            .await
            .expect("handler did not finish")
            .unwrap();

        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_close_frame_tears_down() {
        let state = WebSocketState::new();
        let (socket, in_tx, _out_rx) = TestSocket::pair();

        let task = {
            let state = state.clone();
            tokio::spawn(async move { state.handle_connection(socket).await })
        };

        wait_for_len(&state.registry, 1).await;

        in_tx
            .send(Ok(tungstenite::Message::Close(None)))
            .await
            .unwrap();

        timeout(Duration::from_secs(1), task)
            .await
            .expect("handler did not finish")
            .unwrap();

        assert!(state.registry.is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_unregisters() {
        let state = WebSocketState::new();
        let (socket, in_tx, _out_rx) = TestSocket::pair();

        let task = {
            let state = state.clone();
            tokio::spawn(async move { state.handle_connection(socket).await })
        };

        wait_for_len(&state.registry, 1).await;

        in_tx
            .send(Err(tungstenite::Error::Protocol(
                tungstenite::error::ProtocolError::ResetWithoutClosingHandshake,
            )))
            .await
            .unwrap();

        // The error path unregisters, then the common teardown repeats it
        timeout(Duration::from_secs(1), task)
            .await
            .expect("handler did not finish")
            .unwrap();

        assert!(state.registry.is_empty());
        // Later broadcasts have nobody left to reach
        assert_eq!(state.registry.broadcast(&QuoteTick::new("MSFT", 9)), 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_the_socket() {
        let state = WebSocketState::new();
        let (socket, _in_tx, mut out_rx) = TestSocket::pair();

        let _task = {
            let state = state.clone();
            tokio::spawn(async move { state.handle_connection(socket).await })
        };

        wait_for_len(&state.registry, 1).await;

        assert_eq!(state.registry.broadcast(&QuoteTick::new("MSFT", 0)), 1);

        let frame = timeout(Duration::from_secs(1), out_rx.recv())
            .await
            .expect("no frame within 1s")
            .expect("socket closed");
        match frame {
            tungstenite::Message::Text(text) => {
                assert_eq!(&*text, r#"{"symbol":"MSFT","price":0}"#);
            }
            other => panic!("expected a text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_inbound_is_logged_not_echoed() {
        let state = WebSocketState::new();
        let (socket, in_tx, mut out_rx) = TestSocket::pair();

        let _task = {
            let state = state.clone();
            tokio::spawn(async move { state.handle_connection(socket).await })
        };

        wait_for_len(&state.registry, 1).await;

        in_tx
            .send(Ok(tungstenite::Message::Text("ping-me".to_string().into())))
            .await
            .unwrap();

        // Inbound traffic produces no reply
        assert!(
            timeout(Duration::from_millis(100), out_rx.recv())
                .await
                .is_err(),
            "unexpected reply to an inbound message"
        );
        // And the connection stays registered
        assert_eq!(state.registry.len(), 1);
    }
}
