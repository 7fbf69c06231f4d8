//! WebSocket route handler
//!
//! Handles the WebSocket upgrade and bridges the axum socket into the
//! connection handler's transport vocabulary.

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tracing::debug;

use crate::AppState;

/// Create WebSocket routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/quotes", get(ws_handler))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    debug!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle an established WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // Channels bridging between axum and the connection handler
    let (tx, rx) = tokio::sync::mpsc::channel::<
        Result<tokio_tungstenite::tungstenite::Message, tokio_tungstenite::tungstenite::Error>,
    >(100);
    let (response_tx, mut response_rx) =
        tokio::sync::mpsc::channel::<tokio_tungstenite::tungstenite::Message>(100);

    // Task: forward frames from the axum receiver to the handler. The
    // close frame and any transport error are forwarded too, so the
    // handler sees the full connection lifecycle.
    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            let forwarded = match result {
                Ok(Message::Text(text)) => Ok(tokio_tungstenite::tungstenite::Message::Text(
                    text.to_string().into(),
                )),
                Ok(Message::Binary(data)) => Ok(tokio_tungstenite::tungstenite::Message::Binary(
                    data.to_vec().into(),
                )),
                Ok(Message::Ping(data)) => Ok(tokio_tungstenite::tungstenite::Message::Ping(
                    data.to_vec().into(),
                )),
                Ok(Message::Pong(data)) => Ok(tokio_tungstenite::tungstenite::Message::Pong(
                    data.to_vec().into(),
                )),
                Ok(Message::Close(_)) => {
                    let _ = tx
                        .send(Ok(tokio_tungstenite::tungstenite::Message::Close(None)))
                        .await;
                    break;
                }
                Err(e) => {
                    let _ = tx
                        .send(Err(tokio_tungstenite::tungstenite::Error::Io(
                            std::io::Error::other(e),
                        )))
                        .await;
                    break;
                }
            };

            if tx.send(forwarded).await.is_err() {
                break;
            }
        }
    });

    // Task: forward handler output to the axum sender
    let send_task = tokio::spawn(async move {
        while let Some(msg) = response_rx.recv().await {
            let axum_msg = match msg {
                tokio_tungstenite::tungstenite::Message::Text(text) => {
                    Message::Text(text.to_string().into())
                }
                tokio_tungstenite::tungstenite::Message::Binary(data) => {
                    Message::Binary(Bytes::from(data.to_vec()))
                }
                tokio_tungstenite::tungstenite::Message::Ping(data) => {
                    Message::Ping(Bytes::from(data.to_vec()))
                }
                tokio_tungstenite::tungstenite::Message::Pong(data) => {
                    Message::Pong(Bytes::from(data.to_vec()))
                }
                tokio_tungstenite::tungstenite::Message::Close(_) => break,
                tokio_tungstenite::tungstenite::Message::Frame(_) => continue,
            };

            if sender.send(axum_msg).await.is_err() {
                break;
            }
        }
    });

    let adapter = SocketAdapter { rx, tx: response_tx };
    state.ws_state.handle_connection(adapter).await;

    recv_task.abort();
    send_task.abort();
}

/// Adapts the bridging channels into the stream and sink the connection
/// handler expects
struct SocketAdapter {
    rx: tokio::sync::mpsc::Receiver<
        Result<tokio_tungstenite::tungstenite::Message, tokio_tungstenite::tungstenite::Error>,
    >,
    tx: tokio::sync::mpsc::Sender<tokio_tungstenite::tungstenite::Message>,
}

impl futures_util::Stream for SocketAdapter {
    type Item =
        Result<tokio_tungstenite::tungstenite::Message, tokio_tungstenite::tungstenite::Error>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl futures_util::Sink<tokio_tungstenite::tungstenite::Message> for SocketAdapter {
    type Error = tokio_tungstenite::tungstenite::Error;

    fn poll_ready(
        self: std::pin::Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn start_send(
        self: std::pin::Pin<&mut Self>,
        item: tokio_tungstenite::tungstenite::Message,
    ) -> Result<(), Self::Error> {
        let _ = self.tx.try_send(item);
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
