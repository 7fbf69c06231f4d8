//! Service layer for the TestWS demo server
//!
//! This crate provides the connection registry, the periodic quote
//! publisher, and the WebSocket connection handler that ties them to
//! individual client sockets.

pub mod publisher;
pub mod registry;
pub mod websocket;

pub use publisher::{PublisherHandle, TickPublisher, TickPublisherConfig};
pub use registry::{ClientConnection, ConnectionRegistry};
pub use websocket::WebSocketState;
