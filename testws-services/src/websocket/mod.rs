//! WebSocket infrastructure for the quote stream
//!
//! This module owns the lifecycle of individual client connections, from
//! registration through teardown.

mod handler;

pub use handler::WebSocketState;
