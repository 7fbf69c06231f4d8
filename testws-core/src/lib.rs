//! Core types for the TestWS demo server
//!
//! This crate defines the shared data structures used across the server:
//! the quote payload sent to clients and the connection lifecycle types.

pub mod connection;
pub mod quote;

pub use connection::{ClientId, ConnectionState};
pub use quote::QuoteTick;
