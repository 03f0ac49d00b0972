//! steemrpc-ws: WebSocket JSON-RPC transport with auto-reconnect.
//!
//! # Features
//! - Lazy connect on first request
//! - Request multiplexing over a single connection, correlated by id
//! - Auto-reconnect on disconnect (exponential backoff)
//! - Lifecycle events (`Connected` / `Disconnected`)

pub mod client;

pub use client::WsTransport;
