//! Transport options shared by every built-in transport.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Endpoint and connection settings handed to transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportOptions {
    /// HTTP JSON-RPC endpoint.
    #[serde(default = "default_uri")]
    pub uri: String,
    /// WebSocket JSON-RPC endpoint.
    #[serde(default = "default_websocket")]
    pub websocket: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Retries for transient HTTP failures (not counting the first try).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First WebSocket reconnect delay in milliseconds.
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    /// Upper bound for the WebSocket reconnect delay in milliseconds.
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
}

fn default_uri() -> String {
    "https://api.steemit.com".into()
}
fn default_websocket() -> String {
    "wss://steemd.steemit.com".into()
}
fn default_request_timeout_ms() -> u64 { 30_000 }
fn default_max_retries() -> u32 { 3 }
fn default_reconnect_initial_ms() -> u64 { 500 }
fn default_reconnect_max_ms() -> u64 { 60_000 }

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            websocket: default_websocket(),
            request_timeout_ms: default_request_timeout_ms(),
            max_retries: default_max_retries(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
        }
    }
}

impl TransportOptions {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}
