//! The `RpcTransport` trait, the seam between the API layer and the wire.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::TransportOptions;
use crate::error::TransportError;
use crate::request::ApiCall;

/// Transport health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Transport is connected / responding normally.
    Healthy,
    /// Transport is reconnecting or seeing transient failures.
    Degraded,
    /// Transport is stopped or cannot reach the node.
    Unhealthy,
    /// Health status is unknown (not yet checked).
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// The async trait every transport must implement.
///
/// `send` must be safe to call concurrently: several streams and dispatched
/// methods share one transport.
///
/// # Object Safety
/// The trait is object-safe and is stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    /// Open the underlying connection, if the transport has one.
    async fn start(&self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Close the underlying connection. Pending requests fail.
    async fn stop(&self) {}

    /// Send `call` to the `api` endpoint and return the raw result.
    async fn send(&self, api: &str, call: ApiCall) -> Result<Value, TransportError>;

    /// Apply new options (endpoint URLs, timeouts). Takes effect on the next request.
    fn set_options(&self, _options: &TransportOptions) {}

    /// Return the current health status of this transport.
    fn health(&self) -> HealthStatus {
        HealthStatus::Unknown
    }

    /// Return the transport's current endpoint URL.
    fn url(&self) -> String;
}
