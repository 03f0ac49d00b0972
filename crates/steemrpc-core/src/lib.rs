//! steemrpc-core: foundation traits and types for steemrpc.
//!
//! # Overview
//!
//! The core crate defines what every transport has to provide and what the
//! API layer consumes:
//!
//! - [`RpcTransport`]: the async trait every transport implements
//! - [`ApiCall`] / [`JsonRpcRequest`] / [`JsonRpcResponse`]: wire types
//! - [`TransportError`]: structured error type
//! - [`TransportOptions`]: endpoint URLs, timeouts and reconnect settings
//! - [`Lifecycle`]: transport lifecycle notifications
//! - [`policy`] module: retry backoff

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod policy;
pub mod request;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use config::TransportOptions;
pub use error::TransportError;
pub use lifecycle::{Lifecycle, TransportEvent};
pub use request::{ApiCall, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use transport::{HealthStatus, RpcTransport};
