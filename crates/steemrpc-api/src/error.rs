//! Client-level error type.

use thiserror::Error;

use steemrpc_core::error::TransportError;

use crate::broadcast::BroadcastError;

/// Errors surfaced by the client, generated methods and streams.
#[derive(Debug, Error)]
pub enum Error {
    /// Passed through verbatim from the transport.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `transport` option named something other than `http` or `ws`.
    #[error("Invalid `transport` {0:?}, valid values are `http`, `ws` or a custom transport")]
    InvalidTransport(String),

    /// Options could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// No generated method with that local name.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// More positional arguments than the descriptor declares.
    #[error("{method} takes {expected} argument(s), got {got}")]
    Arity {
        method: String,
        expected: usize,
        got: usize,
    },

    /// `broadcast_transaction_synchronous` failed; carries the digest,
    /// transaction id and serialized transaction.
    #[error(transparent)]
    Broadcast(Box<BroadcastError>),

    /// A transaction could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The node answered with a shape the client cannot use.
    #[error("unexpected response for {method}: {reason}")]
    UnexpectedResponse { method: String, reason: String },

    /// The node has no block at this height.
    #[error("block {0} not found")]
    BlockNotFound(u64),

    /// The method catalog is malformed.
    #[error("invalid method catalog: {0}")]
    Catalog(String),
}

impl Error {
    /// The transport error underneath, if any (including inside a broadcast error).
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Broadcast(b) => Some(&b.source),
            _ => None,
        }
    }
}
