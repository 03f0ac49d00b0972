//! Error enrichment for `broadcast_transaction_synchronous`.
//!
//! When the node rejects a synchronous broadcast, the error is decorated with
//! what is needed to identify the transaction offline: a SHA-256 digest of its
//! binary serialization, a transaction id derived from the same bytes, and a
//! human-readable JSON form. Serialization itself sits behind
//! [`TransactionSerializer`].

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use steemrpc_core::error::TransportError;

use crate::error::Error;

/// Remote method whose failures are enriched.
pub const BROADCAST_SYNCHRONOUS: &str = "broadcast_transaction_synchronous";

/// Binary and object serialization of a signed transaction.
pub trait TransactionSerializer: Send + Sync {
    /// Canonical binary serialization.
    fn to_buffer(&self, trx: &Value) -> Result<Vec<u8>, Error>;

    /// Serializable (human-inspectable) form.
    fn to_object(&self, trx: &Value) -> Result<Value, Error>;
}

/// Serializes transactions as compact JSON with keys in sorted order.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTransactionSerializer;

impl TransactionSerializer for JsonTransactionSerializer {
    fn to_buffer(&self, trx: &Value) -> Result<Vec<u8>, Error> {
        // serde_json's default Map is a BTreeMap, so keys come out sorted.
        serde_json::to_vec(trx).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn to_object(&self, trx: &Value) -> Result<Value, Error> {
        Ok(trx.clone())
    }
}

/// A failed synchronous broadcast.
#[derive(Debug, Error)]
#[error("broadcast failed: {source} (digest {digest})")]
pub struct BroadcastError {
    /// The transport error reported for the broadcast call.
    pub source: TransportError,
    /// Hex SHA-256 of the serialized transaction.
    pub digest: String,
    /// Hex of the serialized transaction.
    pub transaction_id: String,
    /// JSON of the transaction's object form.
    pub transaction: String,
}

/// Decorate `source` with digest, id and serialized form of `trx`.
///
/// If the transaction cannot be serialized the original error is returned
/// unchanged.
pub fn enrich(source: TransportError, trx: &Value, serializer: &dyn TransactionSerializer) -> Error {
    let decorated = serializer.to_buffer(trx).and_then(|buf| {
        let object = serializer.to_object(trx)?;
        let transaction =
            serde_json::to_string(&object).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok((hex::encode(Sha256::digest(&buf)), hex::encode(&buf), transaction))
    });

    match decorated {
        Ok((digest, transaction_id, transaction)) => {
            tracing::debug!(digest = %digest, error = %source, "synchronous broadcast rejected");
            Error::Broadcast(Box::new(BroadcastError {
                source,
                digest,
                transaction_id,
                transaction,
            }))
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not serialize rejected transaction");
            Error::Transport(source)
        }
    }
}
