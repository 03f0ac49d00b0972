//! The few node response shapes the client looks inside.
//!
//! Only the fields the pipeline relies on are typed; everything else the node
//! sends is kept in `extra` and serialized back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An operation is opaque to the client: `[type, payload]` on Steem nodes.
pub type Operation = Value;

/// Response of `get_dynamic_global_properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicGlobalProperties {
    pub head_block_number: u64,
    pub last_irreversible_block_num: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A signed block as returned by `get_block`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A transaction inside a [`Block`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub operations: Vec<Operation>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
