//! steemrpc-api: the client surface of steemrpc.
//!
//! # Architecture
//!
//! ```text
//! Steem (client)
//!   ├── MethodTable        catalog entries bound to the active transport
//!   │     └── GeneratedMethod  positional + `_with` forms, async + callback
//!   ├── broadcast          enriched errors for broadcast_transaction_synchronous
//!   ├── stream             block number → block → transaction → operation
//!   └── Arc<dyn RpcTransport>  HTTP, WebSocket or custom
//! ```
//!
//! # Quick start
//! ```rust,no_run
//! use steemrpc_api::{ClientOptions, Steem, StreamConfig};
//!
//! # async fn run() -> Result<(), steemrpc_api::Error> {
//! let steem = Steem::new(ClientOptions::http("https://api.steemit.com"))?;
//! let props = steem.get_dynamic_global_properties().await?;
//! println!("head = {}", props.head_block_number);
//!
//! let handle = steem.stream_operations(StreamConfig::default(), |op| match op {
//!     Ok(op) => println!("{op}"),
//!     Err(e) => eprintln!("stream stopped: {e}"),
//! });
//! handle.cancel();
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod methods;
pub mod options;
pub mod stream;
pub mod types;

pub use broadcast::{BroadcastError, JsonTransactionSerializer, TransactionSerializer};
pub use client::{Steem, SteemBuilder};
pub use dispatch::{FailurePath, GeneratedMethod, Method, MethodTable};
pub use error::Error;
pub use methods::{MethodCatalog, MethodDescriptor};
pub use options::{ClientOptions, TransportKind};
pub use stream::{StreamConfig, StreamHandle, StreamMode};
pub use types::{Block, DynamicGlobalProperties, Operation, Transaction};

pub use steemrpc_core::{ApiCall, Lifecycle, RpcTransport, TransportError, TransportEvent, TransportOptions};
