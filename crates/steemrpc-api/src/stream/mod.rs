//! Polling streams.
//!
//! ```text
//! stream_block_number ─► stream_block ─► stream_transactions ─► stream_operations
//! ```
//!
//! Each layer consumes the one to its left and exposes a [`StreamHandle`].
//! Cancelling a handle also cancels every layer upstream of it. The first
//! error at any layer is delivered once to that layer's callback, after which
//! the layer and everything upstream of it stop.

mod block;
mod block_number;
mod handle;
mod operations;
mod transactions;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::DynamicGlobalProperties;

pub use block_number::BlockCursor;
pub use handle::StreamHandle;

/// Polling period used when none is configured.
pub const DEFAULT_INTERVAL_MS: u64 = 200;

/// Which block number a stream follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// `head_block_number`.
    #[default]
    Head,
    /// `last_irreversible_block_num`.
    Irreversible,
}

impl StreamMode {
    /// The block number this mode reads from `props`.
    pub fn select(&self, props: &DynamicGlobalProperties) -> u64 {
        match self {
            Self::Head => props.head_block_number,
            Self::Irreversible => props.last_irreversible_block_num,
        }
    }
}

impl FromStr for StreamMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "head" => Ok(Self::Head),
            "irreversible" => Ok(Self::Irreversible),
            other => Err(Error::InvalidConfig(format!(
                "stream mode must be `head` or `irreversible`, got {other:?}"
            ))),
        }
    }
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Head => "head",
            Self::Irreversible => "irreversible",
        })
    }
}

fn default_interval_ms() -> u64 {
    DEFAULT_INTERVAL_MS
}

/// Stream settings shared by every layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub mode: StreamMode,
    /// Milliseconds between block number polls.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            mode: StreamMode::Head,
            interval_ms: DEFAULT_INTERVAL_MS,
        }
    }
}

impl StreamConfig {
    pub fn head() -> Self {
        Self::default()
    }

    pub fn irreversible() -> Self {
        Self {
            mode: StreamMode::Irreversible,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}
