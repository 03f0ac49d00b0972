//! Reliability policies used by the built-in transports.

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy};
