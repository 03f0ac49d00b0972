//! steemrpc-http: HTTP JSON-RPC transport.
//!
//! Every call is a single `POST` of the `call` envelope. Transient failures
//! (connection errors, non-2xx statuses, timeouts) are retried with
//! exponential backoff; node-side errors are returned immediately.

pub mod client;

pub use client::HttpTransport;
