//! A scripted in-memory transport for tests.
//!
//! Responses come from a closure so tests can script sequences (successive
//! head block numbers, failing endpoints) without a node. Every request is
//! recorded and can be inspected afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::TransportOptions;
use crate::error::TransportError;
use crate::request::ApiCall;
use crate::transport::{HealthStatus, RpcTransport};

type Responder = dyn Fn(&str, &ApiCall) -> Result<Value, TransportError> + Send + Sync;

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub api: String,
    pub call: ApiCall,
}

pub struct MockTransport {
    responder: Box<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
    options: Mutex<Option<TransportOptions>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl MockTransport {
    /// Answer every request with `responder(api, call)`.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str, &ApiCall) -> Result<Value, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
            options: Mutex::new(None),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        }
    }

    /// Answer every request with the same value.
    pub fn fixed(value: Value) -> Self {
        Self::new(move |_, _| Ok(value.clone()))
    }

    /// All requests sent so far, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of requests sent to `method`.
    pub fn count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.call.method == method)
            .count()
    }

    /// The options most recently applied via `set_options`.
    pub fn last_options(&self) -> Option<TransportOptions> {
        self.options.lock().unwrap().clone()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn start(&self) -> Result<(), TransportError> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    async fn send(&self, api: &str, call: ApiCall) -> Result<Value, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            api: api.to_string(),
            call: call.clone(),
        });
        (self.responder)(api, &call)
    }

    fn set_options(&self, options: &TransportOptions) {
        *self.options.lock().unwrap() = Some(options.clone());
    }

    fn health(&self) -> HealthStatus {
        HealthStatus::Healthy
    }

    fn url(&self) -> String {
        "mock://".into()
    }
}
