//! HTTP JSON-RPC transport backed by `reqwest`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use steemrpc_core::config::TransportOptions;
use steemrpc_core::error::TransportError;
use steemrpc_core::lifecycle::{Lifecycle, TransportEvent};
use steemrpc_core::policy::{RetryConfig, RetryPolicy};
use steemrpc_core::request::{ApiCall, JsonRpcRequest, JsonRpcResponse};
use steemrpc_core::transport::{HealthStatus, RpcTransport};

#[derive(Debug, Clone)]
struct Settings {
    uri: String,
    retry: RetryPolicy,
    timeout: Duration,
}

impl From<&TransportOptions> for Settings {
    fn from(options: &TransportOptions) -> Self {
        Self {
            uri: options.uri.clone(),
            retry: RetryPolicy::new(RetryConfig::from(options)),
            timeout: options.request_timeout(),
        }
    }
}

/// HTTP JSON-RPC transport.
pub struct HttpTransport {
    settings: RwLock<Settings>,
    http: reqwest::Client,
    next_id: AtomicU64,
    lifecycle: Option<Lifecycle>,
}

impl HttpTransport {
    /// Create a transport posting to `options.uri`.
    pub fn new(options: &TransportOptions) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            settings: RwLock::new(Settings::from(options)),
            http,
            next_id: AtomicU64::new(0),
            lifecycle: None,
        })
    }

    /// Publish `Started`/`Stopped` events into `lifecycle`.
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn current_uri(&self) -> String {
        self.settings().uri
    }

    fn emit(&self, event: TransportEvent) {
        if let Some(lifecycle) = &self.lifecycle {
            lifecycle.emit(event);
        }
    }

    async fn send_once(
        &self,
        settings: &Settings,
        req: &JsonRpcRequest,
    ) -> Result<Value, TransportError> {
        let resp = self
            .http
            .post(&settings.uri)
            .timeout(settings.timeout)
            .json(req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        ms: u64::try_from(settings.timeout.as_millis()).unwrap_or(u64::MAX),
                    }
                } else {
                    TransportError::Http(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;
        // decode failures are final, never retried
        let body: JsonRpcResponse = serde_json::from_str(&text)?;
        body.into_result().map_err(TransportError::Rpc)
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn start(&self) -> Result<(), TransportError> {
        self.emit(TransportEvent::Started {
            url: self.current_uri(),
        });
        Ok(())
    }

    async fn stop(&self) {
        self.emit(TransportEvent::Stopped {
            url: self.current_uri(),
        });
    }

    async fn send(&self, api: &str, call: ApiCall) -> Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let method = call.method.clone();
        let req = JsonRpcRequest::call(id, api, call);
        let settings = self.settings();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(&settings, &req).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() => match settings.retry.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            api,
                            method = %method,
                            "retrying request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(
                            attempt,
                            error = %e,
                            url = %settings.uri,
                            "max retries exceeded"
                        );
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }

    fn set_options(&self, options: &TransportOptions) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = Settings::from(options);
    }

    fn health(&self) -> HealthStatus {
        HealthStatus::Unknown
    }

    fn url(&self) -> String {
        self.current_uri()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn set_options_switches_endpoint() {
        let transport = HttpTransport::new(&TransportOptions::default()).unwrap();
        assert_eq!(transport.url(), "https://api.steemit.com");

        transport.set_options(&TransportOptions {
            uri: "http://127.0.0.1:8090".into(),
            max_retries: 0,
            ..TransportOptions::default()
        });
        assert_eq!(transport.url(), "http://127.0.0.1:8090");
        assert_eq!(transport.settings().retry.config.max_retries, 0);
    }

    #[tokio::test]
    async fn start_and_stop_publish_events() {
        let lifecycle = Lifecycle::default();
        let mut rx = lifecycle.subscribe();
        let transport = HttpTransport::new(&TransportOptions::default())
            .unwrap()
            .with_lifecycle(lifecycle);

        transport.start().await.unwrap();
        transport.stop().await;

        assert!(matches!(rx.try_recv().unwrap(), TransportEvent::Started { .. }));
        assert!(matches!(rx.try_recv().unwrap(), TransportEvent::Stopped { .. }));
    }

    /// Answers every request with `200 OK` and a body that is not JSON-RPC,
    /// counting the requests it served.
    async fn garbled_node(served: Arc<AtomicUsize>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                read_request(&mut socket).await;
                served.fetch_add(1, Ordering::SeqCst);
                let body = "<html>bad gateway</html>";
                let reply = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn malformed_body_is_not_retried() {
        let served = Arc::new(AtomicUsize::new(0));
        let transport = HttpTransport::new(&TransportOptions {
            uri: garbled_node(served.clone()).await,
            max_retries: 3,
            ..TransportOptions::default()
        })
        .unwrap();

        let err = transport
            .send("database_api", ApiCall::new("get_config", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Deserialization(_)), "{err:?}");
        assert!(!err.is_retryable());
        assert_eq!(served.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_node_is_an_http_error() {
        let transport = HttpTransport::new(&TransportOptions {
            uri: "http://127.0.0.1:1".into(),
            max_retries: 0,
            request_timeout_ms: 1_000,
            ..TransportOptions::default()
        })
        .unwrap();

        let err = transport
            .send("database_api", ApiCall::new("get_config", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Http(_)), "{err:?}");
    }
}
