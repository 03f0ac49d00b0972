//! WebSocket JSON-RPC transport with lazy connect and auto-reconnect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;

use steemrpc_core::config::TransportOptions;
use steemrpc_core::error::TransportError;
use steemrpc_core::lifecycle::{Lifecycle, TransportEvent};
use steemrpc_core::request::{ApiCall, JsonRpcRequest, JsonRpcResponse, RpcId};
use steemrpc_core::transport::{HealthStatus, RpcTransport};

type Reply = oneshot::Sender<Result<Value, TransportError>>;
type PendingMap = Arc<Mutex<HashMap<u64, Reply>>>;

/// Connection settings captured when the background task starts.
#[derive(Debug, Clone, PartialEq)]
struct WsConfig {
    url: String,
    reconnect_initial: Duration,
    reconnect_max: Duration,
    request_timeout: Duration,
}

impl From<&TransportOptions> for WsConfig {
    fn from(options: &TransportOptions) -> Self {
        Self {
            url: options.websocket.clone(),
            reconnect_initial: options.reconnect_initial(),
            reconnect_max: options.reconnect_max(),
            request_timeout: options.request_timeout(),
        }
    }
}

/// Command sent from callers to the background WS task.
enum WsCommand {
    Send { req: JsonRpcRequest, tx: Reply },
    Close,
}

/// Handle on a running background task.
#[derive(Clone)]
struct TaskLink {
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    /// In-flight requests of this task, keyed by request id.
    pending: PendingMap,
}

/// WebSocket JSON-RPC transport.
///
/// A background task owns the socket. It is spawned by `start()` (or by the
/// first `send()`), reconnects with exponential backoff, and exits on `stop()`.
pub struct WsTransport {
    config: RwLock<WsConfig>,
    task: Mutex<Option<TaskLink>>,
    connected: Arc<AtomicBool>,
    next_id: AtomicU64,
    lifecycle: Lifecycle,
}

impl WsTransport {
    /// Create a transport for `options.websocket`. No connection is opened yet.
    pub fn new(options: &TransportOptions) -> Self {
        Self {
            config: RwLock::new(WsConfig::from(options)),
            task: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(1),
            lifecycle: Lifecycle::default(),
        }
    }

    /// Publish lifecycle events into `lifecycle`.
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Returns `true` while the background task is running.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|link| !link.cmd_tx.is_closed())
    }

    fn config(&self) -> WsConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Spawn the background task unless one is already running.
    fn ensure_task(&self) -> bool {
        let mut guard = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.as_ref().is_some_and(|link| !link.cmd_tx.is_closed()) {
            return false;
        }
        let (cmd_tx, rx) = mpsc::unbounded_channel::<WsCommand>();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let config = self.config();
        let lifecycle = self.lifecycle.clone();
        let connected = self.connected.clone();
        let task_pending = pending.clone();
        tokio::spawn(async move {
            ws_task(config, rx, task_pending, lifecycle, connected).await;
        });
        *guard = Some(TaskLink { cmd_tx, pending });
        true
    }

    /// Ask the background task to exit. Returns `true` if one was running.
    fn close_task(&self) -> bool {
        let link = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match link {
            Some(link) => {
                let _ = link.cmd_tx.send(WsCommand::Close);
                true
            }
            None => false,
        }
    }

    fn link(&self) -> Option<TaskLink> {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.link()
            .map_or(0, |link| link.pending.lock().unwrap().len())
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close_task();
    }
}

#[async_trait]
impl RpcTransport for WsTransport {
    async fn start(&self) -> Result<(), TransportError> {
        if self.ensure_task() {
            self.lifecycle.emit(TransportEvent::Started {
                url: self.config().url,
            });
        }
        Ok(())
    }

    async fn stop(&self) {
        if self.close_task() {
            self.lifecycle.emit(TransportEvent::Stopped {
                url: self.config().url,
            });
        }
    }

    async fn send(&self, api: &str, call: ApiCall) -> Result<Value, TransportError> {
        self.start().await?;
        let link = self.link().ok_or(TransportError::NotStarted)?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::call(id, api, call);
        let (tx, rx) = oneshot::channel();
        link.cmd_tx
            .send(WsCommand::Send { req, tx })
            .map_err(|_| TransportError::WebSocket("WS task closed".into()))?;

        let timeout = self.config().request_timeout;
        match time::timeout(timeout, rx).await {
            Ok(reply) => {
                reply.map_err(|_| TransportError::WebSocket("WS response dropped".into()))?
            }
            Err(_) => {
                link.pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .remove(&id);
                Err(TransportError::Timeout {
                    ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// A changed URL closes the current connection; the next request reconnects.
    fn set_options(&self, options: &TransportOptions) {
        let next = WsConfig::from(options);
        let url_changed = {
            let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
            let changed = config.url != next.url;
            *config = next;
            changed
        };
        if url_changed && self.close_task() {
            tracing::info!(url = %options.websocket, "WebSocket endpoint changed, reconnecting on next request");
        }
    }

    fn health(&self) -> HealthStatus {
        if !self.is_running() {
            HealthStatus::Unhealthy
        } else if self.connected.load(Ordering::Relaxed) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }

    fn url(&self) -> String {
        self.config().url
    }
}

/// Background task that owns the WebSocket connection.
async fn ws_task(
    config: WsConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    pending: PendingMap,
    lifecycle: Lifecycle,
    connected: Arc<AtomicBool>,
) {
    let mut backoff = config.reconnect_initial;
    let url = config.url;

    loop {
        tracing::info!(url = %url, "connecting via WebSocket");

        let (ws_stream, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "WS connect failed, retrying in {backoff:?}");
                if !wait_backoff(backoff, &mut cmd_rx).await {
                    return;
                }
                backoff = (backoff * 2).min(config.reconnect_max);
                continue;
            }
        };

        backoff = config.reconnect_initial;
        connected.store(true, Ordering::Relaxed);
        lifecycle.emit(TransportEvent::Connected { url: url.clone() });
        let (mut sink, mut stream) = ws_stream.split();

        let closing = loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        None | Some(WsCommand::Close) => {
                            let _ = sink.close().await;
                            break true;
                        }
                        Some(WsCommand::Send { req, tx }) => {
                            let id = match &req.id { RpcId::Number(n) => *n, _ => 0 };
                            let msg = match serde_json::to_string(&req) {
                                Ok(msg) => msg,
                                Err(e) => {
                                    let _ = tx.send(Err(e.into()));
                                    continue;
                                }
                            };
                            {
                                // checked under the lock the timed-out caller removes with
                                let mut in_flight = pending.lock().unwrap_or_else(PoisonError::into_inner);
                                if tx.is_closed() {
                                    continue;
                                }
                                in_flight.insert(id, tx);
                            }
                            if let Err(e) = sink.send(Message::Text(msg.into())).await {
                                tracing::warn!(error = %e, "WS send failed");
                                break false;
                            }
                        }
                    }
                }
                msg = stream.next() => {
                    match msg {
                        None => break false,
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "WS receive error");
                            break false;
                        }
                        Some(Ok(Message::Text(text))) => handle_message(text.as_str(), &pending),
                        Some(Ok(Message::Close(_))) => break false,
                        _ => {}
                    }
                }
            }
        };

        connected.store(false, Ordering::Relaxed);
        fail_pending(&pending, "connection closed");
        lifecycle.emit(TransportEvent::Disconnected { url: url.clone() });

        if closing {
            return;
        }

        tracing::warn!(url = %url, "WS disconnected, reconnecting in {backoff:?}");
        if !wait_backoff(backoff, &mut cmd_rx).await {
            return;
        }
        backoff = (backoff * 2).min(config.reconnect_max);
    }
}

/// Sleep for `delay` while rejecting requests that arrive in the meantime.
/// Returns `false` if the transport was stopped.
async fn wait_backoff(delay: Duration, cmd_rx: &mut mpsc::UnboundedReceiver<WsCommand>) -> bool {
    let sleep = time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = cmd_rx.recv() => match cmd {
                None | Some(WsCommand::Close) => return false,
                Some(WsCommand::Send { tx, .. }) => {
                    let _ = tx.send(Err(TransportError::WebSocket("not connected, reconnecting".into())));
                }
            }
        }
    }
}

fn fail_pending(pending: &PendingMap, reason: &str) {
    let drained: Vec<Reply> = pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .drain()
        .map(|(_, tx)| tx)
        .collect();
    for tx in drained {
        let _ = tx.send(Err(TransportError::WebSocket(reason.to_string())));
    }
}

fn handle_message(text: &str, pending: &PendingMap) {
    let resp = match serde_json::from_str::<JsonRpcResponse>(text) {
        Ok(resp) => resp,
        Err(_) => {
            tracing::debug!("ignoring non-response WS message");
            return;
        }
    };
    let id = match &resp.id {
        RpcId::Number(n) => *n,
        _ => return,
    };
    let tx = pending
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .remove(&id);
    match tx {
        Some(tx) => {
            let _ = tx.send(resp.into_result().map_err(TransportError::Rpc));
        }
        None => tracing::debug!(id, "response for unknown request id"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_with(id: u64) -> (PendingMap, oneshot::Receiver<Result<Value, TransportError>>) {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (tx, rx) = oneshot::channel();
        pending.lock().unwrap().insert(id, tx);
        (pending, rx)
    }

    #[test]
    fn response_routed_by_id() {
        let (pending, mut rx) = pending_with(4);
        handle_message(r#"{"id":4,"jsonrpc":"2.0","result":{"head_block_number":9}}"#, &pending);

        let result = rx.try_recv().unwrap().unwrap();
        assert_eq!(result["head_block_number"], 9);
        assert!(pending.lock().unwrap().is_empty());
    }

    #[test]
    fn node_error_becomes_rpc_error() {
        let (pending, mut rx) = pending_with(2);
        handle_message(
            r#"{"id":2,"error":{"code":-32003,"message":"Unable to acquire database lock"}}"#,
            &pending,
        );

        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, TransportError::Rpc(ref e) if e.code == -32003));
    }

    #[test]
    fn unknown_id_and_garbage_ignored() {
        let (pending, mut rx) = pending_with(1);
        handle_message(r#"{"id":99,"result":null}"#, &pending);
        handle_message("not json", &pending);

        assert!(rx.try_recv().is_err());
        assert_eq!(pending.lock().unwrap().len(), 1);
    }

    #[test]
    fn disconnect_fails_pending_requests() {
        let (pending, mut rx) = pending_with(7);
        fail_pending(&pending, "connection closed");

        let err = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(err, TransportError::WebSocket(_)));
    }

    #[tokio::test]
    async fn set_options_with_new_url_stops_task() {
        let transport = WsTransport::new(&TransportOptions {
            websocket: "ws://127.0.0.1:1".into(),
            ..TransportOptions::default()
        });
        transport.start().await.unwrap();
        assert!(transport.is_running());

        transport.set_options(&TransportOptions {
            websocket: "ws://127.0.0.1:2".into(),
            ..TransportOptions::default()
        });
        assert!(!transport.is_running());
        assert_eq!(transport.url(), "ws://127.0.0.1:2");
    }

    /// Accepts WebSocket connections and never answers.
    async fn silent_node() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    if let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await {
                        while let Some(Ok(_)) = ws.next().await {}
                    }
                });
            }
        });
        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn timed_out_request_is_dropped_from_pending() {
        let transport = WsTransport::new(&TransportOptions {
            websocket: silent_node().await,
            request_timeout_ms: 200,
            ..TransportOptions::default()
        });

        for _ in 0..3 {
            let err = transport
                .send("database_api", ApiCall::new("get_config", vec![]))
                .await
                .unwrap_err();
            assert!(matches!(err, TransportError::Timeout { ms: 200 }), "{err:?}");
        }
        assert!(transport.is_running());
        assert_eq!(transport.pending_len(), 0);
        transport.stop().await;
    }

    #[tokio::test]
    async fn send_after_stop_restarts_task() {
        let transport = WsTransport::new(&TransportOptions {
            websocket: silent_node().await,
            request_timeout_ms: 200,
            ..TransportOptions::default()
        });
        transport.start().await.unwrap();
        transport.stop().await;
        assert!(!transport.is_running());

        let err = transport
            .send("database_api", ApiCall::new("get_config", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }), "{err:?}");
        assert!(transport.is_running());
        transport.stop().await;
    }

    #[tokio::test]
    async fn stop_emits_lifecycle_event() {
        let lifecycle = Lifecycle::default();
        let mut rx = lifecycle.subscribe();
        let transport = WsTransport::new(&TransportOptions {
            websocket: "ws://127.0.0.1:1".into(),
            ..TransportOptions::default()
        })
        .with_lifecycle(lifecycle);

        transport.start().await.unwrap();
        transport.stop().await;

        assert!(matches!(rx.recv().await.unwrap(), TransportEvent::Started { .. }));
        let mut saw_stopped = false;
        while let Ok(event) = rx.try_recv() {
            saw_stopped |= matches!(event, TransportEvent::Stopped { .. });
        }
        assert!(saw_stopped);
        assert_eq!(transport.health(), HealthStatus::Unhealthy);
    }
}
