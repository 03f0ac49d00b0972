//! The [`Steem`] client: one active transport, a generated method table and
//! the streaming entry points.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::{json, Map, Value};
use tokio::sync::broadcast;

use steemrpc_core::lifecycle::{Lifecycle, TransportEvent};
use steemrpc_core::request::ApiCall;
use steemrpc_core::transport::RpcTransport;
use steemrpc_http::HttpTransport;
use steemrpc_ws::WsTransport;

use crate::broadcast::{JsonTransactionSerializer, TransactionSerializer};
use crate::dispatch::{Method, MethodTable};
use crate::error::Error;
use crate::methods::MethodCatalog;
use crate::options::{ClientOptions, TransportKind};
use crate::types::{Block, DynamicGlobalProperties};

struct ActiveTransport {
    /// `None` for a caller-supplied transport.
    kind: Option<TransportKind>,
    transport: Arc<dyn RpcTransport>,
}

struct Inner {
    options: RwLock<ClientOptions>,
    active: RwLock<ActiveTransport>,
    methods: RwLock<Arc<MethodTable>>,
    serializer: Arc<dyn TransactionSerializer>,
    lifecycle: Lifecycle,
}

/// Steem JSON-RPC client.
///
/// Cheap to clone; clones share the transport, method table and lifecycle hub.
#[derive(Clone)]
pub struct Steem {
    inner: Arc<Inner>,
}

impl Steem {
    /// Build a client with the built-in catalog and a transport selected by
    /// `options.transport`.
    pub fn new(options: ClientOptions) -> Result<Self, Error> {
        Self::builder().options(options).build()
    }

    pub fn builder() -> SteemBuilder {
        SteemBuilder::default()
    }

    /// The currently active transport.
    pub fn transport(&self) -> Arc<dyn RpcTransport> {
        let active = self.inner.active.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&active.transport)
    }

    /// Built-in kind of the active transport, `None` when caller-supplied.
    pub fn transport_kind(&self) -> Option<TransportKind> {
        self.inner
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .kind
    }

    pub fn options(&self) -> ClientOptions {
        self.inner
            .options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn methods(&self) -> Arc<MethodTable> {
        let methods = self.inner.methods.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&methods)
    }

    pub fn serializer(&self) -> Arc<dyn TransactionSerializer> {
        Arc::clone(&self.inner.serializer)
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.inner.lifecycle
    }

    /// Subscribe to transport lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<TransportEvent> {
        self.inner.lifecycle.subscribe()
    }

    pub async fn start(&self) -> Result<(), Error> {
        let (kind, transport) = self.active();
        transport.start().await?;
        if kind.is_none() {
            self.inner.lifecycle.emit(TransportEvent::Started { url: transport.url() });
        }
        Ok(())
    }

    pub async fn stop(&self) {
        let (kind, transport) = self.active();
        transport.stop().await;
        if kind.is_none() {
            self.inner.lifecycle.emit(TransportEvent::Stopped { url: transport.url() });
        }
    }

    /// Forward a raw call to the active transport.
    pub async fn send(&self, api: &str, call: ApiCall) -> Result<Value, Error> {
        Ok(self.transport().send(api, call).await?)
    }

    /// Update options in place.
    ///
    /// When the resulting transport kind differs from the active one, a new
    /// transport is built and the previous one is stopped. An invalid
    /// `transport` leaves the client unchanged.
    pub async fn set_options<F>(&self, update: F) -> Result<(), Error>
    where
        F: FnOnce(&mut ClientOptions),
    {
        let mut next = self.options();
        update(&mut next);

        let (active_kind, _) = self.active();
        let target = match (&next.transport, active_kind) {
            (Some(_), _) => Some(next.transport_kind()?),
            (None, None) => None,
            (None, Some(_)) => Some(TransportKind::Ws),
        };

        let mut replaced = None;
        if target != active_kind {
            if let Some(kind) = target {
                let transport =
                    build_transport(kind, &next, self.inner.lifecycle.clone())?;
                let mut active = self.inner.active.write().unwrap_or_else(PoisonError::into_inner);
                let previous = std::mem::replace(&mut active.transport, transport);
                active.kind = Some(kind);
                replaced = Some(previous);
                tracing::info!(transport = %kind, "switched transport");
            }
        }

        *self.inner.options.write().unwrap_or_else(PoisonError::into_inner) = next.clone();

        if let Some(previous) = replaced {
            previous.stop().await;
        }
        self.transport().set_options(&next.transport_options);
        Ok(())
    }

    /// Point the HTTP endpoint at `uri`.
    pub async fn set_uri(&self, uri: impl Into<String>) -> Result<(), Error> {
        let uri = uri.into();
        self.set_options(|o| o.transport_options.uri = uri).await
    }

    /// Point the WebSocket endpoint at `url`.
    pub async fn set_websocket(&self, url: impl Into<String>) -> Result<(), Error> {
        let url = url.into();
        self.set_options(|o| o.transport_options.websocket = url).await
    }

    /// Replace the generated method table with one built from `catalog`.
    pub fn apply_catalog(&self, catalog: &MethodCatalog) {
        let table = Arc::new(MethodTable::from_catalog(catalog));
        tracing::debug!(methods = table.len(), "applied method catalog");
        *self.inner.methods.write().unwrap_or_else(PoisonError::into_inner) = table;
    }

    /// The generated method called `name`.
    pub fn method(&self, name: &str) -> Result<Method, Error> {
        let generated = self.methods().resolve(name)?.clone();
        Ok(Method::new(self.clone(), generated))
    }

    /// Positional call by local method name.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> Result<Value, Error> {
        self.method(name)?.call(args).await
    }

    /// Structural call by local method name.
    pub async fn call_with(&self, name: &str, options: &Map<String, Value>) -> Result<Value, Error> {
        self.method(name)?.call_with(options).await
    }

    pub async fn get_dynamic_global_properties(&self) -> Result<DynamicGlobalProperties, Error> {
        const METHOD: &str = "get_dynamic_global_properties";
        let value = self.call(METHOD, Vec::new()).await?;
        serde_json::from_value(value).map_err(|e| Error::UnexpectedResponse {
            method: METHOD.into(),
            reason: e.to_string(),
        })
    }

    /// Fetch block `block_num`. A `null` answer is [`Error::BlockNotFound`].
    pub async fn get_block(&self, block_num: u64) -> Result<Block, Error> {
        const METHOD: &str = "get_block";
        let value = self.call(METHOD, vec![json!(block_num)]).await?;
        if value.is_null() {
            return Err(Error::BlockNotFound(block_num));
        }
        serde_json::from_value(value).map_err(|e| Error::UnexpectedResponse {
            method: METHOD.into(),
            reason: e.to_string(),
        })
    }

    pub async fn broadcast_transaction_synchronous(&self, trx: Value) -> Result<Value, Error> {
        self.call(crate::broadcast::BROADCAST_SYNCHRONOUS, vec![trx]).await
    }

    fn active(&self) -> (Option<TransportKind>, Arc<dyn RpcTransport>) {
        let active = self.inner.active.read().unwrap_or_else(PoisonError::into_inner);
        (active.kind, Arc::clone(&active.transport))
    }
}

impl std::fmt::Debug for Steem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (kind, transport) = self.active();
        f.debug_struct("Steem")
            .field("transport", &kind)
            .field("url", &transport.url())
            .field("methods", &self.methods().len())
            .finish()
    }
}

fn build_transport(
    kind: TransportKind,
    options: &ClientOptions,
    lifecycle: Lifecycle,
) -> Result<Arc<dyn RpcTransport>, Error> {
    let transport: Arc<dyn RpcTransport> = match kind {
        TransportKind::Http => {
            Arc::new(HttpTransport::new(&options.transport_options)?.with_lifecycle(lifecycle))
        }
        TransportKind::Ws => {
            Arc::new(WsTransport::new(&options.transport_options).with_lifecycle(lifecycle))
        }
    };
    Ok(transport)
}

/// Builder for [`Steem`].
#[derive(Default)]
pub struct SteemBuilder {
    options: ClientOptions,
    transport: Option<Arc<dyn RpcTransport>>,
    catalog: Option<MethodCatalog>,
    serializer: Option<Arc<dyn TransactionSerializer>>,
    lifecycle: Option<Lifecycle>,
}

impl SteemBuilder {
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a caller-supplied transport instead of a built-in one.
    pub fn transport(mut self, transport: Arc<dyn RpcTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn catalog(mut self, catalog: MethodCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn serializer(mut self, serializer: Arc<dyn TransactionSerializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    pub fn lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn build(self) -> Result<Steem, Error> {
        let lifecycle = self.lifecycle.unwrap_or_default();
        let active = match self.transport {
            Some(transport) => ActiveTransport { kind: None, transport },
            None => {
                let kind = self.options.transport_kind()?;
                ActiveTransport {
                    kind: Some(kind),
                    transport: build_transport(kind, &self.options, lifecycle.clone())?,
                }
            }
        };
        let catalog = self.catalog.unwrap_or_else(MethodCatalog::builtin);
        let methods = MethodTable::from_catalog(&catalog);
        tracing::debug!(
            transport = ?active.kind,
            url = %active.transport.url(),
            methods = methods.len(),
            "steem client built"
        );

        Ok(Steem {
            inner: Arc::new(Inner {
                options: RwLock::new(self.options),
                active: RwLock::new(active),
                methods: RwLock::new(Arc::new(methods)),
                serializer: self
                    .serializer
                    .unwrap_or_else(|| Arc::new(JsonTransactionSerializer)),
                lifecycle,
            }),
        })
    }
}
