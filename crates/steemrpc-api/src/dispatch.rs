//! Binding catalog entries into callable methods.
//!
//! Every descriptor becomes a [`GeneratedMethod`] with two argument styles:
//! positional (`call`) and structural (`call_with`, an options object keyed
//! by parameter name). Both resolve to the same `params` array. Each style has
//! an async form and an error-first callback form spawned on the runtime.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use steemrpc_core::request::ApiCall;

use crate::broadcast::{self, BROADCAST_SYNCHRONOUS};
use crate::client::Steem;
use crate::error::Error;
use crate::methods::{MethodCatalog, MethodDescriptor};

/// What happens when the transport reports an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePath {
    /// The transport error is returned unchanged.
    Passthrough,
    /// The error is decorated with digest / transaction id / serialized form.
    EnrichBroadcast,
}

/// A catalog entry bound for dispatch.
#[derive(Debug, Clone)]
pub struct GeneratedMethod {
    name: String,
    descriptor: Arc<MethodDescriptor>,
    failure: FailurePath,
}

impl GeneratedMethod {
    pub fn bind(descriptor: MethodDescriptor) -> Self {
        let failure = if descriptor.remote_method == BROADCAST_SYNCHRONOUS {
            FailurePath::EnrichBroadcast
        } else {
            FailurePath::Passthrough
        };
        Self {
            name: descriptor.name(),
            descriptor: Arc::new(descriptor),
            failure,
        }
    }

    /// Positional form name, e.g. `get_block`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Structural form name, e.g. `get_block_with`.
    pub fn structural_name(&self) -> String {
        format!("{}_with", self.name)
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.descriptor
    }

    pub fn failure_path(&self) -> FailurePath {
        self.failure
    }

    /// Zip positional arguments against the parameter names.
    ///
    /// Missing trailing arguments become `null`; surplus arguments are rejected.
    pub fn options_from_args(&self, args: Vec<Value>) -> Result<Map<String, Value>, Error> {
        let params = &self.descriptor.params;
        if args.len() > params.len() {
            return Err(Error::Arity {
                method: self.name.clone(),
                expected: params.len(),
                got: args.len(),
            });
        }
        let mut args = args.into_iter();
        Ok(params
            .iter()
            .map(|p| (p.clone(), args.next().unwrap_or(Value::Null)))
            .collect())
    }

    /// `[options[p] for p in params]`, absent keys as `null`.
    pub fn params_from_options(&self, options: &Map<String, Value>) -> Vec<Value> {
        self.descriptor
            .params
            .iter()
            .map(|p| options.get(p).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// The request the structural form sends for `options`.
    pub fn api_call(&self, options: &Map<String, Value>) -> ApiCall {
        ApiCall::new(
            self.descriptor.remote_method.clone(),
            self.params_from_options(options),
        )
    }
}

/// Local name → generated method, regenerated whenever a catalog is applied.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, GeneratedMethod>,
    order: Vec<String>,
}

impl MethodTable {
    pub fn from_catalog(catalog: &MethodCatalog) -> Self {
        let mut table = Self::default();
        for descriptor in catalog.iter() {
            let method = GeneratedMethod::bind(descriptor.clone());
            table.order.push(method.name.clone());
            table.methods.insert(method.name.clone(), method);
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&GeneratedMethod> {
        self.methods.get(name)
    }

    /// Look up `name`, failing with [`Error::UnknownMethod`].
    pub fn resolve(&self, name: &str) -> Result<&GeneratedMethod, Error> {
        self.get(name)
            .ok_or_else(|| Error::UnknownMethod(name.to_string()))
    }

    /// Generated methods in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &GeneratedMethod> {
        self.order.iter().filter_map(|name| self.methods.get(name))
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

/// A generated method bound to a client.
#[derive(Clone)]
pub struct Method {
    client: Steem,
    generated: GeneratedMethod,
}

impl Method {
    pub(crate) fn new(client: Steem, generated: GeneratedMethod) -> Self {
        Self { client, generated }
    }

    pub fn generated(&self) -> &GeneratedMethod {
        &self.generated
    }

    /// Positional form.
    pub async fn call(&self, args: Vec<Value>) -> Result<Value, Error> {
        let options = self.generated.options_from_args(args)?;
        self.call_with(&options).await
    }

    /// Structural form.
    pub async fn call_with(&self, options: &Map<String, Value>) -> Result<Value, Error> {
        let descriptor = self.generated.descriptor();
        let call = self.generated.api_call(options);
        let transport = self.client.transport();

        match self.generated.failure_path() {
            FailurePath::Passthrough => Ok(transport.send(&descriptor.endpoint, call).await?),
            FailurePath::EnrichBroadcast => {
                let trx = call.params.first().cloned().unwrap_or(Value::Null);
                match transport.send(&descriptor.endpoint, call).await {
                    Ok(result) => Ok(result),
                    Err(e) => Err(broadcast::enrich(e, &trx, self.client.serializer().as_ref())),
                }
            }
        }
    }

    /// Positional form, delivering to an error-first callback.
    pub fn call_cb<F>(&self, args: Vec<Value>, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Value, Error>) + Send + 'static,
    {
        let method = self.clone();
        tokio::spawn(async move { callback(method.call(args).await) })
    }

    /// Structural form, delivering to an error-first callback.
    pub fn call_with_cb<F>(&self, options: Map<String, Value>, callback: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Value, Error>) + Send + 'static,
    {
        let method = self.clone();
        tokio::spawn(async move { callback(method.call_with(&options).await) })
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.generated.name)
            .field("endpoint", &self.generated.descriptor.endpoint)
            .finish()
    }
}
