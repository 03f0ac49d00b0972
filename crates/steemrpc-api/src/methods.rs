//! Declarative method catalog.
//!
//! A catalog is an ordered list of [`MethodDescriptor`]s in the node's JSON
//! format (`{api, method, params?, method_name?}`). It carries no behavior;
//! [`crate::dispatch::MethodTable`] binds it to a transport.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::Error;

const BUILTIN_CATALOG: &str = include_str!("methods.json");

/// Catalog entries the client does not expose. They are dropped before binding.
pub const UNSUPPORTED_METHODS: &[&str] = &[
    "broadcast_transaction",
    "broadcast_transaction_with_callback",
];

/// One remote method.
///
/// `params` order is the positional argument order and the key set of the
/// structural options object; it must match the node's parameter order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Endpoint (API namespace) the call is routed to, e.g. `database_api`.
    #[serde(rename = "api")]
    pub endpoint: String,
    /// Remote procedure name, e.g. `get_block`.
    #[serde(rename = "method")]
    pub remote_method: String,
    /// Ordered parameter names.
    #[serde(default)]
    pub params: Vec<String>,
    /// Overrides the derived local name.
    #[serde(rename = "method_name", default, skip_serializing_if = "Option::is_none")]
    pub local_name: Option<String>,
}

impl MethodDescriptor {
    pub fn new<I, S>(endpoint: impl Into<String>, remote_method: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoint: endpoint.into(),
            remote_method: remote_method.into(),
            params: params.into_iter().map(Into::into).collect(),
            local_name: None,
        }
    }

    pub fn with_local_name(mut self, name: impl Into<String>) -> Self {
        self.local_name = Some(name.into());
        self
    }

    /// The name the method is exposed under: the override if present,
    /// otherwise the remote name in snake_case.
    pub fn name(&self) -> String {
        match &self.local_name {
            Some(name) => name.clone(),
            None => to_snake_case(&self.remote_method),
        }
    }
}

/// Convert `getDynamicGlobalProperties` / `get-block` / `get_block` to snake_case.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev_lower = false;
    for c in name.chars() {
        if c == '-' || c == ' ' {
            out.push('_');
            prev_lower = false;
        } else if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else {
            out.push(c);
            prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// An ordered, validated set of descriptors with unique local names.
#[derive(Debug, Clone, Default)]
pub struct MethodCatalog {
    descriptors: Vec<MethodDescriptor>,
}

impl MethodCatalog {
    /// Build a catalog, dropping entries whose local name is in `exclude`.
    ///
    /// Two descriptors deriving the same local name is a construction error.
    pub fn new(descriptors: Vec<MethodDescriptor>, exclude: &[&str]) -> Result<Self, Error> {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let name = descriptor.name();
            if exclude.contains(&name.as_str()) {
                continue;
            }
            if !seen.insert(name.clone()) {
                return Err(Error::Catalog(format!(
                    "duplicate local name `{name}` ({}.{})",
                    descriptor.endpoint, descriptor.remote_method
                )));
            }
            kept.push(descriptor);
        }
        Ok(Self { descriptors: kept })
    }

    /// Parse a JSON catalog.
    pub fn from_json(json: &str, exclude: &[&str]) -> Result<Self, Error> {
        let descriptors: Vec<MethodDescriptor> =
            serde_json::from_str(json).map_err(|e| Error::Catalog(e.to_string()))?;
        Self::new(descriptors, exclude)
    }

    /// The catalog shipped with the crate, minus [`UNSUPPORTED_METHODS`].
    ///
    /// # Panics
    ///
    /// Never in practice: the embedded catalog is checked by the unit tests to
    /// parse and to have unique local names.
    pub fn builtin() -> Self {
        Self::from_json(BUILTIN_CATALOG, UNSUPPORTED_METHODS)
            .expect("built-in method catalog is valid")
    }

    pub fn get(&self, name: &str) -> Option<&MethodDescriptor> {
        self.descriptors.iter().find(|d| d.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.descriptors.iter()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl IntoIterator for MethodCatalog {
    type Item = MethodDescriptor;
    type IntoIter = std::vec::IntoIter<MethodDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.into_iter()
    }
}
