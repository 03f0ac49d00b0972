//! Client configuration.
//!
//! `ClientOptions` is plain serde data: it can be built in code, parsed from
//! JSON, or read from `STEEMRPC_*` environment variables. The transport name
//! is validated when the client is constructed, not when options are parsed.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use steemrpc_core::config::TransportOptions;

use crate::error::Error;

/// Built-in transport implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Http,
    Ws,
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(Self::Http),
            "ws" => Ok(Self::Ws),
            other => Err(Error::InvalidTransport(other.to_string())),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::Ws => write!(f, "ws"),
        }
    }
}

/// Options accepted by [`crate::Steem`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientOptions {
    /// `"http"` or `"ws"`. Absent means WebSocket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<String>,
    /// Endpoint URLs, timeouts and reconnect settings.
    #[serde(flatten)]
    pub transport_options: TransportOptions,
}

impl ClientOptions {
    /// HTTP transport against `uri`.
    pub fn http(uri: impl Into<String>) -> Self {
        Self {
            transport: Some("http".into()),
            transport_options: TransportOptions {
                uri: uri.into(),
                ..TransportOptions::default()
            },
        }
    }

    /// WebSocket transport against `url`.
    pub fn ws(url: impl Into<String>) -> Self {
        Self {
            transport: Some("ws".into()),
            transport_options: TransportOptions {
                websocket: url.into(),
                ..TransportOptions::default()
            },
        }
    }

    /// Parse options from a JSON document; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Defaults overridden by `STEEMRPC_TRANSPORT`, `STEEMRPC_URI` and
    /// `STEEMRPC_WEBSOCKET` when set.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(transport) = lookup("STEEMRPC_TRANSPORT") {
            self.transport = Some(transport);
        }
        if let Some(uri) = lookup("STEEMRPC_URI") {
            self.transport_options.uri = uri;
        }
        if let Some(websocket) = lookup("STEEMRPC_WEBSOCKET") {
            self.transport_options.websocket = websocket;
        }
        self
    }

    /// The selected transport kind.
    pub fn transport_kind(&self) -> Result<TransportKind, Error> {
        match &self.transport {
            Some(name) => name.parse(),
            None => Ok(TransportKind::Ws),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_transport_is_websocket() {
        assert_eq!(ClientOptions::default().transport_kind().unwrap(), TransportKind::Ws);
    }

    #[test]
    fn unknown_transport_rejected() {
        let opts = ClientOptions {
            transport: Some("carrier-pigeon".into()),
            ..ClientOptions::default()
        };
        assert!(matches!(
            opts.transport_kind(),
            Err(Error::InvalidTransport(name)) if name == "carrier-pigeon"
        ));
    }

    #[test]
    fn json_flattens_transport_options() {
        let opts = ClientOptions::from_json(
            r#"{"transport":"http","uri":"http://127.0.0.1:8090","max_retries":1}"#,
        )
        .unwrap();
        assert_eq!(opts.transport_kind().unwrap(), TransportKind::Http);
        assert_eq!(opts.transport_options.uri, "http://127.0.0.1:8090");
        assert_eq!(opts.transport_options.max_retries, 1);
        assert_eq!(opts.transport_options.websocket, "wss://steemd.steemit.com");
    }

    #[test]
    fn env_overrides_applied() {
        let opts = ClientOptions::default().with_overrides(|key| match key {
            "STEEMRPC_TRANSPORT" => Some("http".into()),
            "STEEMRPC_URI" => Some("http://node:8090".into()),
            _ => None,
        });
        assert_eq!(opts.transport.as_deref(), Some("http"));
        assert_eq!(opts.transport_options.uri, "http://node:8090");
        assert_eq!(opts.transport_options.websocket, "wss://steemd.steemit.com");
    }
}
