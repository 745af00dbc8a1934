//! Fluent construction mirroring the ecosystem's `ClientBuilder` pattern:
//! a plain builder struct translating constructor options (§6) into an
//! [`EngineIoConfig`] plus the handful of session-level switches that
//! live above the engine layer.

use std::sync::Arc;
use std::time::Duration;

use engineio::{EngineIoConfig, TransportKind};
use serde_json::Value;

use crate::ack::AckCallback;
use crate::client::Client;
use crate::error::Result;
use crate::ns::Handler;

pub struct ClientBuilder {
    config: EngineIoConfig,
    wait_for_connection: bool,
    cancel_acks_on_reconnect: bool,
    default_handlers: Vec<(String, Handler)>,
}

impl ClientBuilder {
    /// `host` accepts `"host"`, `"http://host"` or `"https://host"`; the
    /// port defaults to 443 for https and 80 otherwise unless overridden
    /// with [`ClientBuilder::port`].
    pub fn new(host: impl AsRef<str>) -> Result<Self> {
        let (secure, host, port) = EngineIoConfig::parse_host(host.as_ref(), None)?;
        let mut config = EngineIoConfig::default();
        config.secure = secure;
        config.host = host;
        config.port = port;
        Ok(ClientBuilder {
            config,
            wait_for_connection: false,
            cancel_acks_on_reconnect: false,
            default_handlers: Vec::new(),
        })
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// `"socket.io"` by default; `"engine.io"` for the lower-level client.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.config.resource = resource.into();
        self
    }

    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.config.base_path = base_path.into();
        self
    }

    /// Restrict (and order) the transports the client is willing to use.
    pub fn transports(mut self, transports: Vec<TransportKind>) -> Self {
        self.config.transports = transports;
        self
    }

    /// Retry the handshake indefinitely instead of surfacing
    /// `ConnectionLost` on the first failure.
    pub fn wait_for_connection(mut self, wait: bool) -> Self {
        self.wait_for_connection = wait;
        self
    }

    pub fn hurry_interval(mut self, interval: Duration) -> Self {
        self.config.hurry_interval = interval;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.push((key.into(), value.into()));
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.params.push((key.into(), value.into()));
        self
    }

    pub fn cookie(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.cookies.push((key.into(), value.into()));
        self
    }

    /// `auth` passthrough (`transports.py::prepare_http_session`):
    /// equivalent to setting an `Authorization` header directly.
    pub fn auth(mut self, value: impl Into<String>) -> Self {
        self.config.headers.push(("Authorization".to_string(), value.into()));
        self
    }

    /// Whether outstanding Ack Table entries survive a reconnect.
    /// Defaults to `false` (preserved) — see DESIGN.md's recorded
    /// decision on this open question.
    pub fn cancel_acks_on_reconnect(mut self, cancel: bool) -> Self {
        self.cancel_acks_on_reconnect = cancel;
        self
    }

    /// Install a default-namespace handler before the session connects,
    /// so it is in place before the first inbound packet can arrive.
    pub fn on(mut self, event: impl Into<String>, callback: Handler) -> Self {
        self.default_handlers.push((event.into(), callback));
        self
    }

    /// Run the handshake, negotiate a transport, and start the heartbeat.
    pub async fn connect(self) -> Result<Arc<Client>> {
        let client = Client::new(self.config, self.wait_for_connection, self.cancel_acks_on_reconnect);
        let default_ns = client.registry().default_namespace().await;
        for (event, handler) in self.default_handlers {
            default_ns.on(event, handler).await;
        }
        client.ensure_connected().await?;
        Ok(client)
    }
}

/// Convenience re-export so callers constructing ack callbacks don't need
/// to reach into `crate::ack` directly.
pub fn ack_callback<F: Fn(Vec<Value>) + Send + Sync + 'static>(f: F) -> AckCallback {
    Arc::new(f)
}
