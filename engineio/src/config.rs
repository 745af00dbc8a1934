//! Client-side configuration and URL derivation (§6).

use std::time::Duration;

use crate::error::{Error, Result};

/// Transport kinds a client may use, in the order the user enabled them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Polling,
    WebSocket,
}

/// Static engine configuration supplied by the caller (as opposed to
/// [`crate::session::EngineIoSession`], which comes from the handshake).
#[derive(Debug, Clone)]
pub struct EngineIoConfig {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    /// `"engine.io"` or `"socket.io"` depending on which layer is talking.
    pub resource: String,
    pub base_path: String,
    pub transports: Vec<TransportKind>,
    pub wait_for_connection: bool,
    pub hurry_interval: Duration,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
}

impl Default for EngineIoConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 80,
            secure: false,
            resource: "socket.io".into(),
            base_path: String::new(),
            transports: vec![TransportKind::Polling, TransportKind::WebSocket],
            wait_for_connection: false,
            hurry_interval: Duration::from_secs(1),
            headers: Vec::new(),
            params: Vec::new(),
            cookies: Vec::new(),
        }
    }
}

impl EngineIoConfig {
    /// Parse `host`, `"http://host"` or `"https://host"` and a port
    /// override into `(secure, host, port)`, defaulting the port to 443
    /// for https and 80 otherwise.
    ///
    /// Ported from the Python original's `parse_host`.
    pub fn parse_host(host: &str, port: Option<u16>) -> Result<(bool, String, u16)> {
        let with_scheme = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        };
        let url = url::Url::parse(&with_scheme)?;
        let secure = url.scheme() == "https";
        let hostname = url
            .host_str()
            .ok_or_else(|| Error::packet("missing host"))?
            .to_string();
        let port = port
            .or_else(|| url.port())
            .unwrap_or(if secure { 443 } else { 80 });
        Ok((secure, hostname, port))
    }

    /// Build the handshake/polling/websocket base URL:
    /// `{scheme}://{host}:{port}{base_path}/{resource}/`
    pub fn base_url(&self) -> String {
        format!(
            "{}://{}:{}{}/{}/",
            if self.secure { "https" } else { "http" },
            self.host,
            self.port,
            self.base_path,
            self.resource
        )
    }

    /// Render `cookies` as a single `Cookie` request header value
    /// (`"k=v; k2=v2"`), matching `requests.Session.cookies` being sent as
    /// one header per request. `None` when no cookies were configured.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
