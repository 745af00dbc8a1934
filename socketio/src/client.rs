//! Session Engine (§4.4): the central state machine. Owns the transport,
//! heartbeat, namespace registry and ack table, and exposes the
//! user-facing operations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use engineio::transport::{polling, ws};
use engineio::{EngineIoConfig, EngineIoSession, Packet as EnginePacket, Transport, TransportKind};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::ack::AckCallback;
use crate::error::{Error, Result};
use crate::ns::{Handler, Namespace, Registry, DEFAULT_PATH};
use crate::packet::{PacketType, SocketPacket};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Handshaking,
    Negotiating,
    Connected,
    Reconnecting,
    Closed,
}

struct PendingSend {
    path: Option<String>,
    event: String,
    args: Vec<Value>,
    ack_id: Option<u64>,
}

/// The client-side Socket.IO session. Cheap to clone (an `Arc` wrapper is
/// the usual way to hold one); every public operation takes `&Arc<Self>`
/// so the heartbeat task and reconnect logic can hold their own handle.
pub struct Client {
    config: EngineIoConfig,
    wait_for_connection: bool,
    cancel_acks_on_reconnect: bool,
    pub(crate) registry: Registry,
    pub(crate) ack_table: crate::ack::AckTable,
    state: Mutex<SessionState>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    session: Mutex<Option<EngineIoSession>>,
    heartbeat: Mutex<Option<engineio::HeartbeatHandle>>,
    pending_sends: Mutex<VecDeque<PendingSend>>,
    want_close: AtomicBool,
}

impl Client {
    pub fn new(
        config: EngineIoConfig,
        wait_for_connection: bool,
        cancel_acks_on_reconnect: bool,
    ) -> Arc<Self> {
        Arc::new(Client {
            config,
            wait_for_connection,
            cancel_acks_on_reconnect,
            registry: Registry::new(),
            ack_table: crate::ack::AckTable::new(),
            state: Mutex::new(SessionState::Idle),
            transport: Mutex::new(None),
            session: Mutex::new(None),
            heartbeat: Mutex::new(None),
            pending_sends: Mutex::new(VecDeque::new()),
            want_close: AtomicBool::new(false),
        })
    }

    /// Build a client directly from an already-open transport and
    /// session, skipping the handshake entirely. Used by tests to drive
    /// the session engine against [`engineio::transport::mock::MockTransport`].
    #[cfg(feature = "test-utils")]
    pub fn from_parts(
        transport: Arc<dyn Transport>,
        session: EngineIoSession,
        config: EngineIoConfig,
    ) -> Arc<Self> {
        Arc::new(Client {
            config,
            wait_for_connection: false,
            cancel_acks_on_reconnect: false,
            registry: Registry::new(),
            ack_table: crate::ack::AckTable::new(),
            state: Mutex::new(SessionState::Connected),
            transport: Mutex::new(Some(transport)),
            session: Mutex::new(Some(session)),
            heartbeat: Mutex::new(None),
            pending_sends: Mutex::new(VecDeque::new()),
            want_close: AtomicBool::new(false),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Drive Idle → Handshaking → Negotiating → Connected if not already
    /// past Idle. A no-op once the session is connected or reconnecting.
    pub async fn ensure_connected(self: &Arc<Self>) -> Result<()> {
        let state = *self.state.lock().await;
        match state {
            SessionState::Closed => Err(Error::SessionClosed),
            SessionState::Idle => self.do_handshake_and_negotiate().await,
            _ => Ok(()),
        }
    }

    async fn do_handshake_and_negotiate(self: &Arc<Self>) -> Result<()> {
        *self.state.lock().await = SessionState::Handshaking;

        let (session, polling_transport) = loop {
            match polling::handshake(&self.config).await {
                Ok(pair) => break pair,
                Err(e) => {
                    if self.wait_for_connection {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(error = %e, "handshake failed, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        };

        let transport: Arc<dyn Transport> = Arc::new(polling_transport);
        *self.transport.lock().await = Some(transport);
        *self.session.lock().await = Some(session.clone());

        *self.state.lock().await = SessionState::Negotiating;
        let wants_ws = self.config.transports.contains(&TransportKind::WebSocket);
        if wants_ws && session.supports_websocket_upgrade() {
            match ws::probe_and_upgrade(&self.config, &session).await {
                Ok(ws_transport) => {
                    *self.transport.lock().await = Some(Arc::new(ws_transport));
                    #[cfg(feature = "tracing")]
                    tracing::debug!("upgraded to websocket transport");
                }
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(error = %_e, "websocket upgrade probe failed, staying on long-polling");
                }
            }
        }

        *self.state.lock().await = SessionState::Connected;

        // The default namespace needs no outbound Connect of its own: it is
        // implicit in a successful handshake (§4.4.1 only requires sending
        // Connect(path) for non-default namespaces defined up front).
        self.registry.default_namespace().await.fire_connect().await;

        let transport_name = {
            let guard = self.transport.lock().await;
            guard.as_ref().expect("transport set above").name()
        };
        let hurry_interval = if transport_name == "websocket" {
            session.ping_interval
        } else {
            self.config.hurry_interval
        };

        let me = self.clone();
        let handle = engineio::spawn_heartbeat(session.ping_interval, hurry_interval, move || {
            let me = me.clone();
            async move { me.send_ping().await }
        });
        *self.heartbeat.lock().await = Some(handle);

        for path in self.registry.non_default_paths().await {
            self.send_connect(Some(path)).await?;
        }
        self.drain_pending_sends().await?;

        Ok(())
    }

    async fn send_ping(&self) -> engineio::Result<()> {
        let transport = self.transport.lock().await.clone();
        match transport {
            Some(t) => t.send_packet(EnginePacket::Ping(Bytes::new())).await,
            None => Err(engineio::Error::connection_lost("no active transport")),
        }
    }

    async fn send_connect(&self, path: Option<String>) -> Result<()> {
        self.send_socket_packet(SocketPacket::connect(path)).await
    }

    async fn send_socket_packet(&self, packet: SocketPacket) -> Result<()> {
        let text = packet.encode();
        let transport = self
            .transport
            .lock()
            .await
            .clone()
            .ok_or(Error::SessionClosed)?;
        transport
            .send_packet(EnginePacket::Message(Bytes::from(text.into_bytes())))
            .await
            .map_err(Error::from)
    }

    async fn drain_pending_sends(self: &Arc<Self>) -> Result<()> {
        loop {
            let next = self.pending_sends.lock().await.pop_front();
            let item = match next {
                Some(item) => item,
                None => break,
            };
            let packet = SocketPacket::event(item.path.clone(), item.ack_id, &item.event, item.args.clone());
            if let Err(e) = self.send_socket_packet(packet).await {
                self.pending_sends.lock().await.push_front(item);
                return Err(e);
            }
        }
        Ok(())
    }

    /// `emit(event, args, path, callback)`. Queued (preserving call order)
    /// whenever the transport is down — either because `send_packet`
    /// itself reports `ConnectionLost`, or because a reconnect is already
    /// underway and no transport is installed yet. A user thread calling
    /// `emit` concurrently with the receive loop's reconnect handling must
    /// see the same "it'll go out once we're back" behavior either way.
    pub async fn emit(
        self: &Arc<Self>,
        event: impl Into<String>,
        args: Vec<Value>,
        path: Option<String>,
        callback: Option<AckCallback>,
    ) -> Result<()> {
        self.ensure_connected().await?;
        let event = event.into();
        let ack_id = match callback {
            Some(cb) => Some(self.ack_table.register(cb).await),
            None => None,
        };

        let transport = self.transport.lock().await.clone();
        let transport = match transport {
            Some(t) => t,
            None => {
                self.pending_sends.lock().await.push_back(PendingSend {
                    path,
                    event,
                    args,
                    ack_id,
                });
                return Ok(());
            }
        };

        let packet = SocketPacket::event(path.clone(), ack_id, &event, args.clone());
        let text = packet.encode();
        match transport
            .send_packet(EnginePacket::Message(Bytes::from(text.into_bytes())))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_connection_lost() => {
                self.pending_sends.lock().await.push_back(PendingSend {
                    path,
                    event,
                    args,
                    ack_id,
                });
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// `send(data, callback, path)` — sugar for `emit("message", [data], ...)`.
    pub async fn send(
        self: &Arc<Self>,
        data: Value,
        path: Option<String>,
        callback: Option<AckCallback>,
    ) -> Result<()> {
        self.emit("message", vec![data], path, callback).await
    }

    /// Register and, for a non-default path, connect a namespace; blocks
    /// until the server's Connect packet for that path has been observed.
    pub async fn define(self: &Arc<Self>, path: impl Into<String>) -> Result<Arc<Namespace>> {
        let path = path.into();
        self.ensure_connected().await?;
        let ns = self.registry.get_or_create(&path).await;
        if !path.is_empty() {
            self.send_connect(Some(path)).await?;
            self.wait(None, false, true).await?;
        }
        Ok(ns)
    }

    pub async fn on(&self, event: impl Into<String>, path: Option<&str>, callback: Handler) {
        let ns = self.registry.get_or_create(path.unwrap_or(DEFAULT_PATH)).await;
        ns.on(event, callback).await;
    }

    pub async fn once(&self, event: impl Into<String>, path: Option<&str>, callback: Handler) {
        let ns = self.registry.get_or_create(path.unwrap_or(DEFAULT_PATH)).await;
        ns.once(event, callback).await;
    }

    pub async fn off(&self, event: &str, path: Option<&str>) {
        if let Some(ns) = self.registry.get(path.unwrap_or(DEFAULT_PATH)).await {
            ns.off(event).await;
        }
    }

    /// For a non-default path: send `Disconnect(path)`, drop it from the
    /// registry, fire a local `disconnect`. For the default path: close
    /// the whole session.
    pub async fn disconnect(self: &Arc<Self>, path: Option<String>) -> Result<()> {
        match path {
            Some(p) if !p.is_empty() => {
                let _ = self.send_socket_packet(SocketPacket::disconnect(Some(p.clone()))).await;
                if let Some(ns) = self.registry.get(&p).await {
                    ns.fire_disconnect().await;
                }
                self.registry.remove(&p).await;
                Ok(())
            }
            _ => {
                self.want_close.store(true, Ordering::SeqCst);
                if let Some(hb) = self.heartbeat.lock().await.take() {
                    hb.halt();
                }
                if let Some(t) = self.transport.lock().await.take() {
                    t.close().await;
                }
                *self.state.lock().await = SessionState::Closed;
                Ok(())
            }
        }
    }

    /// The core event loop (§4.4.2). Runs until `duration` elapses, the
    /// session is explicitly closed, every namespace has connected
    /// (`for_connect`), or the Ack Table drains (`for_callbacks`).
    pub async fn wait(
        self: &Arc<Self>,
        duration: Option<Duration>,
        for_callbacks: bool,
        for_connect: bool,
    ) -> Result<()> {
        self.ensure_connected().await?;

        let is_polling = {
            let guard = self.transport.lock().await;
            guard.as_ref().map(|t| t.name()) == Some("xhr-polling")
        };
        if is_polling {
            if let Some(hb) = self.heartbeat.lock().await.as_ref() {
                hb.hurry();
            }
        }
        if let Some(t) = self.transport.lock().await.as_ref() {
            t.set_timeout(Some(Duration::from_secs(1)));
        }

        let deadline = duration.map(|d| tokio::time::Instant::now() + d);

        loop {
            if self.want_close.load(Ordering::SeqCst) {
                break;
            }
            if for_connect && self.all_namespaces_connected().await {
                break;
            }
            if for_callbacks && self.ack_table.is_empty().await {
                break;
            }
            if let Some(dl) = deadline {
                if tokio::time::Instant::now() >= dl {
                    break;
                }
            }

            let transport = self.transport.lock().await.clone();
            let transport = match transport {
                Some(t) => t,
                None => break,
            };

            match transport.recv_packet().await {
                Ok(packet) => match self.dispatch_engine_packet(packet).await {
                    Ok(()) => {}
                    Err(e) if e.is_connection_lost() => {
                        self.handle_connection_lost().await?;
                        break;
                    }
                    Err(_e) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(error = %_e, "dropping malformed inbound packet");
                    }
                },
                Err(e) if e.is_timeout() => continue,
                Err(e) if e.is_connection_lost() => {
                    self.handle_connection_lost().await?;
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if let Some(hb) = self.heartbeat.lock().await.as_ref() {
            hb.relax();
        }
        if let Some(t) = self.transport.lock().await.as_ref() {
            t.set_timeout(None);
        }
        Ok(())
    }

    /// Whether every *non-default* namespace has observed its inbound
    /// Connect. The default namespace carries no such requirement — see
    /// DESIGN.md's "default namespace connect" decision.
    async fn all_namespaces_connected(&self) -> bool {
        for path in self.registry.non_default_paths().await {
            if let Some(ns) = self.registry.get(&path).await {
                if !ns.was_connected() {
                    return false;
                }
            }
        }
        true
    }

    async fn handle_connection_lost(self: &Arc<Self>) -> Result<()> {
        *self.state.lock().await = SessionState::Reconnecting;
        if let Some(hb) = self.heartbeat.lock().await.take() {
            hb.halt();
        }
        self.transport.lock().await.take();

        self.registry.default_namespace().await.fire_disconnect().await;
        for path in self.registry.non_default_paths().await {
            if let Some(ns) = self.registry.get(&path).await {
                ns.fire_disconnect().await;
            }
        }

        if self.cancel_acks_on_reconnect {
            self.ack_table.clear().await;
        }

        *self.state.lock().await = SessionState::Idle;
        self.do_handshake_and_negotiate().await
    }

    async fn dispatch_engine_packet(self: &Arc<Self>, packet: EnginePacket) -> Result<()> {
        match packet {
            EnginePacket::Open(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("engine.io open");
                self.registry.default_namespace().await.fire_open().await;
            }
            EnginePacket::Close => {
                #[cfg(feature = "tracing")]
                tracing::debug!("engine.io close");
                self.registry.default_namespace().await.fire_close().await;
                return Err(Error::Engine(engineio::Error::connection_lost(
                    "server sent engine.io close",
                )));
            }
            EnginePacket::Ping(data) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("engine.io ping");
                self.send_socket_bytes_pong(data.clone()).await?;
                self.registry.default_namespace().await.fire_ping(data).await;
            }
            EnginePacket::Pong(data) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("engine.io pong");
                self.registry.default_namespace().await.fire_pong(data).await;
            }
            EnginePacket::Message(data) => {
                self.dispatch_socketio_message(&data).await?;
            }
            EnginePacket::Upgrade => {
                #[cfg(feature = "tracing")]
                tracing::debug!("engine.io upgrade confirmed");
                self.registry.default_namespace().await.fire_upgrade().await;
            }
            EnginePacket::Noop => {
                #[cfg(feature = "tracing")]
                tracing::debug!("engine.io noop");
                self.registry.default_namespace().await.fire_noop().await;
            }
        }
        Ok(())
    }

    async fn send_socket_bytes_pong(&self, data: Bytes) -> Result<()> {
        let transport = self
            .transport
            .lock()
            .await
            .clone()
            .ok_or(Error::SessionClosed)?;
        transport
            .send_packet(EnginePacket::Pong(data))
            .await
            .map_err(Error::from)
    }

    async fn dispatch_socketio_message(self: &Arc<Self>, data: &[u8]) -> Result<()> {
        let text = match std::str::from_utf8(data) {
            Ok(t) => t,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("dropping non-utf8 socket.io packet");
                return Ok(());
            }
        };
        let packet = match SocketPacket::decode(text) {
            Ok(p) => p,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_e, "dropping malformed socket.io packet");
                return Ok(());
            }
        };

        let path = packet.path.clone().unwrap_or_default();
        let ns = self.registry.get_or_create(&path).await;

        match packet.packet_type {
            PacketType::Connect => {
                #[cfg(feature = "tracing")]
                tracing::debug!(path = %path, reconnect = ns.was_connected(), "socket.io connect");
                ns.fire_connect().await;
            }
            PacketType::Disconnect => {
                #[cfg(feature = "tracing")]
                tracing::debug!(path = %path, "socket.io disconnect");
                ns.fire_disconnect().await;
                if !ns.is_default() {
                    self.registry.remove(&path).await;
                }
            }
            PacketType::Event => {
                let args = packet.args().to_vec();
                if args.is_empty() {
                    return Ok(());
                }
                let event = match &args[0] {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                #[cfg(feature = "tracing")]
                tracing::debug!(path = %path, event = %event, "socket.io event");
                let user_args = args[1..].to_vec();
                let response = ns.fire_event(&event, user_args).await;
                if let Some(ack_id) = packet.ack_id {
                    let ack_packet = SocketPacket::ack(packet.path.clone(), ack_id, response.unwrap_or_default());
                    self.send_socket_packet(ack_packet).await?;
                }
            }
            PacketType::Ack => {
                if let Some(ack_id) = packet.ack_id {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(path = %path, ack_id, "socket.io ack");
                    if let Some(cb) = self.ack_table.take(ack_id).await {
                        cb(packet.args().to_vec());
                    }
                }
            }
            PacketType::Error => {
                #[cfg(feature = "tracing")]
                tracing::debug!(path = %path, "socket.io error");
                if Self::is_invalid_namespace_payload(&packet.args) {
                    ns.mark_invalid();
                }
                ns.fire_error(packet.args.clone()).await;
            }
            PacketType::BinaryEvent | PacketType::BinaryAck => {
                #[cfg(feature = "tracing")]
                tracing::warn!("binary event/ack packets are not implemented");
            }
        }
        Ok(())
    }

    fn is_invalid_namespace_payload(payload: &Value) -> bool {
        let matches_text = |s: &str| s.eq_ignore_ascii_case("invalid namespace");
        match payload {
            Value::String(s) => matches_text(s),
            Value::Array(a) => matches!(a.first(), Some(Value::String(s)) if matches_text(s)),
            _ => false,
        }
    }
}
