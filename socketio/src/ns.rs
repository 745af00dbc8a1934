//! Namespace Registry (§3, §9): one [`Namespace`] per path, each owning its
//! handler table, a "was connected" flag distinguishing `connect` from
//! `reconnect`, and an "invalid" flag set when the server rejects the
//! path.
//!
//! Dispatch is the ordered lookup chain spec.md §9 asks for: an explicit
//! `on()`-registered table first, a fixed set of typed slots second, a
//! generic catch-all last. Rust has no implicit per-subclass `on_<event>`
//! dispatch, so the "declared handler" tier is a fixed struct field set
//! rather than reflection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;
use tokio::sync::Mutex;

/// An event handler. Its return value is the "user's response args"
/// spec.md §4.4.3 describes: when the inbound `Event` carried an ack id,
/// `Some(args)` becomes the Ack packet sent back to the server.
pub type Handler = Arc<dyn Fn(Vec<Value>) -> Option<Vec<Value>> + Send + Sync>;
pub type EventHandler = Arc<dyn Fn(String, Vec<Value>) -> Option<Vec<Value>> + Send + Sync>;
pub type ErrorHandler = Arc<dyn Fn(Value) + Send + Sync>;
pub type NoArgHandler = Arc<dyn Fn() + Send + Sync>;
pub type DataHandler = Arc<dyn Fn(Bytes) + Send + Sync>;

pub const DEFAULT_PATH: &str = "";

/// One namespace's handler table and connection state. Never holds a
/// reference back to the `Registry` that owns it, so there is no cycle
/// to worry about collecting (see DESIGN.md on the dropped weakref shim).
pub struct Namespace {
    pub path: String,
    on_table: Mutex<HashMap<String, Handler>>,
    once_events: Mutex<std::collections::HashSet<String>>,
    on_connect: Mutex<Option<NoArgHandler>>,
    on_reconnect: Mutex<Option<NoArgHandler>>,
    on_disconnect: Mutex<Option<NoArgHandler>>,
    on_error: Mutex<Option<ErrorHandler>>,
    on_event: Mutex<Option<EventHandler>>,
    on_open: Mutex<Option<NoArgHandler>>,
    on_close: Mutex<Option<NoArgHandler>>,
    on_ping: Mutex<Option<DataHandler>>,
    on_pong: Mutex<Option<DataHandler>>,
    on_upgrade: Mutex<Option<NoArgHandler>>,
    on_noop: Mutex<Option<NoArgHandler>>,
    was_connected: AtomicBool,
    invalid: AtomicBool,
}

impl Namespace {
    pub fn new(path: impl Into<String>) -> Arc<Self> {
        Arc::new(Namespace {
            path: path.into(),
            on_table: Mutex::new(HashMap::new()),
            once_events: Mutex::new(std::collections::HashSet::new()),
            on_connect: Mutex::new(None),
            on_reconnect: Mutex::new(None),
            on_disconnect: Mutex::new(None),
            on_error: Mutex::new(None),
            on_event: Mutex::new(None),
            on_open: Mutex::new(None),
            on_close: Mutex::new(None),
            on_ping: Mutex::new(None),
            on_pong: Mutex::new(None),
            on_upgrade: Mutex::new(None),
            on_noop: Mutex::new(None),
            was_connected: AtomicBool::new(false),
            invalid: AtomicBool::new(false),
        })
    }

    pub fn is_default(&self) -> bool {
        self.path.is_empty()
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid.load(Ordering::SeqCst)
    }

    pub fn mark_invalid(&self) {
        self.invalid.store(true, Ordering::SeqCst);
    }

    pub fn was_connected(&self) -> bool {
        self.was_connected.load(Ordering::SeqCst)
    }

    /// Register an explicit event handler. Overwrites any handler
    /// previously registered for the same event name.
    pub async fn on(&self, event: impl Into<String>, callback: Handler) {
        let event = event.into();
        self.once_events.lock().await.remove(&event);
        self.on_table.lock().await.insert(event, callback);
    }

    /// Like [`Namespace::on`], but the table entry is removed the moment
    /// it's dispatched (see `fire_event`), before the handler runs, so it
    /// fires at most once. The handler itself holds no reference back to
    /// this namespace — see SPEC_FULL.md's recorded decision against a
    /// handler→namespace cycle.
    pub async fn once(&self, event: impl Into<String>, callback: Handler) {
        let event = event.into();
        self.once_events.lock().await.insert(event.clone());
        self.on_table.lock().await.insert(event, callback);
    }

    pub async fn off(&self, event: &str) {
        self.on_table.lock().await.remove(event);
        self.once_events.lock().await.remove(event);
    }

    pub async fn set_on_connect(&self, handler: NoArgHandler) {
        *self.on_connect.lock().await = Some(handler);
    }

    pub async fn set_on_reconnect(&self, handler: NoArgHandler) {
        *self.on_reconnect.lock().await = Some(handler);
    }

    pub async fn set_on_disconnect(&self, handler: NoArgHandler) {
        *self.on_disconnect.lock().await = Some(handler);
    }

    pub async fn set_on_error(&self, handler: ErrorHandler) {
        *self.on_error.lock().await = Some(handler);
    }

    pub async fn set_on_event(&self, handler: EventHandler) {
        *self.on_event.lock().await = Some(handler);
    }

    pub async fn set_on_open(&self, handler: NoArgHandler) {
        *self.on_open.lock().await = Some(handler);
    }

    pub async fn set_on_close(&self, handler: NoArgHandler) {
        *self.on_close.lock().await = Some(handler);
    }

    pub async fn set_on_ping(&self, handler: DataHandler) {
        *self.on_ping.lock().await = Some(handler);
    }

    pub async fn set_on_pong(&self, handler: DataHandler) {
        *self.on_pong.lock().await = Some(handler);
    }

    pub async fn set_on_upgrade(&self, handler: NoArgHandler) {
        *self.on_upgrade.lock().await = Some(handler);
    }

    pub async fn set_on_noop(&self, handler: NoArgHandler) {
        *self.on_noop.lock().await = Some(handler);
    }

    /// Fire `connect` the first time this namespace sees an inbound
    /// Connect packet, `reconnect` on every subsequent one.
    pub async fn fire_connect(&self) {
        let already_connected = self.was_connected.swap(true, Ordering::SeqCst);
        if already_connected {
            let handler = self.on_reconnect.lock().await.clone();
            if let Some(h) = handler {
                h();
            }
        } else {
            let handler = self.on_connect.lock().await.clone();
            if let Some(h) = handler {
                h();
            }
        }
    }

    pub async fn fire_disconnect(&self) {
        let handler = self.on_disconnect.lock().await.clone();
        if let Some(h) = handler {
            h();
        }
    }

    pub async fn fire_error(&self, payload: Value) {
        let handler = self.on_error.lock().await.clone();
        if let Some(h) = handler {
            h(payload);
        }
    }

    /// Ordered lookup chain: explicit table, then nothing else for a
    /// named user event (the "declared handler" tier is `connect` /
    /// `disconnect` / `error`, handled separately), then the generic
    /// catch-all. Returns the handler's ack response, if any.
    pub async fn fire_event(&self, event: &str, args: Vec<Value>) -> Option<Vec<Value>> {
        let explicit = {
            let mut once_events = self.once_events.lock().await;
            if once_events.remove(event) {
                self.on_table.lock().await.remove(event)
            } else {
                self.on_table.lock().await.get(event).cloned()
            }
        };
        match explicit {
            Some(handler) => handler(args),
            None => {
                let fallback = self.on_event.lock().await.clone();
                fallback.and_then(|handler| handler(event.to_string(), args))
            }
        }
    }

    pub async fn fire_open(&self) {
        let handler = self.on_open.lock().await.clone();
        if let Some(h) = handler {
            h();
        }
    }

    pub async fn fire_close(&self) {
        let handler = self.on_close.lock().await.clone();
        if let Some(h) = handler {
            h();
        }
    }

    pub async fn fire_ping(&self, data: Bytes) {
        let handler = self.on_ping.lock().await.clone();
        if let Some(h) = handler {
            h(data);
        }
    }

    pub async fn fire_pong(&self, data: Bytes) {
        let handler = self.on_pong.lock().await.clone();
        if let Some(h) = handler {
            h(data);
        }
    }

    pub async fn fire_upgrade(&self) {
        let handler = self.on_upgrade.lock().await.clone();
        if let Some(h) = handler {
            h();
        }
    }

    pub async fn fire_noop(&self) {
        let handler = self.on_noop.lock().await.clone();
        if let Some(h) = handler {
            h();
        }
    }
}

/// Mapping from namespace path to [`Namespace`]. `""` is reserved for the
/// default namespace and is always present once the registry is created.
pub struct Registry {
    namespaces: Mutex<HashMap<String, Arc<Namespace>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        let mut namespaces = HashMap::new();
        namespaces.insert(DEFAULT_PATH.to_string(), Namespace::new(DEFAULT_PATH));
        Registry {
            namespaces: Mutex::new(namespaces),
        }
    }

    pub async fn default_namespace(&self) -> Arc<Namespace> {
        self.namespaces
            .lock()
            .await
            .get(DEFAULT_PATH)
            .expect("default namespace always present")
            .clone()
    }

    pub async fn get(&self, path: &str) -> Option<Arc<Namespace>> {
        self.namespaces.lock().await.get(path).cloned()
    }

    /// Insert a namespace for `path` if absent, returning the existing or
    /// newly created instance.
    pub async fn get_or_create(&self, path: &str) -> Arc<Namespace> {
        let mut namespaces = self.namespaces.lock().await;
        namespaces
            .entry(path.to_string())
            .or_insert_with(|| Namespace::new(path))
            .clone()
    }

    pub async fn remove(&self, path: &str) {
        if path != DEFAULT_PATH {
            self.namespaces.lock().await.remove(path);
        }
    }

    /// All non-default namespace paths, for (re)connect replay.
    pub async fn non_default_paths(&self) -> Vec<String> {
        self.namespaces
            .lock()
            .await
            .keys()
            .filter(|p| !p.is_empty())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn explicit_handler_wins_over_fallback() {
        let ns = Namespace::new("/chat");
        let explicit_count = Arc::new(AtomicUsize::new(0));
        let fallback_count = Arc::new(AtomicUsize::new(0));

        let ec = explicit_count.clone();
        ns.on("greet", Arc::new(move |_| { ec.fetch_add(1, Ordering::SeqCst); None })).await;
        let fc = fallback_count.clone();
        ns.set_on_event(Arc::new(move |_, _| { fc.fetch_add(1, Ordering::SeqCst); None })).await;

        ns.fire_event("greet", vec![]).await;
        ns.fire_event("other", vec![]).await;

        assert_eq!(explicit_count.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn once_handler_fires_a_single_time() {
        let ns = Namespace::new("");
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        ns.once("hello", Arc::new(move |_| { c.fetch_add(1, Ordering::SeqCst); None })).await;

        ns.fire_event("hello", vec![]).await;
        ns.fire_event("hello", vec![]).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handler_return_value_becomes_ack_response() {
        let ns = Namespace::new("");
        ns.on("ack", Arc::new(|args| Some(args))).await;
        let response = ns.fire_event("ack", vec![serde_json::json!({"xxx": "yyy"})]).await;
        assert_eq!(response, Some(vec![serde_json::json!({"xxx": "yyy"})]));
    }

    #[tokio::test]
    async fn registry_always_has_default_namespace() {
        let registry = Registry::new();
        let default = registry.get(DEFAULT_PATH).await;
        assert!(default.is_some());
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let registry = Registry::new();
        let a = registry.get_or_create("/chat").await;
        let b = registry.get_or_create("/chat").await;
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn a_second_connect_fires_reconnect_instead_of_connect_again() {
        let ns = Namespace::new("/chat");
        let connects = Arc::new(AtomicUsize::new(0));
        let reconnects = Arc::new(AtomicUsize::new(0));

        let c = connects.clone();
        ns.set_on_connect(Arc::new(move || { c.fetch_add(1, Ordering::SeqCst); })).await;
        let r = reconnects.clone();
        ns.set_on_reconnect(Arc::new(move || { r.fetch_add(1, Ordering::SeqCst); })).await;

        assert!(!ns.was_connected());
        ns.fire_connect().await;
        assert!(ns.was_connected());
        ns.fire_connect().await;
        ns.fire_connect().await;

        assert_eq!(connects.load(Ordering::SeqCst), 1);
        assert_eq!(reconnects.load(Ordering::SeqCst), 2);
    }
}
