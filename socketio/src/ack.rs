//! Ack Table (§3, §4.4.3): a monotonic id allocator plus a one-shot
//! callback map. Ack ids are strictly increasing within a session and
//! never reused, even across a reconnect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;

/// A one-shot callback invoked with the server's ack arguments.
pub type AckCallback = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

#[derive(Default)]
pub struct AckTable {
    next_id: AtomicU64,
    callbacks: Mutex<HashMap<u64, AckCallback>>,
}

impl AckTable {
    pub fn new() -> Self {
        AckTable {
            next_id: AtomicU64::new(1),
            callbacks: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate the next ack id and register its callback.
    pub async fn register(&self, callback: AckCallback) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.callbacks.lock().await.insert(id, callback);
        id
    }

    /// Look up and remove `id`'s callback; the caller invokes it after the
    /// lock is released, so no user code runs while the table is locked.
    pub async fn take(&self, id: u64) -> Option<AckCallback> {
        self.callbacks.lock().await.remove(&id)
    }

    /// Drop every outstanding callback, used when
    /// `cancel_acks_on_reconnect` is enabled.
    pub async fn clear(&self) {
        self.callbacks.lock().await.clear();
    }

    pub async fn is_empty(&self) -> bool {
        self.callbacks.lock().await.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.callbacks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[tokio::test]
    async fn ids_increase_and_are_not_reused() {
        let table = AckTable::new();
        let a = table.register(Arc::new(|_| {})).await;
        let b = table.register(Arc::new(|_| {})).await;
        assert!(b > a);
        table.take(a).await;
        let c = table.register(Arc::new(|_| {})).await;
        assert!(c > b);
    }

    #[tokio::test]
    async fn take_removes_and_fires_exactly_once() {
        let table = AckTable::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        let id = table
            .register(Arc::new(move |_| {
                fired_clone.store(true, Ordering::SeqCst);
            }))
            .await;
        let cb = table.take(id).await.expect("callback present");
        cb(vec![]);
        assert!(fired.load(Ordering::SeqCst));
        assert!(table.take(id).await.is_none());
    }

    #[tokio::test]
    async fn missing_id_is_ignored_silently() {
        let table = AckTable::new();
        assert!(table.take(42).await.is_none());
    }
}
