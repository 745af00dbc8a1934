//! Heartbeat driver (§4.3): a periodic task that calls a supplied "send
//! ping" action on a relaxed or hurried cadence, cancellable from outside.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::error::Error;

/// A halted driver is discarded, never reused — restarting means
/// spawning a fresh one.
pub struct HeartbeatHandle {
    hurried: Arc<AtomicBool>,
    halted: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Switch to the hurried interval and wake a sleeping tick immediately.
    pub fn hurry(&self) {
        self.hurried.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Switch back to the relaxed interval. Does not wake a sleeping tick.
    pub fn relax(&self) {
        self.hurried.store(false, Ordering::SeqCst);
    }

    pub fn is_hurried(&self) -> bool {
        self.hurried.load(Ordering::SeqCst)
    }

    /// Level-triggered cancellation: a sleeping tick wakes immediately.
    pub fn halt(&self) {
        self.halted.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Spawn the heartbeat task. `send_ping` is called on each tick; a
/// `Timeout` error is swallowed, a `ConnectionLost` error stops the
/// driver (the Session Engine discovers the dead transport on its next
/// send), and it is also stopped by any other error to avoid
/// hot-looping on an unexpected failure.
pub fn spawn<F, Fut>(
    relax_interval: Duration,
    hurry_interval: Duration,
    send_ping: F,
) -> HeartbeatHandle
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Error>> + Send,
{
    let hurried = Arc::new(AtomicBool::new(false));
    let halted = Arc::new(AtomicBool::new(false));
    let wake = Arc::new(Notify::new());

    let task_hurried = hurried.clone();
    let task_halted = halted.clone();
    let task_wake = wake.clone();

    let task = tokio::spawn(async move {
        loop {
            if task_halted.load(Ordering::SeqCst) {
                break;
            }
            match send_ping().await {
                Ok(()) => {}
                Err(Error::Timeout) => {}
                Err(Error::ConnectionLost(_msg)) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(error = %_msg, "heartbeat connection lost, stopping driver");
                    break;
                }
                Err(_other) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(error = %_other, "heartbeat send_ping error, stopping driver");
                    break;
                }
            }

            if task_halted.load(Ordering::SeqCst) {
                break;
            }

            let interval = if task_hurried.load(Ordering::SeqCst) {
                hurry_interval
            } else {
                relax_interval
            };

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = task_wake.notified() => {}
            }
        }
    });

    HeartbeatHandle {
        hurried,
        halted,
        wake,
        task,
    }
}
