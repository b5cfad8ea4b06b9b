//! Tokio-backed refresh timer
//!
//! Each `arm()` spawns a task that sleeps for the requested delay and then
//! emits one tick. Re-arming aborts the previous task, so at most one tick
//! is pending at any time.

use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

use crate::traits::RefreshTimer;

/// Stream of timer ticks produced by [`TokioRefreshTimer`]
pub type TimerTicks = Pin<Box<dyn Stream<Item = ()> + Send + 'static>>;

/// One-shot refresh timer running on the tokio runtime
///
/// `arm()` must be called from within a tokio runtime.
pub struct TokioRefreshTimer {
    tick_tx: mpsc::UnboundedSender<()>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl TokioRefreshTimer {
    /// Create a timer and the stream its ticks are delivered on
    pub fn new() -> (Self, TimerTicks) {
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        let timer = Self {
            tick_tx,
            pending: Mutex::new(None),
        };
        (timer, Box::pin(UnboundedReceiverStream::new(tick_rx)))
    }

    /// Cancel the pending shot, if any
    pub fn cancel(&self) {
        if let Some(handle) = self.lock_pending().take() {
            handle.abort();
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RefreshTimer for TokioRefreshTimer {
    fn arm(&self, after: Duration) {
        debug!("Arming refresh timer for {:?}", after);
        let tick_tx = self.tick_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tick_tx.send(());
        });

        if let Some(previous) = self.lock_pending().replace(handle) {
            previous.abort();
        }
    }
}

impl Drop for TokioRefreshTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
