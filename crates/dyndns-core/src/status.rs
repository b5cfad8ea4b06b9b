//! Backend online/offline status
//!
//! [`BackendStatus`] is the online notifier the scheduler subscribes to.
//! Connection pools flip it as servers become reachable or unreachable;
//! every offline → online transition yields one item on the streams
//! returned by [`BackendStatus::online_transitions`].
//!
//! Each online transition carries a generation number. The scheduler
//! compares it with the generation it saw when its last connect finished,
//! so a transition raised by that connect is not mistaken for a new one.

use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info};

/// Shared online/offline flag of the backend
///
/// Cloning yields another handle to the same flag.
///
/// Transitions are delivered through a `watch` channel, so a subscriber
/// that lags behind a rapid offline → online → offline flap only observes
/// the latest state.
#[derive(Debug, Clone)]
pub struct BackendStatus {
    tx: Arc<watch::Sender<Snapshot>>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Snapshot {
    online: bool,
    /// Number of offline → online transitions so far
    generation: u64,
}

impl BackendStatus {
    /// Create a new status, initially offline
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Snapshot::default());
        Self { tx: Arc::new(tx) }
    }

    /// Whether the backend is currently online
    pub fn is_online(&self) -> bool {
        self.tx.borrow().online
    }

    /// Generation of the latest online transition, 0 if there was none
    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    /// Mark the backend online
    ///
    /// Returns `true` when this call caused an offline → online transition.
    pub fn mark_online(&self) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if state.online {
                false
            } else {
                state.online = true;
                state.generation += 1;
                true
            }
        });
        if changed {
            info!("Backend is now online (transition {})", self.generation());
        }
        changed
    }

    /// Mark the backend offline
    ///
    /// Returns `true` when this call caused an online → offline transition.
    pub fn mark_offline(&self) -> bool {
        let changed = self.tx.send_if_modified(|state| {
            if state.online {
                state.online = false;
                true
            } else {
                false
            }
        });
        if changed {
            info!("Backend is now offline");
        }
        changed
    }

    /// Stream yielding the generation of every offline → online transition
    ///
    /// Only transitions that happen after the call are reported.
    pub fn online_transitions(&self) -> Pin<Box<dyn Stream<Item = u64> + Send + 'static>> {
        debug!("Registering online-transition subscriber");
        let rx = self.tx.subscribe();
        Box::pin(
            WatchStream::from_changes(rx)
                .filter_map(|state| state.online.then_some(state.generation)),
        )
    }
}

impl Default for BackendStatus {
    fn default() -> Self {
        Self::new()
    }
}
