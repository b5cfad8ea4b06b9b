//! Connection guard
//!
//! Obtains a session from the connection pool while the cycle holds the
//! attempt lease. The lease is released as soon as the pool answers, before
//! the outcome is acted upon. Online transitions the pool raised meanwhile
//! are marked as covered first.

use tracing::{debug, info, warn};

use super::events::{SchedulerEvent, Trigger};
use super::lease::LeaseGuard;
use super::SchedulerInner;
use crate::error::Error;
use crate::traits::Connection;

/// Result of the connection step
pub(super) enum Connect {
    /// A live session, owned by the cycle from now on
    Connected(Box<dyn Connection>),
    /// No server reachable
    Offline,
    /// Any other connection failure
    Failed(Error),
}

impl SchedulerInner {
    pub(super) async fn ensure_connected(&self, trigger: Trigger, lease: LeaseGuard<'_>) -> Connect {
        debug!(
            "Acquiring connection from {} for {} refresh",
            self.pool.pool_name(),
            trigger
        );

        let result = self.pool.connect().await;
        self.cover_online_transitions();
        lease.release();

        match result {
            Ok(connection) => {
                debug!("Connected to {}", connection.uri());
                Connect::Connected(connection)
            }
            Err(e) if e.is_offline() => {
                info!(
                    "No server is available, dynamic DNS update is skipped in offline mode: {}",
                    e
                );
                self.emit_event(SchedulerEvent::ConnectionOffline { trigger });
                Connect::Offline
            }
            Err(e) => {
                warn!("Failed to connect via {}: {}", self.pool.pool_name(), e);
                self.emit_event(SchedulerEvent::ConnectionFailed {
                    trigger,
                    error: e.to_string(),
                });
                Connect::Failed(e)
            }
        }
    }
}
