//! Dynamic DNS refresh scheduler
//!
//! The scheduler keeps the client's DNS records fresh. Two trigger sources
//! feed it:
//! - **Online transitions** of the backend (see [`BackendStatus`](crate::BackendStatus))
//! - **Periodic refresh** ticks of the [`RefreshTimer`]
//!
//! Both end up in the same cycle:
//!
//! ```text
//!   on_online() ──┐
//!                 ├──► lease ──► ConnectionPool::connect() ──► release lease
//!   on_timer()  ──┘                         │
//!                           ┌───────────────┼──────────────────┐
//!                           ▼               ▼                  ▼
//!                        offline          failed           connected
//!                        (skip)           (fail)               │
//!                                                              ▼
//!                                                        debounce gate
//!                                                      ┌───────┴───────┐
//!                                                      ▼               ▼
//!                                                   denied         admitted
//!                                                   (skip)             │
//!                                                                      ▼
//!                                                        DnsUpdater::send_update()
//!
//!   every exit path ──► RefreshTimer::arm(refresh interval)
//! ```
//!
//! ## Guarantees
//!
//! - At most one cycle waits for a connection at any time (attempt lease).
//! - An online transition raised while a connect was outstanding, typically
//!   by that connect itself, is dropped once the run loop delivers it.
//! - `last_refresh` only moves forward, and only when the gate admits.
//! - Every cycle re-arms the refresh timer exactly once, whatever its outcome.
//!   Timer firings that find the lease taken re-arm as well; dropped online
//!   triggers do not, the cycle holding the lease does it for them.

pub mod events;
pub mod gate;
pub mod guard;
pub mod lease;
pub mod orchestrator;

pub use events::{CycleOutcome, SchedulerEvent, SkipReason, Trigger};
pub use gate::{DebounceGate, GateDecision};
pub use lease::{AttemptLease, LeaseGuard};
pub use orchestrator::{build_request, server_from_uri, zone_from_domain};

use chrono::{DateTime, Utc};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinSet;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, trace, warn};

use crate::config::{DynDnsOption, SchedulerConfig};
use crate::error::{Error, Result};
use crate::status::BackendStatus;
use crate::timer::TimerTicks;
use crate::traits::{Clock, ConfigStore, ConnectionPool, DnsUpdater, RefreshTimer, SystemClock};
use guard::Connect;
use orchestrator::UpdateOutcome;

/// Stream of online transitions the scheduler reacts to, by generation
pub type OnlineTransitions = Pin<Box<dyn Stream<Item = u64> + Send + 'static>>;

/// Mutable scheduler state
#[derive(Debug)]
struct SchedulerState {
    /// Time of the last attempt admitted by the debounce gate
    last_refresh: DateTime<Utc>,
}

pub(crate) struct SchedulerInner {
    pool: Arc<dyn ConnectionPool>,
    updater: Arc<dyn DnsUpdater>,
    timer: Arc<dyn RefreshTimer>,
    options: Arc<dyn ConfigStore>,
    clock: Arc<dyn Clock>,
    gate: DebounceGate,
    lease: AttemptLease,
    state: Mutex<SchedulerState>,
    config: SchedulerConfig,
    online: Mutex<Option<OnlineTransitions>>,
    status: Option<BackendStatus>,
    /// Latest online generation observed when a connect finished
    covered_generation: AtomicU64,
    started: AtomicBool,
    stopping: AtomicBool,
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl SchedulerInner {
    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Interval until the next periodic refresh
    ///
    /// The option store wins over the built-in configuration so that a
    /// reloaded interval applies from the next re-arm on.
    fn refresh_interval(&self) -> Duration {
        match self.options.get_int(DynDnsOption::RefreshInterval) {
            Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
            _ => self.config.refresh_interval(),
        }
    }

    /// Record the online transitions a finished connect has accounted for
    ///
    /// Must be called before the lease is released.
    fn cover_online_transitions(&self) {
        if let Some(status) = &self.status {
            self.covered_generation
                .fetch_max(status.generation(), Ordering::AcqRel);
        }
    }

    fn emit_event(&self, event: SchedulerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(TrySendError::Closed(_)) => {
                trace!("Event receiver dropped, event discarded");
            }
        }
    }
}

/// Re-arms the refresh timer when dropped
///
/// Lives for the whole cycle so that every exit path, early returns and
/// unwinding included, schedules the next refresh. Suppressed while the run
/// loop is shutting down.
struct Rearm<'a> {
    inner: &'a SchedulerInner,
}

impl Drop for Rearm<'_> {
    fn drop(&mut self) {
        if self.inner.stopping.load(Ordering::Acquire) {
            return;
        }
        let interval = self.inner.refresh_interval();
        debug!("Scheduling next dynamic DNS refresh in {:?}", interval);
        self.inner.timer.arm(interval);
    }
}

/// Debounced, connection-gated dynamic DNS refresh scheduler
///
/// Cheap to clone; clones share the same state.
///
/// ## Lifecycle
///
/// 1. Build with [`DynDnsScheduler::builder()`]
/// 2. Either drive [`on_online()`](Self::on_online) / [`on_timer()`](Self::on_timer)
///    yourself, or hand the timer ticks to [`run()`](Self::run)
/// 3. The run loop stops on SIGINT/SIGTERM (or the test shutdown signal)
#[derive(Clone)]
pub struct DynDnsScheduler {
    inner: Arc<SchedulerInner>,
}

impl DynDnsScheduler {
    /// Start building a scheduler
    pub fn builder() -> DynDnsSchedulerBuilder {
        DynDnsSchedulerBuilder::default()
    }

    /// Online-transition entry point
    pub async fn on_online(&self) -> CycleOutcome {
        self.run_cycle(Trigger::Online).await
    }

    /// Periodic-timer entry point
    ///
    /// Re-arms the refresh timer on every exit path, whether or not a run
    /// loop is active. Only cycles cut short by a run loop shutdown skip
    /// the re-arm.
    pub async fn on_timer(&self) -> CycleOutcome {
        self.run_cycle(Trigger::Timer).await
    }

    /// Time of the last attempt admitted by the debounce gate
    ///
    /// The Unix epoch until the first attempt is admitted.
    pub fn last_refresh(&self) -> DateTime<Utc> {
        self.inner.lock_state().last_refresh
    }

    /// Whether a cycle is currently waiting for its connection
    pub fn is_attempt_active(&self) -> bool {
        self.inner.lease.is_held()
    }

    /// Scheduler configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    async fn run_cycle(&self, trigger: Trigger) -> CycleOutcome {
        self.run_stamped_cycle(trigger, None).await
    }

    /// Cycle for a trigger that may carry the generation of the online
    /// transition it was raised for
    async fn run_stamped_cycle(&self, trigger: Trigger, generation: Option<u64>) -> CycleOutcome {
        let inner = &*self.inner;

        let rearm = match trigger {
            Trigger::Timer => Some(Rearm { inner }),
            Trigger::Online => None,
        };

        let Some(lease) = inner.lease.try_acquire() else {
            debug!("Connection attempt in progress, dropping {} trigger", trigger);
            inner.emit_event(SchedulerEvent::TriggerDropped { trigger });
            return CycleOutcome::Dropped;
        };

        // Covered transitions are published before the lease is released,
        // so holding it makes the comparison exact
        if let Some(generation) = generation {
            if generation <= inner.covered_generation.load(Ordering::Acquire) {
                debug!(
                    "Online transition {} happened during an earlier connection attempt, dropping it",
                    generation
                );
                drop(lease);
                inner.emit_event(SchedulerEvent::TriggerDropped { trigger });
                return CycleOutcome::Dropped;
            }
        }

        let _rearm = rearm.unwrap_or_else(|| Rearm { inner });

        debug!("Starting dynamic DNS refresh cycle ({})", trigger);
        inner.emit_event(SchedulerEvent::CycleStarted { trigger });

        let connection = match inner.ensure_connected(trigger, lease).await {
            Connect::Connected(connection) => connection,
            Connect::Offline => return CycleOutcome::Skipped(SkipReason::Offline),
            Connect::Failed(e) => return CycleOutcome::Failed(e.to_string()),
        };

        match inner.run_update(trigger, connection).await {
            Ok(UpdateOutcome::Sent) => CycleOutcome::Updated,
            Ok(UpdateOutcome::Skipped(reason)) => CycleOutcome::Skipped(reason),
            Err(e) => CycleOutcome::Failed(e.to_string()),
        }
    }

    /// Run the scheduler until a shutdown signal (SIGINT) is received
    ///
    /// Arms the refresh timer immediately, then spawns a cycle for every
    /// online transition and timer tick.
    pub async fn run(&self, ticks: TimerTicks) -> Result<()> {
        self.run_internal(ticks, None).await
    }

    /// Run the scheduler with a caller-controlled shutdown signal
    ///
    /// Stops when `shutdown_rx` fires (or its sender is dropped). With
    /// `None` this behaves like [`run()`](Self::run). The daemon uses it to
    /// stop on SIGTERM as well as SIGINT; tests use it for deterministic
    /// shutdown.
    pub async fn run_with_shutdown(
        &self,
        ticks: TimerTicks,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(ticks, shutdown_rx).await
    }

    async fn run_internal(
        &self,
        ticks: TimerTicks,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        if self.inner.started.swap(true, Ordering::AcqRel) {
            return Err(Error::Other(
                "Scheduler run loop has already been started".to_string(),
            ));
        }
        let online = self
            .inner
            .online
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        let online: OnlineTransitions = online.unwrap_or_else(|| Box::pin(tokio_stream::empty()));

        self.inner.emit_event(SchedulerEvent::Started);
        info!(
            "Dynamic DNS scheduler started (cooldown {}s, refresh interval {:?})",
            self.inner.config.cooldown_secs,
            self.inner.refresh_interval()
        );

        // First refresh right away
        self.inner.timer.arm(Duration::ZERO);

        let mut triggers = online
            .map(|generation| (Trigger::Online, Some(generation)))
            .merge(ticks.map(|_| (Trigger::Timer, None)));
        let mut cycles = JoinSet::new();

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some((trigger, generation)) = triggers.next() => {
                    let scheduler = self.clone();
                    cycles.spawn(async move { scheduler.run_stamped_cycle(trigger, generation).await });
                }

                Some(joined) = cycles.join_next() => {
                    match joined {
                        Ok(outcome) if outcome.is_success() => {
                            debug!("Refresh cycle finished: {:?}", outcome);
                        }
                        Ok(outcome) => {
                            debug!("Refresh cycle failed: {:?}", outcome);
                        }
                        Err(e) if e.is_panic() => {
                            error!("Refresh cycle panicked: {}", e);
                        }
                        Err(_) => {}
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.inner.stopping.store(true, Ordering::Release);
        cycles.shutdown().await;
        self.inner.stopping.store(false, Ordering::Release);

        self.inner.emit_event(SchedulerEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });
        info!("Dynamic DNS scheduler stopped");
        Ok(())
    }
}

/// Builder for [`DynDnsScheduler`]
///
/// Connection pool, updater, refresh timer and option store are required;
/// the clock defaults to the wall clock.
#[derive(Default)]
pub struct DynDnsSchedulerBuilder {
    pool: Option<Arc<dyn ConnectionPool>>,
    updater: Option<Arc<dyn DnsUpdater>>,
    timer: Option<Arc<dyn RefreshTimer>>,
    options: Option<Arc<dyn ConfigStore>>,
    clock: Option<Arc<dyn Clock>>,
    online: Option<OnlineTransitions>,
    status: Option<BackendStatus>,
    config: SchedulerConfig,
}

impl DynDnsSchedulerBuilder {
    pub fn connection_pool(mut self, pool: Arc<dyn ConnectionPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn updater(mut self, updater: Arc<dyn DnsUpdater>) -> Self {
        self.updater = Some(updater);
        self
    }

    pub fn timer(mut self, timer: Arc<dyn RefreshTimer>) -> Self {
        self.timer = Some(timer);
        self
    }

    pub fn options(mut self, options: Arc<dyn ConfigStore>) -> Self {
        self.options = Some(options);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register for online transitions of the backend
    ///
    /// The subscription is taken here, so transitions that happen between
    /// building and running the scheduler are not lost.
    pub fn online_notifier(mut self, status: &BackendStatus) -> Self {
        self.online = Some(status.online_transitions());
        self.status = Some(status.clone());
        self
    }

    /// Build the scheduler
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields scheduler events
    pub fn build(self) -> Result<(DynDnsScheduler, mpsc::Receiver<SchedulerEvent>)> {
        self.config.validate()?;

        let pool = self.pool.ok_or_else(|| {
            Error::config("A connection pool must be initialized in order to use dynamic DNS updates")
        })?;
        let updater = self
            .updater
            .ok_or_else(|| Error::config("A DNS updater is required"))?;
        let timer = self
            .timer
            .ok_or_else(|| Error::config("A refresh timer is required"))?;
        let options = self
            .options
            .ok_or_else(|| Error::config("An option store is required"))?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));

        let (event_tx, event_rx) = mpsc::channel(self.config.event_channel_capacity);

        let inner = SchedulerInner {
            pool,
            updater,
            timer,
            options,
            clock,
            gate: DebounceGate::new(self.config.cooldown()),
            lease: AttemptLease::new(),
            state: Mutex::new(SchedulerState {
                last_refresh: DateTime::<Utc>::UNIX_EPOCH,
            }),
            config: self.config,
            online: Mutex::new(self.online),
            status: self.status,
            covered_generation: AtomicU64::new(0),
            started: AtomicBool::new(false),
            stopping: AtomicBool::new(false),
            event_tx,
        };

        Ok((
            DynDnsScheduler {
                inner: Arc::new(inner),
            },
            event_rx,
        ))
    }
}
