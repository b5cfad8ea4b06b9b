//! Test doubles and common utilities for scheduler contract tests
//!
//! This module provides minimal test doubles for the scheduler's
//! collaborators. Every double counts its calls so tests can assert on
//! exactly what the scheduler did.

#![allow(dead_code)]

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use dyndns_core::config::{DynDnsOption, SchedulerConfig};
use dyndns_core::error::{Error, Result};
use dyndns_core::traits::{
    Clock, Connection, ConnectionPool, DnsUpdater, RefreshTimer, UpdateRequest,
};
use dyndns_core::{DynDnsScheduler, MemoryConfigStore, SchedulerEvent};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};

/// URI the controlled pool connects to by default
pub const SERVER_URI: &str = "ldap://dc1.example.test";

/// A plain session pointing at a fixed URI
pub struct TestConnection {
    uri: String,
}

impl Connection for TestConnection {
    fn uri(&self) -> &str {
        &self.uri
    }
}

/// What the controlled pool answers to a `connect()` call
#[derive(Debug, Clone)]
pub enum ConnectScript {
    /// Hand out a session for this URI
    Connect(String),
    /// Report the service offline
    Offline,
    /// Fail with a non-offline error
    Fail,
}

/// A ConnectionPool whose answers are scripted by the test
///
/// When built with [`ControlledPool::held`], every `connect()` call waits
/// until the test calls [`ControlledPool::release`].
pub struct ControlledPool {
    script: Mutex<VecDeque<ConnectScript>>,
    fallback: ConnectScript,
    hold: Option<Notify>,
    connect_calls: AtomicUsize,
}

impl ControlledPool {
    fn with_fallback(fallback: ConnectScript) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            hold: None,
            connect_calls: AtomicUsize::new(0),
        }
    }

    /// Always connects to [`SERVER_URI`]
    pub fn connecting() -> Self {
        Self::with_fallback(ConnectScript::Connect(SERVER_URI.to_string()))
    }

    /// Always connects to the given URI
    pub fn connecting_to(uri: &str) -> Self {
        Self::with_fallback(ConnectScript::Connect(uri.to_string()))
    }

    /// Always reports offline
    pub fn offline() -> Self {
        Self::with_fallback(ConnectScript::Offline)
    }

    /// Always fails
    pub fn failing() -> Self {
        Self::with_fallback(ConnectScript::Fail)
    }

    /// Make every connect() wait for [`ControlledPool::release`]
    pub fn held(mut self) -> Self {
        self.hold = Some(Notify::new());
        self
    }

    /// Queue answers used before falling back to the default one
    pub fn then(self, script: ConnectScript) -> Self {
        self.script.lock().unwrap().push_back(script);
        self
    }

    /// Let one pending (or the next) connect() complete
    pub fn release(&self) {
        if let Some(hold) = &self.hold {
            hold.notify_one();
        }
    }

    /// Get the number of times connect() was called
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ConnectionPool for ControlledPool {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(hold) = &self.hold {
            hold.notified().await;
        }

        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match next {
            ConnectScript::Connect(uri) => Ok(Box::new(TestConnection { uri })),
            ConnectScript::Offline => Err(Error::offline("no server reachable")),
            ConnectScript::Fail => Err(Error::connection("SASL bind failed")),
        }
    }

    fn pool_name(&self) -> &'static str {
        "controlled"
    }
}

/// A DnsUpdater that records every request
pub struct RecordingUpdater {
    requests: Mutex<Vec<UpdateRequest>>,
    fail: bool,
}

impl RecordingUpdater {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// An updater whose every update is rejected
    pub fn failing() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Get the number of times send_update() was called
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Get the requests that were sent
    pub fn requests(&self) -> Vec<UpdateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl DnsUpdater for RecordingUpdater {
    async fn send_update(&self, _connection: &dyn Connection, request: &UpdateRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(Error::update("REFUSED"));
        }
        Ok(())
    }

    fn updater_name(&self) -> &'static str {
        "recording"
    }
}

/// A RefreshTimer that only records when it was armed
#[derive(Default)]
pub struct RecordingTimer {
    arms: Mutex<Vec<Duration>>,
}

impl RecordingTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of times arm() was called
    pub fn arm_count(&self) -> usize {
        self.arms.lock().unwrap().len()
    }

    /// Get the delays the timer was armed with
    pub fn arms(&self) -> Vec<Duration> {
        self.arms.lock().unwrap().clone()
    }
}

impl RefreshTimer for RecordingTimer {
    fn arm(&self, after: Duration) {
        self.arms.lock().unwrap().push(after);
    }
}

/// A clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, secs: i64) {
        *self.now.lock().unwrap() += ChronoDuration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Fixed starting point of the manual clock
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
}

/// Options describing a complete update target
pub fn target_options() -> MemoryConfigStore {
    let options = MemoryConfigStore::new();
    options.set(DynDnsOption::Domain, "EXAMPLE.TEST");
    options.set(DynDnsOption::Hostname, "client.example.test");
    options.set(DynDnsOption::Realm, "EXAMPLE.TEST");
    options.set(DynDnsOption::Iface, "eth0");
    options.set(DynDnsOption::Ttl, 1200);
    options
}

/// Scheduler plus handles to all of its doubles
pub struct Harness {
    pub scheduler: DynDnsScheduler,
    pub events: mpsc::Receiver<SchedulerEvent>,
    pub pool: Arc<ControlledPool>,
    pub updater: Arc<RecordingUpdater>,
    pub timer: Arc<RecordingTimer>,
    pub clock: Arc<ManualClock>,
    pub options: MemoryConfigStore,
}

impl Harness {
    /// Scheduler with a 60 s cooldown and a 3600 s refresh interval
    pub fn new(pool: ControlledPool, updater: RecordingUpdater) -> Self {
        let pool = Arc::new(pool);
        let updater = Arc::new(updater);
        let timer = Arc::new(RecordingTimer::new());
        let clock = Arc::new(ManualClock::new(start_time()));
        let options = target_options();

        let (scheduler, events) = DynDnsScheduler::builder()
            .connection_pool(pool.clone())
            .updater(updater.clone())
            .timer(timer.clone())
            .options(Arc::new(options.clone()))
            .clock(clock.clone())
            .config(
                SchedulerConfig::new()
                    .with_cooldown_secs(60)
                    .with_refresh_interval_secs(3600),
            )
            .build()
            .expect("scheduler construction succeeds");

        Self {
            scheduler,
            events,
            pool,
            updater,
            timer,
            clock,
            options,
        }
    }

    /// Drain every event emitted so far
    pub fn drain_events(&mut self) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
