//! Pool Contract Test: Online Transitions
//!
//! This test runs the scheduler against a real `LdapConnectionPool` that
//! reports reachability into the same `BackendStatus` the scheduler
//! listens to.
//!
//! Constraints verified:
//! - The online transition raised by a cycle's own connect is dropped and
//!   causes neither a second cycle nor a second connect
//! - A later transition from outside the cycle still starts a cycle

use async_trait::async_trait;
use dyndns_core::traits::{Connection, DnsUpdater, UpdateRequest};
use dyndns_core::{
    BackendStatus, DynDnsOption, DynDnsScheduler, MemoryConfigStore, Result, SchedulerEvent,
    TokioRefreshTimer, Trigger,
};
use dyndns_ldap::{LdapConnectionPool, LdapPoolConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[derive(Default)]
struct CountingUpdater {
    calls: AtomicUsize,
}

#[async_trait]
impl DnsUpdater for CountingUpdater {
    async fn send_update(&self, _connection: &dyn Connection, _request: &UpdateRequest) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn updater_name(&self) -> &'static str {
        "counting"
    }
}

async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Listener that accepts and keeps every session, counting them
async fn counting_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let uri = format!("ldap://127.0.0.1:{}", listener.local_addr().unwrap().port());
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        let mut sessions = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            sessions.push(stream);
        }
    });

    (uri, accepted)
}

#[tokio::test]
async fn own_online_transition_does_not_start_a_cycle() {
    let (uri, accepted) = counting_server().await;
    let status = BackendStatus::new();
    let pool = LdapConnectionPool::new(&LdapPoolConfig::new(vec![uri]), status.clone()).unwrap();
    let updater = Arc::new(CountingUpdater::default());
    let options = MemoryConfigStore::new();
    options.set(DynDnsOption::Domain, "example.test");
    options.set(DynDnsOption::Hostname, "client.example.test");
    let (timer, ticks) = TokioRefreshTimer::new();

    let (scheduler, mut events) = DynDnsScheduler::builder()
        .connection_pool(Arc::new(pool))
        .updater(updater.clone())
        .timer(Arc::new(timer))
        .options(Arc::new(options))
        .online_notifier(&status)
        .build()
        .unwrap();

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let runner = scheduler.clone();
    let handle = tokio::spawn(async move { runner.run_with_shutdown(ticks, Some(shutdown_rx)).await });

    assert!(
        wait_until(Duration::from_secs(2), || updater.calls.load(Ordering::SeqCst) == 1).await,
        "first refresh must update"
    );
    assert!(status.is_online());

    // Give the run loop time to deliver the transition the connect raised
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1, "no second connect");

    assert!(status.mark_offline());
    assert!(status.mark_online());
    assert!(
        wait_until(Duration::from_secs(2), || accepted.load(Ordering::SeqCst) == 2).await,
        "a transition from outside the cycle must start one"
    );

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("run loop must stop promptly")
        .unwrap()
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    let started = |trigger: Trigger| {
        seen.iter()
            .filter(|e| **e == SchedulerEvent::CycleStarted { trigger })
            .count()
    };
    assert_eq!(started(Trigger::Timer), 1);
    assert_eq!(started(Trigger::Online), 1);
    assert!(seen.contains(&SchedulerEvent::TriggerDropped { trigger: Trigger::Online }));
    assert_eq!(updater.calls.load(Ordering::SeqCst), 1, "second cycle is debounced");
}
