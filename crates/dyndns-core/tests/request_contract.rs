//! Scheduler Contract Test: Update Request Assembly
//!
//! This test verifies what the updater is asked to do.
//!
//! Constraints verified:
//! - The zone is the lower-case form of the configured domain
//! - The configuration store itself is never modified
//! - The server is taken from an `ldap://` session URI; anything else fails
//!   the cycle with a configuration error and no update
//! - Missing required options fail the cycle through the same outcome
//! - Option changes are picked up by the next attempt

mod common;

use common::*;
use dyndns_core::traits::ConfigStore;
use dyndns_core::{CycleOutcome, DynDnsOption, SchedulerEvent, Trigger, UpdateRequest};

#[tokio::test]
async fn request_carries_the_configured_target() {
    let h = Harness::new(ControlledPool::connecting(), RecordingUpdater::new());

    h.scheduler.on_timer().await;

    assert_eq!(
        h.updater.requests(),
        vec![UpdateRequest {
            interface: Some("eth0".to_string()),
            hostname: "client.example.test".to_string(),
            zone: "example.test".to_string(),
            realm: Some("EXAMPLE.TEST".to_string()),
            server: "dc1.example.test".to_string(),
            ttl: 1200,
            use_auth_identity: true,
        }]
    );
}

#[tokio::test]
async fn zone_is_normalized_without_touching_the_store() {
    let h = Harness::new(ControlledPool::connecting(), RecordingUpdater::new());

    h.scheduler.on_timer().await;

    assert_eq!(h.updater.requests()[0].zone, "example.test");
    assert_eq!(
        h.options.get_string(DynDnsOption::Domain).as_deref(),
        Some("EXAMPLE.TEST")
    );
}

#[tokio::test]
async fn unexpected_uri_scheme_fails_without_update() {
    let mut h = Harness::new(
        ControlledPool::connecting_to("https://host:1234"),
        RecordingUpdater::new(),
    );

    let outcome = h.scheduler.on_timer().await;

    match outcome {
        CycleOutcome::Failed(error) => assert!(error.starts_with("Configuration error")),
        other => panic!("expected a failed cycle, got {:?}", other),
    }
    assert_eq!(h.updater.calls(), 0);

    let events = h.drain_events();
    assert!(events.iter().any(|e| matches!(
        e,
        SchedulerEvent::UpdateFailed { trigger: Trigger::Timer, .. }
    )));
}

#[tokio::test]
async fn server_port_is_stripped() {
    let h = Harness::new(
        ControlledPool::connecting_to("ldap://dc2.example.test:389"),
        RecordingUpdater::new(),
    );

    h.scheduler.on_online().await;

    assert_eq!(h.updater.requests()[0].server, "dc2.example.test");
}

#[tokio::test]
async fn missing_domain_fails_the_cycle() {
    let h = Harness::new(ControlledPool::connecting(), RecordingUpdater::new());
    h.options.remove(DynDnsOption::Domain);

    let outcome = h.scheduler.on_timer().await;

    assert!(matches!(outcome, CycleOutcome::Failed(ref e) if e.contains("dyndns_domain")));
    assert_eq!(h.updater.calls(), 0);
}

#[tokio::test]
async fn missing_hostname_fails_the_cycle() {
    let h = Harness::new(ControlledPool::connecting(), RecordingUpdater::new());
    h.options.remove(DynDnsOption::Hostname);

    assert!(matches!(h.scheduler.on_timer().await, CycleOutcome::Failed(_)));
    assert_eq!(h.updater.calls(), 0);
}

#[tokio::test]
async fn reloaded_options_apply_to_the_next_attempt() {
    let h = Harness::new(ControlledPool::connecting(), RecordingUpdater::new());

    h.scheduler.on_timer().await;
    h.options.set(DynDnsOption::Domain, "Corp.Example.TEST");
    h.options.set(DynDnsOption::Ttl, 300);
    h.clock.advance(120);
    h.scheduler.on_timer().await;

    let requests = h.updater.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].zone, "corp.example.test");
    assert_eq!(requests[1].ttl, 300);
}
