//! Update orchestrator
//!
//! Consults the debounce gate, assembles the [`UpdateRequest`] from the
//! option store and the live session, and drives the updater.
//!
//! Every early exit (missing option, unexpected URI) and every updater
//! failure comes back through the same `Result`, so the cycle has a single
//! completion path.

use tracing::{debug, error, info};

use super::events::{SchedulerEvent, SkipReason, Trigger};
use super::gate::GateDecision;
use super::SchedulerInner;
use crate::config::{DynDnsOption, DEFAULT_TTL_SECS};
use crate::error::{Error, Result};
use crate::traits::{ConfigStore, Connection, UpdateRequest};

/// URI scheme the session must use for its host to double as the DNS server
pub const EXPECTED_URI_SCHEME: &str = "ldap://";

/// What the orchestrator did
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum UpdateOutcome {
    Sent,
    Skipped(SkipReason),
}

impl SchedulerInner {
    pub(super) async fn run_update(
        &self,
        trigger: Trigger,
        connection: Box<dyn Connection>,
    ) -> Result<UpdateOutcome> {
        let now = self.clock.now();
        let decision = {
            let mut state = self.lock_state();
            self.gate
                .admit(now, &mut state.last_refresh, self.lease.is_held())
        };

        let reason = match decision {
            GateDecision::Proceed => None,
            GateDecision::AttemptActive => {
                debug!("Connection attempt in progress, not scheduling another update");
                Some(SkipReason::AttemptActive)
            }
            GateDecision::Cooldown { remaining } => {
                debug!(
                    "Last update ran recently, not scheduling another one for {:?}",
                    remaining
                );
                Some(SkipReason::Cooldown)
            }
        };
        if let Some(reason) = reason {
            self.emit_event(SchedulerEvent::UpdateSkipped { trigger, reason });
            return Ok(UpdateOutcome::Skipped(reason));
        }

        let request = match build_request(self.options.as_ref(), connection.uri()) {
            Ok(request) => request,
            Err(e) => {
                error!("Cannot build dynamic DNS update: {}", e);
                self.emit_event(SchedulerEvent::UpdateFailed {
                    trigger,
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        info!(
            "Performing dynamic DNS update of {} in zone {} via {}",
            request.hostname, request.zone, request.server
        );

        match self
            .updater
            .send_update(connection.as_ref(), &request)
            .await
        {
            Ok(()) => {
                info!("DNS update finished for {}", request.hostname);
                self.emit_event(SchedulerEvent::UpdateSent {
                    trigger,
                    hostname: request.hostname,
                    zone: request.zone,
                    server: request.server,
                });
                Ok(UpdateOutcome::Sent)
            }
            Err(e) => {
                error!(
                    "Dynamic DNS update via {} failed: {}",
                    self.updater.updater_name(),
                    e
                );
                self.emit_event(SchedulerEvent::UpdateFailed {
                    trigger,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

/// Assemble the update request from the option store and the session URI
pub fn build_request(options: &dyn ConfigStore, uri: &str) -> Result<UpdateRequest> {
    let domain = required_string(options, DynDnsOption::Domain)?;
    let zone = zone_from_domain(&domain);
    let server = server_from_uri(uri)?;
    let hostname = required_string(options, DynDnsOption::Hostname)?;

    Ok(UpdateRequest {
        interface: optional_string(options, DynDnsOption::Iface),
        hostname,
        zone,
        realm: optional_string(options, DynDnsOption::Realm),
        server,
        ttl: ttl(options)?,
        use_auth_identity: true,
    })
}

/// The DNS zone is the lower-case form of the directory domain
pub fn zone_from_domain(domain: &str) -> String {
    domain.trim().to_lowercase()
}

/// Extract the server host from an `ldap://` URI
///
/// The port and any path are dropped; bracketed IPv6 literals are unwrapped.
/// An unterminated or unbracketed IPv6 literal is a configuration error.
pub fn server_from_uri(uri: &str) -> Result<String> {
    let rest = uri.strip_prefix(EXPECTED_URI_SCHEME).ok_or_else(|| {
        Error::config(format!(
            "Unexpected format of server URI '{}', expected {}",
            uri, EXPECTED_URI_SCHEME
        ))
    })?;

    let malformed = || Error::config(format!("Malformed server URI '{}'", uri));

    let authority = rest.split('/').next().unwrap_or_default();
    let host = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, tail) = bracketed.split_once(']').ok_or_else(malformed)?;
        if !(tail.is_empty() || tail.starts_with(':')) {
            return Err(malformed());
        }
        host
    } else {
        match authority.split_once(':') {
            Some((_, port)) if port.contains(':') => return Err(malformed()),
            Some((host, _)) => host,
            None => authority,
        }
    };

    if host.is_empty() {
        return Err(Error::config(format!("Server URI '{}' has no host", uri)));
    }
    Ok(host.to_string())
}

fn required_string(options: &dyn ConfigStore, option: DynDnsOption) -> Result<String> {
    optional_string(options, option)
        .ok_or_else(|| Error::config(format!("{} is not set", option)))
}

fn optional_string(options: &dyn ConfigStore, option: DynDnsOption) -> Option<String> {
    options
        .get_string(option)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn ttl(options: &dyn ConfigStore) -> Result<u32> {
    match options.get_int(DynDnsOption::Ttl) {
        None => Ok(DEFAULT_TTL_SECS),
        Some(ttl) if ttl > 0 && ttl <= i64::from(i32::MAX) => Ok(ttl as u32),
        Some(ttl) => Err(Error::config(format!(
            "{} must be between 1 and {}, got {}",
            DynDnsOption::Ttl,
            i32::MAX,
            ttl
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::MemoryConfigStore;

    fn options() -> MemoryConfigStore {
        let store = MemoryConfigStore::new();
        store.set(DynDnsOption::Domain, "EXAMPLE.TEST");
        store.set(DynDnsOption::Hostname, "client.example.test");
        store.set(DynDnsOption::Realm, "EXAMPLE.TEST");
        store
    }

    #[test]
    fn test_zone_is_lower_case() {
        assert_eq!(zone_from_domain("EXAMPLE.TEST"), "example.test");
        assert_eq!(zone_from_domain(" Corp.Example.Test "), "corp.example.test");
    }

    #[test]
    fn test_server_from_uri() {
        assert_eq!(server_from_uri("ldap://dc1.example.test").unwrap(), "dc1.example.test");
        assert_eq!(server_from_uri("ldap://dc1.example.test:389").unwrap(), "dc1.example.test");
        assert_eq!(server_from_uri("ldap://dc1.example.test/").unwrap(), "dc1.example.test");
        assert_eq!(server_from_uri("ldap://[2001:db8::1]:389").unwrap(), "2001:db8::1");
    }

    #[test]
    fn test_server_from_uri_rejects_other_schemes() {
        assert!(server_from_uri("https://host:1234").unwrap_err().is_config());
        assert!(server_from_uri("ldaps://dc1.example.test").unwrap_err().is_config());
        assert!(server_from_uri("ldap://").unwrap_err().is_config());
    }

    #[test]
    fn test_server_from_uri_rejects_malformed_ipv6() {
        for uri in [
            "ldap://[::1",
            "ldap://[::1]389",
            "ldap://2001:db8::1",
            "ldap://2001:db8::1:389",
        ] {
            let err = server_from_uri(uri).unwrap_err();
            assert!(err.is_config(), "{} should be a configuration error", uri);
        }
        assert_eq!(server_from_uri("ldap://[::1]").unwrap(), "::1");
    }

    #[test]
    fn test_build_request() {
        let request = build_request(&options(), "ldap://dc1.example.test").unwrap();
        assert_eq!(
            request,
            UpdateRequest {
                interface: None,
                hostname: "client.example.test".to_string(),
                zone: "example.test".to_string(),
                realm: Some("EXAMPLE.TEST".to_string()),
                server: "dc1.example.test".to_string(),
                ttl: DEFAULT_TTL_SECS,
                use_auth_identity: true,
            }
        );
    }

    #[test]
    fn test_build_request_leaves_store_untouched() {
        let store = options();
        build_request(&store, "ldap://dc1.example.test").unwrap();
        assert_eq!(
            store.get_string(DynDnsOption::Domain).as_deref(),
            Some("EXAMPLE.TEST")
        );
    }

    #[test]
    fn test_build_request_missing_domain() {
        let store = options();
        store.remove(DynDnsOption::Domain);
        let err = build_request(&store, "ldap://dc1.example.test").unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("dyndns_domain"));
    }

    #[test]
    fn test_build_request_rejects_bad_ttl() {
        let store = options();
        store.set(DynDnsOption::Ttl, -5);
        assert!(build_request(&store, "ldap://dc1").unwrap_err().is_config());

        store.set(DynDnsOption::Ttl, 3600);
        assert_eq!(build_request(&store, "ldap://dc1").unwrap().ttl, 3600);
    }

    #[test]
    fn test_blank_interface_is_ignored() {
        let store = options();
        store.set(DynDnsOption::Iface, "  ");
        assert_eq!(build_request(&store, "ldap://dc1").unwrap().interface, None);

        store.set(DynDnsOption::Iface, "eth0");
        assert_eq!(
            build_request(&store, "ldap://dc1").unwrap().interface.as_deref(),
            Some("eth0")
        );
    }
}
