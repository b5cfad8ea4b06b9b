// # DNS Updater Trait
//
// Defines the interface for pushing the client's address records to the
// DNS server. The wire protocol (nsupdate messages, GSS-TSIG signing) is
// entirely the implementation's business.
//
// ## Implementations
//
// - `nsupdate` process driver: `dyndns-nsupdate` crate

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::traits::Connection;

/// Parameters of a single dynamic DNS update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Interface whose addresses are published (`None`: use the session's local address)
    pub interface: Option<String>,
    /// Fully qualified client host name
    pub hostname: String,
    /// DNS zone, always lower case
    pub zone: String,
    /// Kerberos realm used for the update, if any
    pub realm: Option<String>,
    /// DNS server to send the update to (host part of the session URI)
    pub server: String,
    /// TTL of the published records
    pub ttl: u32,
    /// Authenticate the update with the caller's own identity (GSS-TSIG)
    pub use_auth_identity: bool,
}

/// Trait for DNS updater implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Talk to the DNS server named in the request
/// - ✅ Inspect the session for its local address
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (owned by the scheduler's refresh timer)
/// - ❌ Decide whether an update is needed (owned by the debounce gate)
/// - ❌ Keep state between calls
#[async_trait]
pub trait DnsUpdater: Send + Sync {
    /// Send one update and wait for its result
    ///
    /// # Returns
    ///
    /// - `Ok(())`: the server accepted the update
    /// - `Err(Error)`: the update failed; the error carries the detail to log
    async fn send_update(
        &self,
        connection: &dyn Connection,
        request: &UpdateRequest,
    ) -> Result<(), crate::Error>;

    /// Updater name (for logging/debugging)
    fn updater_name(&self) -> &'static str;
}
