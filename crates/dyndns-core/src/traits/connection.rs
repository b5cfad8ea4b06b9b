// # Connection Pool Trait
//
// Defines the interface for establishing a session with the directory
// service before a DNS update is attempted.
//
// ## Implementations
//
// - TCP reachability pool over `ldap://` URIs: `dyndns-ldap` crate
//
// ## Usage
//
// ```rust,ignore
// use dyndns_core::traits::ConnectionPool;
//
// let connection = match pool.connect().await {
//     Ok(conn) => conn,
//     Err(e) if e.is_offline() => return, // wait for the next trigger
//     Err(e) => return Err(e),
// };
// println!("connected to {}", connection.uri());
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// A live session with the directory service
///
/// The scheduler owns the boxed connection for the duration of one update
/// attempt and drops it when the attempt concludes.
pub trait Connection: Send + Sync {
    /// Canonical URI of the server this session talks to (e.g. `ldap://dc1.example.test`)
    fn uri(&self) -> &str;

    /// Local address of the session socket, if known
    ///
    /// Updaters use it to decide which address to publish when no
    /// interface is configured.
    fn local_addr(&self) -> Option<IpAddr> {
        None
    }
}

/// Trait for connection pool implementations
///
/// # Error Classification
///
/// - `Err(Error::Offline(_))`: no server is reachable. The scheduler treats
///   this as a skipped cycle, not a failure.
/// - Any other `Err`: the session could not be established. The cycle fails
///   and the next periodic tick retries.
///
/// # Forbidden Capabilities
/// - ❌ Retry or back off internally (the refresh timer is the only retry mechanism)
/// - ❌ Trigger DNS updates
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Acquire a usable session
    async fn connect(&self) -> Result<Box<dyn Connection>, crate::Error>;

    /// Pool name (for logging/debugging)
    fn pool_name(&self) -> &'static str;
}
