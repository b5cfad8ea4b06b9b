// # LDAP Connection Pool
//
// This crate provides the connection pool the dynamic DNS scheduler uses to
// decide whether the directory service is reachable.
//
// ## Behavior
//
// - Servers are tried in the configured order (failover list)
// - Each attempt is a TCP connect bounded by a timeout
// - The first reachable server wins and the pool reports the backend online
// - When no server answers, the pool reports the backend offline and
//   `connect()` returns `Error::Offline`, which the scheduler treats as a
//   skipped cycle rather than a failure
//
// The pool does not retry on its own. The refresh timer and online
// transitions are the only reasons a new attempt is made.
//
// ## URIs
//
// Accepted forms: `ldap://host`, `ldap://host:port`, `ldap://[v6addr]:port`
// and the same with `ldaps://`. A trailing path or DN component is ignored.
// IPv6 literals must be bracketed.

use async_trait::async_trait;
use dyndns_core::traits::{Connection, ConnectionPool};
use dyndns_core::{BackendStatus, Error, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// Default TCP connect timeout per server
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(6);

const LDAP_PORT: u16 = 389;
const LDAPS_PORT: u16 = 636;

/// Pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdapPoolConfig {
    /// Servers in failover order
    pub uris: Vec<String>,

    /// Per-server connect timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    DEFAULT_CONNECT_TIMEOUT.as_secs()
}

impl LdapPoolConfig {
    pub fn new(uris: Vec<String>) -> Self {
        Self {
            uris,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// A parsed server entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapServer {
    uri: String,
    host: String,
    port: u16,
}

impl LdapServer {
    /// Parse an `ldap://` or `ldaps://` URI
    pub fn parse(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        let (rest, default_port) = if let Some(rest) = uri.strip_prefix("ldap://") {
            (rest, LDAP_PORT)
        } else if let Some(rest) = uri.strip_prefix("ldaps://") {
            (rest, LDAPS_PORT)
        } else {
            return Err(Error::config(format!("Unsupported LDAP URI scheme: {}", uri)));
        };

        let authority = rest.split('/').next().unwrap_or_default();
        if authority.is_empty() {
            return Err(Error::config(format!("LDAP URI has no host: {}", uri)));
        }

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, tail) = bracketed
                .split_once(']')
                .ok_or_else(|| Error::config(format!("Unterminated IPv6 address in URI: {}", uri)))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(port, uri)?,
                None if tail.is_empty() => default_port,
                None => return Err(Error::config(format!("Malformed LDAP URI: {}", uri))),
            };
            (host.to_string(), port)
        } else {
            match authority.split_once(':') {
                Some((_, port)) if port.contains(':') => {
                    return Err(Error::config(format!(
                        "IPv6 address in LDAP URI must be enclosed in brackets: {}",
                        uri
                    )));
                }
                Some((host, port)) => (host.to_string(), parse_port(port, uri)?),
                None => (authority.to_string(), default_port),
            }
        };

        if host.is_empty() {
            return Err(Error::config(format!("LDAP URI has no host: {}", uri)));
        }

        Ok(Self {
            uri: uri.to_string(),
            host,
            port,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

fn parse_port(port: &str, uri: &str) -> Result<u16> {
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::config(format!("Invalid port in LDAP URI: {}", uri))),
        Ok(port) => Ok(port),
    }
}

/// Session with a reachable server
///
/// Holds the TCP stream open until the scheduler drops the connection.
#[derive(Debug)]
pub struct LdapConnection {
    uri: String,
    local_addr: Option<IpAddr>,
    _stream: TcpStream,
}

impl Connection for LdapConnection {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn local_addr(&self) -> Option<IpAddr> {
        self.local_addr
    }
}

/// Failover pool over a list of LDAP servers
pub struct LdapConnectionPool {
    servers: Vec<LdapServer>,
    connect_timeout: Duration,
    status: BackendStatus,
}

impl LdapConnectionPool {
    /// Create a pool reporting reachability into `status`
    ///
    /// Fails with a configuration error if the list is empty or any URI
    /// is malformed.
    pub fn new(config: &LdapPoolConfig, status: BackendStatus) -> Result<Self> {
        if config.uris.is_empty() {
            return Err(Error::config("At least one LDAP server URI is required"));
        }
        if config.connect_timeout_secs == 0 {
            return Err(Error::config("connect_timeout_secs must be greater than 0"));
        }

        let servers = config
            .uris
            .iter()
            .map(|uri| LdapServer::parse(uri))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            servers,
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            status,
        })
    }

    /// Override the per-server connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn servers(&self) -> &[LdapServer] {
        &self.servers
    }

    async fn try_server(&self, server: &LdapServer) -> std::result::Result<TcpStream, String> {
        let connect = TcpStream::connect((server.host.as_str(), server.port));
        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("timed out after {:?}", self.connect_timeout)),
        }
    }
}

#[async_trait]
impl ConnectionPool for LdapConnectionPool {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        for server in &self.servers {
            match self.try_server(server).await {
                Ok(stream) => {
                    tracing::debug!("Server {} is reachable", server.uri);
                    self.status.mark_online();
                    let local_addr = stream.local_addr().ok().map(|addr| addr.ip());
                    return Ok(Box::new(LdapConnection {
                        uri: server.uri.clone(),
                        local_addr,
                        _stream: stream,
                    }));
                }
                Err(reason) => {
                    tracing::debug!("Server {} is not reachable: {}", server.uri, reason);
                }
            }
        }

        self.status.mark_offline();
        Err(Error::offline(format!(
            "none of the {} configured LDAP servers is reachable",
            self.servers.len()
        )))
    }

    fn pool_name(&self) -> &'static str {
        "ldap"
    }
}
