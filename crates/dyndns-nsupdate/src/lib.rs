// # nsupdate DNS Updater
//
// This crate provides the `DnsUpdater` implementation that publishes the
// host's addresses by piping a message into the `nsupdate` utility.
//
// ## Behavior
//
// - Addresses come from the configured interface, or from the local end of
//   the directory session when no interface is configured
// - Loopback and link-local addresses are never published
// - For each address family the existing records are deleted and the
//   current addresses added, then the batch is sent
// - `nsupdate -g` (GSS-TSIG) is used when the request asks for the host's
//   authentication identity
// - One process per update, bounded by a timeout; a non-zero exit status
//   fails the update with nsupdate's stderr as the message
//
// ## Trust Level
//
// Like every updater, this one is single-shot: no retries, no scheduling,
// no state across calls. Cadence and debouncing belong to the scheduler.

pub mod ifaddrs;

use async_trait::async_trait;
use dyndns_core::traits::{Connection, DnsUpdater, UpdateRequest};
use dyndns_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Default nsupdate binary, looked up in `PATH`
pub const DEFAULT_NSUPDATE_BINARY: &str = "nsupdate";

/// Default time an nsupdate run may take
pub const DEFAULT_NSUPDATE_TIMEOUT: Duration = Duration::from_secs(30);

/// Updater configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsupdateConfig {
    /// Path or name of the nsupdate binary
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Maximum run time of one nsupdate process, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Log the message instead of running nsupdate
    #[serde(default)]
    pub dry_run: bool,
}

fn default_binary() -> String {
    DEFAULT_NSUPDATE_BINARY.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_NSUPDATE_TIMEOUT.as_secs()
}

impl Default for NsupdateConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            timeout_secs: default_timeout_secs(),
            dry_run: false,
        }
    }
}

/// DNS record type for an address
fn record_type(addr: &IpAddr) -> &'static str {
    match addr {
        IpAddr::V4(_) => "A",
        IpAddr::V6(_) => "AAAA",
    }
}

fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

/// Build the nsupdate input for `request` publishing `addrs`
///
/// Both address families are always rewritten, so records of a family the
/// host no longer has are removed.
pub fn build_message(request: &UpdateRequest, addrs: &[IpAddr]) -> String {
    let host = fqdn(&request.hostname);
    let mut message = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(message, "server {}", request.server);
    if let Some(realm) = &request.realm {
        let _ = writeln!(message, "realm {}", realm);
    }
    let _ = writeln!(message, "zone {}", fqdn(&request.zone));

    for rtype in ["A", "AAAA"] {
        let _ = writeln!(message, "update delete {} in {}", host, rtype);
        for addr in addrs.iter().filter(|addr| record_type(addr) == rtype) {
            let _ = writeln!(message, "update add {} {} in {} {}", host, request.ttl, rtype, addr);
        }
        let _ = writeln!(message, "send");
    }

    message
}

/// `DnsUpdater` backed by the `nsupdate` utility
#[derive(Debug, Clone)]
pub struct NsupdateUpdater {
    config: NsupdateConfig,
}

impl NsupdateUpdater {
    pub fn new(config: NsupdateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NsupdateConfig {
        &self.config
    }

    /// Addresses to publish for this request
    pub fn resolve_addresses(
        &self,
        request: &UpdateRequest,
        connection: &dyn Connection,
    ) -> Result<Vec<IpAddr>> {
        match &request.interface {
            Some(iface) => {
                let addrs = ifaddrs::interface_addresses(iface).map_err(|e| {
                    Error::update(format!("Cannot read addresses of interface {}: {}", iface, e))
                })?;
                if addrs.is_empty() {
                    return Err(Error::update(format!(
                        "Interface {} has no address suitable for DNS",
                        iface
                    )));
                }
                Ok(addrs)
            }
            None => match connection.local_addr() {
                Some(addr) if ifaddrs::is_publishable(&addr) => Ok(vec![addr]),
                Some(addr) => Err(Error::update(format!(
                    "Local address {} of the connection to {} is not suitable for DNS",
                    addr,
                    connection.uri()
                ))),
                None => Err(Error::update(format!(
                    "Cannot determine the local address of the connection to {}",
                    connection.uri()
                ))),
            },
        }
    }

    /// Run nsupdate with `message` on stdin
    pub async fn run_nsupdate(&self, message: &str, use_gss: bool) -> Result<()> {
        let mut command = Command::new(&self.config.binary);
        if use_gss {
            command.arg("-g");
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            Error::update(format!("Failed to start {}: {}", self.config.binary, e))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(message.as_bytes()).await {
                Ok(()) => {}
                // The exit status tells what went wrong
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!("{} closed its input early", self.config.binary);
                }
                Err(e) => {
                    return Err(Error::update(format!(
                        "Failed to write to {}: {}",
                        self.config.binary, e
                    )));
                }
            }
        }

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::update(format!(
                    "{} did not finish within {:?}",
                    self.config.binary, timeout
                ))
            })?
            .map_err(|e| Error::update(format!("Failed to wait for {}: {}", self.config.binary, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::update(format!(
                "{} failed ({}): {}",
                self.config.binary,
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl Default for NsupdateUpdater {
    fn default() -> Self {
        Self::new(NsupdateConfig::default())
    }
}

#[async_trait]
impl DnsUpdater for NsupdateUpdater {
    async fn send_update(&self, connection: &dyn Connection, request: &UpdateRequest) -> Result<()> {
        let addrs = self.resolve_addresses(request, connection)?;
        let message = build_message(request, &addrs);

        if self.config.dry_run {
            tracing::info!(
                "DRY-RUN: would send update for {} in zone {} to {}:\n{}",
                request.hostname,
                request.zone,
                request.server,
                message
            );
            return Ok(());
        }

        tracing::debug!("Sending nsupdate message:\n{}", message);
        self.run_nsupdate(&message, request.use_auth_identity).await
    }

    fn updater_name(&self) -> &'static str {
        "nsupdate"
    }
}
