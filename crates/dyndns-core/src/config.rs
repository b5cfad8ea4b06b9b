//! Configuration types for the dynamic DNS scheduler
//!
//! Two kinds of configuration exist:
//! - [`SchedulerConfig`]: timing knobs fixed when the scheduler is built
//! - [`DynDnsOption`]: keys looked up in a [`ConfigStore`](crate::traits::ConfigStore)
//!   at the start of every update attempt, so a reloaded store is picked up
//!   without rebuilding the scheduler

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default TTL for the published records (seconds)
pub const DEFAULT_TTL_SECS: u32 = 1200;

/// Scheduler timing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minimum time between two update attempts allowed past the debounce gate
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Delay before the periodic refresh timer fires again
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    /// Capacity of the scheduler event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SchedulerConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            refresh_interval_secs: default_refresh_interval_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Set the cooldown window
    pub fn with_cooldown_secs(mut self, secs: u64) -> Self {
        self.cooldown_secs = secs;
        self
    }

    /// Set the periodic refresh interval
    pub fn with_refresh_interval_secs(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    /// Cooldown as a [`Duration`]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Refresh interval as a [`Duration`]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.cooldown_secs == 0 {
            return Err(crate::Error::config("cooldown_secs must be > 0"));
        }
        if self.refresh_interval_secs == 0 {
            return Err(crate::Error::config("refresh_interval_secs must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_refresh_interval_secs() -> u64 {
    43200
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Option keys read from the configuration store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynDnsOption {
    /// Directory domain; its lower-cased form is the DNS zone
    Domain,
    /// Client host name whose records are refreshed
    Hostname,
    /// Kerberos realm used to authenticate the update
    Realm,
    /// Interface whose addresses are published
    Iface,
    /// TTL of the published records
    Ttl,
    /// Periodic refresh interval in seconds
    RefreshInterval,
    /// Whether dynamic updates are enabled at all
    Update,
}

impl DynDnsOption {
    /// All known options
    pub const ALL: [DynDnsOption; 7] = [
        DynDnsOption::Domain,
        DynDnsOption::Hostname,
        DynDnsOption::Realm,
        DynDnsOption::Iface,
        DynDnsOption::Ttl,
        DynDnsOption::RefreshInterval,
        DynDnsOption::Update,
    ];

    /// The key under which the option is stored
    pub fn key(&self) -> &'static str {
        match self {
            DynDnsOption::Domain => "dyndns_domain",
            DynDnsOption::Hostname => "dyndns_hostname",
            DynDnsOption::Realm => "dyndns_realm",
            DynDnsOption::Iface => "dyndns_iface",
            DynDnsOption::Ttl => "dyndns_ttl",
            DynDnsOption::RefreshInterval => "dyndns_refresh_interval",
            DynDnsOption::Update => "dyndns_update",
        }
    }

    /// Look up an option by its key
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|opt| opt.key() == key)
    }
}

impl std::fmt::Display for DynDnsOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}
