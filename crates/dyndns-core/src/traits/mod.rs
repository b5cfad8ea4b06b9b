//! Core traits for the dynamic DNS scheduler
//!
//! This module defines the abstract interfaces of the scheduler's
//! external collaborators.
//!
//! - [`ConnectionPool`]: Establish a session with the directory service
//! - [`DnsUpdater`]: Push the client's records to the DNS server
//! - [`RefreshTimer`]: One-shot timer driving the periodic refresh
//! - [`ConfigStore`]: Option store holding the update target
//! - [`Clock`]: Time source for the debounce gate

pub mod config_store;
pub mod connection;
pub mod timer;
pub mod updater;

pub use config_store::ConfigStore;
pub use connection::{Connection, ConnectionPool};
pub use timer::{Clock, RefreshTimer, SystemClock};
pub use updater::{DnsUpdater, UpdateRequest};
