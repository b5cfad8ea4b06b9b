// # dyndns-core
//
// Core library for the debounced, connection-gated dynamic DNS refresh
// scheduler.
//
// ## Architecture Overview
//
// This library keeps a single client's DNS records fresh on the directory's
// DNS server:
// - **ConnectionPool**: Trait for establishing a session with the directory service
// - **DnsUpdater**: Trait for pushing the records to the DNS server
// - **RefreshTimer**: Trait for the one-shot timer driving periodic refreshes
// - **ConfigStore**: Trait for the option store holding the update target
// - **DynDnsScheduler**: Core scheduler reconciling online transitions and timer ticks
// - **BackendStatus**: Online/offline notifier connection pools report into
//
// ## Design Principles
//
// 1. **Single attempt in flight**: An attempt lease serializes connection attempts
// 2. **Debounced**: A cooldown window suppresses redundant updates
// 3. **Cadence survives failure**: Every cycle re-arms the refresh timer
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Nothing is fatal**: Every failure ends at the cycle boundary

pub mod config;
pub mod error;
pub mod options;
pub mod scheduler;
pub mod status;
pub mod timer;
pub mod traits;

// Re-export core types for convenience
pub use config::{DynDnsOption, SchedulerConfig};
pub use error::{Error, Result};
pub use options::MemoryConfigStore;
pub use scheduler::{CycleOutcome, DynDnsScheduler, SchedulerEvent, SkipReason, Trigger};
pub use status::BackendStatus;
pub use timer::TokioRefreshTimer;
pub use traits::{ConfigStore, Connection, ConnectionPool, DnsUpdater, RefreshTimer, UpdateRequest};
