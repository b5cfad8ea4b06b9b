//! Cycle outcomes and scheduler events

use std::fmt;

/// What started a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// The backend went from offline to online
    Online,
    /// The periodic refresh timer fired
    Timer,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Online => f.write_str("online"),
            Trigger::Timer => f.write_str("timer"),
        }
    }
}

/// Why a cycle ended without sending an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No server was reachable
    Offline,
    /// The last admitted attempt is within the cooldown window
    Cooldown,
    /// Another cycle was waiting for its connection when the gate was consulted
    AttemptActive,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Offline => f.write_str("offline"),
            SkipReason::Cooldown => f.write_str("cooldown"),
            SkipReason::AttemptActive => f.write_str("attempt in progress"),
        }
    }
}

/// Final state of one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The update was sent and accepted
    Updated,
    /// The cycle completed without sending an update
    Skipped(SkipReason),
    /// The trigger arrived while another cycle held the attempt lease
    Dropped,
    /// The cycle failed; carries the error text
    Failed(String),
}

impl CycleOutcome {
    /// Everything but `Failed` counts as success from the scheduler's view
    pub fn is_success(&self) -> bool {
        !matches!(self, CycleOutcome::Failed(_))
    }
}

/// Events emitted by the scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Run loop started
    Started,

    /// A cycle took the attempt lease
    CycleStarted { trigger: Trigger },

    /// A trigger was dropped because another cycle holds the lease
    TriggerDropped { trigger: Trigger },

    /// No server reachable; the cycle is skipped
    ConnectionOffline { trigger: Trigger },

    /// The session could not be established
    ConnectionFailed { trigger: Trigger, error: String },

    /// The debounce gate refused the update
    UpdateSkipped { trigger: Trigger, reason: SkipReason },

    /// The update was accepted by the server
    UpdateSent {
        trigger: Trigger,
        hostname: String,
        zone: String,
        server: String,
    },

    /// The update could not be built or was rejected
    UpdateFailed { trigger: Trigger, error: String },

    /// Run loop stopped
    Stopped { reason: String },
}
