//! Debounce gate
//!
//! Pure decision logic: given the current time, the time of the last
//! admitted attempt and whether a connection attempt is outstanding,
//! decide whether a new update may go out. The gate never performs I/O.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Result of consulting the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The update may proceed
    Proceed,
    /// Another attempt holds the lease
    AttemptActive,
    /// The last admitted attempt is too recent
    Cooldown {
        /// Time left until the gate opens again
        remaining: Duration,
    },
}

impl GateDecision {
    pub fn is_proceed(&self) -> bool {
        matches!(self, GateDecision::Proceed)
    }
}

/// Minimum-interval gate in front of the update operation
#[derive(Debug, Clone, Copy)]
pub struct DebounceGate {
    cooldown: ChronoDuration,
}

impl DebounceGate {
    /// Create a gate with the given cooldown window
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown: ChronoDuration::from_std(cooldown).unwrap_or(ChronoDuration::MAX),
        }
    }

    /// Decide whether an attempt may proceed, without touching any state
    pub fn may_proceed(
        &self,
        now: DateTime<Utc>,
        last_refresh: DateTime<Utc>,
        attempt_active: bool,
    ) -> GateDecision {
        if attempt_active {
            return GateDecision::AttemptActive;
        }

        let elapsed = now.signed_duration_since(last_refresh);
        if elapsed < self.cooldown {
            let remaining = self
                .cooldown
                .checked_sub(&elapsed)
                .and_then(|left| left.to_std().ok())
                .unwrap_or_default();
            return GateDecision::Cooldown { remaining };
        }

        GateDecision::Proceed
    }

    /// Decide and, when admitted, record `now` as the last refresh
    ///
    /// Callers hold the scheduler state lock across this call so that the
    /// decision and the write happen together.
    pub fn admit(
        &self,
        now: DateTime<Utc>,
        last_refresh: &mut DateTime<Utc>,
        attempt_active: bool,
    ) -> GateDecision {
        let decision = self.may_proceed(now, *last_refresh, attempt_active);
        if decision.is_proceed() {
            *last_refresh = now;
        }
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + ChronoDuration::seconds(secs)
    }

    #[test]
    fn test_denies_while_attempt_active() {
        let gate = DebounceGate::new(Duration::from_secs(60));
        assert_eq!(
            gate.may_proceed(at(10_000), at(0), true),
            GateDecision::AttemptActive
        );
    }

    #[test]
    fn test_denies_within_cooldown() {
        let gate = DebounceGate::new(Duration::from_secs(60));
        assert_eq!(
            gate.may_proceed(at(1_030), at(1_000), false),
            GateDecision::Cooldown {
                remaining: Duration::from_secs(30)
            }
        );
    }

    #[test]
    fn test_allows_after_cooldown() {
        let gate = DebounceGate::new(Duration::from_secs(60));
        assert!(gate.may_proceed(at(1_061), at(1_000), false).is_proceed());
        assert!(gate.may_proceed(at(1_060), at(1_000), false).is_proceed());
    }

    #[test]
    fn test_first_attempt_after_epoch_is_allowed() {
        let gate = DebounceGate::new(Duration::from_secs(60));
        let now = Utc::now();
        assert!(gate.may_proceed(now, DateTime::<Utc>::UNIX_EPOCH, false).is_proceed());
    }

    #[test]
    fn test_admit_only_advances_when_allowed() {
        let gate = DebounceGate::new(Duration::from_secs(60));
        let mut last = at(1_000);

        assert!(!gate.admit(at(1_030), &mut last, false).is_proceed());
        assert_eq!(last, at(1_000));

        assert!(!gate.admit(at(1_100), &mut last, true).is_proceed());
        assert_eq!(last, at(1_000));

        assert!(gate.admit(at(1_100), &mut last, false).is_proceed());
        assert_eq!(last, at(1_100));
    }

    #[test]
    fn test_clock_going_backwards_is_denied() {
        let gate = DebounceGate::new(Duration::from_secs(60));
        let mut last = at(5_000);
        assert!(!gate.admit(at(4_000), &mut last, false).is_proceed());
        assert_eq!(last, at(5_000));
    }
}
