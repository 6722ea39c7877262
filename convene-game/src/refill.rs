//! Periodic crystal refill.
//!
//! The timer is pure: callers feed it wall-clock milliseconds and it reports
//! when a grant is due. Driving it (intervals, UI countdowns) is up to the
//! host.
use serde::{Deserialize, Serialize};

use crate::constants::{REFILL_GRANT, REFILL_INTERVAL_SECS};

/// How often and how much to refill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RefillSchedule {
    pub interval_secs: u64,
    pub grant: u32,
}

impl Default for RefillSchedule {
    fn default() -> Self {
        Self {
            interval_secs: REFILL_INTERVAL_SECS,
            grant: REFILL_GRANT,
        }
    }
}

impl RefillSchedule {
    #[must_use]
    pub const fn interval_millis(&self) -> u64 {
        self.interval_secs.saturating_mul(1_000)
    }
}

/// Countdown to the next refill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefillTimer {
    schedule: RefillSchedule,
    deadline_ms: u64,
}

impl RefillTimer {
    /// Resume from a stored deadline.
    ///
    /// A missing or already-passed deadline starts a fresh interval from
    /// `now_ms`; time spent away never produces a grant.
    #[must_use]
    pub const fn resume(schedule: RefillSchedule, stored_deadline_ms: Option<u64>, now_ms: u64) -> Self {
        let deadline_ms = match stored_deadline_ms {
            Some(deadline) if deadline > now_ms => deadline,
            _ => now_ms.saturating_add(schedule.interval_millis()),
        };
        Self {
            schedule,
            deadline_ms,
        }
    }

    #[must_use]
    pub const fn deadline_ms(&self) -> u64 {
        self.deadline_ms
    }

    #[must_use]
    pub const fn schedule(&self) -> RefillSchedule {
        self.schedule
    }

    /// Milliseconds until the next grant, zero when due.
    #[must_use]
    pub const fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.deadline_ms.saturating_sub(now_ms)
    }

    /// Report whether a grant is due, rescheduling from `now_ms` if so.
    ///
    /// At most one grant per poll, however late the poll is.
    pub const fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms < self.deadline_ms {
            return false;
        }
        self.deadline_ms = now_ms.saturating_add(self.schedule.interval_millis());
        true
    }
}
