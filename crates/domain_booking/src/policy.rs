//! Scheduling policy

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{TimeSlot, Timezone};

/// Practice rules applied by the scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulingPolicy {
    /// Reschedules allowed per booking
    pub max_reschedules: u32,
    /// Client cancellations closer than this to the session forfeit the credit
    pub late_cancel_window_hours: i64,
    /// Longest recurring series horizon accepted
    pub max_series_horizon_months: u32,
    pub timezone: Timezone,
    /// Practice owner address for booking notifications
    pub practice_email: Option<String>,
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        Self {
            max_reschedules: 2,
            late_cancel_window_hours: 24,
            max_series_horizon_months: 12,
            timezone: Timezone::default(),
            practice_email: None,
        }
    }
}

impl SchedulingPolicy {
    /// Returns true if cancelling `slot` at `now` falls inside the late-cancel window
    pub fn is_late_cancel(&self, slot: &TimeSlot, now: DateTime<Utc>) -> bool {
        let starts_at = self
            .timezone
            .localize(slot.starts_at())
            .unwrap_or_else(|| slot.starts_at().and_utc());
        starts_at - now < Duration::hours(self.late_cancel_window_hours)
    }

    pub fn can_reschedule(&self, reschedule_count: u32) -> bool {
        reschedule_count < self.max_reschedules
    }
}
