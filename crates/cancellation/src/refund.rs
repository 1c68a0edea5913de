//! Refund policy: named configuration, not magic numbers.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Deposit refund policy.
///
/// Cancellations more than `full_refund_cutoff` before the scheduled time
/// refund the whole deposit; anything at or inside the cutoff refunds
/// `late_refund_percent`. The step is strict: exactly at the cutoff counts as
/// late.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundPolicy {
    pub full_refund_cutoff_hours: i64,
    pub late_refund_percent: u64,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            full_refund_cutoff_hours: 24,
            late_refund_percent: 80,
        }
    }
}

impl RefundPolicy {
    pub fn with_cutoff_hours(mut self, hours: i64) -> Self {
        self.full_refund_cutoff_hours = hours;
        self
    }

    pub fn with_late_refund_percent(mut self, percent: u64) -> Self {
        self.late_refund_percent = percent;
        self
    }

    /// Compute the refundable amount for a deposit.
    ///
    /// Compared as durations rather than truncated whole hours, so 24h01m
    /// before the appointment still qualifies for the full refund.
    pub fn compute_refund(
        &self,
        deposit_amount: u64,
        scheduled_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> u64 {
        let until = scheduled_at - now;
        if until > Duration::hours(self.full_refund_cutoff_hours) {
            deposit_amount
        } else {
            deposit_amount * self.late_refund_percent / 100
        }
    }
}
