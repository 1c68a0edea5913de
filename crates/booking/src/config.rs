//! Booking policy knobs, as named configuration rather than inline literals.

use std::time::Duration;

/// Fixed deposit required to hold a maintenance appointment (smallest
/// currency unit).
pub const DEFAULT_DEPOSIT_AMOUNT: u64 = 200_000;

/// Fallback verification poll cadence while a payment is pending.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Hard ceiling on fallback polling, measured from session creation. Past it
/// polling simply stops; the next foreground transition tries again.
pub const DEFAULT_VERIFICATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Booking saga configuration.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    pub deposit_amount: u64,
    pub poll_interval: Duration,
    pub verification_timeout: Duration,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            deposit_amount: DEFAULT_DEPOSIT_AMOUNT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            verification_timeout: DEFAULT_VERIFICATION_TIMEOUT,
        }
    }
}

impl BookingConfig {
    pub fn with_deposit_amount(mut self, amount: u64) -> Self {
        self.deposit_amount = amount;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_verification_timeout(mut self, timeout: Duration) -> Self {
        self.verification_timeout = timeout;
        self
    }
}
