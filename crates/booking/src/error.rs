//! Saga error taxonomy and recovery outcomes.

use thiserror::Error;

use pitstop_appointments::AppointmentId;
use pitstop_payments::TransactionRef;
use pitstop_scheduling::SlotRegistryError;

use crate::store::RecoveryStoreError;

/// Booking saga error.
///
/// Reservation and session-creation failures are recovered locally
/// (compensate, reset) and surfaced as one actionable message. Anything after
/// a completed payment is never an `Err` here; it is a [`RecoveryOutcome`],
/// because "money moved, appointment unconfirmed" is a state to surface, not
/// a failure to propagate.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Capacity was gone by the time we reserved. Nothing was held, so no
    /// compensation is needed; the user picks another slot.
    #[error("the selected slot is no longer available")]
    ReservationConflict,

    /// A booking checkpoint already exists and must be reconciled first.
    #[error("a booking is already in flight; finish or cancel it first")]
    IntentAlreadyActive,

    /// The operation needs an in-flight booking and none exists.
    #[error("no booking is in flight")]
    NoActiveIntent,

    /// The coordinator is not in a phase that allows this operation.
    #[error("operation not allowed in phase {actual} (requires {expected})")]
    InvalidPhase {
        expected: &'static str,
        actual: String,
    },

    /// The payment provider refused to create a session. Compensated.
    #[error("payment session creation failed: {0}")]
    PaymentSession(String),

    /// Cancel was requested but the payment already completed; the booking
    /// must be recovered into a confirmed appointment instead.
    #[error("payment already completed; this booking can no longer be abandoned")]
    PaymentAlreadyCompleted,

    /// Cancel was requested but the payment status could not be verified, so
    /// abandoning would risk dropping a paid booking.
    #[error("could not verify payment status before cancelling: {0}")]
    CancelUnverified(String),

    #[error(transparent)]
    Registry(SlotRegistryError),

    #[error(transparent)]
    Checkpoint(#[from] RecoveryStoreError),
}

/// Terminal (or deliberately non-terminal) result of a recovery pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// No checkpoint exists; nothing is in flight.
    NothingToRecover,

    /// Another recovery pass is running; this one coalesced into it.
    AlreadyInProgress,

    /// Provider still reports the payment pending. Not an error.
    StillPending,

    /// The bounded fallback poll hit its ceiling with the payment still
    /// pending. Polling stops; the next foreground transition tries again.
    VerificationTimeout,

    /// The saga reached its success terminal: appointment confirmed and the
    /// checkpoint cleared.
    Confirmed(AppointmentId),

    /// The saga compensated: slot released, checkpoint cleared.
    Compensated,

    /// Payment completed but appointment creation failed. Never
    /// auto-compensated, because money has moved. The checkpoint stays so a later
    /// pass can retry the idempotent creation; meanwhile the user needs the
    /// manual path.
    Stalled { transaction_ref: TransactionRef },
}

impl RecoveryOutcome {
    /// Single user-facing message per outcome. The stalled case deliberately
    /// reads nothing like an ordinary failure.
    pub fn user_message(&self) -> Option<String> {
        match self {
            RecoveryOutcome::NothingToRecover | RecoveryOutcome::AlreadyInProgress => None,
            RecoveryOutcome::StillPending => {
                Some("Your payment is still processing. We'll keep checking.".to_string())
            }
            RecoveryOutcome::VerificationTimeout => Some(
                "We couldn't confirm your payment yet. Reopen the app after paying to finish your booking."
                    .to_string(),
            ),
            RecoveryOutcome::Confirmed(_) => {
                Some("Your appointment is confirmed. See you at the workshop!".to_string())
            }
            RecoveryOutcome::Compensated => Some(
                "The payment didn't go through. Your slot was released and nothing was charged."
                    .to_string(),
            ),
            RecoveryOutcome::Stalled { transaction_ref } => Some(format!(
                "Your payment ({transaction_ref}) succeeded but we couldn't finish creating the \
                 appointment. Check your appointment list, or contact support with this \
                 reference. Do not pay again."
            )),
        }
    }

    /// True for outcomes that end the in-flight booking one way or the other.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RecoveryOutcome::Confirmed(_)
                | RecoveryOutcome::Compensated
                | RecoveryOutcome::NothingToRecover
        )
    }
}
