//! The booking-payment saga coordinator.

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use async_trait::async_trait;

use pitstop_appointments::{AppointmentDraft, AppointmentId, AppointmentService};
use pitstop_payments::{
    ExternalBrowser, OrderInfo, PaymentGateway, PaymentReturn, PaymentSession, PaymentStatus,
    TransactionRef,
};
use pitstop_scheduling::{SlotId, SlotRegistry, SlotRegistryError};

use crate::config::BookingConfig;
use crate::error::{RecoveryOutcome, SagaError};
use crate::intent::BookingIntent;
use crate::monitor::ForegroundHook;
use crate::store::RecoveryStore;

/// Saga phase machine.
///
/// `Verifying`, `Finalizing` and `Compensating` double as the recovery
/// in-flight guard: a `recover()` arriving while one of them is current
/// coalesces instead of running a second verification. That makes "recovery
/// in progress" part of the state machine rather than a flag bolted on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaPhase {
    Idle,
    Reserving,
    Reserved,
    SessionCreated,
    AwaitingExternalPayment,
    Verifying,
    Finalizing,
    Compensating,
    /// Compensation terminal: slot released, checkpoint cleared.
    Released,
    /// Success terminal.
    Confirmed { appointment_id: AppointmentId },
    /// Payment completed but the appointment could not be created. Money has
    /// moved; never auto-compensated. The checkpoint stays in place so a
    /// later pass can retry the idempotent creation.
    Stalled { transaction_ref: TransactionRef },
}

impl SagaPhase {
    /// Terminal and idle phases from which a fresh booking may start.
    pub fn allows_new_booking(&self) -> bool {
        matches!(
            self,
            SagaPhase::Idle | SagaPhase::Released | SagaPhase::Confirmed { .. }
        )
    }

    fn is_recovery_in_flight(&self) -> bool {
        matches!(
            self,
            SagaPhase::Verifying | SagaPhase::Finalizing | SagaPhase::Compensating
        )
    }
}

/// Orchestrates slot reservation, the external payment hand-off, durable
/// checkpointing, and exactly-once appointment creation.
///
/// Single writer of the [`BookingIntent`] checkpoint. All three verification
/// triggers (foreground transition, payment-return deep link, fallback poll)
/// funnel into [`recover`](Self::recover), so there is one
/// code path and one source of truth.
pub struct BookingSagaCoordinator<R, G, A, S, B> {
    registry: R,
    gateway: G,
    appointments: A,
    store: S,
    browser: B,
    config: BookingConfig,
    phase: Mutex<SagaPhase>,
}

impl<R, G, A, S, B> BookingSagaCoordinator<R, G, A, S, B>
where
    R: SlotRegistry,
    G: PaymentGateway,
    A: AppointmentService,
    S: RecoveryStore,
    B: ExternalBrowser,
{
    pub fn new(
        registry: R,
        gateway: G,
        appointments: A,
        store: S,
        browser: B,
        config: BookingConfig,
    ) -> Self {
        Self {
            registry,
            gateway,
            appointments,
            store,
            browser,
            config,
            phase: Mutex::new(SagaPhase::Idle),
        }
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    pub async fn phase(&self) -> SagaPhase {
        self.phase.lock().await.clone()
    }

    async fn set_phase(&self, next: SagaPhase) {
        *self.phase.lock().await = next;
    }

    /// Reserve a slot and persist the booking intent.
    ///
    /// Requires an idle machine and no existing checkpoint. A capacity
    /// conflict leaves the machine idle: nothing was reserved, so there is
    /// nothing to compensate.
    pub async fn start(&self, slot_id: SlotId, draft: AppointmentDraft) -> Result<(), SagaError> {
        {
            let mut phase = self.phase.lock().await;
            if !phase.allows_new_booking() {
                return Err(SagaError::InvalidPhase {
                    expected: "idle",
                    actual: format!("{phase:?}"),
                });
            }
            *phase = SagaPhase::Reserving;
        }

        match self.store.read().await {
            Ok(None) => {}
            Ok(Some(_)) => {
                self.set_phase(SagaPhase::Idle).await;
                return Err(SagaError::IntentAlreadyActive);
            }
            Err(e) => {
                self.set_phase(SagaPhase::Idle).await;
                return Err(e.into());
            }
        }

        let reservation = match self.registry.reserve(slot_id).await {
            Ok(reservation) => reservation,
            Err(SlotRegistryError::Conflict) => {
                self.set_phase(SagaPhase::Idle).await;
                return Err(SagaError::ReservationConflict);
            }
            Err(e) => {
                self.set_phase(SagaPhase::Idle).await;
                return Err(SagaError::Registry(e));
            }
        };

        // The reserved slot must be durable before anything else happens:
        // from here on, an interruption is recoverable.
        let intent = BookingIntent::reserved(draft, slot_id, reservation, Utc::now());
        if let Err(e) = self.store.write(&intent).await {
            if let Err(release_err) = self.registry.release(slot_id, reservation).await {
                warn!(error = %release_err, "slot release failed; TTL backstop will reclaim");
            }
            self.set_phase(SagaPhase::Idle).await;
            return Err(e.into());
        }

        info!(%slot_id, "slot reserved; booking intent persisted");
        self.set_phase(SagaPhase::Reserved).await;
        Ok(())
    }

    /// Create the payment session and hand off to the external browser.
    ///
    /// The transaction reference is durably attached to the checkpoint
    /// *before* the redirect opens; a kill at any later point leaves enough
    /// state to resume. Session-creation failure compensates back to idle.
    pub async fn create_payment_session(
        &self,
        order_info: OrderInfo,
    ) -> Result<PaymentSession, SagaError> {
        {
            let phase = self.phase.lock().await;
            if *phase != SagaPhase::Reserved {
                return Err(SagaError::InvalidPhase {
                    expected: "reserved",
                    actual: format!("{phase:?}"),
                });
            }
        }

        let Some(mut intent) = self.store.read().await? else {
            self.set_phase(SagaPhase::Idle).await;
            return Err(SagaError::NoActiveIntent);
        };

        let session = match self
            .gateway
            .create_session(
                self.config.deposit_amount,
                order_info,
                intent.pending_booking_draft.draft_ref,
            )
            .await
        {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "payment session creation failed; compensating");
                self.compensate(&intent).await?;
                return Err(SagaError::PaymentSession(e.to_string()));
            }
        };

        intent.attach_session(session.transaction_ref.clone(), Utc::now());
        if let Err(e) = self.store.write(&intent).await {
            // Never open the redirect without a durable reference to resume by.
            self.compensate(&intent).await?;
            return Err(e.into());
        }
        self.set_phase(SagaPhase::SessionCreated).await;

        if let Err(e) = self.browser.open(&session.payment_url).await {
            // The checkpoint is in place; the user can retry from the UI and
            // recovery handles everything else.
            warn!(error = %e, "external browser failed to open payment url");
        }
        info!(
            transaction_ref = %session.transaction_ref,
            "payment session created; control handed to external browser"
        );
        self.set_phase(SagaPhase::AwaitingExternalPayment).await;
        Ok(session)
    }

    /// Reconcile the in-flight booking against provider truth.
    ///
    /// Safe to call from a cold start, a foreground transition, a deep link,
    /// or the fallback poll; concurrent calls coalesce via the phase guard.
    pub async fn recover(&self) -> Result<RecoveryOutcome, SagaError> {
        // The phase to fall back to when verification cannot finish this
        // pass. A stalled machine must stay stalled: downgrading it to
        // awaiting-payment would hide a booking that needs attention.
        let resume_phase = {
            let mut phase = self.phase.lock().await;
            if phase.is_recovery_in_flight() {
                return Ok(RecoveryOutcome::AlreadyInProgress);
            }
            let resume = match &*phase {
                SagaPhase::Stalled { transaction_ref } => SagaPhase::Stalled {
                    transaction_ref: transaction_ref.clone(),
                },
                _ => SagaPhase::AwaitingExternalPayment,
            };
            *phase = SagaPhase::Verifying;
            resume
        };

        let intent = match self.store.read().await {
            Ok(Some(intent)) => intent,
            Ok(None) => {
                self.set_phase(SagaPhase::Idle).await;
                return Ok(RecoveryOutcome::NothingToRecover);
            }
            Err(e) => {
                self.set_phase(resume_phase).await;
                return Err(e.into());
            }
        };

        let Some(transaction_ref) = intent.current_transaction_ref.clone() else {
            // Killed between reservation and session creation: no payment can
            // exist yet, so compensation is always correct.
            info!("recovering checkpoint without payment session; compensating");
            self.compensate(&intent).await?;
            return Ok(RecoveryOutcome::Compensated);
        };

        let check = match self.gateway.check(&transaction_ref).await {
            Ok(check) => check,
            Err(e) => {
                // Normal during an external-redirect delay; retried on the
                // next poll tick or foreground transition.
                debug!(error = %e, "payment status check failed; will retry");
                let outcome = match &resume_phase {
                    SagaPhase::Stalled { transaction_ref } => RecoveryOutcome::Stalled {
                        transaction_ref: transaction_ref.clone(),
                    },
                    _ => RecoveryOutcome::StillPending,
                };
                self.set_phase(resume_phase).await;
                return Ok(outcome);
            }
        };

        // The check may have been slow; honor its result only if the
        // checkpoint still names the same transaction.
        let still_current = match self.store.read().await {
            Ok(Some(current)) => {
                current.current_transaction_ref.as_ref() == Some(&transaction_ref)
            }
            Ok(None) => false,
            Err(e) => {
                self.set_phase(resume_phase).await;
                return Err(e.into());
            }
        };
        if !still_current {
            debug!(%transaction_ref, "discarding stale verification result");
            self.set_phase(SagaPhase::Idle).await;
            return Ok(RecoveryOutcome::NothingToRecover);
        }

        match check.status {
            PaymentStatus::Pending => {
                self.set_phase(SagaPhase::AwaitingExternalPayment).await;
                Ok(RecoveryOutcome::StillPending)
            }
            PaymentStatus::Failed => {
                info!(%transaction_ref, "payment failed; compensating");
                self.compensate(&intent).await?;
                Ok(RecoveryOutcome::Compensated)
            }
            PaymentStatus::Completed => {
                self.set_phase(SagaPhase::Finalizing).await;
                if let Some(existing) = check.appointment_id {
                    // The server already created it out-of-band. This is the
                    // client-side half of the idempotency boundary: no second
                    // creation call.
                    let appointment_id = AppointmentId::new(existing);
                    info!(%appointment_id, "appointment already created server-side");
                    return self.finish_confirmed(appointment_id).await;
                }

                match self
                    .appointments
                    .create(
                        &intent.pending_booking_draft,
                        &transaction_ref,
                        intent.reserved_slot_id,
                        Some(intent.reservation_id),
                    )
                    .await
                {
                    Ok(appointment) => {
                        info!(appointment_id = %appointment.id, "appointment created");
                        self.finish_confirmed(appointment.id).await
                    }
                    Err(e) => {
                        // Money has moved. Releasing the slot or dropping the
                        // checkpoint here would strand a paid customer; hold
                        // everything and surface the manual path.
                        error!(
                            %transaction_ref,
                            error = %e,
                            "appointment creation failed after completed payment"
                        );
                        self.set_phase(SagaPhase::Stalled {
                            transaction_ref: transaction_ref.clone(),
                        })
                        .await;
                        Ok(RecoveryOutcome::Stalled { transaction_ref })
                    }
                }
            }
        }
    }

    /// Bounded fallback poll while the payment stays pending.
    ///
    /// Interval and ceiling come from [`BookingConfig`]; the ceiling is
    /// measured from session creation, not from when polling started. Network
    /// errors are swallowed; the next tick retries. Hitting the ceiling is
    /// an outcome, not an error: the next foreground transition tries again.
    pub async fn verification_poll(&self) -> Result<RecoveryOutcome, SagaError> {
        let Some(intent) = self.store.read().await? else {
            return Ok(RecoveryOutcome::NothingToRecover);
        };
        let Some(session_created_at) = intent.session_created_at else {
            return Ok(RecoveryOutcome::NothingToRecover);
        };

        let timeout = chrono::Duration::from_std(self.config.verification_timeout)
            .unwrap_or(chrono::Duration::MAX);
        let deadline_utc = session_created_at
            .checked_add_signed(timeout)
            .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
        let remaining = deadline_utc.signed_duration_since(Utc::now());
        if remaining <= chrono::Duration::zero() {
            return Ok(RecoveryOutcome::VerificationTimeout);
        }
        let deadline = tokio::time::Instant::now() + remaining.to_std().unwrap_or_default();

        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                debug!("verification poll ceiling reached; stopping");
                return Ok(RecoveryOutcome::VerificationTimeout);
            }
            // Never sleep past the ceiling: a budget shorter than one
            // interval still gets a final check at the deadline.
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
            match self.recover().await {
                Ok(RecoveryOutcome::StillPending) | Ok(RecoveryOutcome::AlreadyInProgress) => {
                    continue;
                }
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    debug!(error = %e, "recovery attempt during poll failed; retrying next tick");
                    continue;
                }
            }
        }
    }

    /// Best-effort fast path from the payment provider's redirect.
    ///
    /// The success flag is advisory: a matching return is verified through
    /// the same `recover()` path as every other trigger, and a return that
    /// doesn't match the checkpoint is ignored.
    pub async fn handle_payment_return(
        &self,
        payment_return: &PaymentReturn,
    ) -> Result<RecoveryOutcome, SagaError> {
        let Some(intent) = self.store.read().await? else {
            debug!("payment return with no booking in flight; ignoring");
            return Ok(RecoveryOutcome::NothingToRecover);
        };
        if intent.current_transaction_ref.as_ref() != Some(&payment_return.transaction_ref) {
            debug!(
                transaction_ref = %payment_return.transaction_ref,
                "payment return does not match checkpoint; ignoring"
            );
            return Ok(RecoveryOutcome::NothingToRecover);
        }
        self.recover().await
    }

    /// User-initiated abandon before the payment completes.
    ///
    /// Refused once the payment is verifiably completed (recover instead) or
    /// when its status cannot be verified, since abandoning then could drop a paid
    /// booking.
    pub async fn cancel_in_flight(&self) -> Result<RecoveryOutcome, SagaError> {
        {
            let mut phase = self.phase.lock().await;
            if phase.is_recovery_in_flight() {
                return Ok(RecoveryOutcome::AlreadyInProgress);
            }
            *phase = SagaPhase::Compensating;
        }

        let intent = match self.store.read().await {
            Ok(Some(intent)) => intent,
            Ok(None) => {
                self.set_phase(SagaPhase::Idle).await;
                return Ok(RecoveryOutcome::NothingToRecover);
            }
            Err(e) => {
                self.set_phase(SagaPhase::Idle).await;
                return Err(e.into());
            }
        };

        if let Some(transaction_ref) = intent.current_transaction_ref.clone() {
            match self.gateway.check(&transaction_ref).await {
                Ok(check) if check.status == PaymentStatus::Completed => {
                    self.set_phase(SagaPhase::AwaitingExternalPayment).await;
                    return Err(SagaError::PaymentAlreadyCompleted);
                }
                Ok(_) => {}
                Err(e) => {
                    self.set_phase(SagaPhase::AwaitingExternalPayment).await;
                    return Err(SagaError::CancelUnverified(e.to_string()));
                }
            }
        }

        self.compensate(&intent).await?;
        info!("in-flight booking abandoned; compensated");
        Ok(RecoveryOutcome::Compensated)
    }

    /// Release the held slot and drop the checkpoint.
    ///
    /// Release failures are logged, not propagated: the backend TTL is the
    /// safety net underneath client-side compensation, and `release` is
    /// idempotent so a later pass repeating it is harmless.
    async fn compensate(&self, intent: &BookingIntent) -> Result<(), SagaError> {
        self.set_phase(SagaPhase::Compensating).await;
        if let Err(e) = self
            .registry
            .release(intent.reserved_slot_id, intent.reservation_id)
            .await
        {
            warn!(
                slot_id = %intent.reserved_slot_id,
                error = %e,
                "slot release failed during compensation; TTL backstop will reclaim"
            );
        }
        match self.store.clear().await {
            Ok(()) => {
                self.set_phase(SagaPhase::Released).await;
                Ok(())
            }
            Err(e) => {
                // Checkpoint survived; the next recovery pass re-compensates.
                self.set_phase(SagaPhase::Released).await;
                Err(e.into())
            }
        }
    }

    async fn finish_confirmed(
        &self,
        appointment_id: AppointmentId,
    ) -> Result<RecoveryOutcome, SagaError> {
        match self.store.clear().await {
            Ok(()) => {
                self.set_phase(SagaPhase::Confirmed { appointment_id }).await;
                Ok(RecoveryOutcome::Confirmed(appointment_id))
            }
            Err(e) => {
                // The appointment exists; only the checkpoint removal failed.
                // Re-running recovery later re-confirms idempotently.
                self.set_phase(SagaPhase::AwaitingExternalPayment).await;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl<R, G, A, S, B> ForegroundHook for BookingSagaCoordinator<R, G, A, S, B>
where
    R: SlotRegistry,
    G: PaymentGateway,
    A: AppointmentService,
    S: RecoveryStore,
    B: ExternalBrowser,
{
    async fn on_foreground(&self) {
        match self.recover().await {
            Ok(outcome) => {
                if let Some(message) = outcome.user_message() {
                    info!(%message, "foreground recovery finished");
                }
            }
            Err(e) => warn!(error = %e, "foreground recovery failed"),
        }
    }
}
