//! End-to-end saga scenarios against the in-memory backend.
//!
//! These are the executable versions of the booking flow's guarantees: crash
//! recovery from the durable checkpoint, compensation on failure, exactly-once
//! appointment creation, the bounded fallback poll, and coalescing of
//! concurrent recovery triggers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveTime, Utc};
use tokio::sync::Notify;

use pitstop_appointments::{AppointmentDraft, AppointmentService};
use pitstop_booking::{
    AppVisibility, BookingConfig, BookingSagaCoordinator, LifecycleMonitor, RecoveryOutcome,
    RecoveryStore, SagaError, SagaPhase,
};
use pitstop_booking::config::DEFAULT_DEPOSIT_AMOUNT;
use pitstop_cancellation::CancellationRefundEngine;
use pitstop_core::{AggregateId, CustomerId, VehicleId};
use pitstop_payments::{
    GatewayError, OrderInfo, PaymentCheck, PaymentGateway, PaymentReturn, PaymentSession,
    PaymentStatus, TransactionRef,
};
use pitstop_scheduling::{Slot, SlotId, SlotRegistry};

use crate::in_memory::{
    InMemoryAppointmentService, InMemorySlotRegistry, MockPaymentGateway, RecordingBrowser,
};
use crate::recovery::{FileRecoveryStore, InMemoryRecoveryStore};

type Coordinator = BookingSagaCoordinator<
    Arc<InMemorySlotRegistry>,
    Arc<MockPaymentGateway>,
    Arc<InMemoryAppointmentService>,
    Arc<InMemoryRecoveryStore>,
    Arc<RecordingBrowser>,
>;

struct Harness {
    slots: Arc<InMemorySlotRegistry>,
    gateway: Arc<MockPaymentGateway>,
    appointments: Arc<InMemoryAppointmentService>,
    store: Arc<InMemoryRecoveryStore>,
    browser: Arc<RecordingBrowser>,
    slot_id: SlotId,
    customer_id: CustomerId,
}

impl Harness {
    async fn new() -> Self {
        pitstop_observability::init();
        let slots = Arc::new(InMemorySlotRegistry::new());
        let appointments = Arc::new(InMemoryAppointmentService::new(
            slots.clone(),
            CancellationRefundEngine::default(),
            DEFAULT_DEPOSIT_AMOUNT,
        ));
        let slot_id = SlotId::new(AggregateId::new());
        let date = (Utc::now() + ChronoDuration::days(3)).date_naive();
        let slot = Slot::open(
            slot_id,
            date,
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            2,
        )
        .unwrap();
        slots.insert(slot).await;

        Self {
            slots,
            gateway: Arc::new(MockPaymentGateway::new()),
            appointments,
            store: Arc::new(InMemoryRecoveryStore::new()),
            browser: Arc::new(RecordingBrowser::new()),
            slot_id,
            customer_id: CustomerId::new(),
        }
    }

    fn coordinator(&self) -> Coordinator {
        self.coordinator_with(BookingConfig::default())
    }

    fn coordinator_with(&self, config: BookingConfig) -> Coordinator {
        BookingSagaCoordinator::new(
            self.slots.clone(),
            self.gateway.clone(),
            self.appointments.clone(),
            self.store.clone(),
            self.browser.clone(),
            config,
        )
    }

    fn draft(&self) -> AppointmentDraft {
        AppointmentDraft {
            draft_ref: AggregateId::new(),
            customer_id: self.customer_id,
            vehicle_id: VehicleId::new(),
            scheduled_date: (Utc::now() + ChronoDuration::days(3)).date_naive(),
            scheduled_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            notes: Some("periodic maintenance".to_string()),
            technician_id: None,
        }
    }

    fn order_info(&self) -> OrderInfo {
        OrderInfo {
            customer_id: self.customer_id,
            description: "maintenance deposit".to_string(),
        }
    }

    /// Reserve and hand off to the browser, returning the session reference.
    async fn start_and_pay(&self, coordinator: &Coordinator) -> TransactionRef {
        coordinator.start(self.slot_id, self.draft()).await.unwrap();
        let session = coordinator
            .create_payment_session(self.order_info())
            .await
            .unwrap();
        session.transaction_ref
    }
}

#[tokio::test]
async fn happy_path_confirms_and_clears_checkpoint() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    let txref = h.start_and_pay(&coordinator).await;
    assert_eq!(h.browser.opened_urls().await.len(), 1);
    assert_eq!(coordinator.phase().await, SagaPhase::AwaitingExternalPayment);

    h.gateway.set_status(&txref, PaymentStatus::Completed).await;
    let outcome = coordinator.recover().await.unwrap();

    let RecoveryOutcome::Confirmed(appointment_id) = outcome else {
        panic!("expected confirmation, got {outcome:?}");
    };
    assert!(h.store.read().await.unwrap().is_none());
    assert_eq!(h.slots.booked_count(h.slot_id).await, Some(1));
    assert_eq!(h.slots.active_holds(h.slot_id).await, 0);
    let appointment = h.appointments.get(appointment_id).await.unwrap();
    assert_eq!(appointment.payment.transaction_ref, txref);
    assert!(appointment.deposit.paid);
}

#[tokio::test]
async fn restart_resumes_from_the_file_checkpoint() {
    let h = Harness::new().await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileRecoveryStore::new(dir.path().join("intent.json")));

    // First process: reserve, open the session, then die.
    {
        let coordinator = BookingSagaCoordinator::new(
            h.slots.clone(),
            h.gateway.clone(),
            h.appointments.clone(),
            store.clone(),
            h.browser.clone(),
            BookingConfig::default(),
        );
        coordinator.start(h.slot_id, h.draft()).await.unwrap();
        coordinator
            .create_payment_session(h.order_info())
            .await
            .unwrap();
    }

    // The user pays in the external browser while the app is gone.
    let txref = h.gateway.last_transaction_ref().await.unwrap();
    h.gateway.set_status(&txref, PaymentStatus::Completed).await;

    // Second process: cold start, nothing in memory but the file.
    let coordinator = BookingSagaCoordinator::new(
        h.slots.clone(),
        h.gateway.clone(),
        h.appointments.clone(),
        store.clone(),
        h.browser.clone(),
        BookingConfig::default(),
    );
    let outcome = coordinator.recover().await.unwrap();

    assert!(matches!(outcome, RecoveryOutcome::Confirmed(_)));
    assert!(store.read().await.unwrap().is_none());
    assert_eq!(h.slots.booked_count(h.slot_id).await, Some(1));
}

#[tokio::test]
async fn failed_payment_compensates() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    let txref = h.start_and_pay(&coordinator).await;
    h.gateway.set_status(&txref, PaymentStatus::Failed).await;

    let outcome = coordinator.recover().await.unwrap();
    assert_eq!(outcome, RecoveryOutcome::Compensated);
    assert!(h.store.read().await.unwrap().is_none());
    assert_eq!(h.slots.active_holds(h.slot_id).await, 0);
    assert_eq!(h.slots.booked_count(h.slot_id).await, Some(0));
    assert_eq!(coordinator.phase().await, SagaPhase::Released);
}

#[tokio::test]
async fn checkpoint_without_session_compensates_on_recovery() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    // Killed after the reservation but before any payment session existed.
    coordinator.start(h.slot_id, h.draft()).await.unwrap();

    let restarted = h.coordinator();
    let outcome = restarted.recover().await.unwrap();
    assert_eq!(outcome, RecoveryOutcome::Compensated);
    assert_eq!(h.slots.active_holds(h.slot_id).await, 0);
}

#[tokio::test]
async fn unreachable_provider_leaves_the_booking_pending() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    h.start_and_pay(&coordinator).await;
    h.gateway.fail_transport(true);

    let outcome = coordinator.recover().await.unwrap();
    assert_eq!(outcome, RecoveryOutcome::StillPending);
    assert!(h.store.read().await.unwrap().is_some());
    assert_eq!(coordinator.phase().await, SagaPhase::AwaitingExternalPayment);
}

#[tokio::test]
async fn stalled_booking_retries_idempotently() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    let txref = h.start_and_pay(&coordinator).await;
    h.gateway.set_status(&txref, PaymentStatus::Completed).await;
    h.appointments.fail_create(true);

    let outcome = coordinator.recover().await.unwrap();
    let RecoveryOutcome::Stalled { transaction_ref } = outcome else {
        panic!("expected stall, got {outcome:?}");
    };
    assert_eq!(transaction_ref, txref);
    // The checkpoint stays put and the slot is never auto-released.
    assert!(h.store.read().await.unwrap().is_some());
    assert!(
        RecoveryOutcome::Stalled {
            transaction_ref: transaction_ref.clone()
        }
        .user_message()
        .unwrap()
        .contains(transaction_ref.as_str())
    );

    // Backend comes back; the retry lands exactly one appointment.
    h.appointments.fail_create(false);
    let outcome = coordinator.recover().await.unwrap();
    assert!(matches!(outcome, RecoveryOutcome::Confirmed(_)));
    assert!(h.store.read().await.unwrap().is_none());
    assert_eq!(h.slots.booked_count(h.slot_id).await, Some(1));
}

#[tokio::test]
async fn transient_check_failure_keeps_the_stalled_state() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    let txref = h.start_and_pay(&coordinator).await;
    h.gateway.set_status(&txref, PaymentStatus::Completed).await;
    h.appointments.fail_create(true);
    let outcome = coordinator.recover().await.unwrap();
    assert!(matches!(outcome, RecoveryOutcome::Stalled { .. }));

    // The provider goes unreachable; the stall must not be downgraded to an
    // ordinary pending payment.
    h.gateway.fail_transport(true);
    let outcome = coordinator.recover().await.unwrap();
    assert!(matches!(outcome, RecoveryOutcome::Stalled { .. }));
    assert!(matches!(
        coordinator.phase().await,
        SagaPhase::Stalled { .. }
    ));

    // Both dependencies come back and the retry still lands.
    h.gateway.fail_transport(false);
    h.appointments.fail_create(false);
    let outcome = coordinator.recover().await.unwrap();
    assert!(matches!(outcome, RecoveryOutcome::Confirmed(_)));
}

#[tokio::test]
async fn server_created_appointment_is_not_created_twice() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    let txref = h.start_and_pay(&coordinator).await;
    h.gateway.set_status(&txref, PaymentStatus::Completed).await;
    let server_side = AggregateId::new();
    h.gateway.attach_appointment(&txref, server_side).await;

    let outcome = coordinator.recover().await.unwrap();
    let RecoveryOutcome::Confirmed(appointment_id) = outcome else {
        panic!("expected confirmation, got {outcome:?}");
    };
    assert_eq!(appointment_id.0, server_side);
    // No client-side create call was made.
    assert!(h.appointments.list_for_customer(h.customer_id).await.unwrap().is_empty());
    assert!(h.store.read().await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn poll_stops_at_the_ceiling_and_keeps_the_checkpoint() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    let txref = h.start_and_pay(&coordinator).await;
    let outcome = coordinator.verification_poll().await.unwrap();
    assert_eq!(outcome, RecoveryOutcome::VerificationTimeout);

    // Polling gave up but nothing was lost; the next trigger still works.
    assert!(h.store.read().await.unwrap().is_some());
    h.gateway.set_status(&txref, PaymentStatus::Completed).await;
    let outcome = coordinator.recover().await.unwrap();
    assert!(matches!(outcome, RecoveryOutcome::Confirmed(_)));
}

#[tokio::test(start_paused = true)]
async fn poll_picks_up_a_completed_payment() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    let txref = h.start_and_pay(&coordinator).await;
    h.gateway.set_status(&txref, PaymentStatus::Completed).await;

    let outcome = coordinator.verification_poll().await.unwrap();
    assert!(matches!(outcome, RecoveryOutcome::Confirmed(_)));
}

#[tokio::test(start_paused = true)]
async fn poll_with_a_budget_below_one_interval_still_checks_once() {
    let h = Harness::new().await;
    let coordinator = h.coordinator_with(
        BookingConfig::default().with_verification_timeout(Duration::from_millis(500)),
    );

    let txref = h.start_and_pay(&coordinator).await;
    h.gateway.set_status(&txref, PaymentStatus::Completed).await;

    // Less than one poll interval remains before the ceiling; the completed
    // payment must still be picked up by a final check at the deadline.
    let outcome = coordinator.verification_poll().await.unwrap();
    assert!(matches!(outcome, RecoveryOutcome::Confirmed(_)));
}

/// Gateway wrapper that parks `check` until the test releases it, to hold a
/// recovery pass open.
struct GatedGateway {
    inner: Arc<MockPaymentGateway>,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl PaymentGateway for GatedGateway {
    async fn create_session(
        &self,
        amount: u64,
        order_info: OrderInfo,
        draft_ref: AggregateId,
    ) -> Result<PaymentSession, GatewayError> {
        self.inner.create_session(amount, order_info, draft_ref).await
    }

    async fn check(&self, transaction_ref: &TransactionRef) -> Result<PaymentCheck, GatewayError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.check(transaction_ref).await
    }
}

#[tokio::test]
async fn concurrent_recovery_triggers_coalesce() {
    let h = Harness::new().await;
    let gateway = Arc::new(GatedGateway {
        inner: h.gateway.clone(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let coordinator = Arc::new(BookingSagaCoordinator::new(
        h.slots.clone(),
        gateway.clone(),
        h.appointments.clone(),
        h.store.clone(),
        h.browser.clone(),
        BookingConfig::default(),
    ));

    coordinator.start(h.slot_id, h.draft()).await.unwrap();
    let session = coordinator
        .create_payment_session(h.order_info())
        .await
        .unwrap();
    h.gateway
        .set_status(&session.transaction_ref, PaymentStatus::Completed)
        .await;

    let first = tokio::spawn({
        let coordinator = coordinator.clone();
        async move { coordinator.recover().await }
    });
    gateway.entered.notified().await;

    // A second trigger while the first is verifying must not double-create.
    let second = coordinator.recover().await.unwrap();
    assert_eq!(second, RecoveryOutcome::AlreadyInProgress);

    gateway.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, RecoveryOutcome::Confirmed(_)));
    assert_eq!(
        h.appointments
            .list_for_customer(h.customer_id)
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn cancel_before_payment_compensates() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    h.start_and_pay(&coordinator).await;
    let outcome = coordinator.cancel_in_flight().await.unwrap();
    assert_eq!(outcome, RecoveryOutcome::Compensated);
    assert!(h.store.read().await.unwrap().is_none());
    assert_eq!(h.slots.active_holds(h.slot_id).await, 0);
}

#[tokio::test]
async fn cancel_after_completed_payment_is_refused() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    let txref = h.start_and_pay(&coordinator).await;
    h.gateway.set_status(&txref, PaymentStatus::Completed).await;

    let err = coordinator.cancel_in_flight().await.unwrap_err();
    assert!(matches!(err, SagaError::PaymentAlreadyCompleted));

    // The paid booking is still recoverable into a confirmed appointment.
    let outcome = coordinator.recover().await.unwrap();
    assert!(matches!(outcome, RecoveryOutcome::Confirmed(_)));
}

#[tokio::test]
async fn cancel_with_unverifiable_payment_is_refused() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    h.start_and_pay(&coordinator).await;
    h.gateway.fail_transport(true);

    let err = coordinator.cancel_in_flight().await.unwrap_err();
    assert!(matches!(err, SagaError::CancelUnverified(_)));
    assert!(h.store.read().await.unwrap().is_some());
}

#[tokio::test]
async fn mismatched_payment_return_is_ignored() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    h.start_and_pay(&coordinator).await;
    let outcome = coordinator
        .handle_payment_return(&PaymentReturn {
            success: true,
            transaction_ref: TransactionRef::new("TXN-from-some-other-session"),
            amount: DEFAULT_DEPOSIT_AMOUNT,
        })
        .await
        .unwrap();

    assert_eq!(outcome, RecoveryOutcome::NothingToRecover);
    // The in-flight booking is untouched.
    assert!(h.store.read().await.unwrap().is_some());
}

#[tokio::test]
async fn matching_payment_return_verifies_through_the_gateway() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    let txref = h.start_and_pay(&coordinator).await;
    h.gateway.set_status(&txref, PaymentStatus::Completed).await;

    let outcome = coordinator
        .handle_payment_return(&PaymentReturn {
            success: true,
            transaction_ref: txref,
            amount: DEFAULT_DEPOSIT_AMOUNT,
        })
        .await
        .unwrap();
    assert!(matches!(outcome, RecoveryOutcome::Confirmed(_)));
}

#[tokio::test]
async fn payment_return_success_flag_is_not_trusted() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    // The redirect claims success but the provider still reports pending.
    let txref = h.start_and_pay(&coordinator).await;
    let outcome = coordinator
        .handle_payment_return(&PaymentReturn {
            success: true,
            transaction_ref: txref,
            amount: DEFAULT_DEPOSIT_AMOUNT,
        })
        .await
        .unwrap();
    assert_eq!(outcome, RecoveryOutcome::StillPending);
}

#[tokio::test]
async fn start_is_refused_while_an_intent_is_active() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();
    h.start_and_pay(&coordinator).await;

    // A fresh coordinator over the same store (new process, same device).
    let restarted = h.coordinator();
    let err = restarted.start(h.slot_id, h.draft()).await.unwrap_err();
    assert!(matches!(err, SagaError::IntentAlreadyActive));
}

#[tokio::test]
async fn reservation_conflict_leaves_nothing_behind() {
    let h = Harness::new().await;

    // Other customers take the whole window first.
    h.slots.reserve(h.slot_id).await.unwrap();
    h.slots.reserve(h.slot_id).await.unwrap();

    let coordinator = h.coordinator();
    let err = coordinator.start(h.slot_id, h.draft()).await.unwrap_err();
    assert!(matches!(err, SagaError::ReservationConflict));
    assert!(h.store.read().await.unwrap().is_none());
    assert_eq!(coordinator.phase().await, SagaPhase::Idle);
}

#[tokio::test]
async fn foreground_transition_drives_recovery() {
    let h = Harness::new().await;
    let coordinator = Arc::new(h.coordinator());

    let txref = h.start_and_pay(&coordinator).await;
    h.gateway.set_status(&txref, PaymentStatus::Completed).await;

    let monitor = LifecycleMonitor::new().with_hook(coordinator.clone());
    monitor.set_visibility(AppVisibility::Background).await;
    monitor.set_visibility(AppVisibility::Foreground).await;

    assert!(matches!(
        coordinator.phase().await,
        SagaPhase::Confirmed { .. }
    ));
    assert!(h.store.read().await.unwrap().is_none());
}

#[tokio::test]
async fn browser_failure_keeps_the_booking_resumable() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    coordinator.start(h.slot_id, h.draft()).await.unwrap();
    h.browser.fail_open(true);
    let session = coordinator
        .create_payment_session(h.order_info())
        .await
        .unwrap();

    // The redirect never opened but the checkpoint carries the reference.
    assert!(h.browser.opened_urls().await.is_empty());
    let intent = h.store.read().await.unwrap().unwrap();
    assert_eq!(
        intent.current_transaction_ref,
        Some(session.transaction_ref)
    );
    assert_eq!(coordinator.phase().await, SagaPhase::AwaitingExternalPayment);
}

#[tokio::test]
async fn rejected_session_compensates_immediately() {
    let h = Harness::new().await;
    let coordinator = h.coordinator();

    coordinator.start(h.slot_id, h.draft()).await.unwrap();
    h.gateway.reject_session_creation(true);

    let err = coordinator
        .create_payment_session(h.order_info())
        .await
        .unwrap_err();
    assert!(matches!(err, SagaError::PaymentSession(_)));
    assert!(h.store.read().await.unwrap().is_none());
    assert_eq!(h.slots.active_holds(h.slot_id).await, 0);
    assert_eq!(coordinator.phase().await, SagaPhase::Released);
}
