//! In-memory appointment backend.
//!
//! Implements the server-side half of the saga's contract: creation is
//! idempotent on the transaction reference, consumes the slot's capacity
//! unit through the shared registry, and returns the capacity when a
//! cancellation completes. The staff-side operations (approve, reject,
//! process refund) live here too so cancellation tests can run the whole
//! sub-workflow against one backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use pitstop_appointments::{
    Appointment, AppointmentDraft, AppointmentId, AppointmentService, AppointmentServiceError,
    AppointmentStatus, CancelRequestSubmission, DepositInfo, PaymentInfo,
};
use pitstop_cancellation::{CancellationRefundEngine, CancellationRequest};
use pitstop_core::{AggregateId, CustomerId, UserId};
use pitstop_payments::TransactionRef;
use pitstop_scheduling::{ReservationId, SlotId};

use crate::in_memory::slots::InMemorySlotRegistry;

/// In-memory [`AppointmentService`] backed by the shared slot registry.
pub struct InMemoryAppointmentService {
    slots: Arc<InMemorySlotRegistry>,
    engine: CancellationRefundEngine,
    deposit_amount: u64,
    appointments: Mutex<HashMap<AppointmentId, Appointment>>,
    by_transaction: Mutex<HashMap<TransactionRef, AppointmentId>>,
    fail_create: AtomicBool,
}

impl InMemoryAppointmentService {
    pub fn new(
        slots: Arc<InMemorySlotRegistry>,
        engine: CancellationRefundEngine,
        deposit_amount: u64,
    ) -> Self {
        Self {
            slots,
            engine,
            deposit_amount,
            appointments: Mutex::new(HashMap::new()),
            by_transaction: Mutex::new(HashMap::new()),
            fail_create: AtomicBool::new(false),
        }
    }

    /// Make `create` fail until cleared (drives the stalled-saga path).
    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, id: AppointmentId) -> Option<Appointment> {
        self.appointments.lock().await.get(&id).cloned()
    }

    /// Staff approval of a pending cancellation request.
    pub async fn approve_cancel_request(
        &self,
        id: AppointmentId,
        approved_by: UserId,
    ) -> Result<Appointment, AppointmentServiceError> {
        let mut appointments = self.appointments.lock().await;
        let appointment = appointments
            .get_mut(&id)
            .ok_or(AppointmentServiceError::UnknownAppointment)?;
        self.engine
            .record_approval(appointment, approved_by, Utc::now())
            .map_err(|e| AppointmentServiceError::CancelRejected(e.to_string()))?;
        Ok(appointment.clone())
    }

    /// Staff rejection of a pending cancellation request.
    pub async fn reject_cancel_request(
        &self,
        id: AppointmentId,
    ) -> Result<Appointment, AppointmentServiceError> {
        let mut appointments = self.appointments.lock().await;
        let appointment = appointments
            .get_mut(&id)
            .ok_or(AppointmentServiceError::UnknownAppointment)?;
        self.engine
            .record_rejection(appointment, Utc::now())
            .map_err(|e| AppointmentServiceError::CancelRejected(e.to_string()))?;
        Ok(appointment.clone())
    }

    /// Staff refund processing. The terminal transition returns the slot's
    /// capacity unit to the pool, once.
    pub async fn process_refund(
        &self,
        id: AppointmentId,
        processed_by: UserId,
        evidence_image: Option<String>,
    ) -> Result<Appointment, AppointmentServiceError> {
        let mut appointments = self.appointments.lock().await;
        let appointment = appointments
            .get_mut(&id)
            .ok_or(AppointmentServiceError::UnknownAppointment)?;
        self.engine
            .record_refund_processed(appointment, processed_by, evidence_image, Utc::now())
            .map_err(|e| AppointmentServiceError::CancelRejected(e.to_string()))?;
        self.slots
            .release_booked(appointment.slot_id)
            .await
            .map_err(|e| AppointmentServiceError::Transport(e.to_string()))?;
        info!(appointment_id = %id, "appointment cancelled; capacity returned");
        Ok(appointment.clone())
    }
}

#[async_trait]
impl AppointmentService for InMemoryAppointmentService {
    async fn create(
        &self,
        draft: &AppointmentDraft,
        transaction_ref: &TransactionRef,
        slot_id: SlotId,
        reservation: Option<ReservationId>,
    ) -> Result<Appointment, AppointmentServiceError> {
        // Idempotency check first: a retry after a failure-injection window
        // or a crashed finalization must find the original record.
        {
            let by_transaction = self.by_transaction.lock().await;
            if let Some(existing) = by_transaction.get(transaction_ref) {
                let appointments = self.appointments.lock().await;
                if let Some(appointment) = appointments.get(existing) {
                    debug!(
                        %transaction_ref,
                        appointment_id = %existing,
                        "create repeated for known transaction; returning existing"
                    );
                    return Ok(appointment.clone());
                }
            }
        }

        if self.fail_create.load(Ordering::SeqCst) {
            return Err(AppointmentServiceError::Transport(
                "appointment backend unavailable".to_string(),
            ));
        }

        self.slots
            .commit(slot_id, reservation)
            .await
            .map_err(|e| AppointmentServiceError::CreationRejected(e.to_string()))?;

        let now = Utc::now();
        let appointment = Appointment {
            id: AppointmentId::new(AggregateId::new()),
            status: AppointmentStatus::Confirmed,
            customer_id: draft.customer_id,
            vehicle_id: draft.vehicle_id,
            slot_id,
            technician_id: draft.technician_id,
            scheduled_date: draft.scheduled_date,
            scheduled_time: draft.scheduled_time,
            notes: draft.notes.clone(),
            deposit: DepositInfo {
                amount: self.deposit_amount,
                paid: true,
                paid_at: Some(now),
            },
            payment: PaymentInfo {
                transaction_ref: transaction_ref.clone(),
                method: "online".to_string(),
                amount: self.deposit_amount,
            },
            cancel_request: None,
            created_at: now,
        };

        // Re-check under the lock held through the insert: the capacity
        // commit above is an await, so a parallel create with the same
        // reference may have landed first. If it did, return its record and
        // give back the extra capacity unit this call just took.
        let mut by_transaction = self.by_transaction.lock().await;
        if let Some(existing) = by_transaction.get(transaction_ref).copied() {
            drop(by_transaction);
            self.slots
                .release_booked(slot_id)
                .await
                .map_err(|e| AppointmentServiceError::Transport(e.to_string()))?;
            debug!(
                %transaction_ref,
                appointment_id = %existing,
                "parallel create already landed; extra capacity returned"
            );
            let appointments = self.appointments.lock().await;
            return appointments
                .get(&existing)
                .cloned()
                .ok_or(AppointmentServiceError::UnknownAppointment);
        }
        let mut appointments = self.appointments.lock().await;
        by_transaction.insert(transaction_ref.clone(), appointment.id);
        appointments.insert(appointment.id, appointment.clone());
        info!(
            appointment_id = %appointment.id,
            %transaction_ref,
            "appointment created"
        );
        Ok(appointment)
    }

    async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Appointment>, AppointmentServiceError> {
        let appointments = self.appointments.lock().await;
        let mut list: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.customer_id == customer_id)
            .cloned()
            .collect();
        list.sort_by_key(|a| a.created_at);
        Ok(list)
    }

    async fn submit_cancel_request(
        &self,
        appointment_id: AppointmentId,
        submission: CancelRequestSubmission,
    ) -> Result<Appointment, AppointmentServiceError> {
        let mut appointments = self.appointments.lock().await;
        let appointment = appointments
            .get_mut(&appointment_id)
            .ok_or(AppointmentServiceError::UnknownAppointment)?;
        self.engine
            .request_cancellation(
                appointment,
                CancellationRequest {
                    reason: submission.reason,
                    refund_method: submission.refund_method,
                    bank_info: submission.bank_info,
                    proof_image_url: submission.proof_image_url,
                },
                Utc::now(),
            )
            .map_err(|e| AppointmentServiceError::CancelRejected(e.to_string()))?;
        Ok(appointment.clone())
    }
}
