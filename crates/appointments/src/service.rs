//! Appointment service contract (client-facing view of the appointment
//! backend).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use pitstop_core::CustomerId;
use pitstop_payments::TransactionRef;
use pitstop_scheduling::{ReservationId, SlotId};

use crate::appointment::{Appointment, AppointmentDraft, AppointmentId, BankInfo, RefundMethod};

/// Appointment service operation error.
#[derive(Debug, Error)]
pub enum AppointmentServiceError {
    /// Creation was rejected by the backend (validation, closed slot, ...).
    #[error("appointment creation rejected: {0}")]
    CreationRejected(String),

    /// The appointment does not exist.
    #[error("unknown appointment")]
    UnknownAppointment,

    /// The cancel request was rejected by the backend.
    #[error("cancel request rejected: {0}")]
    CancelRejected(String),

    /// Transport-level failure talking to the backend.
    #[error("appointment service transport error: {0}")]
    Transport(String),
}

/// Customer-submitted cancellation request payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequestSubmission {
    pub reason: String,
    pub refund_method: RefundMethod,
    #[serde(default)]
    pub bank_info: Option<BankInfo>,
    #[serde(default)]
    pub proof_image_url: Option<String>,
}

/// Client contract for the appointment backend.
#[async_trait]
pub trait AppointmentService: Send + Sync {
    /// Create the appointment for a completed payment.
    ///
    /// Idempotent on `transaction_ref`: a second call with the same reference
    /// returns the appointment the first call created. Passing the
    /// reservation handle tells the backend the capacity unit is already
    /// held by this client, so it must not be counted twice.
    async fn create(
        &self,
        draft: &AppointmentDraft,
        transaction_ref: &TransactionRef,
        slot_id: SlotId,
        reservation: Option<ReservationId>,
    ) -> Result<Appointment, AppointmentServiceError>;

    /// All appointments for a customer (backs the manual-recovery path and
    /// the cancellation screens).
    async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Appointment>, AppointmentServiceError>;

    /// Submit a cancellation request for an appointment.
    async fn submit_cancel_request(
        &self,
        appointment_id: AppointmentId,
        submission: CancelRequestSubmission,
    ) -> Result<Appointment, AppointmentServiceError>;
}

#[async_trait]
impl<S> AppointmentService for Arc<S>
where
    S: AppointmentService + ?Sized,
{
    async fn create(
        &self,
        draft: &AppointmentDraft,
        transaction_ref: &TransactionRef,
        slot_id: SlotId,
        reservation: Option<ReservationId>,
    ) -> Result<Appointment, AppointmentServiceError> {
        (**self)
            .create(draft, transaction_ref, slot_id, reservation)
            .await
    }

    async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Appointment>, AppointmentServiceError> {
        (**self).list_for_customer(customer_id).await
    }

    async fn submit_cancel_request(
        &self,
        appointment_id: AppointmentId,
        submission: CancelRequestSubmission,
    ) -> Result<Appointment, AppointmentServiceError> {
        (**self).submit_cancel_request(appointment_id, submission).await
    }
}
