//! REST adapter for the appointment backend.

use async_trait::async_trait;
use tracing::debug;

use pitstop_appointments::{
    Appointment, AppointmentDraft, AppointmentId, AppointmentService, AppointmentServiceError,
    CancelRequestSubmission,
};
use pitstop_core::CustomerId;
use pitstop_payments::TransactionRef;
use pitstop_scheduling::{ReservationId, SlotId};

use crate::rest::dto::CreateAppointmentRequest;

/// [`AppointmentService`] speaking the backend's HTTP contract.
///
/// `create` posts the transaction reference with the draft; the backend's
/// idempotent handling of repeated references is what makes retrying the
/// finalization step safe.
pub struct RestAppointmentService {
    base_url: String,
    client: reqwest::Client,
}

impl RestAppointmentService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AppointmentService for RestAppointmentService {
    async fn create(
        &self,
        draft: &AppointmentDraft,
        transaction_ref: &TransactionRef,
        slot_id: SlotId,
        reservation: Option<ReservationId>,
    ) -> Result<Appointment, AppointmentServiceError> {
        let url = format!("{}/appointments", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&CreateAppointmentRequest {
                draft: draft.clone(),
                transaction_ref: transaction_ref.clone(),
                slot_id,
                skip_slot_reservation: reservation.is_some(),
                reservation_id: reservation,
            })
            .send()
            .await
            .map_err(|e| AppointmentServiceError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppointmentServiceError::CreationRejected(format!(
                "{status}: {body}"
            )));
        }
        let appointment: Appointment = resp
            .json()
            .await
            .map_err(|e| AppointmentServiceError::Transport(e.to_string()))?;
        debug!(appointment_id = %appointment.id, "appointment created");
        Ok(appointment)
    }

    async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Appointment>, AppointmentServiceError> {
        let url = format!("{}/appointments", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("customerId", customer_id.to_string())])
            .send()
            .await
            .map_err(|e| AppointmentServiceError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(AppointmentServiceError::Transport(format!("{status}: {body}")));
        }
        resp.json()
            .await
            .map_err(|e| AppointmentServiceError::Transport(e.to_string()))
    }

    async fn submit_cancel_request(
        &self,
        appointment_id: AppointmentId,
        submission: CancelRequestSubmission,
    ) -> Result<Appointment, AppointmentServiceError> {
        let url = format!("{}/appointments/{}/cancel-request", self.base_url, appointment_id);
        let resp = self
            .client
            .post(&url)
            .json(&submission)
            .send()
            .await
            .map_err(|e| AppointmentServiceError::Transport(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => resp
                .json()
                .await
                .map_err(|e| AppointmentServiceError::Transport(e.to_string())),
            reqwest::StatusCode::NOT_FOUND => Err(AppointmentServiceError::UnknownAppointment),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(AppointmentServiceError::CancelRejected(format!(
                    "{status}: {body}"
                )))
            }
        }
    }
}
