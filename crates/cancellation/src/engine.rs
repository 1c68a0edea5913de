//! Cancel -> approve -> refund state machine on the appointment record.

use chrono::{DateTime, Utc};
use tracing::debug;

use pitstop_appointments::{
    Appointment, AppointmentStatus, BankInfo, CancelRequest, RefundMethod,
};
use pitstop_core::{DomainError, DomainResult, UserId};

use crate::refund::RefundPolicy;

/// Customer input for opening a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationRequest {
    pub reason: String,
    pub refund_method: RefundMethod,
    pub bank_info: Option<BankInfo>,
    pub proof_image_url: Option<String>,
}

/// Drives the cancellation/refund sub-workflow.
///
/// Customer-side operations validate preconditions before anything is
/// submitted; staff-side operations only reflect outcomes decided elsewhere
/// (approval and refund processing happen in the back office).
#[derive(Debug, Clone, Default)]
pub struct CancellationRefundEngine {
    policy: RefundPolicy,
}

impl CancellationRefundEngine {
    pub fn new(policy: RefundPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RefundPolicy {
        &self.policy
    }

    /// Whether the customer may open a cancellation request right now.
    ///
    /// Any existing request blocks a new one, including a rejected request
    /// kept for audit; staff tooling clears those.
    pub fn can_request_cancellation(&self, appointment: &Appointment) -> bool {
        appointment.is_cancellable_status() && appointment.cancel_request.is_none()
    }

    /// Open a cancellation request, fixing the refund amount by policy at
    /// request time.
    pub fn request_cancellation(
        &self,
        appointment: &mut Appointment,
        request: CancellationRequest,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !appointment.is_cancellable_status() {
            return Err(DomainError::invariant(format!(
                "appointment in status {:?} cannot be cancelled",
                appointment.status
            )));
        }
        if appointment.cancel_request.is_some() {
            return Err(DomainError::conflict(
                "a cancellation request already exists for this appointment",
            ));
        }
        if request.reason.trim().is_empty() {
            return Err(DomainError::validation("cancellation reason cannot be empty"));
        }
        if request.refund_method == RefundMethod::BankTransfer {
            if request.bank_info.is_none() {
                return Err(DomainError::validation(
                    "bank transfer refunds require bank account details",
                ));
            }
            // Server requires the uploaded proof; do not submit without it.
            if request.proof_image_url.as_deref().unwrap_or("").is_empty() {
                return Err(DomainError::validation(
                    "bank transfer refunds require an uploaded proof image",
                ));
            }
        }

        let refund_amount =
            self.policy
                .compute_refund(appointment.deposit.amount, appointment.scheduled_at(), now);
        debug!(
            appointment_id = %appointment.id,
            refund_amount,
            "opening cancellation request"
        );

        appointment.cancel_request = Some(CancelRequest {
            reason: request.reason,
            refund_method: request.refund_method,
            bank_info: request.bank_info,
            customer_proof_image: request.proof_image_url,
            requested_at: now,
            refund_amount,
            approved_at: None,
            approved_by: None,
            rejected_at: None,
            refund_processed_at: None,
            refund_processed_by: None,
            refund_evidence_image: None,
        });
        appointment.status = AppointmentStatus::CancelRequested;
        Ok(())
    }

    /// Reflect a staff approval onto the record.
    pub fn record_approval(
        &self,
        appointment: &mut Appointment,
        approved_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if appointment.status != AppointmentStatus::CancelRequested {
            return Err(DomainError::invariant(
                "only a requested cancellation can be approved",
            ));
        }
        let request = appointment
            .cancel_request
            .as_mut()
            .ok_or_else(|| DomainError::invariant("cancel_requested status without a request"))?;
        request.approved_at = Some(now);
        request.approved_by = Some(approved_by);
        appointment.status = AppointmentStatus::CancelApproved;
        Ok(())
    }

    /// Reflect a staff rejection: back to the stable confirmed state. The
    /// request stays on the record for audit.
    pub fn record_rejection(
        &self,
        appointment: &mut Appointment,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if appointment.status != AppointmentStatus::CancelRequested {
            return Err(DomainError::invariant(
                "only a requested cancellation can be rejected",
            ));
        }
        let request = appointment
            .cancel_request
            .as_mut()
            .ok_or_else(|| DomainError::invariant("cancel_requested status without a request"))?;
        request.rejected_at = Some(now);
        appointment.status = AppointmentStatus::Confirmed;
        Ok(())
    }

    /// Reflect the processed refund: terminal cancelled state with evidence.
    pub fn record_refund_processed(
        &self,
        appointment: &mut Appointment,
        processed_by: UserId,
        evidence_image: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if appointment.status != AppointmentStatus::CancelApproved {
            return Err(DomainError::invariant(
                "refund can only be processed for an approved cancellation",
            ));
        }
        let request = appointment
            .cancel_request
            .as_mut()
            .ok_or_else(|| DomainError::invariant("cancel_approved status without a request"))?;
        request.refund_processed_at = Some(now);
        request.refund_processed_by = Some(processed_by);
        request.refund_evidence_image = evidence_image;
        appointment.status = AppointmentStatus::Cancelled;
        Ok(())
    }
}
