use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use pitstop_core::{AggregateId, CustomerId, TechnicianId, UserId, VehicleId};
use pitstop_payments::TransactionRef;
use pitstop_scheduling::SlotId;

/// Appointment identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppointmentId(pub AggregateId);

impl AppointmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AppointmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Appointment status lifecycle.
///
/// The cancellation sub-machine is `Confirmed -> CancelRequested ->
/// CancelApproved -> Cancelled`, with staff rejection returning the record to
/// `Confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    CancelRequested,
    CancelApproved,
    Cancelled,
}

/// What the customer filled in before paying. This is the payload persisted in
/// the booking checkpoint, so its shape must stay stable across app versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentDraft {
    /// Opaque client-side reference tying payment sessions to this draft.
    pub draft_ref: AggregateId,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub technician_id: Option<TechnicianId>,
}

/// Deposit paid to hold the appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositInfo {
    /// Smallest currency unit.
    pub amount: u64,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Payment details attached by the backend on creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub transaction_ref: TransactionRef,
    pub method: String,
    pub amount: u64,
}

/// How the refund should be paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundMethod {
    OriginalMethod,
    BankTransfer,
}

/// Customer bank details for a bank-transfer refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankInfo {
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
}

/// Cancellation request attached to an appointment.
///
/// Written once by the customer, then annotated by staff as it moves through
/// approval and refund processing. Retained after rejection for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub reason: String,
    pub refund_method: RefundMethod,
    #[serde(default)]
    pub bank_info: Option<BankInfo>,
    /// Customer-uploaded proof image (required for bank transfers).
    #[serde(default)]
    pub customer_proof_image: Option<String>,
    pub requested_at: DateTime<Utc>,
    /// Refund amount fixed by policy at request time.
    pub refund_amount: u64,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_by: Option<UserId>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refund_processed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refund_processed_by: Option<UserId>,
    /// Staff-uploaded evidence of the processed refund.
    #[serde(default)]
    pub refund_evidence_image: Option<String>,
}

/// A maintenance appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: AppointmentId,
    pub status: AppointmentStatus,
    pub customer_id: CustomerId,
    pub vehicle_id: VehicleId,
    pub slot_id: SlotId,
    #[serde(default)]
    pub technician_id: Option<TechnicianId>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: NaiveTime,
    #[serde(default)]
    pub notes: Option<String>,
    pub deposit: DepositInfo,
    pub payment: PaymentInfo,
    #[serde(default)]
    pub cancel_request: Option<CancelRequest>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// The scheduled start instant (UTC), used for refund-window math.
    pub fn scheduled_at(&self) -> DateTime<Utc> {
        chrono::TimeZone::from_utc_datetime(
            &Utc,
            &self.scheduled_date.and_time(self.scheduled_time),
        )
    }

    /// Statuses from which a cancellation request may be opened.
    pub fn is_cancellable_status(&self) -> bool {
        matches!(
            self.status,
            AppointmentStatus::Pending | AppointmentStatus::Confirmed
        )
    }
}
