//! Wire DTOs for the backend REST contract.
//!
//! Kept separate from the domain types so the wire shape can stay frozen
//! while the domain evolves. All field names are camelCase on the wire.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use pitstop_appointments::AppointmentDraft;
use pitstop_core::AggregateId;
use pitstop_payments::{OrderInfo, PaymentCheck, PaymentSession, PaymentStatus, TransactionRef};
use pitstop_scheduling::{ReservationId, Slot, SlotId, SlotRegistryError, SlotStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotDto {
    pub id: SlotId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: u32,
    pub booked_count: u32,
    pub status: SlotStatus,
}

impl From<Slot> for SlotDto {
    fn from(slot: Slot) -> Self {
        Self {
            id: slot.id,
            date: slot.date,
            start_time: slot.start_time,
            end_time: slot.end_time,
            capacity: slot.capacity,
            booked_count: slot.booked_count,
            status: slot.status,
        }
    }
}

impl TryFrom<SlotDto> for Slot {
    type Error = SlotRegistryError;

    /// The wire payload is untrusted; a booked count above capacity would
    /// break the `booked_count <= capacity` invariant the domain relies on.
    fn try_from(dto: SlotDto) -> Result<Self, Self::Error> {
        if dto.booked_count > dto.capacity {
            return Err(SlotRegistryError::Transport(format!(
                "slot {} reports bookedCount {} above capacity {}",
                dto.id, dto.booked_count, dto.capacity
            )));
        }
        Ok(Self {
            id: dto.id,
            date: dto.date,
            start_time: dto.start_time,
            end_time: dto.end_time,
            capacity: dto.capacity,
            booked_count: dto.booked_count,
            status: dto.status,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveResponse {
    pub reservation_id: ReservationId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRequest {
    pub reservation_id: ReservationId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub amount: u64,
    pub order_info: OrderInfo,
    pub draft_ref: AggregateId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionResponse {
    pub payment_url: String,
    pub transaction_ref: TransactionRef,
}

impl From<CreateSessionResponse> for PaymentSession {
    fn from(dto: CreateSessionResponse) -> Self {
        Self {
            payment_url: dto.payment_url,
            transaction_ref: dto.transaction_ref,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusResponse {
    pub status: PaymentStatus,
    #[serde(default)]
    pub appointment_id: Option<AggregateId>,
}

impl From<PaymentStatusResponse> for PaymentCheck {
    fn from(dto: PaymentStatusResponse) -> Self {
        Self {
            status: dto.status,
            appointment_id: dto.appointment_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    pub draft: AppointmentDraft,
    pub transaction_ref: TransactionRef,
    pub slot_id: SlotId,
    pub skip_slot_reservation: bool,
    #[serde(default)]
    pub reservation_id: Option<ReservationId>,
}
