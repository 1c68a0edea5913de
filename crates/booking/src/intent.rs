//! The saga's durable checkpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pitstop_appointments::AppointmentDraft;
use pitstop_payments::TransactionRef;
use pitstop_scheduling::{ReservationId, SlotId};

/// Current checkpoint schema version. Bump only with a migration path: the
/// serialized field names are the recovery signal across app versions.
pub const INTENT_SCHEMA_VERSION: u32 = 1;

fn current_schema_version() -> u32 {
    INTENT_SCHEMA_VERSION
}

/// Durable booking checkpoint, the saga's only persisted state.
///
/// Owned exclusively by the coordinator (single writer). At most one exists
/// per customer session; its presence means a booking is in flight and must
/// be reconciled before a new one may start.
///
/// Write ordering is the crash-safety contract: `reservedSlotId` is persisted
/// before the payment session is requested, and `currentTransactionRef` is
/// persisted before the external browser opens. Any interruption after the
/// redirect therefore leaves enough state to resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingIntent {
    #[serde(default = "current_schema_version")]
    pub schema_version: u32,
    pub pending_booking_draft: AppointmentDraft,
    pub reserved_slot_id: SlotId,
    pub reservation_id: ReservationId,
    #[serde(default)]
    pub current_transaction_ref: Option<TransactionRef>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub session_created_at: Option<DateTime<Utc>>,
}

impl BookingIntent {
    /// Checkpoint written at reservation time, before any payment exists.
    pub fn reserved(
        draft: AppointmentDraft,
        slot_id: SlotId,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: INTENT_SCHEMA_VERSION,
            pending_booking_draft: draft,
            reserved_slot_id: slot_id,
            reservation_id,
            current_transaction_ref: None,
            created_at: now,
            session_created_at: None,
        }
    }

    /// Attach the payment session, to be persisted before the redirect opens.
    pub fn attach_session(&mut self, transaction_ref: TransactionRef, now: DateTime<Utc>) {
        self.current_transaction_ref = Some(transaction_ref);
        self.session_created_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pitstop_core::{AggregateId, CustomerId, VehicleId};

    fn test_draft() -> AppointmentDraft {
        AppointmentDraft {
            draft_ref: AggregateId::new(),
            customer_id: CustomerId::new(),
            vehicle_id: VehicleId::new(),
            scheduled_date: NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
            scheduled_time: chrono::NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            notes: Some("brake check".to_string()),
            technician_id: None,
        }
    }

    #[test]
    fn serializes_under_stable_key_names() {
        let mut intent = BookingIntent::reserved(
            test_draft(),
            SlotId::new(AggregateId::new()),
            ReservationId::new(AggregateId::new()),
            Utc::now(),
        );
        intent.attach_session(TransactionRef::new("TXN-9"), Utc::now());

        let json = serde_json::to_value(&intent).unwrap();
        let obj = json.as_object().unwrap();
        assert!(obj.contains_key("schemaVersion"));
        assert!(obj.contains_key("pendingBookingDraft"));
        assert!(obj.contains_key("reservedSlotId"));
        assert!(obj.contains_key("reservationId"));
        assert!(obj.contains_key("currentTransactionRef"));
        assert!(obj.contains_key("sessionCreatedAt"));
    }

    #[test]
    fn deserializes_checkpoint_missing_optional_fields() {
        // A checkpoint written before the payment session exists.
        let intent = BookingIntent::reserved(
            test_draft(),
            SlotId::new(AggregateId::new()),
            ReservationId::new(AggregateId::new()),
            Utc::now(),
        );
        let json = serde_json::to_string(&intent).unwrap();
        let back: BookingIntent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.current_transaction_ref, None);
        assert_eq!(back.session_created_at, None);
        assert_eq!(back.schema_version, INTENT_SCHEMA_VERSION);
    }
}
