use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use pitstop_core::{AggregateId, DomainError};

/// Slot identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub AggregateId);

impl SlotId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for SlotId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Slot status lifecycle.
///
/// `Closed` slots never accept reservations regardless of remaining capacity
/// (scheduling staff can close a window that still has room).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Available,
    PartiallyBooked,
    Full,
    Closed,
}

/// A bookable time window with finite capacity.
///
/// Invariant: `0 <= booked_count <= capacity` at all times, so
/// `available_capacity` is never negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: u32,
    pub booked_count: u32,
    pub status: SlotStatus,
}

impl Slot {
    /// Create an open slot with no bookings yet.
    pub fn open(
        id: SlotId,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        capacity: u32,
    ) -> Result<Self, DomainError> {
        if capacity == 0 {
            return Err(DomainError::validation("capacity must be at least 1"));
        }
        if end_time <= start_time {
            return Err(DomainError::validation("end_time must be after start_time"));
        }
        Ok(Self {
            id,
            date,
            start_time,
            end_time,
            capacity,
            booked_count: 0,
            status: SlotStatus::Available,
        })
    }

    /// Derived: `capacity - booked_count`.
    pub fn available_capacity(&self) -> u32 {
        self.capacity - self.booked_count
    }

    /// Whether the slot can appear in customer-facing listings.
    pub fn is_listable(&self) -> bool {
        matches!(self.status, SlotStatus::Available | SlotStatus::PartiallyBooked)
            && self.available_capacity() > 0
    }

    /// The scheduled start instant of this slot (UTC).
    pub fn starts_at(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.date.and_time(self.start_time))
    }

    /// Recompute `status` from the booked count, preserving `Closed`.
    pub fn refresh_status(&mut self) {
        if self.status == SlotStatus::Closed {
            return;
        }
        self.status = if self.booked_count >= self.capacity {
            SlotStatus::Full
        } else if self.booked_count > 0 {
            SlotStatus::PartiallyBooked
        } else {
            SlotStatus::Available
        };
    }

    /// Increment the booked count (successful appointment creation).
    pub fn record_booking(&mut self) -> Result<(), DomainError> {
        if self.booked_count >= self.capacity {
            return Err(DomainError::invariant("booked_count cannot exceed capacity"));
        }
        self.booked_count += 1;
        self.refresh_status();
        Ok(())
    }

    /// Decrement the booked count (cancelled appointment returns to the pool).
    pub fn record_cancellation(&mut self) -> Result<(), DomainError> {
        if self.booked_count == 0 {
            return Err(DomainError::invariant("booked_count cannot go negative"));
        }
        self.booked_count -= 1;
        self.refresh_status();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_slot(capacity: u32) -> Slot {
        Slot::open(
            SlotId::new(AggregateId::new()),
            NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            capacity,
        )
        .unwrap()
    }

    #[test]
    fn open_rejects_zero_capacity() {
        let err = Slot::open(
            SlotId::new(AggregateId::new()),
            NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            0,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn open_rejects_inverted_window() {
        let err = Slot::open(
            SlotId::new(AggregateId::new()),
            NaiveDate::from_ymd_opt(2026, 9, 14).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            2,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn status_tracks_booked_count() {
        let mut slot = test_slot(2);
        assert_eq!(slot.status, SlotStatus::Available);

        slot.record_booking().unwrap();
        assert_eq!(slot.status, SlotStatus::PartiallyBooked);
        assert_eq!(slot.available_capacity(), 1);

        slot.record_booking().unwrap();
        assert_eq!(slot.status, SlotStatus::Full);
        assert_eq!(slot.available_capacity(), 0);
        assert!(!slot.is_listable());

        slot.record_cancellation().unwrap();
        assert_eq!(slot.status, SlotStatus::PartiallyBooked);
        assert!(slot.is_listable());
    }

    #[test]
    fn booking_past_capacity_is_rejected() {
        let mut slot = test_slot(1);
        slot.record_booking().unwrap();
        let err = slot.record_booking().unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
        assert_eq!(slot.booked_count, 1);
    }

    #[test]
    fn cancellation_on_empty_slot_is_rejected() {
        let mut slot = test_slot(1);
        let err = slot.record_cancellation().unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn closed_slot_is_never_listable() {
        let mut slot = test_slot(3);
        slot.status = SlotStatus::Closed;
        assert!(!slot.is_listable());

        // refresh_status must not reopen a closed slot
        slot.refresh_status();
        assert_eq!(slot.status, SlotStatus::Closed);
    }

    proptest! {
        /// Property: for any sequence of bookings and cancellations, the
        /// capacity invariant holds and available_capacity never underflows.
        #[test]
        fn capacity_invariant_holds(
            capacity in 1u32..8,
            ops in prop::collection::vec(prop::bool::ANY, 0..64)
        ) {
            let mut slot = test_slot(capacity);
            for book in ops {
                if book {
                    let _ = slot.record_booking();
                } else {
                    let _ = slot.record_cancellation();
                }
                prop_assert!(slot.booked_count <= slot.capacity);
                prop_assert_eq!(
                    slot.available_capacity(),
                    slot.capacity - slot.booked_count
                );
            }
        }
    }
}
