//! In-memory slot registry (reference backend).
//!
//! Models the server-side capacity rules the saga relies on: atomic
//! reservation against `capacity`, idempotent release, and a TTL on every
//! hold so a client that never resumes cannot strand capacity. Expired holds
//! are swept lazily on each operation rather than by a background task.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use pitstop_core::AggregateId;
use pitstop_scheduling::{
    DateRange, ReservationId, Slot, SlotId, SlotRegistry, SlotRegistryError,
};

/// Default server-side hold lifetime. Long enough to cover an external
/// payment round-trip, short enough that abandoned bookings return capacity
/// within the same scheduling window.
pub const DEFAULT_HOLD_TTL: Duration = Duration::from_secs(300);

struct SlotEntry {
    slot: Slot,
    /// Outstanding holds keyed by reservation handle, valued by expiry.
    /// Release and commit name the hold through its handle, so one
    /// customer's compensation can never drop another customer's hold.
    holds: HashMap<ReservationId, Instant>,
}

impl SlotEntry {
    fn sweep(&mut self, now: Instant) {
        self.holds.retain(|_, expires_at| *expires_at > now);
    }

    fn committed_and_held(&self) -> u32 {
        self.slot.booked_count + self.holds.len() as u32
    }
}

/// Reference implementation of [`SlotRegistry`] plus the server-side
/// operations the appointment backend performs against it (`commit`,
/// `release_booked`).
pub struct InMemorySlotRegistry {
    state: Mutex<HashMap<SlotId, SlotEntry>>,
    hold_ttl: Duration,
}

impl InMemorySlotRegistry {
    pub fn new() -> Self {
        Self::with_hold_ttl(DEFAULT_HOLD_TTL)
    }

    pub fn with_hold_ttl(hold_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
            hold_ttl,
        }
    }

    pub async fn insert(&self, slot: Slot) {
        let mut state = self.state.lock().await;
        state.insert(slot.id, SlotEntry { slot, holds: HashMap::new() });
    }

    /// Consume capacity for a created appointment.
    ///
    /// With a reservation handle, that hold becomes the booking. Without one
    /// (the client's hold expired, or creation was requested without a
    /// reservation), capacity is re-validated and acquired fresh; a full
    /// slot then yields `Conflict`. Payment is authoritative, capacity is
    /// re-checked at creation time.
    pub async fn commit(
        &self,
        slot_id: SlotId,
        reservation: Option<ReservationId>,
    ) -> Result<(), SlotRegistryError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let entry = state.get_mut(&slot_id).ok_or(SlotRegistryError::UnknownSlot)?;
        entry.sweep(now);

        let consumed = reservation
            .map(|reservation| entry.holds.remove(&reservation).is_some())
            .unwrap_or(false);
        if !consumed && entry.committed_and_held() >= entry.slot.capacity {
            return Err(SlotRegistryError::Conflict);
        }
        entry
            .slot
            .record_booking()
            .map_err(|e| SlotRegistryError::Transport(e.to_string()))?;
        debug!(%slot_id, booked = entry.slot.booked_count, "slot capacity committed");
        Ok(())
    }

    /// Return a cancelled appointment's capacity unit to the pool.
    pub async fn release_booked(&self, slot_id: SlotId) -> Result<(), SlotRegistryError> {
        let mut state = self.state.lock().await;
        let entry = state.get_mut(&slot_id).ok_or(SlotRegistryError::UnknownSlot)?;
        entry
            .slot
            .record_cancellation()
            .map_err(|e| SlotRegistryError::Transport(e.to_string()))?;
        debug!(%slot_id, booked = entry.slot.booked_count, "booked capacity released");
        Ok(())
    }

    /// Test observability: outstanding (unexpired) holds for a slot.
    pub async fn active_holds(&self, slot_id: SlotId) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        match state.get_mut(&slot_id) {
            Some(entry) => {
                entry.sweep(now);
                entry.holds.len()
            }
            None => 0,
        }
    }

    /// Test observability: current booked count for a slot.
    pub async fn booked_count(&self, slot_id: SlotId) -> Option<u32> {
        let state = self.state.lock().await;
        state.get(&slot_id).map(|entry| entry.slot.booked_count)
    }
}

impl Default for InMemorySlotRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SlotRegistry for InMemorySlotRegistry {
    async fn list(&self, range: DateRange) -> Result<Vec<Slot>, SlotRegistryError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let mut slots: Vec<Slot> = state
            .values_mut()
            .filter(|entry| range.contains(entry.slot.date))
            .map(|entry| {
                entry.sweep(now);
                // Listings reflect holds as consumed capacity so two
                // customers don't race for the same last unit.
                let mut listed = entry.slot.clone();
                listed.booked_count =
                    entry.committed_and_held().min(listed.capacity);
                listed.refresh_status();
                listed
            })
            .filter(Slot::is_listable)
            .collect();
        slots.sort_by_key(|slot| (slot.date, slot.start_time));
        Ok(slots)
    }

    async fn reserve(&self, slot_id: SlotId) -> Result<ReservationId, SlotRegistryError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        let entry = state.get_mut(&slot_id).ok_or(SlotRegistryError::UnknownSlot)?;
        entry.sweep(now);

        if !entry.slot.is_listable() || entry.committed_and_held() >= entry.slot.capacity {
            return Err(SlotRegistryError::Conflict);
        }
        let reservation = ReservationId::new(AggregateId::new());
        entry.holds.insert(reservation, now + self.hold_ttl);
        debug!(%slot_id, %reservation, holds = entry.holds.len(), "capacity unit held");
        Ok(reservation)
    }

    async fn release(
        &self,
        slot_id: SlotId,
        reservation: ReservationId,
    ) -> Result<(), SlotRegistryError> {
        let now = Instant::now();
        let mut state = self.state.lock().await;
        // Idempotent: an unknown slot, an expired hold, or a handle already
        // released all succeed without touching anyone else's hold.
        if let Some(entry) = state.get_mut(&slot_id) {
            entry.sweep(now);
            if entry.holds.remove(&reservation).is_some() {
                debug!(%slot_id, %reservation, "held capacity released");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use pitstop_core::AggregateId;

    fn slot_with_capacity(capacity: u32) -> Slot {
        Slot::open(
            SlotId::new(AggregateId::new()),
            NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            capacity,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn reserve_until_full_then_conflict() {
        let registry = InMemorySlotRegistry::new();
        let slot = slot_with_capacity(2);
        let id = slot.id;
        registry.insert(slot).await;

        registry.reserve(id).await.unwrap();
        registry.reserve(id).await.unwrap();
        assert!(matches!(
            registry.reserve(id).await,
            Err(SlotRegistryError::Conflict)
        ));
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let registry = InMemorySlotRegistry::new();
        let slot = slot_with_capacity(1);
        let id = slot.id;
        registry.insert(slot).await;

        let reservation = registry.reserve(id).await.unwrap();
        registry.release(id, reservation).await.unwrap();
        registry.release(id, reservation).await.unwrap();
        registry
            .release(SlotId::new(AggregateId::new()), reservation)
            .await
            .unwrap();
        assert_eq!(registry.active_holds(id).await, 0);
    }

    #[tokio::test]
    async fn repeated_release_never_drops_another_customers_hold() {
        let registry = InMemorySlotRegistry::new();
        let slot = slot_with_capacity(2);
        let id = slot.id;
        registry.insert(slot).await;

        let first = registry.reserve(id).await.unwrap();
        let second = registry.reserve(id).await.unwrap();

        // One customer compensates twice; the other customer's hold must
        // survive both calls.
        registry.release(id, first).await.unwrap();
        registry.release(id, first).await.unwrap();
        assert_eq!(registry.active_holds(id).await, 1);

        // And the surviving hold is still the one that can be committed.
        registry.commit(id, Some(second)).await.unwrap();
        assert_eq!(registry.booked_count(id).await, Some(1));
        assert_eq!(registry.active_holds(id).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_holds_are_swept_and_capacity_returns() {
        let registry = InMemorySlotRegistry::with_hold_ttl(Duration::from_secs(60));
        let slot = slot_with_capacity(1);
        let id = slot.id;
        registry.insert(slot).await;

        registry.reserve(id).await.unwrap();
        assert!(matches!(
            registry.reserve(id).await,
            Err(SlotRegistryError::Conflict)
        ));

        tokio::time::advance(Duration::from_secs(61)).await;
        registry.reserve(id).await.unwrap();
        assert_eq!(registry.active_holds(id).await, 1);
    }

    #[tokio::test]
    async fn commit_consumes_the_hold() {
        let registry = InMemorySlotRegistry::new();
        let slot = slot_with_capacity(1);
        let id = slot.id;
        registry.insert(slot).await;

        let reservation = registry.reserve(id).await.unwrap();
        registry.commit(id, Some(reservation)).await.unwrap();
        assert_eq!(registry.booked_count(id).await, Some(1));
        assert_eq!(registry.active_holds(id).await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn commit_after_expired_hold_reacquires_capacity() {
        let registry = InMemorySlotRegistry::with_hold_ttl(Duration::from_secs(60));
        let slot = slot_with_capacity(1);
        let id = slot.id;
        registry.insert(slot).await;

        let reservation = registry.reserve(id).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        // Hold expired but the unit is still free, so the paid booking lands.
        registry.commit(id, Some(reservation)).await.unwrap();
        assert_eq!(registry.booked_count(id).await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn commit_conflicts_when_capacity_was_retaken() {
        let registry = InMemorySlotRegistry::with_hold_ttl(Duration::from_secs(60));
        let slot = slot_with_capacity(1);
        let id = slot.id;
        registry.insert(slot).await;

        let expired = registry.reserve(id).await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;

        // Another customer takes the freed unit and books it.
        let taken = registry.reserve(id).await.unwrap();
        registry.commit(id, Some(taken)).await.unwrap();

        assert!(matches!(
            registry.commit(id, Some(expired)).await,
            Err(SlotRegistryError::Conflict)
        ));
    }

    #[tokio::test]
    async fn cancelled_booking_returns_capacity_once() {
        let registry = InMemorySlotRegistry::new();
        let slot = slot_with_capacity(1);
        let id = slot.id;
        registry.insert(slot).await;

        let reservation = registry.reserve(id).await.unwrap();
        registry.commit(id, Some(reservation)).await.unwrap();
        registry.release_booked(id).await.unwrap();
        assert_eq!(registry.booked_count(id).await, Some(0));

        // A second decrement would go negative and is refused.
        assert!(registry.release_booked(id).await.is_err());
    }

    #[tokio::test]
    async fn listing_counts_holds_against_capacity() {
        let registry = InMemorySlotRegistry::new();
        let slot = slot_with_capacity(1);
        let id = slot.id;
        let date = slot.date;
        registry.insert(slot).await;
        registry.reserve(id).await.unwrap();

        let listed = registry.list(DateRange::new(date, date)).await.unwrap();
        assert!(listed.is_empty());
    }
}
