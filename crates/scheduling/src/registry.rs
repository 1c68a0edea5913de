//! Slot registry contract (client-facing view of the slot backend).
//!
//! Capacity counters are owned and serialized by the backend; this trait only
//! requests transitions. `reserve` holds one capacity unit for a bounded TTL
//! enforced server-side, so a client that never resumes cannot strand
//! capacity permanently.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use pitstop_core::AggregateId;

use crate::slot::{Slot, SlotId};

/// Handle for a held capacity unit, issued by `reserve`.
///
/// `release` and commit paths name the hold through this handle, so repeating
/// a release can only ever drop the caller's own hold.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub AggregateId);

impl ReservationId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReservationId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Inclusive date range for slot listings.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Slot registry operation error.
#[derive(Debug, Error)]
pub enum SlotRegistryError {
    /// No capacity remains for the requested slot. Not compensable: nothing
    /// was held, the user must pick another slot.
    #[error("slot has no remaining capacity")]
    Conflict,

    /// The slot does not exist (or was removed by scheduling staff).
    #[error("unknown slot")]
    UnknownSlot,

    /// Transport-level failure talking to the backend.
    #[error("slot registry transport error: {0}")]
    Transport(String),
}

/// Client contract for the slot backend.
///
/// `reserve` must be treated as fallible even immediately after a successful
/// `list`; capacity can be taken by a concurrent customer at any time.
/// `release` is idempotent: compensation paths may call it more than once.
#[async_trait]
pub trait SlotRegistry: Send + Sync {
    /// Slots in the range with listable status and remaining capacity.
    async fn list(&self, range: DateRange) -> Result<Vec<Slot>, SlotRegistryError>;

    /// Atomically hold one capacity unit for a bounded TTL and return the
    /// handle naming the hold.
    async fn reserve(&self, slot_id: SlotId) -> Result<ReservationId, SlotRegistryError>;

    /// Release the named hold. Releasing an already-released or expired hold
    /// is a no-op, not an error.
    async fn release(
        &self,
        slot_id: SlotId,
        reservation: ReservationId,
    ) -> Result<(), SlotRegistryError>;
}

#[async_trait]
impl<R> SlotRegistry for Arc<R>
where
    R: SlotRegistry + ?Sized,
{
    async fn list(&self, range: DateRange) -> Result<Vec<Slot>, SlotRegistryError> {
        (**self).list(range).await
    }

    async fn reserve(&self, slot_id: SlotId) -> Result<ReservationId, SlotRegistryError> {
        (**self).reserve(slot_id).await
    }

    async fn release(
        &self,
        slot_id: SlotId,
        reservation: ReservationId,
    ) -> Result<(), SlotRegistryError> {
        (**self).release(slot_id, reservation).await
    }
}
