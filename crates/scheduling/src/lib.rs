//! `pitstop-scheduling`: bookable time slots and the slot registry contract.
//!
//! A `Slot` is a finite-capacity time window. Capacity is authoritative server
//! state: clients only request transitions (reserve/release) and must treat
//! reservation as fallible even right after a successful listing.

pub mod registry;
pub mod slot;

pub use registry::{DateRange, ReservationId, SlotRegistry, SlotRegistryError};
pub use slot::{Slot, SlotId, SlotStatus};
