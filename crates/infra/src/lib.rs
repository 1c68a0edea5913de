//! `pitstop-infra`: backend implementations of the client-facing contracts.
//!
//! Three families live here. The in-memory backend is both the test double
//! and the executable statement of what the server guarantees (capacity
//! atomicity, hold TTLs, idempotent creation). The recovery stores persist
//! the booking checkpoint, in memory or as an atomically-replaced JSON file.
//! The REST adapters speak the backend HTTP contract for production use.

pub mod in_memory;
pub mod recovery;
pub mod rest;

#[cfg(test)]
mod integration_tests;

pub use in_memory::{
    InMemoryAppointmentService, InMemorySlotRegistry, MockPaymentGateway, RecordingBrowser,
};
pub use recovery::{FileRecoveryStore, InMemoryRecoveryStore};
pub use rest::{RestAppointmentService, RestPaymentGateway, RestSlotRegistry};
