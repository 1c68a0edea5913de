//! HTTP adapters for the backend contract.
//!
//! One adapter per trait, each a thin translation layer: domain call in,
//! endpoint + DTO out, status code back to the domain error taxonomy. The
//! tests run them against a minimal in-process router backed by the
//! in-memory implementations, so adapter and reference backend are checked
//! against the same contract.

pub mod appointments;
pub mod dto;
pub mod payments;
pub mod slots;

pub use appointments::RestAppointmentService;
pub use payments::RestPaymentGateway;
pub use slots::RestSlotRegistry;
