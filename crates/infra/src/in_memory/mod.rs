//! In-memory reference backend: slot registry with TTL holds, programmable
//! payment gateway, and an idempotent appointment service. Used by the
//! integration tests and as the executable statement of the server-side
//! contract the REST adapters speak to.

pub mod appointments;
pub mod payments;
pub mod slots;

pub use appointments::InMemoryAppointmentService;
pub use payments::{MockPaymentGateway, RecordingBrowser};
pub use slots::{DEFAULT_HOLD_TTL, InMemorySlotRegistry};
