//! `pitstop-cancellation`: refund policy and the cancel/approve/refund
//! sub-state-machine.
//!
//! The refund computation is a pure function with a hard step at the refund
//! window boundary. The engine validates customer preconditions client-side
//! (mirroring server-side requirements) and reflects staff-side outcomes onto
//! the appointment record.

pub mod engine;
pub mod refund;

pub use engine::{CancellationRefundEngine, CancellationRequest};
pub use refund::RefundPolicy;
