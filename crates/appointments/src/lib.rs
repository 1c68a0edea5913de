//! `pitstop-appointments`: the appointment record and its service contract.
//!
//! Appointments are created exactly once per payment transaction (the
//! transaction reference is the idempotency key) and are never deleted, only
//! transitioned to a cancelled terminal state.

pub mod appointment;
pub mod service;

pub use appointment::{
    Appointment, AppointmentDraft, AppointmentId, AppointmentStatus, BankInfo, CancelRequest,
    DepositInfo, PaymentInfo, RefundMethod,
};
pub use service::{AppointmentService, AppointmentServiceError, CancelRequestSubmission};
