//! `pitstop-booking`: the booking-payment saga.
//!
//! A deposit booking spans three systems that share no transaction: the slot
//! backend, the external payment provider, and the appointment backend. The
//! coordinator here drives the flow as a saga: every step either advances
//! toward a confirmed appointment or compensates (releases the held slot),
//! with one deliberate exception, the post-payment creation failure, where
//! money has moved and automatic compensation would be wrong.
//!
//! The only durable state is the [`intent::BookingIntent`] checkpoint. Its
//! presence is the entire "a booking is in flight" signal: re-entering
//! recovery from a cold start is indistinguishable from resuming a warm
//! session, because every transition after the reservation is re-derivable
//! from (checkpoint, provider-side transaction status).

pub mod config;
pub mod coordinator;
pub mod error;
pub mod intent;
pub mod monitor;
pub mod store;

pub use config::BookingConfig;
pub use coordinator::{BookingSagaCoordinator, SagaPhase};
pub use error::{RecoveryOutcome, SagaError};
pub use intent::BookingIntent;
pub use monitor::{AppVisibility, ForegroundHook, LifecycleMonitor};
pub use store::{RecoveryStore, RecoveryStoreError};
