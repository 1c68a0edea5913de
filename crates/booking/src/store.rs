//! Durable, crash-surviving storage for the booking checkpoint.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::intent::BookingIntent;

/// Recovery store operation error.
#[derive(Debug, Error)]
pub enum RecoveryStoreError {
    /// The backing storage failed (filesystem, platform keystore, ...).
    #[error("checkpoint storage error: {0}")]
    Storage(String),

    /// The stored checkpoint could not be decoded.
    #[error("checkpoint corrupted: {0}")]
    Corrupted(String),
}

/// Device-local storage for the single booking checkpoint.
///
/// Single-record, single-writer: only the saga coordinator mutates it. The
/// record's presence or absence is the entire recovery signal, so `write`
/// must be atomic with respect to crashes (a torn write must never surface
/// as a half-checkpoint on `read`).
#[async_trait]
pub trait RecoveryStore: Send + Sync {
    /// The current checkpoint, if a booking is in flight.
    async fn read(&self) -> Result<Option<BookingIntent>, RecoveryStoreError>;

    /// Persist the checkpoint, replacing any previous one.
    async fn write(&self, intent: &BookingIntent) -> Result<(), RecoveryStoreError>;

    /// Remove the checkpoint. Clearing an absent checkpoint is a no-op.
    async fn clear(&self) -> Result<(), RecoveryStoreError>;
}

#[async_trait]
impl<S> RecoveryStore for Arc<S>
where
    S: RecoveryStore + ?Sized,
{
    async fn read(&self) -> Result<Option<BookingIntent>, RecoveryStoreError> {
        (**self).read().await
    }

    async fn write(&self, intent: &BookingIntent) -> Result<(), RecoveryStoreError> {
        (**self).write(intent).await
    }

    async fn clear(&self) -> Result<(), RecoveryStoreError> {
        (**self).clear().await
    }
}
