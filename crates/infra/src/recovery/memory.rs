//! In-memory recovery store for tests and ephemeral sessions.

use async_trait::async_trait;
use tokio::sync::Mutex;

use pitstop_booking::{BookingIntent, RecoveryStore, RecoveryStoreError};

/// [`RecoveryStore`] that lives and dies with the process. Useful in tests
/// and anywhere durability across restarts is explicitly not wanted.
pub struct InMemoryRecoveryStore {
    intent: Mutex<Option<BookingIntent>>,
}

impl InMemoryRecoveryStore {
    pub fn new() -> Self {
        Self {
            intent: Mutex::new(None),
        }
    }
}

impl Default for InMemoryRecoveryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecoveryStore for InMemoryRecoveryStore {
    async fn read(&self) -> Result<Option<BookingIntent>, RecoveryStoreError> {
        Ok(self.intent.lock().await.clone())
    }

    async fn write(&self, intent: &BookingIntent) -> Result<(), RecoveryStoreError> {
        *self.intent.lock().await = Some(intent.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), RecoveryStoreError> {
        *self.intent.lock().await = None;
        Ok(())
    }
}
