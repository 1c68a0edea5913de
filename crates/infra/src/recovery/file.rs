//! JSON-file recovery store.
//!
//! The checkpoint is one small JSON document at a fixed path. Writes go to a
//! sibling temp file first and land via rename, so a crash mid-write can
//! never surface as a half-checkpoint: `read` sees either the previous
//! complete document or the new one.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use pitstop_booking::{BookingIntent, RecoveryStore, RecoveryStoreError};

/// Durable [`RecoveryStore`] backed by a single JSON file.
pub struct FileRecoveryStore {
    path: PathBuf,
}

impl FileRecoveryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

#[async_trait]
impl RecoveryStore for FileRecoveryStore {
    async fn read(&self) -> Result<Option<BookingIntent>, RecoveryStoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RecoveryStoreError::Storage(e.to_string())),
        };
        let intent = serde_json::from_slice(&bytes)
            .map_err(|e| RecoveryStoreError::Corrupted(e.to_string()))?;
        Ok(Some(intent))
    }

    async fn write(&self, intent: &BookingIntent) -> Result<(), RecoveryStoreError> {
        let json = serde_json::to_vec_pretty(intent)
            .map_err(|e| RecoveryStoreError::Storage(e.to_string()))?;
        let tmp = self.tmp_path();
        std::fs::write(&tmp, &json).map_err(|e| RecoveryStoreError::Storage(e.to_string()))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| RecoveryStoreError::Storage(e.to_string()))?;
        debug!(path = %self.path.display(), "booking checkpoint written");
        Ok(())
    }

    async fn clear(&self) -> Result<(), RecoveryStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "booking checkpoint cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RecoveryStoreError::Storage(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, Utc};
    use pitstop_appointments::AppointmentDraft;
    use pitstop_core::{AggregateId, CustomerId, VehicleId};
    use pitstop_payments::TransactionRef;
    use pitstop_scheduling::{ReservationId, SlotId};

    fn intent() -> BookingIntent {
        BookingIntent::reserved(
            AppointmentDraft {
                draft_ref: AggregateId::new(),
                customer_id: CustomerId::new(),
                vehicle_id: VehicleId::new(),
                scheduled_date: NaiveDate::from_ymd_opt(2026, 9, 15).unwrap(),
                scheduled_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                notes: None,
                technician_id: None,
            },
            SlotId::new(AggregateId::new()),
            ReservationId::new(AggregateId::new()),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecoveryStore::new(dir.path().join("booking-intent.json"));

        assert!(store.read().await.unwrap().is_none());

        let mut checkpoint = intent();
        checkpoint.attach_session(TransactionRef::new("TXN-1"), Utc::now());
        store.write(&checkpoint).await.unwrap();

        let back = store.read().await.unwrap().unwrap();
        assert_eq!(back, checkpoint);

        store.clear().await.unwrap();
        assert!(store.read().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileRecoveryStore::new(dir.path().join("booking-intent.json"));
        store.clear().await.unwrap();
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn torn_write_never_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("booking-intent.json");
        let store = FileRecoveryStore::new(&path);

        let checkpoint = intent();
        store.write(&checkpoint).await.unwrap();

        // A crash mid-write leaves a partial temp file behind; the real
        // checkpoint is untouched.
        std::fs::write(store.tmp_path(), b"{\"schemaVersion\":1,\"pend").unwrap();
        let back = store.read().await.unwrap().unwrap();
        assert_eq!(back, checkpoint);
    }

    #[tokio::test]
    async fn corrupted_checkpoint_is_reported_not_misread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("booking-intent.json");
        std::fs::write(&path, b"not json at all").unwrap();

        let store = FileRecoveryStore::new(&path);
        assert!(matches!(
            store.read().await,
            Err(RecoveryStoreError::Corrupted(_))
        ));
    }
}
