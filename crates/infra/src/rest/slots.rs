//! REST adapter for the slot backend.

use async_trait::async_trait;
use tracing::debug;

use pitstop_scheduling::{
    DateRange, ReservationId, Slot, SlotId, SlotRegistry, SlotRegistryError,
};

use crate::rest::dto::{ReleaseRequest, ReserveResponse, SlotDto};

/// [`SlotRegistry`] speaking the backend's HTTP contract.
pub struct RestSlotRegistry {
    base_url: String,
    client: reqwest::Client,
}

impl RestSlotRegistry {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    fn map_failure(status: reqwest::StatusCode, body: String) -> SlotRegistryError {
        match status {
            reqwest::StatusCode::CONFLICT => SlotRegistryError::Conflict,
            reqwest::StatusCode::NOT_FOUND => SlotRegistryError::UnknownSlot,
            status => SlotRegistryError::Transport(format!("{status}: {body}")),
        }
    }
}

#[async_trait]
impl SlotRegistry for RestSlotRegistry {
    async fn list(&self, range: DateRange) -> Result<Vec<Slot>, SlotRegistryError> {
        let url = format!("{}/slots", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("from", range.from.to_string()), ("to", range.to.to_string())])
            .send()
            .await
            .map_err(|e| SlotRegistryError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SlotRegistryError::Transport(format!("{status}: {body}")));
        }
        let dtos: Vec<SlotDto> = resp
            .json()
            .await
            .map_err(|e| SlotRegistryError::Transport(e.to_string()))?;
        debug!(count = dtos.len(), "slots listed");
        dtos.into_iter().map(Slot::try_from).collect()
    }

    async fn reserve(&self, slot_id: SlotId) -> Result<ReservationId, SlotRegistryError> {
        let url = format!("{}/slots/{}/reserve", self.base_url, slot_id);
        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| SlotRegistryError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::map_failure(status, body));
        }
        let dto: ReserveResponse = resp
            .json()
            .await
            .map_err(|e| SlotRegistryError::Transport(e.to_string()))?;
        Ok(dto.reservation_id)
    }

    async fn release(
        &self,
        slot_id: SlotId,
        reservation: ReservationId,
    ) -> Result<(), SlotRegistryError> {
        let url = format!("{}/slots/{}/release", self.base_url, slot_id);
        let resp = self
            .client
            .post(&url)
            .json(&ReleaseRequest {
                reservation_id: reservation,
            })
            .send()
            .await
            .map_err(|e| SlotRegistryError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::map_failure(status, body));
        }
        Ok(())
    }
}
