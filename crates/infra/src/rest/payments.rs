//! REST adapter for the payment provider.

use async_trait::async_trait;
use tracing::debug;

use pitstop_core::AggregateId;
use pitstop_payments::{
    GatewayError, OrderInfo, PaymentCheck, PaymentGateway, PaymentSession, TransactionRef,
};

use crate::rest::dto::{CreateSessionRequest, CreateSessionResponse, PaymentStatusResponse};

/// [`PaymentGateway`] speaking the provider's HTTP contract.
pub struct RestPaymentGateway {
    base_url: String,
    client: reqwest::Client,
}

impl RestPaymentGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentGateway for RestPaymentGateway {
    async fn create_session(
        &self,
        amount: u64,
        order_info: OrderInfo,
        draft_ref: AggregateId,
    ) -> Result<PaymentSession, GatewayError> {
        let url = format!("{}/payment/create-session", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&CreateSessionRequest {
                amount,
                order_info,
                draft_ref,
            })
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::SessionRejected(format!("{status}: {body}")));
        }
        let dto: CreateSessionResponse = resp
            .json()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        debug!(transaction_ref = %dto.transaction_ref, "payment session created");
        Ok(dto.into())
    }

    async fn check(&self, transaction_ref: &TransactionRef) -> Result<PaymentCheck, GatewayError> {
        let url = format!("{}/payment/{}", self.base_url, transaction_ref);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        match resp.status() {
            status if status.is_success() => {
                let dto: PaymentStatusResponse = resp
                    .json()
                    .await
                    .map_err(|e| GatewayError::Transport(e.to_string()))?;
                Ok(dto.into())
            }
            reqwest::StatusCode::NOT_FOUND => Err(GatewayError::UnknownTransaction),
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(GatewayError::Transport(format!("{status}: {body}")))
            }
        }
    }
}
