use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use pitstop_core::{AggregateId, CustomerId};

/// Provider-issued transaction reference.
///
/// Globally unique; used as the idempotency key for appointment creation, so
/// repeating a create request with the same reference yields at most one
/// appointment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionRef(String);

impl TransactionRef {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TransactionRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-side transaction status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// Order description passed to the provider when creating a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInfo {
    pub customer_id: CustomerId,
    pub description: String,
}

/// Result of `create_session`: where to send the user and how to find the
/// transaction afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub payment_url: String,
    pub transaction_ref: TransactionRef,
}

/// Result of `check`: current status, plus the appointment the server may
/// have already created out-of-band for a completed payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCheck {
    pub status: PaymentStatus,
    pub appointment_id: Option<AggregateId>,
}

/// Payment gateway operation error.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Session creation was rejected by the provider.
    #[error("payment session rejected: {0}")]
    SessionRejected(String),

    /// The transaction reference is unknown to the provider.
    #[error("unknown transaction reference")]
    UnknownTransaction,

    /// Transport-level failure talking to the provider.
    #[error("payment gateway transport error: {0}")]
    Transport(String),
}

/// Adapter contract for the external payment provider.
///
/// `check` is a pure read and must be safe to call repeatedly; the saga
/// leans on that during recovery and polling.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment session for `amount` (smallest currency unit).
    ///
    /// `draft_ref` is an opaque client-side reference tying the session back
    /// to the booking draft it pays for.
    async fn create_session(
        &self,
        amount: u64,
        order_info: OrderInfo,
        draft_ref: AggregateId,
    ) -> Result<PaymentSession, GatewayError>;

    /// Report the transaction's current status.
    async fn check(&self, transaction_ref: &TransactionRef) -> Result<PaymentCheck, GatewayError>;
}

#[async_trait]
impl<G> PaymentGateway for Arc<G>
where
    G: PaymentGateway + ?Sized,
{
    async fn create_session(
        &self,
        amount: u64,
        order_info: OrderInfo,
        draft_ref: AggregateId,
    ) -> Result<PaymentSession, GatewayError> {
        (**self).create_session(amount, order_info, draft_ref).await
    }

    async fn check(&self, transaction_ref: &TransactionRef) -> Result<PaymentCheck, GatewayError> {
        (**self).check(transaction_ref).await
    }
}
