//! Programmable payment gateway double.
//!
//! Saga tests drive the provider side of the flow through this: flip a
//! transaction to completed or failed, attach a server-created appointment,
//! or make the next call fail at the transport level.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use pitstop_core::AggregateId;
use pitstop_payments::{
    ExternalBrowser, GatewayError, OrderInfo, PaymentCheck, PaymentGateway, PaymentSession,
    PaymentStatus, TransactionRef,
};

/// In-memory [`PaymentGateway`] with controllable provider-side state.
pub struct MockPaymentGateway {
    transactions: Mutex<HashMap<TransactionRef, PaymentCheck>>,
    next_ref: AtomicU64,
    reject_create: AtomicBool,
    fail_transport: AtomicBool,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self {
            transactions: Mutex::new(HashMap::new()),
            next_ref: AtomicU64::new(1),
            reject_create: AtomicBool::new(false),
            fail_transport: AtomicBool::new(false),
        }
    }

    /// Make `create_session` reject until cleared.
    pub fn reject_session_creation(&self, reject: bool) {
        self.reject_create.store(reject, Ordering::SeqCst);
    }

    /// Make every call fail at the transport level until cleared.
    pub fn fail_transport(&self, fail: bool) {
        self.fail_transport.store(fail, Ordering::SeqCst);
    }

    /// Flip a transaction's provider-side status.
    pub async fn set_status(&self, transaction_ref: &TransactionRef, status: PaymentStatus) {
        let mut transactions = self.transactions.lock().await;
        if let Some(check) = transactions.get_mut(transaction_ref) {
            check.status = status;
        }
    }

    /// Simulate the server creating the appointment out-of-band for a
    /// completed payment.
    pub async fn attach_appointment(
        &self,
        transaction_ref: &TransactionRef,
        appointment_id: AggregateId,
    ) {
        let mut transactions = self.transactions.lock().await;
        if let Some(check) = transactions.get_mut(transaction_ref) {
            check.appointment_id = Some(appointment_id);
        }
    }

    /// The most recently issued transaction reference, for tests that need
    /// to manipulate a session the coordinator created.
    pub async fn last_transaction_ref(&self) -> Option<TransactionRef> {
        let issued = self.next_ref.load(Ordering::SeqCst);
        if issued <= 1 {
            return None;
        }
        Some(TransactionRef::new(format!("TXN-{}", issued - 1)))
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_session(
        &self,
        amount: u64,
        order_info: OrderInfo,
        draft_ref: AggregateId,
    ) -> Result<PaymentSession, GatewayError> {
        if self.fail_transport.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        if self.reject_create.load(Ordering::SeqCst) {
            return Err(GatewayError::SessionRejected("amount not accepted".to_string()));
        }

        let transaction_ref =
            TransactionRef::new(format!("TXN-{}", self.next_ref.fetch_add(1, Ordering::SeqCst)));
        let mut transactions = self.transactions.lock().await;
        transactions.insert(
            transaction_ref.clone(),
            PaymentCheck {
                status: PaymentStatus::Pending,
                appointment_id: None,
            },
        );
        debug!(
            %transaction_ref,
            amount,
            customer_id = %order_info.customer_id,
            %draft_ref,
            "payment session created"
        );
        Ok(PaymentSession {
            payment_url: format!("https://pay.example/session/{transaction_ref}"),
            transaction_ref,
        })
    }

    async fn check(&self, transaction_ref: &TransactionRef) -> Result<PaymentCheck, GatewayError> {
        if self.fail_transport.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection refused".to_string()));
        }
        let transactions = self.transactions.lock().await;
        transactions
            .get(transaction_ref)
            .cloned()
            .ok_or(GatewayError::UnknownTransaction)
    }
}

/// Browser double that records opened URLs instead of leaving the process.
pub struct RecordingBrowser {
    opened: Mutex<Vec<String>>,
    fail_open: AtomicBool,
}

impl RecordingBrowser {
    pub fn new() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            fail_open: AtomicBool::new(false),
        }
    }

    pub fn fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub async fn opened_urls(&self) -> Vec<String> {
        self.opened.lock().await.clone()
    }
}

impl Default for RecordingBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExternalBrowser for RecordingBrowser {
    async fn open(&self, url: &str) -> Result<(), GatewayError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("no browser available".to_string()));
        }
        self.opened.lock().await.push(url.to_string());
        Ok(())
    }
}
