//! `pitstop-payments`: adapter contract for the external payment provider.
//!
//! The provider is browser-based: `create_session` returns a redirect URL, the
//! user pays outside the app, and `check` reports status on demand. The
//! transaction reference doubles as the idempotency key for appointment
//! creation.

pub mod browser;
pub mod deeplink;
pub mod gateway;

pub use browser::ExternalBrowser;
pub use deeplink::PaymentReturn;
pub use gateway::{
    GatewayError, OrderInfo, PaymentCheck, PaymentGateway, PaymentSession, PaymentStatus,
    TransactionRef,
};
