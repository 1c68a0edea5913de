//! Hand-off to the platform's external browser.
//!
//! The redirect deliberately opens outside the app (provider policy, and the
//! flow must survive the host process being suspended), so this is a one-way
//! trait with no completion signal. Resumption arrives via the lifecycle
//! monitor or the payment-return deep link.

use async_trait::async_trait;
use std::sync::Arc;

use crate::gateway::GatewayError;

/// Opens a URL in the OS browser, handing control away from the app.
#[async_trait]
pub trait ExternalBrowser: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), GatewayError>;
}

#[async_trait]
impl<B> ExternalBrowser for Arc<B>
where
    B: ExternalBrowser + ?Sized,
{
    async fn open(&self, url: &str) -> Result<(), GatewayError> {
        (**self).open(url).await
    }
}
