//! The uniform gateway trait and provider selection.

use std::sync::Arc;

use async_trait::async_trait;
use common::{BuyerId, IntentRef};
use domain::Money;
use serde::{Deserialize, Serialize};

use crate::card::CardProcessor;
use crate::error::Result;
use crate::intent::{IntentStatus, PaymentIntent};
use crate::wallet::WalletRedirectProcessor;

/// Contextual data attached to an authorization.
#[derive(Debug, Clone)]
pub struct PaymentMetadata {
    /// The buyer paying for the order.
    pub buyer_id: BuyerId,
    /// Opaque instrument token collected by the web layer (card token,
    /// wallet account handle).
    pub payment_token: String,
}

/// Result of a successful capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub reference: IntentRef,
    /// The amount actually transferred; equal on every idempotent retry.
    pub amount: Money,
}

/// Result of a successful void.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voided {
    pub reference: IntentRef,
}

/// Uniform interface over heterogeneous payment processors.
///
/// Implementations must be thread-safe; the orchestrator calls them
/// outside any storage transaction, so they may block on the network.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// The provider name recorded on intents.
    fn provider(&self) -> &'static str;

    /// Reserves funds without transferring them.
    ///
    /// Fails with `Unavailable` (retryable, nothing reserved) or
    /// `Declined` (buyer must change payment method).
    async fn authorize(
        &self,
        amount: Money,
        currency: &str,
        meta: PaymentMetadata,
    ) -> Result<PaymentIntent>;

    /// Finalizes a previously authorized intent, transferring funds.
    ///
    /// Idempotent: capturing an already-captured intent returns the
    /// original [`Captured`] result without a second charge.
    async fn capture(&self, reference: &IntentRef) -> Result<Captured>;

    /// Releases a not-yet-captured authorization. Best effort.
    async fn void(&self, reference: &IntentRef) -> Result<Voided>;

    /// Returns the provider-side status of an intent, for the
    /// reconciliation sweep.
    async fn lookup(&self, reference: &IntentRef) -> Result<IntentStatus>;
}

// Lets a shared gateway handle pass wherever a `PaymentGateway` is
// expected.
#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    fn provider(&self) -> &'static str {
        (**self).provider()
    }

    async fn authorize(
        &self,
        amount: Money,
        currency: &str,
        meta: PaymentMetadata,
    ) -> Result<PaymentIntent> {
        (**self).authorize(amount, currency, meta).await
    }

    async fn capture(&self, reference: &IntentRef) -> Result<Captured> {
        (**self).capture(reference).await
    }

    async fn void(&self, reference: &IntentRef) -> Result<Voided> {
        (**self).void(reference).await
    }

    async fn lookup(&self, reference: &IntentRef) -> Result<IntentStatus> {
        (**self).lookup(reference).await
    }
}

/// Which payment processor a deployment settles through.
///
/// Selected once from configuration; business logic only ever sees the
/// [`PaymentGateway`] trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayKind {
    Card,
    WalletRedirect,
}

impl GatewayKind {
    /// Parses a configuration value such as `"card"` or `"wallet_redirect"`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "card" => Some(GatewayKind::Card),
            "wallet_redirect" => Some(GatewayKind::WalletRedirect),
            _ => None,
        }
    }
}

/// Constructs the gateway for the configured provider.
pub fn gateway_for(kind: GatewayKind) -> Arc<dyn PaymentGateway> {
    match kind {
        GatewayKind::Card => Arc::new(CardProcessor::new()),
        GatewayKind::WalletRedirect => Arc::new(WalletRedirectProcessor::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_gateway_kind() {
        assert_eq!(GatewayKind::parse("card"), Some(GatewayKind::Card));
        assert_eq!(
            GatewayKind::parse("wallet_redirect"),
            Some(GatewayKind::WalletRedirect)
        );
        assert_eq!(GatewayKind::parse("bank_transfer"), None);
    }

    #[test]
    fn gateway_for_reports_provider() {
        assert_eq!(gateway_for(GatewayKind::Card).provider(), "card");
        assert_eq!(
            gateway_for(GatewayKind::WalletRedirect).provider(),
            "wallet_redirect"
        );
    }
}
