//! Card-network processor: a classic two-phase authorize/capture flow.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::IntentRef;
use domain::Money;

use crate::adapter::{Captured, PaymentGateway, PaymentMetadata, Voided};
use crate::error::{GatewayError, Result};
use crate::intent::{IntentStatus, PaymentIntent};

const PROVIDER: &str = "card";

#[derive(Debug)]
struct IntentRecord {
    amount: Money,
    status: IntentStatus,
    /// How many times funds actually moved. Idempotent capture retries
    /// must leave this at one.
    charge_count: u32,
}

#[derive(Debug, Default)]
struct CardState {
    intents: HashMap<String, IntentRecord>,
    next_id: u32,
    decline: bool,
    unavailable: bool,
    fail_on_capture: bool,
}

/// Simulated card-network processor.
///
/// Authorization reserves funds immediately; capture transfers them in
/// a second phase. Failure injection hooks drive the orchestrator's
/// error paths in tests.
#[derive(Debug, Clone, Default)]
pub struct CardProcessor {
    state: Arc<RwLock<CardState>>,
}

impl CardProcessor {
    /// Creates a new card processor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the processor to decline authorizations.
    pub fn set_decline(&self, decline: bool) {
        self.state.write().unwrap().decline = decline;
    }

    /// Configures the processor to report itself unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Configures captures to fail while leaving the authorization open.
    pub fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().unwrap().fail_on_capture = fail;
    }

    /// Returns how many times funds were transferred for an intent.
    pub fn charge_count(&self, reference: &IntentRef) -> u32 {
        self.state
            .read()
            .unwrap()
            .intents
            .get(reference.as_str())
            .map(|r| r.charge_count)
            .unwrap_or(0)
    }

    /// Returns the number of intents the processor knows about.
    pub fn intent_count(&self) -> usize {
        self.state.read().unwrap().intents.len()
    }
}

#[async_trait]
impl PaymentGateway for CardProcessor {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn authorize(
        &self,
        amount: Money,
        currency: &str,
        _meta: PaymentMetadata,
    ) -> Result<PaymentIntent> {
        let mut state = self.state.write().unwrap();

        if state.unavailable {
            return Err(GatewayError::Unavailable(
                "card network did not respond".to_string(),
            ));
        }
        if state.decline {
            return Err(GatewayError::Declined("card was declined".to_string()));
        }

        state.next_id += 1;
        let reference = format!("ch_{:04}", state.next_id);
        state.intents.insert(reference.clone(), IntentRecord {
            amount,
            status: IntentStatus::Authorized,
            charge_count: 0,
        });

        Ok(PaymentIntent {
            provider: PROVIDER.to_string(),
            reference: IntentRef::new(reference),
            amount,
            currency: currency.to_string(),
            status: IntentStatus::Authorized,
        })
    }

    async fn capture(&self, reference: &IntentRef) -> Result<Captured> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_capture {
            return Err(GatewayError::CaptureFailed(
                "card network rejected the capture".to_string(),
            ));
        }

        let record = state
            .intents
            .get_mut(reference.as_str())
            .ok_or_else(|| GatewayError::UnknownIntent(reference.clone()))?;

        match record.status {
            // Retried capture: return the original result, no new charge.
            IntentStatus::Captured => Ok(Captured {
                reference: reference.clone(),
                amount: record.amount,
            }),
            IntentStatus::Authorized => {
                record.status = IntentStatus::Captured;
                record.charge_count += 1;
                Ok(Captured {
                    reference: reference.clone(),
                    amount: record.amount,
                })
            }
            other => Err(GatewayError::CaptureFailed(format!(
                "intent {reference} is {other}, not authorized"
            ))),
        }
    }

    async fn void(&self, reference: &IntentRef) -> Result<Voided> {
        let mut state = self.state.write().unwrap();

        if state.unavailable {
            return Err(GatewayError::Unavailable(
                "card network did not respond".to_string(),
            ));
        }

        let record = state
            .intents
            .get_mut(reference.as_str())
            .ok_or_else(|| GatewayError::UnknownIntent(reference.clone()))?;

        match record.status {
            IntentStatus::Voided => Ok(Voided {
                reference: reference.clone(),
            }),
            IntentStatus::Authorized => {
                record.status = IntentStatus::Voided;
                Ok(Voided {
                    reference: reference.clone(),
                })
            }
            other => Err(GatewayError::VoidFailed(format!(
                "intent {reference} is {other}, not authorized"
            ))),
        }
    }

    async fn lookup(&self, reference: &IntentRef) -> Result<IntentStatus> {
        let state = self.state.read().unwrap();

        if state.unavailable {
            return Err(GatewayError::Unavailable(
                "card network did not respond".to_string(),
            ));
        }

        state
            .intents
            .get(reference.as_str())
            .map(|r| r.status)
            .ok_or_else(|| GatewayError::UnknownIntent(reference.clone()))
    }
}

#[cfg(test)]
mod tests {
    use common::BuyerId;

    use super::*;
    use crate::intent::CURRENCY_USD;

    fn meta() -> PaymentMetadata {
        PaymentMetadata {
            buyer_id: BuyerId::new(),
            payment_token: "tok_visa".to_string(),
        }
    }

    #[tokio::test]
    async fn authorize_then_capture() {
        let gateway = CardProcessor::new();
        let intent = gateway
            .authorize(Money::from_cents(2200), CURRENCY_USD, meta())
            .await
            .unwrap();
        assert_eq!(intent.status, IntentStatus::Authorized);

        let captured = gateway.capture(&intent.reference).await.unwrap();
        assert_eq!(captured.amount, Money::from_cents(2200));
        assert_eq!(gateway.charge_count(&intent.reference), 1);
    }

    #[tokio::test]
    async fn capture_is_idempotent() {
        let gateway = CardProcessor::new();
        let intent = gateway
            .authorize(Money::from_cents(500), CURRENCY_USD, meta())
            .await
            .unwrap();

        let first = gateway.capture(&intent.reference).await.unwrap();
        let second = gateway.capture(&intent.reference).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(gateway.charge_count(&intent.reference), 1);
    }

    #[tokio::test]
    async fn decline_and_unavailable() {
        let gateway = CardProcessor::new();

        gateway.set_decline(true);
        let err = gateway
            .authorize(Money::from_cents(100), CURRENCY_USD, meta())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Declined(_)));

        gateway.set_decline(false);
        gateway.set_unavailable(true);
        let err = gateway
            .authorize(Money::from_cents(100), CURRENCY_USD, meta())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(gateway.intent_count(), 0);
    }

    #[tokio::test]
    async fn outage_gates_void_and_lookup() {
        let gateway = CardProcessor::new();
        let intent = gateway
            .authorize(Money::from_cents(700), CURRENCY_USD, meta())
            .await
            .unwrap();

        gateway.set_unavailable(true);
        let err = gateway.lookup(&intent.reference).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));
        let err = gateway.void(&intent.reference).await.unwrap_err();
        assert!(matches!(err, GatewayError::Unavailable(_)));

        // The authorization is untouched once the network is back.
        gateway.set_unavailable(false);
        assert_eq!(
            gateway.lookup(&intent.reference).await.unwrap(),
            IntentStatus::Authorized
        );
    }

    #[tokio::test]
    async fn void_releases_authorization() {
        let gateway = CardProcessor::new();
        let intent = gateway
            .authorize(Money::from_cents(900), CURRENCY_USD, meta())
            .await
            .unwrap();

        gateway.void(&intent.reference).await.unwrap();
        assert_eq!(
            gateway.lookup(&intent.reference).await.unwrap(),
            IntentStatus::Voided
        );

        // A voided intent cannot be captured.
        assert!(gateway.capture(&intent.reference).await.is_err());
        assert_eq!(gateway.charge_count(&intent.reference), 0);
    }

    #[tokio::test]
    async fn cannot_void_captured_intent() {
        let gateway = CardProcessor::new();
        let intent = gateway
            .authorize(Money::from_cents(900), CURRENCY_USD, meta())
            .await
            .unwrap();
        gateway.capture(&intent.reference).await.unwrap();

        let err = gateway.void(&intent.reference).await.unwrap_err();
        assert!(matches!(err, GatewayError::VoidFailed(_)));
    }
}
