//! Wallet-redirect processor: off-site approval normalized to the
//! two-phase flow the orchestrator expects.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::IntentRef;
use domain::Money;

use crate::adapter::{Captured, PaymentGateway, PaymentMetadata, Voided};
use crate::error::{GatewayError, Result};
use crate::intent::{IntentStatus, PaymentIntent};

const PROVIDER: &str = "wallet_redirect";

#[derive(Debug)]
struct HoldRecord {
    amount: Money,
    status: IntentStatus,
    redirect_url: String,
    charge_count: u32,
}

#[derive(Debug, Default)]
struct WalletState {
    holds: HashMap<String, HoldRecord>,
    next_id: u32,
    approve: Option<bool>,
    unavailable: bool,
    fail_on_capture: bool,
}

/// Simulated wallet provider with an off-site approval step.
///
/// The real provider parks the buyer on a redirect page and reports the
/// approval via callback; this adapter resolves that approval inside
/// `authorize`, so callers see the same authorize/capture/void protocol
/// as the card processor.
#[derive(Debug, Clone, Default)]
pub struct WalletRedirectProcessor {
    state: Arc<RwLock<WalletState>>,
}

impl WalletRedirectProcessor {
    /// Creates a new wallet processor; approvals succeed by default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces the simulated off-site approval outcome.
    pub fn set_approval(&self, approve: bool) {
        self.state.write().unwrap().approve = Some(approve);
    }

    /// Configures the processor to report itself unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Configures captures to fail while leaving the hold open.
    pub fn set_fail_on_capture(&self, fail: bool) {
        self.state.write().unwrap().fail_on_capture = fail;
    }

    /// Returns how many times funds were transferred for a hold.
    pub fn charge_count(&self, reference: &IntentRef) -> u32 {
        self.state
            .read()
            .unwrap()
            .holds
            .get(reference.as_str())
            .map(|r| r.charge_count)
            .unwrap_or(0)
    }

    /// Returns the redirect URL the buyer was sent to for a hold.
    pub fn redirect_url(&self, reference: &IntentRef) -> Option<String> {
        self.state
            .read()
            .unwrap()
            .holds
            .get(reference.as_str())
            .map(|r| r.redirect_url.clone())
    }
}

#[async_trait]
impl PaymentGateway for WalletRedirectProcessor {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn authorize(
        &self,
        amount: Money,
        currency: &str,
        meta: PaymentMetadata,
    ) -> Result<PaymentIntent> {
        let mut state = self.state.write().unwrap();

        if state.unavailable {
            return Err(GatewayError::Unavailable(
                "wallet provider did not respond".to_string(),
            ));
        }

        state.next_id += 1;
        let reference = format!("wr_{:04}", state.next_id);
        let redirect_url = format!(
            "https://wallet.example/approve/{reference}?buyer={}",
            meta.buyer_id
        );

        // The off-site approval resolves here, before authorize returns;
        // the caller never sees the intermediate Created hold.
        let approved = state.approve.unwrap_or(true);
        if !approved {
            state.holds.insert(reference.clone(), HoldRecord {
                amount,
                status: IntentStatus::Failed,
                redirect_url,
                charge_count: 0,
            });
            return Err(GatewayError::Declined(
                "buyer did not approve the wallet payment".to_string(),
            ));
        }

        state.holds.insert(reference.clone(), HoldRecord {
            amount,
            status: IntentStatus::Authorized,
            redirect_url,
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
                "wallet settlement was refused".to_string(),
            ));
        }

        let record = state
            .holds
            .get_mut(reference.as_str())
            .ok_or_else(|| GatewayError::UnknownIntent(reference.clone()))?;

        match record.status {
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
                "hold {reference} is {other}, not approved"
            ))),
        }
    }

    async fn void(&self, reference: &IntentRef) -> Result<Voided> {
        let mut state = self.state.write().unwrap();

        if state.unavailable {
            return Err(GatewayError::Unavailable(
                "wallet provider did not respond".to_string(),
            ));
        }

        let record = state
            .holds
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
                "hold {reference} is {other}, not approved"
            ))),
        }
    }

    async fn lookup(&self, reference: &IntentRef) -> Result<IntentStatus> {
        let state = self.state.read().unwrap();

        if state.unavailable {
            return Err(GatewayError::Unavailable(
                "wallet provider did not respond".to_string(),
            ));
        }

        state
            .holds
            .get(reference.as_str())
            .map(|r| r.status)
            .ok_or_else(|| GatewayError::UnknownIntent(reference.clone()))
    }
}
