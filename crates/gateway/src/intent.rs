//! Payment intents and their lifecycle.

use common::IntentRef;
use domain::Money;
use serde::{Deserialize, Serialize};

/// The only currency this marketplace settles in.
pub const CURRENCY_USD: &str = "USD";

/// Lifecycle status of a payment intent on the provider side.
///
/// ```text
/// Created ──► Authorized ──┬──► Captured
///    │            │        └──► Voided
///    └────────────┴──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    /// Intent exists but funds are not yet reserved.
    Created,
    /// Funds reserved, not transferred.
    Authorized,
    /// Funds transferred (terminal).
    Captured,
    /// Authorization was refused or abandoned (terminal).
    Failed,
    /// Authorization released without transfer (terminal).
    Voided,
}

impl IntentStatus {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            IntentStatus::Captured | IntentStatus::Failed | IntentStatus::Voided
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Created => "created",
            IntentStatus::Authorized => "authorized",
            IntentStatus::Captured => "captured",
            IntentStatus::Failed => "failed",
            IntentStatus::Voided => "voided",
        }
    }
}

impl std::fmt::Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A provider-side payment intent, owned by one checkout attempt.
///
/// Created before the inventory commit and finalized (captured or
/// voided) only after the local commit outcome is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub provider: String,
    pub reference: IntentRef,
    pub amount: Money,
    pub currency: String,
    pub status: IntentStatus,
}
