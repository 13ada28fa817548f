//! Payment method selection.

use serde::{Deserialize, Serialize};

/// The payment method a buyer selected for a checkout attempt.
///
/// Maps one-to-one onto a gateway processor; business logic only ever
/// branches on this enum, never on provider name strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card-network processor with a two-phase authorize/capture flow.
    Card,
    /// Wallet processor with an off-site redirect approval.
    WalletRedirect,
}

impl PaymentMethod {
    /// Returns the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::WalletRedirect => "wallet_redirect",
        }
    }

    /// Parses a method from its stored string form.
    pub fn parse(s: &str) -> Result<Self, crate::error::DomainError> {
        match s {
            "card" => Ok(PaymentMethod::Card),
            "wallet_redirect" => Ok(PaymentMethod::WalletRedirect),
            other => Err(crate::error::DomainError::UnknownPaymentMethod(
                other.to_string(),
            )),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
