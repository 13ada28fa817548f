//! Checkout state machine.

use serde::{Deserialize, Serialize};

/// The state of a checkout attempt in its lifecycle.
///
/// State transitions:
/// ```text
/// Initiated ──► Authorized ──► Committed ──► Confirmed
///     │              │              └──► CaptureFailed
///     │              ├──► InventoryRejected
///     │              └──► CommitFailed
///     └──► AuthorizationFailed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CheckoutState {
    /// Attempt started; taking the cart snapshot.
    #[default]
    Initiated,

    /// Payment authorized; funds reserved, nothing committed locally.
    Authorized,

    /// Inventory decremented and order persisted; capture outstanding.
    Committed,

    /// Payment captured; the only externally-visible success state (terminal).
    Confirmed,

    /// The gateway refused or could not take the authorization (terminal).
    AuthorizationFailed,

    /// One or more listings lost availability; nothing was committed and
    /// the authorization was voided (terminal).
    InventoryRejected,

    /// The settlement transaction failed for a non-stock reason (terminal).
    CommitFailed,

    /// Capture failed after the local commit; the stock was re-credited
    /// and the order marked failed (terminal).
    CaptureFailed,
}

impl CheckoutState {
    /// Returns true if the checkout reached its success state.
    pub fn is_success(&self) -> bool {
        matches!(self, CheckoutState::Confirmed)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            CheckoutState::Initiated | CheckoutState::Authorized | CheckoutState::Committed
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutState::Initiated => "Initiated",
            CheckoutState::Authorized => "Authorized",
            CheckoutState::Committed => "Committed",
            CheckoutState::Confirmed => "Confirmed",
            CheckoutState::AuthorizationFailed => "AuthorizationFailed",
            CheckoutState::InventoryRejected => "InventoryRejected",
            CheckoutState::CommitFailed => "CommitFailed",
            CheckoutState::CaptureFailed => "CaptureFailed",
        }
    }
}

impl std::fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
