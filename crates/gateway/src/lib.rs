//! Payment gateway adapter for marketplace checkout.
//!
//! External payment providers disagree on protocol: a card-network
//! processor runs a two-phase authorize/capture flow, while a wallet
//! provider sends the buyer off-site and confirms the approval on
//! return. The [`PaymentGateway`] trait normalizes both into the same
//! four operations (`authorize`, `capture`, `void`, `lookup`) so the
//! checkout orchestrator never branches on the provider.
//!
//! Captures are idempotent: a retried capture for the same intent
//! reference returns the original captured result and never charges
//! the buyer twice.

pub mod adapter;
pub mod card;
pub mod error;
pub mod intent;
pub mod wallet;

pub use adapter::{Captured, GatewayKind, PaymentGateway, PaymentMetadata, Voided, gateway_for};
pub use card::CardProcessor;
pub use error::{GatewayError, Result};
pub use intent::{CURRENCY_USD, IntentStatus, PaymentIntent};
pub use wallet::WalletRedirectProcessor;
