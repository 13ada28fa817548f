//! The checkout orchestrator: snapshot → authorize → commit → capture.

use std::time::Duration;

use common::{BuyerId, ListingId, OrderId};
use domain::{IdempotencyKey, Money, Order, OrderLine, OrderStatus, PaymentMethod};
use gateway::{CURRENCY_USD, PaymentGateway, PaymentMetadata};
use storage::{MarketStore, StorageError};

use crate::error::{CheckoutError, Result};
use crate::events::{OrderEvent, OrderEvents};
use crate::snapshot;
use crate::state::CheckoutState;

/// How often the compensating re-credit is retried before giving up on
/// this attempt and leaving the order to the reconciliation sweep.
const RECREDIT_ATTEMPTS: u32 = 5;
const RECREDIT_BACKOFF: Duration = Duration::from_millis(50);

/// One checkout request from the web layer.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub buyer_id: BuyerId,
    pub idempotency_key: IdempotencyKey,
    pub payment_method: PaymentMethod,
    /// Opaque instrument token collected by the web layer.
    pub payment_token: String,
}

/// The outcome of a settled checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub state: CheckoutState,
    pub total: Money,
    /// Listings dropped from the cart during the snapshot.
    pub dropped: Vec<ListingId>,
}

/// Orchestrates checkout settlement.
///
/// Sequences the saga over the store and the payment gateway. The
/// gateway is only ever called while no storage transaction is open:
/// authorization happens before the settlement transaction, capture
/// after it commits, which bounds lock hold time to the local commit.
///
/// Correctness under concurrency comes entirely from the store's
/// transaction isolation; the orchestrator holds no locks of its own
/// and any number of instances may run at once.
pub struct CheckoutOrchestrator<S, G>
where
    S: MarketStore,
    G: PaymentGateway,
{
    store: S,
    gateway: G,
    events: OrderEvents,
}

impl<S, G> CheckoutOrchestrator<S, G>
where
    S: MarketStore,
    G: PaymentGateway,
{
    /// Creates a new orchestrator.
    pub fn new(store: S, gateway: G) -> Self {
        Self {
            store,
            gateway,
            events: OrderEvents::new(),
        }
    }

    /// Returns the order event channel for downstream subscribers.
    pub fn events(&self) -> OrderEvents {
        self.events.clone()
    }

    /// Runs one checkout attempt to a terminal state.
    #[tracing::instrument(skip(self, request), fields(buyer_id = %request.buyer_id, key = %request.idempotency_key))]
    pub async fn checkout(&self, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let started = std::time::Instant::now();

        let result = self.run(request).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(receipt) => {
                metrics::counter!("checkout_confirmed").increment(1);
                tracing::info!(order_id = %receipt.order_id, total = %receipt.total, "checkout confirmed");
            }
            Err(e) => {
                metrics::counter!("checkout_failed").increment(1);
                tracing::info!(error = %e, "checkout failed");
            }
        }
        result
    }

    async fn run(&self, request: CheckoutRequest) -> Result<CheckoutReceipt> {
        // A retried request (double-click, network retry) replays the
        // prior outcome instead of re-authorizing or re-decrementing.
        if let Some(existing) = self.store.order_for_key(&request.idempotency_key).await? {
            return self.replay(existing).await;
        }

        tracing::debug!(state = %CheckoutState::Initiated, "taking cart snapshot");
        let snapshot = match snapshot::snapshot(&self.store, request.buyer_id).await {
            Ok(snapshot) => snapshot,
            Err(CheckoutError::EmptyCart) => {
                // A concurrent attempt with the same key may have settled
                // and cleared the cart after the key check above.
                if let Some(existing) = self.store.order_for_key(&request.idempotency_key).await? {
                    return self.replay(existing).await;
                }
                return Err(CheckoutError::EmptyCart);
            }
            Err(e) => return Err(e),
        };

        // Authorize before any transaction opens; on failure there is
        // nothing local to roll back.
        let intent = self
            .gateway
            .authorize(snapshot.total, CURRENCY_USD, PaymentMetadata {
                buyer_id: request.buyer_id,
                payment_token: request.payment_token.clone(),
            })
            .await
            .map_err(authorize_error)?;
        tracing::debug!(state = %CheckoutState::Authorized, reference = %intent.reference, "payment authorized");

        let order = Order::pending(
            request.buyer_id,
            snapshot.total,
            request.payment_method,
            intent.reference.clone(),
            request.idempotency_key.clone(),
        );
        let lines = OrderLine::from_snapshot(order.id, &snapshot.lines);

        match self.store.commit_order(&order, &lines).await {
            Ok(()) => {
                tracing::debug!(state = %CheckoutState::Committed, order_id = %order.id, "inventory committed");
            }
            Err(StorageError::InsufficientStock { listing_ids }) => {
                // Loser of a stock race: nothing was committed, release
                // the reserved funds before reporting.
                self.void_quietly(&intent.reference).await;
                return Err(CheckoutError::InventoryRejected(listing_ids));
            }
            Err(StorageError::DuplicateKey(_)) => {
                // A concurrent request with the same key won the commit;
                // drop our authorization and replay its outcome.
                self.void_quietly(&intent.reference).await;
                let existing = self
                    .store
                    .order_for_key(&request.idempotency_key)
                    .await?
                    .ok_or(StorageError::DuplicateKey(request.idempotency_key.clone()))?;
                return self.replay(existing).await;
            }
            Err(e) => {
                self.void_quietly(&intent.reference).await;
                return Err(CheckoutError::CommitFailed(e.to_string()));
            }
        }

        match self.gateway.capture(&intent.reference).await {
            Ok(captured) => {
                debug_assert_eq!(captured.amount, order.total);
                self.store.mark_confirmed(order.id).await?;
                self.events.publish(OrderEvent {
                    order_id: order.id,
                    buyer_id: order.buyer_id,
                    status: OrderStatus::Confirmed,
                });
                if let Err(e) = self.store.clear_cart(request.buyer_id).await {
                    tracing::warn!(order_id = %order.id, error = %e, "failed to clear cart after confirmation");
                }
                Ok(CheckoutReceipt {
                    order_id: order.id,
                    state: CheckoutState::Confirmed,
                    total: order.total,
                    dropped: snapshot.dropped,
                })
            }
            Err(e) => {
                // The decrement already committed but the charge did
                // not: the one payment/inventory desync window.
                metrics::counter!("checkout_capture_desync").increment(1);
                tracing::error!(
                    order_id = %order.id,
                    reference = %intent.reference,
                    error = %e,
                    "capture failed after committed settlement; re-crediting inventory"
                );
                self.recredit_with_retry(order.id, &format!("capture failed: {e}"))
                    .await?;
                self.events.publish(OrderEvent {
                    order_id: order.id,
                    buyer_id: order.buyer_id,
                    status: OrderStatus::Failed,
                });
                Err(CheckoutError::CaptureFailed { order_id: order.id })
            }
        }
    }

    /// Maps a stored order back onto the outcome its original attempt
    /// produced.
    async fn replay(&self, existing: Order) -> Result<CheckoutReceipt> {
        tracing::info!(order_id = %existing.id, status = %existing.status, "replaying idempotent checkout");
        match existing.status {
            OrderStatus::Confirmed => Ok(CheckoutReceipt {
                order_id: existing.id,
                state: CheckoutState::Confirmed,
                total: existing.total,
                dropped: Vec::new(),
            }),
            // Committed but capture not yet settled; the reconciliation
            // sweep will resolve it.
            OrderStatus::Pending => Ok(CheckoutReceipt {
                order_id: existing.id,
                state: CheckoutState::Committed,
                total: existing.total,
                dropped: Vec::new(),
            }),
            OrderStatus::Failed => Err(CheckoutError::CaptureFailed {
                order_id: existing.id,
            }),
        }
    }

    /// Best-effort void of a not-yet-captured authorization.
    async fn void_quietly(&self, reference: &common::IntentRef) {
        if let Err(e) = self.gateway.void(reference).await {
            tracing::warn!(%reference, error = %e, "failed to void authorization");
        }
    }

    /// Retries the compensating re-credit until it succeeds.
    ///
    /// It touches only local storage, so short of a storage outage it
    /// cannot permanently fail; after the attempts are exhausted the
    /// order stays pending for the reconciliation sweep to resolve.
    async fn recredit_with_retry(&self, order_id: OrderId, reason: &str) -> Result<()> {
        let mut last_err = None;
        for attempt in 1..=RECREDIT_ATTEMPTS {
            match self.store.recredit_order(order_id, reason).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::warn!(%order_id, attempt, error = %e, "re-credit attempt failed");
                    last_err = Some(e);
                    tokio::time::sleep(RECREDIT_BACKOFF * attempt).await;
                }
            }
        }
        let e = last_err.unwrap_or(StorageError::OrderNotFound(order_id));
        tracing::error!(%order_id, error = %e, "re-credit exhausted retries; leaving order to reconciliation");
        Err(CheckoutError::Storage(e))
    }
}

fn authorize_error(e: gateway::GatewayError) -> CheckoutError {
    match e {
        gateway::GatewayError::Declined(reason) => CheckoutError::GatewayDeclined(reason),
        gateway::GatewayError::Unavailable(reason) => CheckoutError::GatewayUnavailable(reason),
        other => CheckoutError::AuthorizationFailed {
            reason: other.to_string(),
        },
    }
}
