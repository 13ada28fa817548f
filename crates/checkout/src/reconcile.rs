//! Reconciliation sweep for orders stranded mid-settlement.
//!
//! A crash between the inventory commit and the capture outcome leaves
//! an order pending with no process driving it. The sweep periodically
//! picks up pending orders older than a grace period, asks the gateway
//! what actually happened to the payment, and settles each one the way
//! the orchestrator would have.

use chrono::{Duration, Utc};
use domain::OrderStatus;
use gateway::{GatewayError, IntentStatus, PaymentGateway};
use storage::MarketStore;

use crate::error::Result;
use crate::events::{OrderEvent, OrderEvents};

/// Outcome counts for one sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    /// Stale pending orders found.
    pub examined: usize,
    /// Orders whose payment turned out captured and were confirmed.
    pub confirmed: usize,
    /// Orders re-credited because the payment never settled.
    pub recredited: usize,
    /// Orders left pending for the next pass (gateway unreachable or a
    /// storage write failed).
    pub skipped: usize,
}

/// Settles stale pending orders against the gateway's record.
pub struct Reconciler<S, G>
where
    S: MarketStore,
    G: PaymentGateway,
{
    store: S,
    gateway: G,
    events: OrderEvents,
    grace: Duration,
}

impl<S, G> Reconciler<S, G>
where
    S: MarketStore,
    G: PaymentGateway,
{
    /// Creates a sweep over the given store and gateway. Orders younger
    /// than `grace` are left alone; their checkout may still be running.
    pub fn new(store: S, gateway: G, events: OrderEvents, grace: Duration) -> Self {
        Self {
            store,
            gateway,
            events,
            grace,
        }
    }

    /// Runs one sweep pass.
    ///
    /// Each order is settled independently; a failure on one order is
    /// logged and counted as skipped rather than aborting the pass.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<ReconcileReport> {
        let cutoff = Utc::now() - self.grace;
        let stale = self.store.stale_pending_orders(cutoff).await?;

        let mut report = ReconcileReport {
            examined: stale.len(),
            ..ReconcileReport::default()
        };

        for order in stale {
            match self.gateway.lookup(&order.payment_reference).await {
                Ok(IntentStatus::Captured) => {
                    // The charge went through; only the confirmation was
                    // lost.
                    match self.store.mark_confirmed(order.id).await {
                        Ok(()) => {
                            tracing::info!(order_id = %order.id, "reconciled: payment was captured, order confirmed");
                            self.events.publish(OrderEvent {
                                order_id: order.id,
                                buyer_id: order.buyer_id,
                                status: OrderStatus::Confirmed,
                            });
                            report.confirmed += 1;
                        }
                        Err(e) => {
                            tracing::warn!(order_id = %order.id, error = %e, "reconcile: failed to confirm order");
                            report.skipped += 1;
                        }
                    }
                }
                Ok(IntentStatus::Authorized) => {
                    // Still only a hold; release it and give the stock
                    // back.
                    if let Err(e) = self.gateway.void(&order.payment_reference).await {
                        tracing::warn!(order_id = %order.id, error = %e, "reconcile: failed to void stale authorization");
                    }
                    self.recredit(&order, "reconciled: payment never captured", &mut report)
                        .await;
                }
                Ok(status) => {
                    self.recredit(
                        &order,
                        &format!("reconciled: payment ended {status}"),
                        &mut report,
                    )
                    .await;
                }
                Err(GatewayError::UnknownIntent(_)) => {
                    self.recredit(&order, "reconciled: payment intent unknown to provider", &mut report)
                        .await;
                }
                Err(e) => {
                    tracing::warn!(order_id = %order.id, error = %e, "reconcile: gateway lookup failed, leaving order for next pass");
                    report.skipped += 1;
                }
            }
        }

        metrics::counter!("reconcile_runs_total").increment(1);
        metrics::counter!("reconcile_orders_confirmed").increment(report.confirmed as u64);
        metrics::counter!("reconcile_orders_recredited").increment(report.recredited as u64);
        if report.examined > 0 {
            tracing::info!(
                examined = report.examined,
                confirmed = report.confirmed,
                recredited = report.recredited,
                skipped = report.skipped,
                "reconcile pass complete"
            );
        }
        Ok(report)
    }

    async fn recredit(&self, order: &domain::Order, reason: &str, report: &mut ReconcileReport) {
        match self.store.recredit_order(order.id, reason).await {
            Ok(()) => {
                tracing::info!(order_id = %order.id, reason, "reconciled: order re-credited");
                self.events.publish(OrderEvent {
                    order_id: order.id,
                    buyer_id: order.buyer_id,
                    status: OrderStatus::Failed,
                });
                report.recredited += 1;
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "reconcile: failed to re-credit order");
                report.skipped += 1;
            }
        }
    }
}
