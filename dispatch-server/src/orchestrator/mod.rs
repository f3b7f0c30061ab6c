//! Side-effect orchestrator
//!
//! The only consumer of the lifecycle event stream. Everything that
//! follows a payment, a cancellation or a delivery (fiscal invoices, sold
//! counters, loyalty points, mission creation and teardown, courier stats,
//! customer notices) happens here, after the owning service has already
//! committed. Every step is isolated: a failing step logs and the rest
//! still run, and no failure ever propagates back into order or mission
//! state.

use crate::breaker::{BreakerRegistry, BreakerSettings, CircuitBreaker};
use crate::collaborators::{
    CatalogProvider, CourierDirectory, InvoiceAuthority, MerchantProvider, Notification, Notifier,
    RewardsLedger,
};
use crate::events::EventBus;
use crate::missions::MissionDispatcher;
use crate::orders::OrderService;
use rust_decimal::prelude::*;
use serde_json::json;
use shared::mission::Mission;
use shared::order::{Order, OrderStatus, PaymentStatus};
use chrono::Utc;
use parking_lot::Mutex;
use shared::LifecycleEvent;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

pub const INVOICES_BREAKER: &str = "invoice-authority";

pub struct SideEffectOrchestrator {
    bus: Arc<EventBus>,
    orders: Arc<OrderService>,
    dispatcher: Arc<MissionDispatcher>,
    merchants: Arc<dyn MerchantProvider>,
    catalog: Arc<dyn CatalogProvider>,
    invoices: Arc<dyn InvoiceAuthority>,
    rewards: Arc<dyn RewardsLedger>,
    notifier: Arc<dyn Notifier>,
    couriers: Arc<dyn CourierDirectory>,
    invoices_breaker: Arc<CircuitBreaker>,
    loyalty_unit: Decimal,
    /// Receiver taken at construction; events published between wiring and
    /// the first poll of `run` stay buffered here instead of being dropped
    startup_rx: Mutex<Option<broadcast::Receiver<LifecycleEvent>>>,
}

impl SideEffectOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: Arc<EventBus>,
        orders: Arc<OrderService>,
        dispatcher: Arc<MissionDispatcher>,
        merchants: Arc<dyn MerchantProvider>,
        catalog: Arc<dyn CatalogProvider>,
        invoices: Arc<dyn InvoiceAuthority>,
        rewards: Arc<dyn RewardsLedger>,
        notifier: Arc<dyn Notifier>,
        couriers: Arc<dyn CourierDirectory>,
        breakers: &BreakerRegistry,
        breaker_settings: BreakerSettings,
        loyalty_unit: Decimal,
    ) -> Self {
        let startup_rx = Mutex::new(Some(bus.subscribe()));
        Self {
            bus,
            orders,
            dispatcher,
            merchants,
            catalog,
            invoices,
            rewards,
            notifier,
            couriers,
            invoices_breaker: breakers.register(INVOICES_BREAKER, breaker_settings),
            loyalty_unit,
            startup_rx,
        }
    }

    /// Consume the event stream until cancelled
    pub async fn run(&self, cancel: CancellationToken) {
        let mut rx = self
            .startup_rx
            .lock()
            .take()
            .unwrap_or_else(|| self.bus.subscribe());
        tracing::info!("side-effect orchestrator started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("side-effect orchestrator stopping");
                    break;
                }
                received = rx.recv() => match received {
                    Ok(event) => self.handle(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("orchestrator lagged, {skipped} event(s) lost");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    /// Dispatch one event to its handlers
    pub async fn handle(&self, event: LifecycleEvent) {
        tracing::debug!("handling {}", event.name());
        match event {
            LifecycleEvent::OrderPaid { order } => self.on_order_paid(&order).await,
            LifecycleEvent::OrderCancelled { order, reason } => {
                self.on_order_cancelled(&order, reason).await
            }
            LifecycleEvent::OrderStatusChanged { order, to, .. } => {
                self.on_order_status_changed(&order, to).await
            }
            LifecycleEvent::MissionDelivered { mission } => {
                self.on_mission_delivered(&mission).await
            }
        }
    }

    // ==================== order.paid ====================

    async fn on_order_paid(&self, order: &Order) {
        self.issue_invoice(order).await;

        for item in &order.items {
            if let Err(err) = self.catalog.increment_sold(&item.item_id, item.quantity).await {
                tracing::warn!("sold counter for {} failed: {err}", item.item_id);
            }
        }

        self.award_loyalty(order).await;

        self.notify(
            &order.customer_id,
            "Order confirmed",
            &format!("Your order {} is confirmed", order.receipt_number),
        )
        .await;
        self.notify(
            &order.merchant_id,
            "New order",
            &format!("Paid order {} is waiting for the kitchen", order.receipt_number),
        )
        .await;
    }

    /// Issue the fiscal invoice through its breaker; the outcome is
    /// reflected into order metadata either way so support can re-issue
    /// later.
    async fn issue_invoice(&self, order: &Order) {
        let invoices = self.invoices.clone();
        let order_for_call = order.clone();
        let result = self
            .invoices_breaker
            .call(|| async move { invoices.issue_invoice(&order_for_call).await })
            .await;

        let entries = match result {
            Ok(receipt) => {
                tracing::info!("invoice {} issued for order {}", receipt.document_key, order.id);
                vec![
                    ("invoice_document_key".to_string(), json!(receipt.document_key)),
                    ("invoice_status".to_string(), json!("issued")),
                ]
            }
            Err(err) => {
                tracing::warn!("invoice for order {} failed: {err}", order.id);
                vec![("invoice_status".to_string(), json!("failed"))]
            }
        };
        if let Err(err) = self.orders.merge_metadata(&order.id, entries).await {
            tracing::warn!("invoice metadata for order {} failed: {err}", order.id);
        }
    }

    async fn issue_credit_note(&self, order: &Order) {
        let invoices = self.invoices.clone();
        let order_for_call = order.clone();
        let result = self
            .invoices_breaker
            .call(|| async move { invoices.issue_credit_note(&order_for_call).await })
            .await;
        match result {
            Ok(note) => {
                tracing::info!("credit note {} issued for order {}", note.document_key, order.id);
                let entries = vec![(
                    "credit_note_document_key".to_string(),
                    json!(note.document_key),
                )];
                if let Err(err) = self.orders.merge_metadata(&order.id, entries).await {
                    tracing::warn!("credit note metadata for order {} failed: {err}", order.id);
                }
            }
            Err(err) => tracing::warn!("credit note for order {} failed: {err}", order.id),
        }
    }

    async fn award_loyalty(&self, order: &Order) {
        let merchant = match self.merchants.get_merchant(&order.merchant_id).await {
            Ok(merchant) => merchant,
            Err(err) => {
                tracing::warn!("merchant lookup for order {} failed: {err}", order.id);
                return;
            }
        };
        if !merchant.sustainable {
            return;
        }

        let points = (order.breakdown.subtotal / self.loyalty_unit)
            .floor()
            .to_u64()
            .unwrap_or(0);
        if points == 0 {
            return;
        }
        if let Err(err) = self
            .rewards
            .award(&order.customer_id, &order.id, points)
            .await
        {
            tracing::warn!("loyalty award for order {} failed: {err}", order.id);
        } else {
            tracing::info!("{points} loyalty point(s) awarded for order {}", order.id);
        }
    }

    // ==================== order.cancelled ====================

    async fn on_order_cancelled(&self, order: &Order, reason: Option<String>) {
        if let Err(err) = self.dispatcher.cancel_by_order(&order.id, reason).await {
            tracing::warn!("mission teardown for order {} failed: {err}", order.id);
        }

        if let Err(err) = self.rewards.reverse(&order.customer_id, &order.id).await {
            tracing::warn!("loyalty reversal for order {} failed: {err}", order.id);
        }

        // compensate the fiscal document if one was issued; re-read the
        // order so a replayed cancellation cannot issue a second note
        match self.orders.get_order(&order.id).await {
            Ok(current)
                if current.invoice_document_key().is_some()
                    && !current.metadata.contains_key("credit_note_document_key") =>
            {
                self.issue_credit_note(&current).await;
            }
            Ok(_) => {}
            Err(err) => tracing::warn!("order reload for credit note failed: {err}"),
        }

        if matches!(
            order.payment_status,
            PaymentStatus::Paid | PaymentStatus::PartiallyRefunded
        ) {
            match self.orders.process_refund(&order.id, None).await {
                Ok(outcome) => {
                    tracing::info!("auto-refund {} for cancelled order {}", outcome.amount, order.id)
                }
                Err(err) => tracing::warn!("auto-refund for order {} failed: {err}", order.id),
            }
        }

        self.notify(&order.customer_id, "Order cancelled", "Your order was cancelled")
            .await;
        self.notify(
            &order.merchant_id,
            "Order cancelled",
            &format!("Order {} was cancelled", order.receipt_number),
        )
        .await;
    }

    // ==================== order.status_changed ====================

    async fn on_order_status_changed(&self, order: &Order, to: OrderStatus) {
        if to == OrderStatus::Ready {
            self.spawn_mission(order).await;
        } else if let Err(err) = self.dispatcher.sync_status_by_order(&order.id, to).await {
            tracing::warn!("mission sync for order {} failed: {err}", order.id);
        }

        let notice = match to {
            OrderStatus::Preparing => Some("The kitchen is preparing your order"),
            OrderStatus::Ready => Some("Your order is ready and waiting for a courier"),
            OrderStatus::OnWay => Some("Your order is on the way"),
            OrderStatus::Delivered => Some("Your order was delivered, enjoy!"),
            _ => None,
        };
        if let Some(body) = notice {
            self.notify(&order.customer_id, "Order update", body).await;
        }
    }

    async fn spawn_mission(&self, order: &Order) {
        let merchant = match self.merchants.get_merchant(&order.merchant_id).await {
            Ok(merchant) => merchant,
            Err(err) => {
                tracing::warn!("cannot create mission for order {}: {err}", order.id);
                return;
            }
        };
        if let Err(err) = self
            .dispatcher
            .create_from_order(order, &merchant.name, merchant.coords)
            .await
        {
            tracing::warn!("mission creation for order {} failed: {err}", order.id);
        }
    }

    // ==================== mission.delivered ====================

    async fn on_mission_delivered(&self, mission: &Mission) {
        let earnings = mission.courier_earnings.unwrap_or(mission.estimated_earnings);
        let Some(courier_id) = &mission.courier_id else {
            tracing::warn!("delivered mission {} has no courier", mission.id);
            return;
        };

        // the settlement marker makes replays harmless, with or without a
        // backing order
        match self.dispatcher.get_mission(&mission.id).await {
            Ok(current) if current.metadata.contains_key("earnings_recorded_at") => {
                tracing::debug!("duplicate delivery event for mission {} ignored", mission.id);
                return;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::warn!("mission reload for {} failed: {err}", mission.id);
                return;
            }
        }

        // standalone missions only carry courier stats
        if let Some(order_id) = &mission.order_id {
            match self.orders.get_order(order_id).await {
                Ok(order) if order.status == OrderStatus::Delivered => {
                    tracing::debug!("order {order_id} already closed");
                }
                Ok(_) => {
                    if let Err(err) = self
                        .orders
                        .close_delivered(order_id, courier_id, earnings)
                        .await
                    {
                        tracing::warn!("closing order {order_id} failed: {err}");
                    }
                }
                Err(err) => tracing::warn!("order lookup for mission {} failed: {err}", mission.id),
            }
        }

        if let Err(err) = self.couriers.record_delivery(courier_id, earnings).await {
            tracing::warn!("courier stats for {} failed: {err}", courier_id);
        } else if let Err(err) = self
            .dispatcher
            .merge_metadata(
                &mission.id,
                vec![("earnings_recorded_at".to_string(), json!(Utc::now().to_rfc3339()))],
            )
            .await
        {
            tracing::warn!("settlement marker for mission {} failed: {err}", mission.id);
        }

        if let Some(customer_id) = &mission.customer_id {
            self.notify(customer_id, "Delivered", "Your delivery is complete").await;
        }
    }

    async fn notify(&self, recipient_id: &str, title: &str, body: &str) {
        let result = self
            .notifier
            .notify(Notification {
                recipient_id: recipient_id.to_string(),
                title: title.to_string(),
                body: body.to_string(),
            })
            .await;
        if let Err(err) = result {
            tracing::warn!("notice to {recipient_id} failed: {err}");
        }
    }
}
