//! Order lifecycle operations
//!
//! Single writer for the order aggregate. Validates checkout, computes the
//! monetary breakdown once at creation, enforces the status transition
//! table, applies payment webhooks idempotently and owns disputes and
//! refunds. Publishes lifecycle events; never performs side effects
//! directly.

use crate::breaker::{BreakerRegistry, BreakerSettings, CircuitBreaker};
use crate::collaborators::{
    CatalogProvider, MerchantProvider, PaymentGateway, PaymentSession, RealtimeGateway,
    RefundOutcome,
};
use crate::events::EventBus;
use crate::pricing::{distance_km, PricingConfig};
use crate::repository::{MissionRepository, OrderRepository};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use shared::money::Breakdown;
use shared::order::{
    CreateOrderInput, DisputeStatus, Order, OrderItem, OrderStatus, PaymentStatus,
};
use shared::types::Metadata;
use shared::{AppError, AppResult, ErrorCode, LifecycleEvent};
use std::sync::Arc;
use uuid::Uuid;

pub const PAYMENTS_BREAKER: &str = "payment-gateway";

/// Checkout quote returned before the customer commits
#[derive(Debug, Clone, Serialize)]
pub struct QuotedTotals {
    pub breakdown: Breakdown,
    pub distance_km: f64,
    pub estimated_minutes: u32,
    pub surge: bool,
}

pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    missions: Arc<dyn MissionRepository>,
    merchants: Arc<dyn MerchantProvider>,
    catalog: Arc<dyn CatalogProvider>,
    payments: Arc<dyn PaymentGateway>,
    realtime: Arc<dyn RealtimeGateway>,
    bus: Arc<EventBus>,
    payments_breaker: Arc<CircuitBreaker>,
    pricing: PricingConfig,
}

impl OrderService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orders: Arc<dyn OrderRepository>,
        missions: Arc<dyn MissionRepository>,
        merchants: Arc<dyn MerchantProvider>,
        catalog: Arc<dyn CatalogProvider>,
        payments: Arc<dyn PaymentGateway>,
        realtime: Arc<dyn RealtimeGateway>,
        bus: Arc<EventBus>,
        breakers: &BreakerRegistry,
        breaker_settings: BreakerSettings,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            orders,
            missions,
            merchants,
            catalog,
            payments,
            realtime,
            bus,
            payments_breaker: breakers.register(PAYMENTS_BREAKER, breaker_settings),
            pricing,
        }
    }

    // ==================== Checkout ====================

    /// Validate the checkout input and price it without creating anything
    pub async fn preview_totals(&self, input: &CreateOrderInput) -> AppResult<QuotedTotals> {
        let (_, quote) = self.validate_and_quote(input).await?;
        Ok(quote)
    }

    /// Create an order in `PENDING`/`UNPAID` with its breakdown locked in
    pub async fn create_order(&self, input: CreateOrderInput) -> AppResult<Order> {
        let (items, quote) = self.validate_and_quote(&input).await?;
        let receipt_number = self.orders.next_receipt_number().await?;

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            customer_id: input.customer_id,
            merchant_id: input.merchant_id,
            items,
            breakdown: quote.breakdown,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            dispute_status: DisputeStatus::None,
            dispute_reason: None,
            transaction_id: None,
            receipt_number,
            courier_id: None,
            courier_earnings: Decimal::ZERO,
            delivery_address: input.delivery_address,
            delivery_coords: input.delivery_coords,
            customer_notes: input.customer_notes,
            status_history: vec![],
            metadata: Metadata::from_iter([
                ("distance_km".to_string(), json!(quote.distance_km)),
                ("estimated_minutes".to_string(), json!(quote.estimated_minutes)),
                ("surge".to_string(), json!(quote.surge)),
            ]),
            created_at: now,
            updated_at: now,
        };

        self.orders.insert(order.clone()).await?;
        tracing::info!(
            "order created: {} receipt {} total {}",
            order.id,
            order.receipt_number,
            order.breakdown.total
        );
        self.realtime.order_updated(&order);
        Ok(order)
    }

    async fn validate_and_quote(
        &self,
        input: &CreateOrderInput,
    ) -> AppResult<(Vec<OrderItem>, QuotedTotals)> {
        if input.items.is_empty() {
            return Err(AppError::validation("order must contain at least one item"));
        }
        if input.courier_tip < Decimal::ZERO {
            return Err(AppError::validation("tip must be non-negative")
                .with_detail("courier_tip", input.courier_tip.to_string()));
        }
        if !input.delivery_coords.is_valid() {
            return Err(AppError::validation("delivery coordinates are invalid"));
        }

        let merchant = self.merchants.get_merchant(&input.merchant_id).await?;
        if !merchant.is_open {
            return Err(AppError::new(ErrorCode::MerchantUnavailable));
        }

        let distance = distance_km(merchant.coords, input.delivery_coords);
        if distance > merchant.delivery_radius_km {
            return Err(AppError::new(ErrorCode::OutOfDeliveryRange)
                .with_detail("distance_km", distance)
                .with_detail("radius_km", merchant.delivery_radius_km));
        }

        let mut items = Vec::with_capacity(input.items.len());
        let mut subtotal = Decimal::ZERO;
        for line in &input.items {
            if line.quantity == 0 {
                return Err(AppError::validation("quantity must be at least 1")
                    .with_detail("item_id", line.item_id.clone()));
            }
            let item = self.catalog.get_item(&line.item_id).await?;
            if item.merchant_id != input.merchant_id {
                return Err(AppError::new(ErrorCode::ItemMerchantMismatch)
                    .with_detail("item_id", line.item_id.clone()));
            }
            if !item.available {
                return Err(AppError::with_message(
                    ErrorCode::ItemNotFound,
                    format!("item '{}' is not available", item.name),
                ));
            }
            let line_total = item.price * Decimal::from(line.quantity);
            subtotal += line_total;
            items.push(OrderItem {
                item_id: item.id,
                name: item.name,
                unit_price: item.price,
                quantity: line.quantity,
                line_total,
                ticketed: false,
            });
        }

        let pool = self.missions.unassigned_count().await?;
        let surge = self.pricing.is_surge(pool);
        let delivery_fee = self.pricing.delivery_fee(distance, surge);
        let breakdown = Breakdown::compute(subtotal, delivery_fee, input.courier_tip, &self.pricing.fees);

        Ok((
            items,
            QuotedTotals {
                breakdown,
                distance_km: distance,
                estimated_minutes: self.pricing.estimated_minutes(distance),
                surge,
            },
        ))
    }

    // ==================== Payment ====================

    /// Open a checkout session with the payment gateway
    pub async fn start_payment(&self, order_id: &str) -> AppResult<PaymentSession> {
        let order = self.require_order(order_id).await?;
        if order.status != OrderStatus::Pending {
            return Err(AppError::new(ErrorCode::OrderInvalidTransition)
                .with_detail("status", format!("{:?}", order.status)));
        }
        if order.payment_status == PaymentStatus::Paid {
            return Err(AppError::with_message(
                ErrorCode::AlreadyExists,
                "order is already paid",
            ));
        }

        let payments = self.payments.clone();
        self.payments_breaker
            .call(|| async move { payments.create_session(&order).await })
            .await
    }

    /// Apply a payment webhook.
    ///
    /// Idempotent: reapplying the payment status the order already has
    /// returns the order unchanged and publishes nothing. The first
    /// transition to `PAID` confirms the order and publishes `order.paid`
    /// exactly once.
    pub async fn update_payment_status(
        &self,
        order_id: &str,
        payment_status: PaymentStatus,
        transaction_id: Option<String>,
    ) -> AppResult<Order> {
        let mut order = self.require_order(order_id).await?;
        if order.payment_status == payment_status {
            tracing::debug!(
                "payment webhook replay ignored: {} already {:?}",
                order.id,
                payment_status
            );
            return Ok(order);
        }

        match payment_status {
            PaymentStatus::Paid => {
                if !matches!(
                    order.payment_status,
                    PaymentStatus::Unpaid | PaymentStatus::Failed
                ) {
                    return Err(AppError::new(ErrorCode::PaymentRejected)
                        .with_detail("payment_status", format!("{:?}", order.payment_status)));
                }
                if order.status.is_terminal() {
                    return Err(AppError::new(ErrorCode::OrderTerminal));
                }
                order.payment_status = PaymentStatus::Paid;
                order.transaction_id = transaction_id;
                if order.status == OrderStatus::Pending {
                    order.record_transition(OrderStatus::Confirmed);
                }
                self.orders.save(&order).await?;
                tracing::info!("order paid: {} txn {:?}", order.id, order.transaction_id);
                self.realtime.order_updated(&order);
                self.bus.publish(LifecycleEvent::OrderPaid {
                    order: order.clone(),
                });
            }
            PaymentStatus::Failed => {
                if order.payment_status != PaymentStatus::Unpaid {
                    return Err(AppError::new(ErrorCode::PaymentRejected)
                        .with_detail("payment_status", format!("{:?}", order.payment_status)));
                }
                order.payment_status = PaymentStatus::Failed;
                order.transaction_id = transaction_id;
                order.updated_at = Utc::now();
                self.orders.save(&order).await?;
                tracing::warn!("payment failed for order {}", order.id);
                self.realtime.order_updated(&order);
            }
            PaymentStatus::Unpaid | PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded => {
                return Err(AppError::validation(
                    "refunds and resets do not come through the payment webhook",
                ));
            }
        }
        Ok(order)
    }

    // ==================== Status ====================

    /// Move the order along the forward path.
    ///
    /// Transitions must be in the allowed-transition table and, past
    /// confirmation, require a paid order. Cancellation goes through
    /// `cancel_order`.
    pub async fn update_status(&self, order_id: &str, to: OrderStatus) -> AppResult<Order> {
        if to == OrderStatus::Cancelled {
            return Err(AppError::validation("use cancellation, not a status update"));
        }
        let mut order = self.require_order(order_id).await?;
        if order.status.is_terminal() {
            return Err(AppError::new(ErrorCode::OrderTerminal)
                .with_detail("status", format!("{:?}", order.status)));
        }
        if !order.status.can_transition_to(to) {
            return Err(AppError::new(ErrorCode::OrderInvalidTransition)
                .with_detail("from", format!("{:?}", order.status))
                .with_detail("to", format!("{:?}", to)));
        }
        if order.payment_status != PaymentStatus::Paid {
            return Err(AppError::new(ErrorCode::OrderNotPaid));
        }

        let from = order.status;
        order.record_transition(to);
        self.orders.save(&order).await?;
        tracing::info!("order {}: {:?} -> {:?}", order.id, from, to);
        self.realtime.order_updated(&order);
        self.bus.publish(LifecycleEvent::OrderStatusChanged {
            order: order.clone(),
            from,
            to,
        });
        Ok(order)
    }

    /// Cancel from any non-terminal status
    pub async fn cancel_order(&self, order_id: &str, reason: Option<String>) -> AppResult<Order> {
        let mut order = self.require_order(order_id).await?;
        if order.status.is_terminal() {
            return Err(AppError::new(ErrorCode::OrderTerminal)
                .with_detail("status", format!("{:?}", order.status)));
        }

        order.record_transition(OrderStatus::Cancelled);
        if let Some(reason) = &reason {
            order.merge_metadata([("cancel_reason".to_string(), json!(reason))]);
        }
        self.orders.save(&order).await?;
        tracing::info!("order cancelled: {} ({:?})", order.id, reason);
        self.realtime.order_updated(&order);
        self.bus.publish(LifecycleEvent::OrderCancelled {
            order: order.clone(),
            reason,
        });
        Ok(order)
    }

    /// Close the order after its mission was verified delivered.
    ///
    /// Idempotent: an already-delivered order is returned unchanged so
    /// duplicate delivery events cannot double-apply. Copies the courier
    /// and the final earnings onto the order.
    pub async fn close_delivered(
        &self,
        order_id: &str,
        courier_id: &str,
        courier_earnings: Decimal,
    ) -> AppResult<Order> {
        let mut order = self.require_order(order_id).await?;
        if order.status == OrderStatus::Delivered {
            return Ok(order);
        }
        if order.status == OrderStatus::Cancelled {
            return Err(AppError::new(ErrorCode::OrderTerminal)
                .with_detail("status", "CANCELLED"));
        }

        let from = order.status;
        order.courier_id = Some(courier_id.to_string());
        order.courier_earnings = courier_earnings;
        order.record_transition(OrderStatus::Delivered);
        self.orders.save(&order).await?;
        tracing::info!("order delivered: {} by {}", order.id, courier_id);
        self.realtime.order_updated(&order);
        self.bus.publish(LifecycleEvent::OrderStatusChanged {
            order: order.clone(),
            from,
            to: OrderStatus::Delivered,
        });
        Ok(order)
    }

    // ==================== Refunds and disputes ====================

    /// Refund part or all of a captured payment through the gateway
    pub async fn process_refund(
        &self,
        order_id: &str,
        amount: Option<Decimal>,
    ) -> AppResult<RefundOutcome> {
        let mut order = self.require_order(order_id).await?;
        if !matches!(
            order.payment_status,
            PaymentStatus::Paid | PaymentStatus::PartiallyRefunded
        ) {
            return Err(AppError::new(ErrorCode::RefundRejected)
                .with_detail("payment_status", format!("{:?}", order.payment_status)));
        }
        if order.transaction_id.is_none() {
            return Err(AppError::with_message(
                ErrorCode::RefundRejected,
                "no captured transaction to refund",
            ));
        }

        let already = order
            .metadata
            .get("refunded_total")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<Decimal>().ok())
            .unwrap_or(Decimal::ZERO);
        let refundable = order.breakdown.total - already;
        let amount = amount.unwrap_or(refundable);
        if amount <= Decimal::ZERO || amount > refundable {
            return Err(AppError::new(ErrorCode::RefundRejected)
                .with_detail("amount", amount.to_string())
                .with_detail("refundable", refundable.to_string()));
        }

        let payments = self.payments.clone();
        let order_for_call = order.clone();
        let outcome = self
            .payments_breaker
            .call(|| async move { payments.refund(&order_for_call, amount).await })
            .await?;

        let refunded_total = already + outcome.amount;
        let fully_refunded = refunded_total >= order.breakdown.total;
        order.payment_status = if fully_refunded {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        order.merge_metadata([
            ("refunded_total".to_string(), json!(refunded_total.to_string())),
            ("last_refund_id".to_string(), json!(outcome.refund_id)),
        ]);

        // a full refund of a live order also takes it out of fulfillment
        let cancelled = fully_refunded && !order.status.is_terminal();
        if cancelled {
            order.record_transition(OrderStatus::Cancelled);
        }
        self.orders.save(&order).await?;
        tracing::info!(
            "refund processed for {}: {} ({})",
            order.id,
            outcome.amount,
            outcome.refund_id
        );
        self.realtime.order_updated(&order);
        if cancelled {
            self.bus.publish(LifecycleEvent::OrderCancelled {
                order: order.clone(),
                reason: Some("fully refunded".into()),
            });
        }
        Ok(outcome)
    }

    /// Open a dispute on a paid order
    pub async fn open_dispute(&self, order_id: &str, reason: String) -> AppResult<Order> {
        let mut order = self.require_order(order_id).await?;
        if order.payment_status == PaymentStatus::Unpaid {
            return Err(AppError::new(ErrorCode::OrderNotPaid));
        }
        if order.dispute_status.is_open() {
            return Err(AppError::new(ErrorCode::DisputeAlreadyOpen));
        }

        order.dispute_status = DisputeStatus::Open;
        order.dispute_reason = Some(reason);
        order.updated_at = Utc::now();
        self.orders.save(&order).await?;
        tracing::info!("dispute opened on order {}", order.id);
        self.realtime.order_updated(&order);
        Ok(order)
    }

    /// Move an open dispute to investigation
    pub async fn investigate_dispute(&self, order_id: &str) -> AppResult<Order> {
        let mut order = self.require_order(order_id).await?;
        if order.dispute_status != DisputeStatus::Open {
            return Err(AppError::new(ErrorCode::DisputeNotOpen));
        }
        order.dispute_status = DisputeStatus::Investigating;
        order.updated_at = Utc::now();
        self.orders.save(&order).await?;
        Ok(order)
    }

    /// Close a dispute, optionally refunding the order in full
    pub async fn resolve_dispute(&self, order_id: &str, refund: bool) -> AppResult<Order> {
        let order = self.require_order(order_id).await?;
        if !order.dispute_status.is_open() {
            return Err(AppError::new(ErrorCode::DisputeNotOpen));
        }

        if refund {
            self.process_refund(order_id, None).await?;
        }
        let mut order = self.require_order(order_id).await?;
        order.dispute_status = if refund {
            DisputeStatus::Refunded
        } else {
            DisputeStatus::Resolved
        };
        order.updated_at = Utc::now();
        self.orders.save(&order).await?;
        tracing::info!(
            "dispute on order {} closed ({})",
            order.id,
            if refund { "refunded" } else { "resolved" }
        );
        self.realtime.order_updated(&order);
        Ok(order)
    }

    // ==================== Queries ====================

    pub async fn get_order(&self, order_id: &str) -> AppResult<Order> {
        self.require_order(order_id).await
    }

    pub async fn list_by_customer(&self, customer_id: &str) -> AppResult<Vec<Order>> {
        self.orders.find_by_customer(customer_id).await
    }

    pub async fn list_disputed(&self) -> AppResult<Vec<Order>> {
        self.orders.find_disputed().await
    }

    /// Patch order metadata without touching aggregate state
    pub async fn merge_metadata(
        &self,
        order_id: &str,
        entries: Vec<(String, serde_json::Value)>,
    ) -> AppResult<()> {
        self.orders.merge_metadata(order_id, entries).await
    }

    async fn require_order(&self, order_id: &str) -> AppResult<Order> {
        self.orders
            .find_one(order_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound).with_detail("order_id", order_id))
    }
}
