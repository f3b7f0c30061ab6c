//! Order status machine and input types

use crate::types::Coordinates;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order lifecycle status.
///
/// Forward path: `PENDING → CONFIRMED → PREPARING → READY → ON_WAY →
/// DELIVERED`. `CANCELLED` is reachable from every non-terminal state.
/// `DELIVERED` and `CANCELLED` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    OnWay,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Whether a transition to `next` is present in the allowed-transition
    /// table. Terminal states admit nothing.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed | Cancelled)
                | (Confirmed, Preparing | Cancelled)
                | (Preparing, Ready | Cancelled)
                | (Ready, OnWay | Cancelled)
                | (OnWay, Delivered | Cancelled)
        )
    }

    /// Terminal statuses admit no further transitions from any caller
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

/// Payment status, driven by the payment gateway webhook
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Failed,
    Refunded,
    PartiallyRefunded,
}

/// Dispute status for admin arbitration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    #[default]
    None,
    Open,
    Investigating,
    Resolved,
    Refunded,
}

impl DisputeStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, DisputeStatus::Open | DisputeStatus::Investigating)
    }
}

/// Append-only status history entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

/// Ordered line item with a unit-price snapshot taken at creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    /// Catalog item id
    pub item_id: String,
    /// Item name snapshot
    pub name: String,
    /// Unit price snapshot; never recomputed from current catalog prices
    pub unit_price: Decimal,
    pub quantity: u32,
    /// unit_price * quantity
    pub line_total: Decimal,
    /// Whether this item carries sellable inventory (tickets)
    #[serde(default)]
    pub ticketed: bool,
}

/// Requested line item at checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemInput {
    pub item_id: String,
    pub quantity: u32,
}

/// Checkout input for order creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderInput {
    pub customer_id: String,
    pub merchant_id: String,
    pub items: Vec<OrderItemInput>,
    pub delivery_address: String,
    pub delivery_coords: Coordinates,
    #[serde(default)]
    pub courier_tip: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_notes: Option<String>,
}
