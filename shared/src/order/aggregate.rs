//! Order aggregate
//!
//! Owned exclusively by the order service; mutated only through its
//! operations. Orders are never deleted, only moved to a terminal status.

use super::types::{DisputeStatus, OrderItem, OrderStatus, PaymentStatus, StatusChange};
use crate::money::Breakdown;
use crate::types::{Coordinates, Metadata};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One purchase transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_id: String,
    pub merchant_id: String,
    pub items: Vec<OrderItem>,

    /// Monetary breakdown computed once at creation
    #[serde(flatten)]
    pub breakdown: Breakdown,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub dispute_status: DisputeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute_reason: Option<String>,

    /// External payment transaction id, set by the gateway webhook
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Receipt number from the locked document sequence
    pub receipt_number: String,

    /// Courier who delivered the order, copied from the mission at close
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courier_id: Option<String>,
    /// Final courier earnings, copied from the mission at close
    pub courier_earnings: Decimal,

    pub delivery_address: String,
    pub delivery_coords: Coordinates,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_notes: Option<String>,

    /// Append-only status history log
    pub status_history: Vec<StatusChange>,
    #[serde(default)]
    pub metadata: Metadata,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Record a status change: appends a history entry and moves the status.
    ///
    /// Does not validate the transition table; callers decide whether the
    /// transition goes through the table or the cancellation/closing
    /// short-circuit.
    pub fn record_transition(&mut self, to: OrderStatus) {
        let now = Utc::now();
        self.status_history.push(StatusChange {
            from: self.status,
            to,
            timestamp: now,
        });
        self.status = to;
        self.updated_at = now;
    }

    /// Merge entries into the metadata map
    pub fn merge_metadata(
        &mut self,
        entries: impl IntoIterator<Item = (String, serde_json::Value)>,
    ) {
        self.metadata.extend(entries);
        self.updated_at = Utc::now();
    }

    /// Invoice document key recorded by the orchestrator, if any
    pub fn invoice_document_key(&self) -> Option<&str> {
        self.metadata
            .get("invoice_document_key")
            .and_then(|v| v.as_str())
    }
}
