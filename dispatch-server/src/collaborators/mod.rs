//! Collaborator seams
//!
//! Traits for everything the engine talks to but does not own: merchant and
//! catalog lookups, the payment gateway, the invoice authority, push
//! notifications, the realtime socket layer, the courier directory, the geo
//! index and the rewards ledger. Production wires remote clients behind
//! these traits; tests and the default build wire the in-memory versions.

mod memory;

pub use memory::{
    InMemoryCatalog, InMemoryCouriers, InMemoryGeoIndex, InMemoryInvoices, InMemoryMerchants,
    InMemoryNotifier, InMemoryPayments, InMemoryRealtime, InMemoryRewards,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::mission::Mission;
use shared::order::Order;
use shared::types::Coordinates;
use shared::AppResult;

/// Merchant profile as seen by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MerchantInfo {
    pub id: String,
    pub name: String,
    pub coords: Coordinates,
    pub is_open: bool,
    /// Orders beyond this radius from the merchant are rejected
    pub delivery_radius_km: f64,
    /// Sustainable merchants earn their customers loyalty points
    pub sustainable: bool,
}

/// Catalog item snapshot used to price order lines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: String,
    pub merchant_id: String,
    pub name: String,
    pub price: Decimal,
    pub available: bool,
}

/// Checkout session handed back to the customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSession {
    pub session_id: String,
    pub payment_url: String,
}

/// Result of a processed refund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundOutcome {
    pub refund_id: String,
    pub amount: Decimal,
}

/// Fiscal document issued for a paid order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceReceipt {
    pub document_key: String,
    pub issued_at: DateTime<Utc>,
}

/// Push notification payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: String,
    pub title: String,
    pub body: String,
}

/// Courier profile and running delivery stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierProfile {
    pub id: String,
    pub verified: bool,
    pub deliveries: u64,
    pub total_earnings: Decimal,
}

#[async_trait]
pub trait MerchantProvider: Send + Sync {
    async fn get_merchant(&self, merchant_id: &str) -> AppResult<MerchantInfo>;
}

#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn get_item(&self, item_id: &str) -> AppResult<CatalogItem>;

    /// Bump the sold counter after a confirmed sale
    async fn increment_sold(&self, item_id: &str, quantity: u32) -> AppResult<()>;
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a checkout session for the order total
    async fn create_session(&self, order: &Order) -> AppResult<PaymentSession>;

    /// Refund part or all of a captured payment
    async fn refund(&self, order: &Order, amount: Decimal) -> AppResult<RefundOutcome>;
}

#[async_trait]
pub trait InvoiceAuthority: Send + Sync {
    async fn issue_invoice(&self, order: &Order) -> AppResult<InvoiceReceipt>;

    /// Compensating credit note for a cancelled order that was invoiced
    async fn issue_credit_note(&self, order: &Order) -> AppResult<InvoiceReceipt>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> AppResult<()>;
}

/// Realtime fan-out to connected clients.
///
/// Fire-and-forget by contract: implementations must never block the caller
/// and failures stay inside the gateway.
pub trait RealtimeGateway: Send + Sync {
    fn order_updated(&self, order: &Order);
    fn mission_updated(&self, mission: &Mission);
    fn courier_position(&self, mission_id: &str, position: Coordinates);
}

/// Spatial index over open missions, keyed by mission id at the pickup
/// point
pub trait GeoIndex: Send + Sync {
    fn upsert(&self, id: &str, position: Coordinates);
    fn remove(&self, id: &str);
    /// Ids within `radius_km` of `center`, nearest first
    fn within_radius(&self, center: Coordinates, radius_km: f64) -> Vec<String>;
}

#[async_trait]
pub trait RewardsLedger: Send + Sync {
    /// Credit loyalty points for an order
    async fn award(&self, customer_id: &str, order_id: &str, points: u64) -> AppResult<()>;

    /// Take back points previously awarded for an order; a no-op when none
    /// were
    async fn reverse(&self, customer_id: &str, order_id: &str) -> AppResult<()>;
}

#[async_trait]
pub trait CourierDirectory: Send + Sync {
    async fn is_verified(&self, courier_id: &str) -> AppResult<bool>;

    /// Atomically add one delivery and its earnings to the courier's stats
    async fn record_delivery(&self, courier_id: &str, earnings: Decimal) -> AppResult<()>;

    async fn get_profile(&self, courier_id: &str) -> AppResult<CourierProfile>;
}
