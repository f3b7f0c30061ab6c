//! In-memory collaborator implementations
//!
//! Used by the default build and by the test suites. State lives in
//! `DashMap`s so the implementations behave correctly under the same
//! concurrency the remote versions would see.

use super::{
    CatalogItem, CatalogProvider, CourierDirectory, CourierProfile, GeoIndex, InvoiceAuthority,
    InvoiceReceipt, MerchantInfo, MerchantProvider, Notification, Notifier, PaymentGateway,
    PaymentSession, RealtimeGateway, RefundOutcome, RewardsLedger,
};
use crate::pricing::distance_km;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use shared::mission::Mission;
use shared::order::Order;
use shared::types::Coordinates;
use shared::{AppError, AppResult, ErrorCode};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct InMemoryMerchants {
    merchants: DashMap<String, MerchantInfo>,
}

impl InMemoryMerchants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, merchant: MerchantInfo) {
        self.merchants.insert(merchant.id.clone(), merchant);
    }
}

#[async_trait]
impl MerchantProvider for InMemoryMerchants {
    async fn get_merchant(&self, merchant_id: &str) -> AppResult<MerchantInfo> {
        self.merchants
            .get(merchant_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| AppError::not_found("merchant"))
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    items: DashMap<String, CatalogItem>,
    sold: DashMap<String, u64>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: CatalogItem) {
        self.items.insert(item.id.clone(), item);
    }

    pub fn sold_count(&self, item_id: &str) -> u64 {
        self.sold.get(item_id).map(|entry| *entry).unwrap_or(0)
    }
}

#[async_trait]
impl CatalogProvider for InMemoryCatalog {
    async fn get_item(&self, item_id: &str) -> AppResult<CatalogItem> {
        self.items
            .get(item_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| AppError::new(ErrorCode::ItemNotFound))
    }

    async fn increment_sold(&self, item_id: &str, quantity: u32) -> AppResult<()> {
        *self.sold.entry(item_id.to_string()).or_insert(0) += u64::from(quantity);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPayments {
    session_seq: AtomicU64,
    refund_seq: AtomicU64,
}

impl InMemoryPayments {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPayments {
    async fn create_session(&self, order: &Order) -> AppResult<PaymentSession> {
        let n = self.session_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let session_id = format!("sess-{n:06}");
        Ok(PaymentSession {
            payment_url: format!("https://pay.local/checkout/{session_id}?order={}", order.id),
            session_id,
        })
    }

    async fn refund(&self, _order: &Order, amount: Decimal) -> AppResult<RefundOutcome> {
        let n = self.refund_seq.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(RefundOutcome {
            refund_id: format!("ref-{n:06}"),
            amount,
        })
    }
}

#[derive(Default)]
pub struct InMemoryInvoices {
    doc_seq: AtomicU64,
    credit_seq: AtomicU64,
}

impl InMemoryInvoices {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvoiceAuthority for InMemoryInvoices {
    async fn issue_invoice(&self, _order: &Order) -> AppResult<InvoiceReceipt> {
        let n = self.doc_seq.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(InvoiceReceipt {
            document_key: format!("DOC-{n:010}"),
            issued_at: Utc::now(),
        })
    }

    async fn issue_credit_note(&self, _order: &Order) -> AppResult<InvoiceReceipt> {
        let n = self.credit_seq.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(InvoiceReceipt {
            document_key: format!("NC-{n:010}"),
            issued_at: Utc::now(),
        })
    }
}

/// Records every notification instead of delivering it
#[derive(Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: Notification) -> AppResult<()> {
        tracing::debug!(
            "notify {}: {}",
            notification.recipient_id,
            notification.title
        );
        self.sent.lock().push(notification);
        Ok(())
    }
}

/// Counts emissions; a stand-in for the socket layer
#[derive(Default)]
pub struct InMemoryRealtime {
    pub order_updates: AtomicU64,
    pub mission_updates: AtomicU64,
    pub position_updates: AtomicU64,
}

impl InMemoryRealtime {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RealtimeGateway for InMemoryRealtime {
    fn order_updated(&self, order: &Order) {
        tracing::trace!("realtime order update: {}", order.id);
        self.order_updates.fetch_add(1, Ordering::Relaxed);
    }

    fn mission_updated(&self, mission: &Mission) {
        tracing::trace!("realtime mission update: {}", mission.id);
        self.mission_updates.fetch_add(1, Ordering::Relaxed);
    }

    fn courier_position(&self, mission_id: &str, position: Coordinates) {
        tracing::trace!(
            "realtime position: {} at ({}, {})",
            mission_id,
            position.lat,
            position.lng
        );
        self.position_updates.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Default)]
pub struct InMemoryGeoIndex {
    points: DashMap<String, Coordinates>,
}

impl InMemoryGeoIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GeoIndex for InMemoryGeoIndex {
    fn upsert(&self, id: &str, position: Coordinates) {
        self.points.insert(id.to_string(), position);
    }

    fn remove(&self, id: &str) {
        self.points.remove(id);
    }

    fn within_radius(&self, center: Coordinates, radius_km: f64) -> Vec<String> {
        let mut hits: Vec<(String, f64)> = self
            .points
            .iter()
            .filter_map(|entry| {
                let d = distance_km(center, *entry.value());
                (d <= radius_km).then(|| (entry.key().clone(), d))
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.into_iter().map(|(id, _)| id).collect()
    }
}

#[derive(Default)]
pub struct InMemoryRewards {
    /// Points credited per (customer, order); drained on reversal
    awards: DashMap<(String, String), u64>,
    balances: DashMap<String, u64>,
}

impl InMemoryRewards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, customer_id: &str) -> u64 {
        self.balances
            .get(customer_id)
            .map(|entry| *entry)
            .unwrap_or(0)
    }
}

#[async_trait]
impl RewardsLedger for InMemoryRewards {
    async fn award(&self, customer_id: &str, order_id: &str, points: u64) -> AppResult<()> {
        self.awards
            .insert((customer_id.to_string(), order_id.to_string()), points);
        *self.balances.entry(customer_id.to_string()).or_insert(0) += points;
        Ok(())
    }

    async fn reverse(&self, customer_id: &str, order_id: &str) -> AppResult<()> {
        let key = (customer_id.to_string(), order_id.to_string());
        if let Some((_, points)) = self.awards.remove(&key) {
            if let Some(mut balance) = self.balances.get_mut(customer_id) {
                *balance = balance.saturating_sub(points);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCouriers {
    couriers: DashMap<String, CourierProfile>,
}

impl InMemoryCouriers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, profile: CourierProfile) {
        self.couriers.insert(profile.id.clone(), profile);
    }
}

#[async_trait]
impl CourierDirectory for InMemoryCouriers {
    async fn is_verified(&self, courier_id: &str) -> AppResult<bool> {
        Ok(self
            .couriers
            .get(courier_id)
            .map(|entry| entry.verified)
            .unwrap_or(false))
    }

    async fn record_delivery(&self, courier_id: &str, earnings: Decimal) -> AppResult<()> {
        let mut entry = self
            .couriers
            .get_mut(courier_id)
            .ok_or_else(|| AppError::not_found("courier"))?;
        entry.deliveries += 1;
        entry.total_earnings += earnings;
        Ok(())
    }

    async fn get_profile(&self, courier_id: &str) -> AppResult<CourierProfile> {
        self.couriers
            .get(courier_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| AppError::not_found("courier"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_catalog_sold_counter_accumulates() {
        let catalog = InMemoryCatalog::new();
        catalog.insert(CatalogItem {
            id: "item-1".into(),
            merchant_id: "merch-1".into(),
            name: "Casado".into(),
            price: dec!(4500),
            available: true,
        });

        catalog.increment_sold("item-1", 2).await.unwrap();
        catalog.increment_sold("item-1", 3).await.unwrap();
        assert_eq!(catalog.sold_count("item-1"), 5);
    }

    #[tokio::test]
    async fn test_geo_index_orders_by_distance() {
        let index = InMemoryGeoIndex::new();
        let center = Coordinates::new(9.93, -84.08);
        index.upsert("far", Coordinates::new(9.99, -84.20));
        index.upsert("near", Coordinates::new(9.931, -84.081));
        index.upsert("outside", Coordinates::new(10.5, -85.0));

        let hits = index.within_radius(center, 20.0);
        assert_eq!(hits, vec!["near".to_string(), "far".to_string()]);

        index.remove("near");
        assert_eq!(index.within_radius(center, 20.0), vec!["far".to_string()]);
    }

    #[tokio::test]
    async fn test_rewards_reversal_is_idempotent() {
        let rewards = InMemoryRewards::new();
        rewards.award("cust-1", "order-1", 40).await.unwrap();
        rewards.award("cust-1", "order-2", 10).await.unwrap();
        assert_eq!(rewards.balance("cust-1"), 50);

        rewards.reverse("cust-1", "order-1").await.unwrap();
        rewards.reverse("cust-1", "order-1").await.unwrap();
        assert_eq!(rewards.balance("cust-1"), 10);
    }

    #[tokio::test]
    async fn test_courier_stats_accumulate() {
        let couriers = InMemoryCouriers::new();
        couriers.insert(CourierProfile {
            id: "courier-1".into(),
            verified: true,
            deliveries: 0,
            total_earnings: Decimal::ZERO,
        });

        couriers
            .record_delivery("courier-1", dec!(2030))
            .await
            .unwrap();
        couriers
            .record_delivery("courier-1", dec!(1530))
            .await
            .unwrap();

        let profile = couriers.get_profile("courier-1").await.unwrap();
        assert_eq!(profile.deliveries, 2);
        assert_eq!(profile.total_earnings, dec!(3560));
    }

    #[tokio::test]
    async fn test_unknown_courier_is_unverified() {
        let couriers = InMemoryCouriers::new();
        assert!(!couriers.is_verified("ghost").await.unwrap());
    }
}
