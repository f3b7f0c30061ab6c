//! In-memory repositories backed by `DashMap`

use super::{MissionRepository, OrderRepository};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use shared::mission::{Mission, MissionStatus};
use shared::order::Order;
use shared::{AppError, AppResult};

#[derive(Default)]
pub struct InMemoryOrders {
    orders: DashMap<String, Order>,
    /// Receipt counter per yyyymmdd key; the entry lock makes the draw
    /// atomic
    receipt_counters: DashMap<String, u64>,
}

impl InMemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrders {
    async fn insert(&self, order: Order) -> AppResult<()> {
        if self.orders.contains_key(&order.id) {
            return Err(AppError::storage(format!(
                "order {} already exists",
                order.id
            )));
        }
        self.orders.insert(order.id.clone(), order);
        Ok(())
    }

    async fn find_one(&self, order_id: &str) -> AppResult<Option<Order>> {
        Ok(self.orders.get(order_id).map(|entry| entry.clone()))
    }

    async fn save(&self, order: &Order) -> AppResult<()> {
        self.orders.insert(order.id.clone(), order.clone());
        Ok(())
    }

    async fn find_by_customer(&self, customer_id: &str) -> AppResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.customer_id == customer_id)
            .map(|entry| entry.clone())
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn find_disputed(&self) -> AppResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| entry.dispute_status.is_open())
            .map(|entry| entry.clone())
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn next_receipt_number(&self) -> AppResult<String> {
        let day = Utc::now().format("%Y%m%d").to_string();
        let mut counter = self.receipt_counters.entry(day.clone()).or_insert(0);
        *counter += 1;
        Ok(format!("FAC{day}{}", 10000 + *counter))
    }

    async fn merge_metadata(
        &self,
        order_id: &str,
        entries: Vec<(String, Value)>,
    ) -> AppResult<()> {
        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| AppError::not_found("order"))?;
        order.merge_metadata(entries);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMissions {
    missions: DashMap<String, Mission>,
}

impl InMemoryMissions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MissionRepository for InMemoryMissions {
    async fn insert(&self, mission: Mission) -> AppResult<()> {
        if self.missions.contains_key(&mission.id) {
            return Err(AppError::storage(format!(
                "mission {} already exists",
                mission.id
            )));
        }
        self.missions.insert(mission.id.clone(), mission);
        Ok(())
    }

    async fn find_one(&self, mission_id: &str) -> AppResult<Option<Mission>> {
        Ok(self.missions.get(mission_id).map(|entry| entry.clone()))
    }

    async fn save(&self, mission: &Mission) -> AppResult<()> {
        self.missions.insert(mission.id.clone(), mission.clone());
        Ok(())
    }

    async fn find_by_order(&self, order_id: &str) -> AppResult<Option<Mission>> {
        Ok(self
            .missions
            .iter()
            .find(|entry| entry.order_id.as_deref() == Some(order_id))
            .map(|entry| entry.clone()))
    }

    async fn find_available(&self) -> AppResult<Vec<Mission>> {
        let mut missions: Vec<Mission> = self
            .missions
            .iter()
            .filter(|entry| entry.is_claimable())
            .map(|entry| entry.clone())
            .collect();
        missions.sort_by_key(|m| m.created_at);
        Ok(missions)
    }

    async fn find_by_courier(&self, courier_id: &str) -> AppResult<Vec<Mission>> {
        let mut missions: Vec<Mission> = self
            .missions
            .iter()
            .filter(|entry| entry.courier_id.as_deref() == Some(courier_id))
            .map(|entry| entry.clone())
            .collect();
        missions.sort_by_key(|m| m.created_at);
        Ok(missions)
    }

    async fn find_by_status(&self, status: MissionStatus) -> AppResult<Vec<Mission>> {
        let mut missions: Vec<Mission> = self
            .missions
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.clone())
            .collect();
        missions.sort_by_key(|m| m.created_at);
        Ok(missions)
    }

    async fn unassigned_count(&self) -> AppResult<usize> {
        Ok(self
            .missions
            .iter()
            .filter(|entry| entry.is_claimable())
            .count())
    }

    async fn merge_metadata(
        &self,
        mission_id: &str,
        entries: Vec<(String, Value)>,
    ) -> AppResult<()> {
        let mut mission = self
            .missions
            .get_mut(mission_id)
            .ok_or_else(|| AppError::not_found("mission"))?;
        mission.merge_metadata(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::money::Breakdown;
    use shared::order::{DisputeStatus, OrderStatus, PaymentStatus};
    use shared::types::{Coordinates, Metadata};
    use rust_decimal::Decimal;

    fn sample_order(id: &str) -> Order {
        Order {
            id: id.into(),
            customer_id: "cust-1".into(),
            merchant_id: "merch-1".into(),
            items: vec![],
            breakdown: Breakdown::default(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            dispute_status: DisputeStatus::None,
            dispute_reason: None,
            transaction_id: None,
            receipt_number: "FAC2026083010001".into(),
            courier_id: None,
            courier_earnings: Decimal::ZERO,
            delivery_address: "somewhere".into(),
            delivery_coords: Coordinates::new(9.93, -84.08),
            customer_notes: None,
            status_history: vec![],
            metadata: Metadata::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let repo = InMemoryOrders::new();
        repo.insert(sample_order("order-1")).await.unwrap();
        assert!(repo.insert(sample_order("order-1")).await.is_err());
    }

    #[tokio::test]
    async fn test_receipt_numbers_are_sequential_and_unique() {
        let repo = InMemoryOrders::new();
        let day = Utc::now().format("%Y%m%d").to_string();

        let first = repo.next_receipt_number().await.unwrap();
        let second = repo.next_receipt_number().await.unwrap();
        assert_eq!(first, format!("FAC{day}10001"));
        assert_eq!(second, format!("FAC{day}10002"));
    }

    #[tokio::test]
    async fn test_receipt_numbers_survive_concurrent_draws() {
        use std::collections::HashSet;
        use std::sync::Arc;

        let repo = Arc::new(InMemoryOrders::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let repo = repo.clone();
            handles.push(tokio::spawn(
                async move { repo.next_receipt_number().await },
            ));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            assert!(seen.insert(handle.await.unwrap().unwrap()));
        }
        assert_eq!(seen.len(), 32);
    }

    #[tokio::test]
    async fn test_find_disputed_filters_open_disputes() {
        let repo = InMemoryOrders::new();
        let mut disputed = sample_order("order-1");
        disputed.dispute_status = DisputeStatus::Open;
        repo.insert(disputed).await.unwrap();
        repo.insert(sample_order("order-2")).await.unwrap();

        let found = repo.find_disputed().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "order-1");
    }

    #[tokio::test]
    async fn test_merge_metadata_patches_without_replacing() {
        let repo = InMemoryOrders::new();
        repo.insert(sample_order("order-1")).await.unwrap();

        repo.merge_metadata("order-1", vec![("a".into(), serde_json::json!(1))])
            .await
            .unwrap();
        repo.merge_metadata("order-1", vec![("b".into(), serde_json::json!(2))])
            .await
            .unwrap();

        let order = repo.find_one("order-1").await.unwrap().unwrap();
        assert_eq!(order.metadata.len(), 2);
    }
}
