//! Persistence seams for the two aggregates
//!
//! The services only ever see these traits. Writes go through whole-
//! aggregate `save` except for `merge_metadata`, which patches metadata
//! keys without rewriting the aggregate so background writers (the position
//! simulator) cannot clobber concurrent state changes.

mod memory;

pub use memory::{InMemoryMissions, InMemoryOrders};

use async_trait::async_trait;
use serde_json::Value;
use shared::mission::{Mission, MissionStatus};
use shared::order::Order;
use shared::AppResult;

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn insert(&self, order: Order) -> AppResult<()>;

    async fn find_one(&self, order_id: &str) -> AppResult<Option<Order>>;

    /// Persist the full aggregate, replacing the stored copy
    async fn save(&self, order: &Order) -> AppResult<()>;

    async fn find_by_customer(&self, customer_id: &str) -> AppResult<Vec<Order>>;

    /// Orders with an open or investigating dispute, oldest first
    async fn find_disputed(&self) -> AppResult<Vec<Order>>;

    /// Next receipt number from the locked per-day document sequence.
    ///
    /// Gapless within a day and never reused, even when order creation
    /// fails after the draw.
    async fn next_receipt_number(&self) -> AppResult<String>;

    /// Patch metadata keys without touching the rest of the aggregate
    async fn merge_metadata(
        &self,
        order_id: &str,
        entries: Vec<(String, Value)>,
    ) -> AppResult<()>;
}

#[async_trait]
pub trait MissionRepository: Send + Sync {
    async fn insert(&self, mission: Mission) -> AppResult<()>;

    async fn find_one(&self, mission_id: &str) -> AppResult<Option<Mission>>;

    async fn save(&self, mission: &Mission) -> AppResult<()>;

    /// The mission linked to an order, if one was ever created
    async fn find_by_order(&self, order_id: &str) -> AppResult<Option<Mission>>;

    /// Unassigned pool, oldest first
    async fn find_available(&self) -> AppResult<Vec<Mission>>;

    async fn find_by_courier(&self, courier_id: &str) -> AppResult<Vec<Mission>>;

    async fn find_by_status(&self, status: MissionStatus) -> AppResult<Vec<Mission>>;

    /// Size of the unassigned pool, for surge detection
    async fn unassigned_count(&self) -> AppResult<usize>;

    async fn merge_metadata(
        &self,
        mission_id: &str,
        entries: Vec<(String, Value)>,
    ) -> AppResult<()>;
}
