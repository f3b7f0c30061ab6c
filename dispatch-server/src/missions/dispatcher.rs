//! Mission dispatcher
//!
//! Single writer for the mission aggregate. Owns the contested claim path:
//! a per-mission async mutex serializes claim attempts so that exactly one
//! courier wins and every loser gets a conflict error, never a second
//! assignment. Pickup and delivery flow back onto the linked order.

use crate::collaborators::{CourierDirectory, GeoIndex, RealtimeGateway};
use crate::events::EventBus;
use crate::orders::OrderService;
use crate::pricing::{distance_km, PricingConfig};
use crate::repository::MissionRepository;
use chrono::Utc;
use dashmap::DashMap;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use shared::mission::{Mission, MissionStatus, MissionType};
use shared::order::{Order, OrderStatus};
use shared::types::{Coordinates, Metadata};
use shared::{AppError, AppResult, ErrorCode, LifecycleEvent};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Input for a mission with no backing order (pure logistics request)
#[derive(Debug, Clone, Deserialize)]
pub struct StandaloneMissionInput {
    pub customer_id: Option<String>,
    pub mission_type: MissionType,
    pub origin_address: String,
    pub origin: Coordinates,
    pub destination_address: String,
    pub destination: Coordinates,
    #[serde(default)]
    pub courier_tip: rust_decimal::Decimal,
}

pub struct MissionDispatcher {
    missions: Arc<dyn MissionRepository>,
    couriers: Arc<dyn CourierDirectory>,
    geo: Arc<dyn GeoIndex>,
    realtime: Arc<dyn RealtimeGateway>,
    orders: Arc<OrderService>,
    bus: Arc<EventBus>,
    pricing: PricingConfig,
    /// Claim serialization points, one per contested mission
    claim_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MissionDispatcher {
    pub fn new(
        missions: Arc<dyn MissionRepository>,
        couriers: Arc<dyn CourierDirectory>,
        geo: Arc<dyn GeoIndex>,
        realtime: Arc<dyn RealtimeGateway>,
        orders: Arc<OrderService>,
        bus: Arc<EventBus>,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            missions,
            couriers,
            geo,
            realtime,
            orders,
            bus,
            pricing,
            claim_locks: DashMap::new(),
        }
    }

    // ==================== Creation ====================

    /// Create the delivery mission for an order that reached `READY`.
    ///
    /// Idempotent: if the order already has a mission it is returned as-is,
    /// so event replays cannot spawn duplicates.
    pub async fn create_from_order(
        &self,
        order: &Order,
        origin_address: &str,
        origin: Coordinates,
    ) -> AppResult<Mission> {
        if let Some(existing) = self.missions.find_by_order(&order.id).await? {
            tracing::debug!("mission for order {} already exists: {}", order.id, existing.id);
            return Ok(existing);
        }

        let distance = distance_km(origin, order.delivery_coords);
        let pool = self.missions.unassigned_count().await?;
        let surge = self.pricing.is_surge(pool);
        let estimated_earnings = self
            .pricing
            .courier_earnings(order.breakdown.delivery_fee, order.breakdown.courier_tip);

        let mission = self
            .build_mission(
                Some(order.id.clone()),
                Some(order.customer_id.clone()),
                Some(order.merchant_id.clone()),
                MissionType::FoodDelivery,
                origin_address.to_string(),
                origin,
                order.delivery_address.clone(),
                order.delivery_coords,
                distance,
                estimated_earnings,
                order.breakdown.courier_tip,
                surge,
            )
            .await?;

        tracing::info!(
            "mission created for order {}: {} ({:.2} km, est {})",
            order.id,
            mission.id,
            distance,
            mission.estimated_earnings
        );
        Ok(mission)
    }

    /// Create a mission with no backing order
    pub async fn create_standalone(&self, input: StandaloneMissionInput) -> AppResult<Mission> {
        if !input.origin.is_valid() || !input.destination.is_valid() {
            return Err(AppError::validation("mission coordinates are invalid"));
        }

        let distance = distance_km(input.origin, input.destination);
        let pool = self.missions.unassigned_count().await?;
        let surge = self.pricing.is_surge(pool);
        let fee = self.pricing.delivery_fee(distance, surge);
        let estimated_earnings = self.pricing.courier_earnings(fee, input.courier_tip);

        let mission = self
            .build_mission(
                None,
                input.customer_id,
                None,
                input.mission_type,
                input.origin_address,
                input.origin,
                input.destination_address,
                input.destination,
                distance,
                estimated_earnings,
                input.courier_tip,
                surge,
            )
            .await?;

        tracing::info!("standalone mission created: {}", mission.id);
        Ok(mission)
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_mission(
        &self,
        order_id: Option<String>,
        customer_id: Option<String>,
        merchant_id: Option<String>,
        mission_type: MissionType,
        origin_address: String,
        origin: Coordinates,
        destination_address: String,
        destination: Coordinates,
        distance: f64,
        estimated_earnings: rust_decimal::Decimal,
        courier_tip: rust_decimal::Decimal,
        surge: bool,
    ) -> AppResult<Mission> {
        let now = Utc::now();
        let mission = Mission {
            id: Uuid::new_v4().to_string(),
            order_id,
            customer_id,
            merchant_id,
            mission_type,
            status: MissionStatus::Ready,
            courier_id: None,
            origin_address,
            origin,
            destination_address,
            destination,
            estimated_distance_km: distance,
            actual_distance_km: None,
            estimated_minutes: self.pricing.estimated_minutes(distance),
            estimated_earnings,
            courier_earnings: None,
            delivery_otp: generate_otp(),
            courier_tip,
            surge,
            picked_up_at: None,
            completed_at: None,
            metadata: Metadata::new(),
            created_at: now,
            updated_at: now,
        };

        self.missions.insert(mission.clone()).await?;
        self.geo.upsert(&mission.id, mission.origin);
        self.realtime.mission_updated(&mission);
        Ok(mission)
    }

    // ==================== Claim / release ====================

    /// Claim a mission for a courier.
    ///
    /// Eligibility runs before the lock; the authoritative claimability
    /// re-check runs inside it against a fresh read, so under N concurrent
    /// attempts exactly one courier wins and the rest fail with a conflict.
    pub async fn claim(&self, mission_id: &str, courier_id: &str) -> AppResult<Mission> {
        if !self.couriers.is_verified(courier_id).await? {
            return Err(AppError::new(ErrorCode::CourierNotVerified));
        }
        // cheap pre-check outside the lock
        let mission = self.require_mission(mission_id).await?;
        if mission.status.is_terminal() {
            return Err(AppError::new(ErrorCode::MissionNotAvailable)
                .with_detail("status", format!("{:?}", mission.status)));
        }

        let lock = self
            .claim_locks
            .entry(mission_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // authoritative re-check under the lock
        let mut mission = self.require_mission(mission_id).await?;
        if mission.courier_id.is_some() {
            return Err(AppError::new(ErrorCode::MissionAlreadyClaimed)
                .with_detail("mission_id", mission_id));
        }
        if !mission.is_claimable() {
            return Err(AppError::new(ErrorCode::MissionNotAvailable)
                .with_detail("status", format!("{:?}", mission.status)));
        }

        mission.courier_id = Some(courier_id.to_string());
        mission.status = MissionStatus::Confirmed;
        mission.updated_at = Utc::now();
        self.missions.save(&mission).await?;
        self.geo.remove(&mission.id);
        self.realtime.mission_updated(&mission);
        tracing::info!("mission {} claimed by {}", mission.id, courier_id);
        Ok(mission)
    }

    /// Give a claimed mission back to the pool.
    ///
    /// Only the assigned courier may release. Releasing after pickup drops
    /// the pickup timestamp so the next courier starts clean.
    pub async fn release(&self, mission_id: &str, courier_id: &str) -> AppResult<Mission> {
        let mut mission = self.require_mission(mission_id).await?;
        self.require_assigned(&mission, courier_id)?;
        if !matches!(
            mission.status,
            MissionStatus::Confirmed | MissionStatus::OnWay
        ) {
            return Err(AppError::new(ErrorCode::MissionNotAvailable)
                .with_detail("status", format!("{:?}", mission.status)));
        }

        mission.courier_id = None;
        mission.status = MissionStatus::Ready;
        mission.picked_up_at = None;
        mission.updated_at = Utc::now();
        self.missions.save(&mission).await?;
        self.geo.upsert(&mission.id, mission.origin);
        self.realtime.mission_updated(&mission);
        tracing::info!("mission {} released by {}", mission.id, courier_id);
        Ok(mission)
    }

    // ==================== Progress ====================

    /// Courier-driven status update (pickup, mostly).
    ///
    /// Delivery never goes through here; it requires the code verification
    /// path. Pickup moves the linked order to `ON_WAY`.
    pub async fn update_status(
        &self,
        mission_id: &str,
        courier_id: &str,
        to: MissionStatus,
    ) -> AppResult<Mission> {
        if to == MissionStatus::Delivered {
            return Err(AppError::with_message(
                ErrorCode::MissionInvalidTransition,
                "delivery requires code verification",
            ));
        }

        let mut mission = self.require_mission(mission_id).await?;
        self.require_assigned(&mission, courier_id)?;
        if !mission.status.can_transition_to(to) {
            return Err(AppError::new(ErrorCode::MissionInvalidTransition)
                .with_detail("from", format!("{:?}", mission.status))
                .with_detail("to", format!("{:?}", to)));
        }

        mission.status = to;
        mission.updated_at = Utc::now();
        if to == MissionStatus::OnWay {
            mission.picked_up_at = Some(Utc::now());
        }
        self.missions.save(&mission).await?;
        self.realtime.mission_updated(&mission);
        tracing::info!("mission {}: now {:?}", mission.id, to);

        // pickup drags the linked order along
        if to == MissionStatus::OnWay {
            if let Some(order_id) = &mission.order_id {
                self.orders.update_status(order_id, OrderStatus::OnWay).await?;
            }
        }
        Ok(mission)
    }

    /// Verify delivery with the one-time code and finalize earnings.
    ///
    /// Final earnings come from the fee for the distance actually traveled
    /// (simulated odometer, falling back to the estimate), plus the full
    /// tip. Idempotent for the assigned courier, but only with the right
    /// code; a replay never bypasses the code check.
    pub async fn verify_delivery(
        &self,
        mission_id: &str,
        courier_id: &str,
        otp: &str,
    ) -> AppResult<Mission> {
        let mut mission = self.require_mission(mission_id).await?;
        self.require_assigned(&mission, courier_id)?;

        if mission.delivery_otp != otp {
            return Err(AppError::new(ErrorCode::OtpMismatch));
        }
        if mission.status == MissionStatus::Delivered {
            return Ok(mission);
        }
        if mission.status != MissionStatus::OnWay {
            return Err(AppError::new(ErrorCode::MissionInvalidTransition)
                .with_detail("from", format!("{:?}", mission.status)));
        }

        let actual_km = mission
            .metadata
            .get("traveled_km")
            .and_then(|v| v.as_f64())
            .unwrap_or(mission.estimated_distance_km);
        let final_fee = self.pricing.delivery_fee(actual_km, mission.surge);
        let earnings = self.pricing.courier_earnings(final_fee, mission.courier_tip);

        let now = Utc::now();
        mission.status = MissionStatus::Delivered;
        mission.actual_distance_km = Some(actual_km);
        mission.courier_earnings = Some(earnings);
        mission.completed_at = Some(now);
        mission.updated_at = now;
        self.missions.save(&mission).await?;
        self.claim_locks.remove(mission_id);
        self.realtime.mission_updated(&mission);
        tracing::info!(
            "mission {} delivered by {} ({:.2} km, earned {})",
            mission.id,
            courier_id,
            actual_km,
            earnings
        );
        self.bus.publish(LifecycleEvent::MissionDelivered {
            mission: mission.clone(),
        });
        Ok(mission)
    }

    // ==================== Admin ====================

    /// Assign a mission to a courier directly, bypassing the claim race.
    ///
    /// Works on claimed missions too (reassignment); records who did it.
    pub async fn admin_assign(
        &self,
        mission_id: &str,
        courier_id: &str,
        assigned_by: &str,
    ) -> AppResult<Mission> {
        if !self.couriers.is_verified(courier_id).await? {
            return Err(AppError::new(ErrorCode::CourierNotVerified));
        }

        let lock = self
            .claim_locks
            .entry(mission_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let mut mission = self.require_mission(mission_id).await?;
        if mission.status.is_terminal() || mission.status == MissionStatus::OnWay {
            return Err(AppError::new(ErrorCode::MissionNotAvailable)
                .with_detail("status", format!("{:?}", mission.status)));
        }

        let previous = mission.courier_id.replace(courier_id.to_string());
        mission.status = MissionStatus::Confirmed;
        mission.merge_metadata([
            ("admin_assigned_by".to_string(), json!(assigned_by)),
            ("admin_assigned_at".to_string(), json!(Utc::now().to_rfc3339())),
        ]);
        self.missions.save(&mission).await?;
        self.geo.remove(&mission.id);
        self.realtime.mission_updated(&mission);
        tracing::info!(
            "mission {} assigned to {} by {} (was {:?})",
            mission.id,
            courier_id,
            assigned_by,
            previous
        );
        Ok(mission)
    }

    /// Force-cancel a mission regardless of assignment
    pub async fn cancel(&self, mission_id: &str, reason: Option<String>) -> AppResult<Mission> {
        let mut mission = self.require_mission(mission_id).await?;
        if mission.status.is_terminal() {
            return Err(AppError::new(ErrorCode::MissionNotAvailable)
                .with_detail("status", format!("{:?}", mission.status)));
        }

        mission.status = MissionStatus::Cancelled;
        mission.updated_at = Utc::now();
        if let Some(reason) = &reason {
            mission.merge_metadata([("cancel_reason".to_string(), json!(reason))]);
        }
        self.missions.save(&mission).await?;
        self.geo.remove(&mission.id);
        self.claim_locks.remove(mission_id);
        self.realtime.mission_updated(&mission);
        tracing::info!("mission {} cancelled ({:?})", mission.id, reason);
        Ok(mission)
    }

    /// Cancel the mission linked to an order, if any and still live
    pub async fn cancel_by_order(&self, order_id: &str, reason: Option<String>) -> AppResult<()> {
        if let Some(mission) = self.missions.find_by_order(order_id).await? {
            if !mission.status.is_terminal() {
                self.cancel(&mission.id, reason).await?;
            }
        }
        Ok(())
    }

    /// Bring the linked mission in line with its order's status.
    ///
    /// Idempotent: only cancellation has a mission-side effect; every other
    /// order status either drives the mission through its own operations or
    /// needs nothing here.
    pub async fn sync_status_by_order(
        &self,
        order_id: &str,
        order_status: OrderStatus,
    ) -> AppResult<()> {
        if order_status == OrderStatus::Cancelled {
            self.cancel_by_order(order_id, Some("order cancelled".into()))
                .await?;
        }
        Ok(())
    }

    // ==================== Queries ====================

    pub async fn get_mission(&self, mission_id: &str) -> AppResult<Mission> {
        self.require_mission(mission_id).await
    }

    /// Unassigned pool, oldest first, optionally filtered by mission type
    pub async fn find_available(
        &self,
        mission_type: Option<MissionType>,
    ) -> AppResult<Vec<Mission>> {
        let mut pool = self.missions.find_available().await?;
        if let Some(wanted) = mission_type {
            pool.retain(|m| m.mission_type == wanted);
        }
        Ok(pool)
    }

    /// Claimable missions whose pickup is within `radius_km`, nearest first
    pub async fn find_nearby(&self, center: Coordinates, radius_km: f64) -> AppResult<Vec<Mission>> {
        let mut nearby = Vec::new();
        for id in self.geo.within_radius(center, radius_km) {
            if let Some(mission) = self.missions.find_one(&id).await? {
                if mission.is_claimable() {
                    nearby.push(mission);
                }
            }
        }
        Ok(nearby)
    }

    pub async fn find_by_courier(&self, courier_id: &str) -> AppResult<Vec<Mission>> {
        self.missions.find_by_courier(courier_id).await
    }

    /// Patch mission metadata without touching aggregate state
    pub async fn merge_metadata(
        &self,
        mission_id: &str,
        entries: Vec<(String, serde_json::Value)>,
    ) -> AppResult<()> {
        self.missions.merge_metadata(mission_id, entries).await
    }

    fn require_assigned(&self, mission: &Mission, courier_id: &str) -> AppResult<()> {
        if mission.courier_id.as_deref() != Some(courier_id) {
            return Err(AppError::new(ErrorCode::NotAssignedCourier));
        }
        Ok(())
    }

    async fn require_mission(&self, mission_id: &str) -> AppResult<Mission> {
        self.missions
            .find_one(mission_id)
            .await?
            .ok_or_else(|| {
                AppError::new(ErrorCode::MissionNotFound).with_detail("mission_id", mission_id)
            })
    }
}

fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    format!("{:04}", rng.gen_range(0..10000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{BreakerRegistry, BreakerSettings};
    use crate::collaborators::{
        CatalogItem, CourierProfile, InMemoryCatalog, InMemoryCouriers, InMemoryGeoIndex,
        InMemoryMerchants, InMemoryPayments, InMemoryRealtime, MerchantInfo,
    };
    use crate::repository::{InMemoryMissions, InMemoryOrders};
    use rust_decimal_macros::dec;
    use shared::money::FeeSchedule;
    use shared::order::{CreateOrderInput, OrderItemInput, PaymentStatus};

    fn pricing() -> PricingConfig {
        PricingConfig {
            base_fare: dec!(500),
            per_km_rate: dec!(300),
            min_delivery_fee: dec!(800),
            max_delivery_fee: dec!(5000),
            surge_pool_threshold: 5,
            surge_multiplier: dec!(1.25),
            platform_delivery_cut: dec!(0.10),
            avg_speed_kmh: 25.0,
            pickup_buffer_minutes: 8,
            fees: FeeSchedule {
                tax_rate: dec!(0.13),
                platform_fee_percent: dec!(0.05),
                transaction_fee_percent: dec!(0.05),
                transaction_fee_flat: dec!(250),
            },
        }
    }

    struct Fixture {
        dispatcher: Arc<MissionDispatcher>,
        orders: Arc<OrderService>,
        couriers: Arc<InMemoryCouriers>,
    }

    fn fixture() -> Fixture {
        let order_repo = Arc::new(InMemoryOrders::new());
        let mission_repo = Arc::new(InMemoryMissions::new());
        let merchants = Arc::new(InMemoryMerchants::new());
        merchants.insert(MerchantInfo {
            id: "merch-1".into(),
            name: "Soda La Esquina".into(),
            coords: Coordinates::new(9.93, -84.08),
            is_open: true,
            delivery_radius_km: 10.0,
            sustainable: false,
        });
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.insert(CatalogItem {
            id: "item-1".into(),
            merchant_id: "merch-1".into(),
            name: "Casado".into(),
            price: dec!(5000),
            available: true,
        });
        let couriers = Arc::new(InMemoryCouriers::new());
        couriers.insert(CourierProfile {
            id: "courier-1".into(),
            verified: true,
            deliveries: 0,
            total_earnings: dec!(0),
        });
        couriers.insert(CourierProfile {
            id: "courier-2".into(),
            verified: true,
            deliveries: 0,
            total_earnings: dec!(0),
        });

        let bus = Arc::new(EventBus::new(64));
        let registry = BreakerRegistry::new();
        let orders = Arc::new(OrderService::new(
            order_repo,
            mission_repo.clone(),
            merchants,
            catalog,
            Arc::new(InMemoryPayments::new()),
            Arc::new(InMemoryRealtime::new()),
            bus.clone(),
            &registry,
            BreakerSettings::default(),
            pricing(),
        ));
        let dispatcher = Arc::new(MissionDispatcher::new(
            mission_repo,
            couriers.clone(),
            Arc::new(InMemoryGeoIndex::new()),
            Arc::new(InMemoryRealtime::new()),
            orders.clone(),
            bus,
            pricing(),
        ));
        Fixture {
            dispatcher,
            orders,
            couriers,
        }
    }

    async fn ready_order(fx: &Fixture) -> Order {
        let order = fx
            .orders
            .create_order(CreateOrderInput {
                customer_id: "cust-1".into(),
                merchant_id: "merch-1".into(),
                items: vec![OrderItemInput {
                    item_id: "item-1".into(),
                    quantity: 2,
                }],
                delivery_address: "100m norte de la iglesia".into(),
                delivery_coords: Coordinates::new(9.94, -84.09),
                courier_tip: dec!(500),
                customer_notes: None,
            })
            .await
            .unwrap();
        fx.orders
            .update_payment_status(&order.id, PaymentStatus::Paid, Some("txn-1".into()))
            .await
            .unwrap();
        fx.orders
            .update_status(&order.id, OrderStatus::Preparing)
            .await
            .unwrap();
        fx.orders
            .update_status(&order.id, OrderStatus::Ready)
            .await
            .unwrap()
    }

    async fn ready_mission(fx: &Fixture) -> (Order, Mission) {
        let order = ready_order(fx).await;
        let mission = fx
            .dispatcher
            .create_from_order(&order, "Soda La Esquina", Coordinates::new(9.93, -84.08))
            .await
            .unwrap();
        (order, mission)
    }

    #[tokio::test]
    async fn test_create_from_order_is_idempotent() {
        let fx = fixture();
        let (order, mission) = ready_mission(&fx).await;
        let again = fx
            .dispatcher
            .create_from_order(&order, "Soda La Esquina", Coordinates::new(9.93, -84.08))
            .await
            .unwrap();
        assert_eq!(mission.id, again.id);
        assert_eq!(fx.dispatcher.find_available(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_claim_requires_verified_courier() {
        let fx = fixture();
        let (_, mission) = ready_mission(&fx).await;
        let err = fx
            .dispatcher
            .claim(&mission.id, "unknown")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::CourierNotVerified);
    }

    #[tokio::test]
    async fn test_second_claim_loses_with_conflict() {
        let fx = fixture();
        let (_, mission) = ready_mission(&fx).await;

        let won = fx.dispatcher.claim(&mission.id, "courier-1").await.unwrap();
        assert_eq!(won.courier_id.as_deref(), Some("courier-1"));
        assert_eq!(won.status, MissionStatus::Confirmed);

        let err = fx
            .dispatcher
            .claim(&mission.id, "courier-2")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissionAlreadyClaimed);
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_exactly_one_winner() {
        let fx = fixture();
        let (_, mission) = ready_mission(&fx).await;

        for i in 3..20 {
            fx.couriers.insert(CourierProfile {
                id: format!("courier-{i}"),
                verified: true,
                deliveries: 0,
                total_earnings: dec!(0),
            });
        }

        let mut handles = Vec::new();
        for i in 1..20 {
            let dispatcher = fx.dispatcher.clone();
            let mission_id = mission.id.clone();
            handles.push(tokio::spawn(async move {
                dispatcher.claim(&mission_id, &format!("courier-{i}")).await
            }));
        }

        let mut winners = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(err) => {
                    assert_eq!(err.code, ErrorCode::MissionAlreadyClaimed);
                    conflicts += 1;
                }
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(conflicts, 18);
    }

    #[tokio::test]
    async fn test_release_returns_mission_to_pool() {
        let fx = fixture();
        let (_, mission) = ready_mission(&fx).await;
        fx.dispatcher.claim(&mission.id, "courier-1").await.unwrap();

        let err = fx
            .dispatcher
            .release(&mission.id, "courier-2")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotAssignedCourier);

        let released = fx
            .dispatcher
            .release(&mission.id, "courier-1")
            .await
            .unwrap();
        assert!(released.is_claimable());

        // claimable again, by anyone
        fx.dispatcher.claim(&mission.id, "courier-2").await.unwrap();
    }

    #[tokio::test]
    async fn test_pickup_moves_order_on_way() {
        let fx = fixture();
        let (order, mission) = ready_mission(&fx).await;
        fx.dispatcher.claim(&mission.id, "courier-1").await.unwrap();

        let mission = fx
            .dispatcher
            .update_status(&mission.id, "courier-1", MissionStatus::OnWay)
            .await
            .unwrap();
        assert!(mission.picked_up_at.is_some());

        let order = fx.orders.get_order(&order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::OnWay);
    }

    #[tokio::test]
    async fn test_delivery_rejected_through_plain_status_update() {
        let fx = fixture();
        let (_, mission) = ready_mission(&fx).await;
        fx.dispatcher.claim(&mission.id, "courier-1").await.unwrap();
        fx.dispatcher
            .update_status(&mission.id, "courier-1", MissionStatus::OnWay)
            .await
            .unwrap();

        let err = fx
            .dispatcher
            .update_status(&mission.id, "courier-1", MissionStatus::Delivered)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::MissionInvalidTransition);
    }

    #[tokio::test]
    async fn test_verify_delivery_checks_code_and_finalizes_earnings() {
        let fx = fixture();
        let (_, mission) = ready_mission(&fx).await;
        fx.dispatcher.claim(&mission.id, "courier-1").await.unwrap();
        fx.dispatcher
            .update_status(&mission.id, "courier-1", MissionStatus::OnWay)
            .await
            .unwrap();

        let otp = fx
            .dispatcher
            .get_mission(&mission.id)
            .await
            .unwrap()
            .delivery_otp;

        let err = fx
            .dispatcher
            .verify_delivery(&mission.id, "courier-1", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OtpMismatch);

        let delivered = fx
            .dispatcher
            .verify_delivery(&mission.id, "courier-1", &otp)
            .await
            .unwrap();
        assert_eq!(delivered.status, MissionStatus::Delivered);
        assert!(delivered.courier_earnings.is_some());
        assert!(delivered.completed_at.is_some());

        // replay with the right code returns the same terminal mission
        let replay = fx
            .dispatcher
            .verify_delivery(&mission.id, "courier-1", &otp)
            .await
            .unwrap();
        assert_eq!(replay.courier_earnings, delivered.courier_earnings);

        // a wrong code is rejected even after delivery
        let err = fx
            .dispatcher
            .verify_delivery(&mission.id, "courier-1", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::OtpMismatch);
    }

    #[tokio::test]
    async fn test_admin_assign_overrides_claim() {
        let fx = fixture();
        let (_, mission) = ready_mission(&fx).await;
        fx.dispatcher.claim(&mission.id, "courier-1").await.unwrap();

        let reassigned = fx
            .dispatcher
            .admin_assign(&mission.id, "courier-2", "ops-1")
            .await
            .unwrap();
        assert_eq!(reassigned.courier_id.as_deref(), Some("courier-2"));
        assert_eq!(
            reassigned.metadata.get("admin_assigned_by").unwrap(),
            "ops-1"
        );
    }

    #[tokio::test]
    async fn test_cancel_by_order_skips_terminal_missions() {
        let fx = fixture();
        let (order, mission) = ready_mission(&fx).await;
        fx.dispatcher
            .cancel_by_order(&order.id, Some("order cancelled".into()))
            .await
            .unwrap();

        let mission = fx.dispatcher.get_mission(&mission.id).await.unwrap();
        assert_eq!(mission.status, MissionStatus::Cancelled);

        // second pass is a no-op
        fx.dispatcher.cancel_by_order(&order.id, None).await.unwrap();
    }

    #[test]
    fn test_generated_otp_shape() {
        for _ in 0..50 {
            let otp = generate_otp();
            assert_eq!(otp.len(), 4);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
