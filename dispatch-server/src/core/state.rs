//! Shared application state
//!
//! One wiring point for the whole engine. The default build uses the
//! in-memory collaborators and repositories; a deployment with real
//! upstreams swaps them behind the same traits.

use super::config::Config;
use crate::breaker::BreakerRegistry;
use crate::collaborators::{
    InMemoryCatalog, InMemoryCouriers, InMemoryGeoIndex, InMemoryInvoices, InMemoryMerchants,
    InMemoryNotifier, InMemoryPayments, InMemoryRealtime, InMemoryRewards,
};
use crate::events::EventBus;
use crate::missions::{MissionDispatcher, PositionSimulator};
use crate::orchestrator::SideEffectOrchestrator;
use crate::orders::OrderService;
use crate::repository::{InMemoryMissions, InMemoryOrders};
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub bus: Arc<EventBus>,
    pub breakers: Arc<BreakerRegistry>,
    pub orders: Arc<OrderService>,
    pub dispatcher: Arc<MissionDispatcher>,
    pub orchestrator: Arc<SideEffectOrchestrator>,
    pub simulator: Arc<PositionSimulator>,

    // concrete handles kept for seeding and inspection
    pub merchants: Arc<InMemoryMerchants>,
    pub catalog: Arc<InMemoryCatalog>,
    pub couriers: Arc<InMemoryCouriers>,
}

impl AppState {
    /// Wire the engine with in-memory storage and collaborators
    pub fn build(config: Config) -> Self {
        let bus = Arc::new(EventBus::new(config.event_capacity));
        let breakers = Arc::new(BreakerRegistry::new());

        let order_repo = Arc::new(InMemoryOrders::new());
        let mission_repo = Arc::new(InMemoryMissions::new());

        let merchants = Arc::new(InMemoryMerchants::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let couriers = Arc::new(InMemoryCouriers::new());
        let payments = Arc::new(InMemoryPayments::new());
        let invoices = Arc::new(InMemoryInvoices::new());
        let notifier = Arc::new(InMemoryNotifier::new());
        let realtime = Arc::new(InMemoryRealtime::new());
        let geo = Arc::new(InMemoryGeoIndex::new());
        let rewards = Arc::new(InMemoryRewards::new());

        let orders = Arc::new(OrderService::new(
            order_repo,
            mission_repo.clone(),
            merchants.clone(),
            catalog.clone(),
            payments,
            realtime.clone(),
            bus.clone(),
            &breakers,
            config.breaker,
            config.pricing.clone(),
        ));

        let dispatcher = Arc::new(MissionDispatcher::new(
            mission_repo.clone(),
            couriers.clone(),
            geo,
            realtime.clone(),
            orders.clone(),
            bus.clone(),
            config.pricing.clone(),
        ));

        let orchestrator = Arc::new(SideEffectOrchestrator::new(
            bus.clone(),
            orders.clone(),
            dispatcher.clone(),
            merchants.clone(),
            catalog.clone(),
            invoices,
            rewards,
            notifier.clone(),
            couriers.clone(),
            &breakers,
            config.breaker,
            config.loyalty_unit,
        ));

        let simulator = Arc::new(PositionSimulator::new(
            mission_repo,
            realtime,
            notifier,
            config.simulator.clone(),
        ));

        Self {
            config,
            bus,
            breakers,
            orders,
            dispatcher,
            orchestrator,
            simulator,
            merchants,
            catalog,
            couriers,
        }
    }
}
