//! End-to-end fulfillment flows through the public engine wiring

use dispatch_server::collaborators::{CatalogItem, CourierDirectory, CourierProfile, MerchantInfo};
use dispatch_server::core::{AppState, BackgroundTasks, Config, TaskKind};
use rust_decimal_macros::dec;
use shared::mission::MissionStatus;
use shared::order::{CreateOrderInput, Order, OrderItemInput, OrderStatus, PaymentStatus};
use shared::types::Coordinates;
use shared::ErrorCode;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

fn engine() -> (Arc<AppState>, BackgroundTasks) {
    let state = Arc::new(AppState::build(Config::from_env()));

    state.merchants.insert(MerchantInfo {
        id: "merch-1".into(),
        name: "Soda La Esquina".into(),
        coords: Coordinates::new(9.93, -84.08),
        is_open: true,
        delivery_radius_km: 10.0,
        sustainable: true,
    });
    state.catalog.insert(CatalogItem {
        id: "item-1".into(),
        merchant_id: "merch-1".into(),
        name: "Casado".into(),
        price: dec!(5000),
        available: true,
    });
    for i in 1..=8 {
        state.couriers.insert(CourierProfile {
            id: format!("courier-{i}"),
            verified: true,
            deliveries: 0,
            total_earnings: dec!(0),
        });
    }

    let tasks = BackgroundTasks::new();
    let orchestrator = state.orchestrator.clone();
    let token = tasks.cancel_token();
    tasks.spawn(TaskKind::Orchestrator, async move {
        orchestrator.run(token).await;
    });

    (state, tasks)
}

fn checkout() -> CreateOrderInput {
    CreateOrderInput {
        customer_id: "cust-1".into(),
        merchant_id: "merch-1".into(),
        items: vec![OrderItemInput {
            item_id: "item-1".into(),
            quantity: 2,
        }],
        delivery_address: "100m norte de la iglesia".into(),
        delivery_coords: Coordinates::new(9.94, -84.09),
        courier_tip: dec!(500),
        customer_notes: Some("ring the bell".into()),
    }
}

/// Poll until `check` passes or a few seconds elapse
async fn wait_for<F, Fut>(what: &str, check: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

async fn paid_ready_order(state: &Arc<AppState>) -> Order {
    let order = state.orders.create_order(checkout()).await.unwrap();
    state
        .orders
        .update_payment_status(&order.id, PaymentStatus::Paid, Some("txn-1".into()))
        .await
        .unwrap();
    state
        .orders
        .update_status(&order.id, OrderStatus::Preparing)
        .await
        .unwrap();
    state
        .orders
        .update_status(&order.id, OrderStatus::Ready)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_full_delivery_flow() {
    let (state, tasks) = engine();

    // checkout: the reference money scenario
    let order = state.orders.create_order(checkout()).await.unwrap();
    assert_eq!(order.breakdown.subtotal, dec!(10000.00));
    assert_eq!(order.breakdown.tax, dec!(1300.00));
    assert!(order.breakdown.verify());
    assert_eq!(order.status, OrderStatus::Pending);

    // payment webhook confirms and fans out side effects
    state
        .orders
        .update_payment_status(&order.id, PaymentStatus::Paid, Some("txn-1".into()))
        .await
        .unwrap();
    wait_for("invoice issuance", || async {
        state
            .orders
            .get_order(&order.id)
            .await
            .unwrap()
            .invoice_document_key()
            .is_some()
    })
    .await;

    // kitchen progresses; READY spawns the mission
    state
        .orders
        .update_status(&order.id, OrderStatus::Preparing)
        .await
        .unwrap();
    state
        .orders
        .update_status(&order.id, OrderStatus::Ready)
        .await
        .unwrap();
    wait_for("mission creation", || async {
        !state.dispatcher.find_available(None).await.unwrap().is_empty()
    })
    .await;

    let mission = state.dispatcher.find_available(None).await.unwrap().remove(0);
    assert_eq!(mission.order_id.as_deref(), Some(order.id.as_str()));

    // claim, pick up, drive a bit, verify with the code
    state.dispatcher.claim(&mission.id, "courier-1").await.unwrap();
    state
        .dispatcher
        .update_status(&mission.id, "courier-1", MissionStatus::OnWay)
        .await
        .unwrap();
    assert_eq!(
        state.orders.get_order(&order.id).await.unwrap().status,
        OrderStatus::OnWay
    );

    for _ in 0..5 {
        state.simulator.tick().await.unwrap();
    }

    let otp = state
        .dispatcher
        .get_mission(&mission.id)
        .await
        .unwrap()
        .delivery_otp;
    let delivered = state
        .dispatcher
        .verify_delivery(&mission.id, "courier-1", &otp)
        .await
        .unwrap();
    assert_eq!(delivered.status, MissionStatus::Delivered);
    let earnings = delivered.courier_earnings.unwrap();
    assert!(earnings > dec!(0));

    // orchestrator closes the order and credits the courier
    wait_for("order close", || async {
        state.orders.get_order(&order.id).await.unwrap().status == OrderStatus::Delivered
    })
    .await;
    let order = state.orders.get_order(&order.id).await.unwrap();
    assert_eq!(order.courier_id.as_deref(), Some("courier-1"));
    assert_eq!(order.courier_earnings, earnings);

    let profile = state.couriers.get_profile("courier-1").await.unwrap();
    assert_eq!(profile.deliveries, 1);
    assert_eq!(profile.total_earnings, earnings);

    tasks.shutdown().await;
}

#[tokio::test]
async fn test_contested_claim_has_one_winner() {
    let (state, tasks) = engine();
    let order = paid_ready_order(&state).await;
    wait_for("mission creation", || async {
        state
            .dispatcher
            .find_available(None)
            .await
            .unwrap()
            .iter()
            .any(|m| m.order_id.as_deref() == Some(order.id.as_str()))
    })
    .await;
    let mission = state.dispatcher.find_available(None).await.unwrap().remove(0);

    let mut handles = Vec::new();
    for i in 1..=8 {
        let dispatcher = state.dispatcher.clone();
        let mission_id = mission.id.clone();
        handles.push(tokio::spawn(async move {
            dispatcher.claim(&mission_id, &format!("courier-{i}")).await
        }));
    }

    let mut winners = Vec::new();
    let mut losses = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(mission) => winners.push(mission),
            Err(err) => {
                assert_eq!(err.code, ErrorCode::MissionAlreadyClaimed);
                losses += 1;
            }
        }
    }
    assert_eq!(winners.len(), 1);
    assert_eq!(losses, 7);

    let stored = state.dispatcher.get_mission(&mission.id).await.unwrap();
    assert_eq!(stored.courier_id, winners[0].courier_id);

    tasks.shutdown().await;
}

#[tokio::test]
async fn test_cancellation_refunds_and_tears_down() {
    let (state, tasks) = engine();
    let order = paid_ready_order(&state).await;
    wait_for("mission creation", || async {
        state
            .dispatcher
            .find_available(None)
            .await
            .unwrap()
            .iter()
            .any(|m| m.order_id.as_deref() == Some(order.id.as_str()))
    })
    .await;

    state
        .orders
        .cancel_order(&order.id, Some("kitchen closed".into()))
        .await
        .unwrap();

    wait_for("auto refund", || async {
        state.orders.get_order(&order.id).await.unwrap().payment_status == PaymentStatus::Refunded
    })
    .await;
    wait_for("mission teardown", || async {
        state.dispatcher.find_available(None).await.unwrap().is_empty()
    })
    .await;

    // terminal: nothing moves anymore
    let err = state
        .orders
        .update_status(&order.id, OrderStatus::OnWay)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::OrderTerminal);

    tasks.shutdown().await;
}

#[tokio::test]
async fn test_payment_webhook_replay_is_harmless() {
    let (state, tasks) = engine();
    let order = state.orders.create_order(checkout()).await.unwrap();

    for _ in 0..3 {
        state
            .orders
            .update_payment_status(&order.id, PaymentStatus::Paid, Some("txn-1".into()))
            .await
            .unwrap();
    }

    let order = state.orders.get_order(&order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Confirmed);
    // exactly one PENDING -> CONFIRMED entry
    assert_eq!(order.status_history.len(), 1);

    tasks.shutdown().await;
}

#[tokio::test]
async fn test_breaker_status_reported() {
    let (state, tasks) = engine();
    let status = state.breakers.system_status();
    assert!(status.iter().any(|s| s.name == "payment-gateway"));
    assert!(status.iter().any(|s| s.name == "invoice-authority"));
    tasks.shutdown().await;
}
