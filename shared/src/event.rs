//! Lifecycle events published on the engine's event bus
//!
//! Events decouple the order service, the mission dispatcher and the
//! side-effect orchestrator: the services that own state publish, the
//! orchestrator consumes. Each subscriber holds its own broadcast receiver,
//! so one slow or failing subscriber never blocks or rolls back another.

use crate::mission::Mission;
use crate::order::{Order, OrderStatus};
use serde::{Deserialize, Serialize};

/// Typed lifecycle event carried on the broadcast bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Payment confirmed for an order (first transition to PAID only)
    OrderPaid { order: Order },
    /// Order force-cancelled with an optional reason
    OrderCancelled {
        order: Order,
        reason: Option<String>,
    },
    /// Order moved along the forward path
    OrderStatusChanged {
        order: Order,
        from: OrderStatus,
        to: OrderStatus,
    },
    /// Mission delivery verified; earnings are final
    MissionDelivered { mission: Mission },
}

impl LifecycleEvent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::OrderPaid { .. } => "order.paid",
            LifecycleEvent::OrderCancelled { .. } => "order.cancelled",
            LifecycleEvent::OrderStatusChanged { .. } => "order.status_changed",
            LifecycleEvent::MissionDelivered { .. } => "mission.delivered",
        }
    }
}
