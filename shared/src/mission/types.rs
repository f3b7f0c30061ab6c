//! Mission status machine

use serde::{Deserialize, Serialize};

/// Kind of physical delivery task
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionType {
    #[default]
    FoodDelivery,
    Parcel,
}

/// Mission lifecycle status.
///
/// `PENDING`/`READY` are the unassigned pool states; `CONFIRMED` means a
/// courier holds the mission; `ON_WAY` means picked up; `DELIVERED` means
/// verified with the delivery code. `CANCELLED` is reachable from any
/// non-terminal state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissionStatus {
    #[default]
    Pending,
    Ready,
    Confirmed,
    OnWay,
    Delivered,
    Cancelled,
}

impl MissionStatus {
    /// Allowed-transition table for `update_status`.
    ///
    /// Claim and release move between `READY`/`PENDING` and `CONFIRMED`
    /// through their own operations; this table covers the driven
    /// transitions.
    pub fn can_transition_to(&self, next: MissionStatus) -> bool {
        use MissionStatus::*;
        matches!(
            (self, next),
            (Pending, Ready | Confirmed | Cancelled)
                | (Ready, Confirmed | Cancelled)
                | (Confirmed, OnWay | Ready | Cancelled)
                | (OnWay, Delivered | Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MissionStatus::Delivered | MissionStatus::Cancelled)
    }

    /// Pool states: unassigned and visible to couriers
    pub fn is_unassigned_pool(&self) -> bool {
        matches!(self, MissionStatus::Pending | MissionStatus::Ready)
    }
}
