//! Mission aggregate
//!
//! One physical pickup-to-dropoff delivery task, optionally linked 1:1 to an
//! order. Owned by the mission dispatcher.

use super::types::{MissionStatus, MissionType};
use crate::types::{Coordinates, Metadata};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    /// Linked order, if any; missions may exist standalone for pure
    /// logistics requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,

    pub mission_type: MissionType,
    pub status: MissionStatus,

    /// Null until exactly one successful claim; cleared only by an explicit
    /// release in an allowed state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courier_id: Option<String>,

    pub origin_address: String,
    pub origin: Coordinates,
    pub destination_address: String,
    pub destination: Coordinates,

    pub estimated_distance_km: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_distance_km: Option<f64>,
    pub estimated_minutes: u32,

    /// Earnings estimate shown in the pool
    pub estimated_earnings: Decimal,
    /// Final earnings, set once at delivery verification and immutable after
    #[serde(skip_serializing_if = "Option::is_none")]
    pub courier_earnings: Option<Decimal>,

    /// One-time code presented at delivery as proof of completion
    pub delivery_otp: String,
    pub courier_tip: Decimal,
    /// Surge flag captured from the pool size at creation
    pub surge: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_up_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Position simulation state and admin-override audit trail
    #[serde(default)]
    pub metadata: Metadata,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mission {
    /// Whether the mission sits unassigned in the pool
    pub fn is_claimable(&self) -> bool {
        self.courier_id.is_none() && self.status.is_unassigned_pool()
    }

    /// Last simulated position, falling back to the origin
    pub fn simulated_position(&self) -> Coordinates {
        let lat = self
            .metadata
            .get("current_lat")
            .and_then(|v| v.as_f64())
            .unwrap_or(self.origin.lat);
        let lng = self
            .metadata
            .get("current_lng")
            .and_then(|v| v.as_f64())
            .unwrap_or(self.origin.lng);
        Coordinates::new(lat, lng)
    }

    /// Merge entries into the metadata map
    pub fn merge_metadata(
        &mut self,
        entries: impl IntoIterator<Item = (String, serde_json::Value)>,
    ) {
        self.metadata.extend(entries);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_mission() -> Mission {
        Mission {
            id: "mis-1".into(),
            order_id: Some("order-1".into()),
            customer_id: Some("cust-1".into()),
            merchant_id: Some("merch-1".into()),
            mission_type: MissionType::FoodDelivery,
            status: MissionStatus::Ready,
            courier_id: None,
            origin_address: "merchant".into(),
            origin: Coordinates::new(9.98, -83.03),
            destination_address: "customer".into(),
            destination: Coordinates::new(9.95, -83.01),
            estimated_distance_km: 4.0,
            actual_distance_km: None,
            estimated_minutes: 17,
            estimated_earnings: Decimal::ZERO,
            courier_earnings: None,
            delivery_otp: "1234".into(),
            courier_tip: Decimal::ZERO,
            surge: false,
            picked_up_at: None,
            completed_at: None,
            metadata: Metadata::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_claimable_only_when_unassigned_pool() {
        let mut mission = sample_mission();
        assert!(mission.is_claimable());

        mission.courier_id = Some("courier-1".into());
        assert!(!mission.is_claimable());

        mission.courier_id = None;
        mission.status = MissionStatus::Cancelled;
        assert!(!mission.is_claimable());
    }

    #[test]
    fn test_simulated_position_falls_back_to_origin() {
        let mut mission = sample_mission();
        assert_eq!(mission.simulated_position(), mission.origin);

        mission.merge_metadata([
            ("current_lat".to_string(), json!(9.97)),
            ("current_lng".to_string(), json!(-83.02)),
        ]);
        assert_eq!(mission.simulated_position(), Coordinates::new(9.97, -83.02));
    }
}
