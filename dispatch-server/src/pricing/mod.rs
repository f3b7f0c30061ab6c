//! Pricing engine
//!
//! Pure functions over the pricing configuration: distance, delivery fee,
//! surge detection, courier earnings and time estimates. Everything money
//! related stays in `Decimal`; distance is the one quantity kept as `f64`
//! because it feeds geometry, not ledgers.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use shared::money::{round_money, FeeSchedule};
use shared::types::Coordinates;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers (haversine)
pub fn distance_km(from: Coordinates, to: Coordinates) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Delivery fee rates and estimate tunables, loaded from the environment at
/// startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Flat component of every delivery fee
    pub base_fare: Decimal,
    /// Per-kilometer component
    pub per_km_rate: Decimal,
    /// Fee floor after the distance formula
    pub min_delivery_fee: Decimal,
    /// Fee ceiling; also caps surge pricing
    pub max_delivery_fee: Decimal,
    /// Unassigned missions at or above this count trigger surge
    pub surge_pool_threshold: usize,
    /// Multiplier applied to the distance formula during surge
    pub surge_multiplier: Decimal,
    /// Platform's cut of the delivery fee; the rest goes to the courier
    pub platform_delivery_cut: Decimal,
    /// Average courier speed used for time estimates
    pub avg_speed_kmh: f64,
    /// Fixed pickup/handoff buffer added to every estimate
    pub pickup_buffer_minutes: u32,
    /// Order-level fee schedule (tax, platform fee, transaction fee)
    pub fees: FeeSchedule,
}

impl PricingConfig {
    /// Delivery fee for a given distance.
    ///
    /// The surge multiplier applies to the raw distance formula; the result
    /// is then clamped to [min, max], so surge never pushes the fee past
    /// the ceiling.
    pub fn delivery_fee(&self, distance_km: f64, surge: bool) -> Decimal {
        let km = Decimal::from_f64(distance_km).unwrap_or_default();
        let mut fee = self.base_fare + self.per_km_rate * km;
        if surge {
            fee *= self.surge_multiplier;
        }
        round_money(fee.clamp(self.min_delivery_fee, self.max_delivery_fee))
    }

    /// Whether the unassigned pool size puts the market in surge
    pub fn is_surge(&self, unassigned_pool: usize) -> bool {
        unassigned_pool >= self.surge_pool_threshold
    }

    /// Platform's share of a delivery fee
    pub fn platform_cut(&self, delivery_fee: Decimal) -> Decimal {
        round_money(delivery_fee * self.platform_delivery_cut)
    }

    /// Courier take-home for a delivery fee plus the full tip.
    ///
    /// Tips are never subject to the platform cut.
    pub fn courier_earnings(&self, delivery_fee: Decimal, courier_tip: Decimal) -> Decimal {
        round_money(delivery_fee - self.platform_cut(delivery_fee) + courier_tip)
    }

    /// Estimated delivery duration in minutes, never below 10
    pub fn estimated_minutes(&self, distance_km: f64) -> u32 {
        let travel = (distance_km / self.avg_speed_kmh * 60.0).ceil() as u32;
        (travel + self.pickup_buffer_minutes).max(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config() -> PricingConfig {
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

    #[test]
    fn test_distance_zero_for_same_point() {
        let p = Coordinates::new(9.9281, -84.0907);
        assert!(distance_km(p, p) < 1e-9);
    }

    #[test]
    fn test_distance_known_pair() {
        // San Jose downtown to Cartago, roughly 18-19 km as the crow flies
        let a = Coordinates::new(9.9281, -84.0907);
        let b = Coordinates::new(9.8644, -83.9194);
        let d = distance_km(a, b);
        assert!(d > 17.0 && d < 21.0, "got {d}");
    }

    #[test]
    fn test_delivery_fee_clamps_to_floor() {
        // 0.5 km: 500 + 150 = 650, below the 800 floor
        assert_eq!(config().delivery_fee(0.5, false), dec!(800.00));
    }

    #[test]
    fn test_delivery_fee_linear_in_distance() {
        // 4 km: 500 + 1200 = 1700
        assert_eq!(config().delivery_fee(4.0, false), dec!(1700.00));
    }

    #[test]
    fn test_delivery_fee_clamps_to_ceiling() {
        // 40 km: 500 + 12000, far past the 5000 cap
        assert_eq!(config().delivery_fee(40.0, false), dec!(5000.00));
    }

    #[test]
    fn test_surge_multiplies_but_respects_ceiling() {
        let cfg = config();
        // 4 km surged: 1700 * 1.25 = 2125
        assert_eq!(cfg.delivery_fee(4.0, true), dec!(2125.00));
        // already at the cap, surge cannot exceed it
        assert_eq!(cfg.delivery_fee(40.0, true), dec!(5000.00));
        // surge applies before the clamp: 650 * 1.25 clears the 800 floor
        assert_eq!(cfg.delivery_fee(0.5, true), dec!(812.50));
    }

    #[test]
    fn test_surge_threshold() {
        let cfg = config();
        assert!(!cfg.is_surge(4));
        assert!(cfg.is_surge(5));
        assert!(cfg.is_surge(12));
    }

    #[test]
    fn test_courier_earnings_cut_excludes_tip() {
        // fee 1700, cut 170, plus full tip 500
        let cfg = config();
        assert_eq!(cfg.platform_cut(dec!(1700)), dec!(170.00));
        assert_eq!(cfg.courier_earnings(dec!(1700), dec!(500)), dec!(2030.00));
    }

    #[test]
    fn test_estimated_minutes_includes_buffer() {
        // 5 km at 25 km/h = 12 min travel + 8 min buffer
        assert_eq!(config().estimated_minutes(5.0), 20);
    }

    #[test]
    fn test_estimated_minutes_floor() {
        assert_eq!(config().estimated_minutes(0.1), 10);
    }
}
