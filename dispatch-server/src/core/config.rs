//! Runtime configuration loaded from the environment
//!
//! Every tunable has a default so a bare process starts with sane values;
//! operators override through env vars (a `.env` file is honored at
//! startup).

use crate::breaker::BreakerSettings;
use crate::pricing::PricingConfig;
use rust_decimal::Decimal;
use shared::money::FeeSchedule;
use std::str::FromStr;
use std::time::Duration;

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

fn env_decimal(key: &str, default: &str) -> Decimal {
    std::env::var(key)
        .ok()
        .and_then(|raw| Decimal::from_str(&raw).ok())
        .unwrap_or_else(|| Decimal::from_str(default).unwrap_or_default())
}

/// Courier position simulation tunables
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub tick_interval: Duration,
    /// Fraction of the remaining leg covered per tick
    pub speed_factor: f64,
    /// Remaining distance at which the customer gets an approach notice
    pub approach_notice_km: f64,
    /// Remaining distance treated as arrival
    pub arrival_km: f64,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Broadcast channel capacity for the event bus
    pub event_capacity: usize,
    pub pricing: PricingConfig,
    pub breaker: BreakerSettings,
    pub simulator: SimulatorConfig,
    /// One loyalty point per this much subtotal at sustainable merchants
    pub loyalty_unit: Decimal,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            event_capacity: env_parse("EVENT_CAPACITY", 256),
            pricing: PricingConfig {
                base_fare: env_decimal("PRICING_BASE_FARE", "500"),
                per_km_rate: env_decimal("PRICING_PER_KM_RATE", "300"),
                min_delivery_fee: env_decimal("PRICING_MIN_DELIVERY_FEE", "800"),
                max_delivery_fee: env_decimal("PRICING_MAX_DELIVERY_FEE", "5000"),
                surge_pool_threshold: env_parse("PRICING_SURGE_POOL_THRESHOLD", 5),
                surge_multiplier: env_decimal("PRICING_SURGE_MULTIPLIER", "1.25"),
                platform_delivery_cut: env_decimal("PRICING_PLATFORM_DELIVERY_CUT", "0.10"),
                avg_speed_kmh: env_parse("PRICING_AVG_SPEED_KMH", 25.0),
                pickup_buffer_minutes: env_parse("PRICING_PICKUP_BUFFER_MINUTES", 8),
                fees: FeeSchedule {
                    tax_rate: env_decimal("FEES_TAX_RATE", "0.13"),
                    platform_fee_percent: env_decimal("FEES_PLATFORM_FEE_PERCENT", "0.05"),
                    transaction_fee_percent: env_decimal("FEES_TRANSACTION_FEE_PERCENT", "0.05"),
                    transaction_fee_flat: env_decimal("FEES_TRANSACTION_FEE_FLAT", "250"),
                },
            },
            breaker: BreakerSettings {
                failure_threshold: env_parse("BREAKER_FAILURE_THRESHOLD", 5),
                reset_timeout: Duration::from_secs(env_parse("BREAKER_RESET_TIMEOUT_SECS", 30)),
            },
            simulator: SimulatorConfig {
                tick_interval: Duration::from_millis(env_parse("SIMULATOR_TICK_MS", 2000)),
                speed_factor: env_parse("SIMULATOR_SPEED_FACTOR", 0.15),
                approach_notice_km: env_parse("SIMULATOR_APPROACH_NOTICE_KM", 0.3),
                arrival_km: env_parse("SIMULATOR_ARRIVAL_KM", 0.05),
            },
            loyalty_unit: env_decimal("LOYALTY_UNIT", "1000"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
