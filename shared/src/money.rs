//! Monetary breakdown types using rust_decimal for precision
//!
//! All monetary amounts in the system are `Decimal` values in the platform
//! currency's major unit, rounded half-up to two decimal places at breakdown
//! boundaries. Binary floating point is never used for money.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};

/// Rounding for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Round a raw amount to the monetary precision used throughout the system
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Fee schedule applied when assembling an order breakdown.
///
/// All rates are configuration, loaded at startup; operators can tune them
/// without a code change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Sales tax rate applied to the items subtotal (e.g. 0.13)
    pub tax_rate: Decimal,
    /// Platform fee rate applied to the items subtotal only
    pub platform_fee_percent: Decimal,
    /// Transaction fee rate applied to the amount the customer pays
    pub transaction_fee_percent: Decimal,
    /// Flat transaction fee added on top of the percentage
    pub transaction_fee_flat: Decimal,
}

/// Monetary breakdown of an order, computed once at creation.
///
/// Invariant: `total == subtotal + tax + delivery_fee + courier_tip +
/// transaction_fee`. The platform fee is the merchant-side cut and is not
/// part of the amount the customer pays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Breakdown {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub delivery_fee: Decimal,
    pub platform_fee: Decimal,
    pub transaction_fee: Decimal,
    pub courier_tip: Decimal,
    pub total: Decimal,
}

impl Breakdown {
    /// Assemble the full breakdown from the items subtotal, the delivery fee
    /// and the tip, applying the fee schedule.
    ///
    /// Tax and platform fee are computed from the subtotal; the transaction
    /// fee is computed from the base amount the customer pays
    /// (subtotal + tax + delivery fee + tip).
    pub fn compute(
        subtotal: Decimal,
        delivery_fee: Decimal,
        courier_tip: Decimal,
        fees: &FeeSchedule,
    ) -> Self {
        let subtotal = round_money(subtotal);
        let delivery_fee = round_money(delivery_fee);
        let courier_tip = round_money(courier_tip);

        let tax = round_money(subtotal * fees.tax_rate);
        let platform_fee = round_money(subtotal * fees.platform_fee_percent);

        let base = subtotal + tax + delivery_fee + courier_tip;
        let transaction_fee =
            round_money(base * fees.transaction_fee_percent + fees.transaction_fee_flat);

        Self {
            subtotal,
            tax,
            delivery_fee,
            platform_fee,
            transaction_fee,
            courier_tip,
            total: base + transaction_fee,
        }
    }

    /// Check the reconciliation invariant.
    ///
    /// `total` must equal the sum of every component the customer pays.
    /// Exact with `Decimal` arithmetic; never recomputed from current prices.
    pub fn verify(&self) -> bool {
        self.total
            == self.subtotal + self.tax + self.delivery_fee + self.courier_tip
                + self.transaction_fee
    }
}
