//! Fixed-point monetary types for the energy market.
//!
//! Tariffs and wallet balances use fixed-point arithmetic with 4 decimal
//! places so that settlement debits and credits are exact and replayable.
//! Both types serialize as plain decimal numbers (rupees) so the stored world
//! snapshot stays human-readable.

use derive_more::{Add, AddAssign, From, Into, Neg, Sub, SubAssign, Sum};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed-point scale for Price and Cash types.
/// 10,000 = Rs 1.00, 15,000 = Rs 1.50, 100 = Rs 0.01
pub const MONEY_SCALE: i64 = 10_000;

/// Raw units in one tenth of a rupee.
const TENTH: i64 = MONEY_SCALE / 10;

/// Round a raw fixed-point value to one decimal place, halves away from zero.
#[inline]
fn round_raw_to_tenth(raw: i64) -> i64 {
    let half = TENTH / 2;
    if raw >= 0 {
        (raw + half) / TENTH * TENTH
    } else {
        -((-raw + half) / TENTH * TENTH)
    }
}

// =============================================================================
// Fixed-Point Price Type (per kWh)
// =============================================================================

/// Fixed-point tariff in rupees per kWh.
///
/// # Examples
/// - `Price(10000)` = Rs 1.00/kWh
/// - `Price(380000)` = Rs 38.00/kWh
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Add,
    Sub,
    Neg,
    AddAssign,
    SubAssign,
    From,
    Into,
)]
#[serde(from = "f64", into = "f64")]
pub struct Price(pub i64);

impl Price {
    pub const ZERO: Price = Price(0);

    /// Create a Price from a floating-point value.
    #[inline]
    pub fn from_float(v: f64) -> Self {
        Self((v * MONEY_SCALE as f64).round() as i64)
    }

    /// Convert to floating-point for display/calculations.
    #[inline]
    pub fn to_float(self) -> f64 {
        self.0 as f64 / MONEY_SCALE as f64
    }

    /// Raw internal value.
    #[inline]
    pub fn raw(self) -> i64 {
        self.0
    }

    /// Round to one decimal place (Rs 0.1 resolution).
    #[inline]
    pub fn round_to_tenth(self) -> Self {
        Price(round_raw_to_tenth(self.0))
    }

    /// Midpoint between two prices, rounded to one decimal place.
    #[inline]
    pub fn midpoint(self, other: Self) -> Self {
        Price((self.0 + other.0) / 2).round_to_tenth()
    }

    /// Clamp into `[lo, hi]`. When the interval is empty (`hi < lo`) the
    /// lower bound wins.
    #[inline]
    pub fn clamp_to(self, lo: Self, hi: Self) -> Self {
        lo.max(self.min(hi))
    }

    /// Total cost of `kwh` units at this tariff.
    #[inline]
    pub fn for_kwh(self, kwh: f64) -> Cash {
        Cash((self.0 as f64 * kwh).round() as i64)
    }
}

impl From<f64> for Price {
    fn from(v: f64) -> Self {
        Price::from_float(v)
    }
}

impl From<Price> for f64 {
    fn from(p: Price) -> Self {
        p.to_float()
    }
}

impl fmt::Debug for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Price(Rs {:.2}/kWh)", self.to_float())
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rs {:.1}", self.to_float())
    }
}

// =============================================================================
// Fixed-Point Cash Type
// =============================================================================

/// Fixed-point wallet amount in rupees.
///
/// Signed and never clamped: a household wallet may go negative.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    Add,
    Sub,
    Neg,
    AddAssign,
    SubAssign,
    Sum,
    From,
    Into,
)]
#[serde(from = "f64", into = "f64")]
pub struct Cash(pub i64);

impl Cash {
    pub const ZERO: Cash = Cash(0);

    /// Create Cash from a floating-point value.
    #[inline]
    pub fn from_float(v: f64) -> Self {
        Self((v * MONEY_SCALE as f64).round() as i64)
    }

    /// Convert to floating-point for display/calculations.
    #[inline]
    pub fn to_float(self) -> f64 {
        self.0 as f64 / MONEY_SCALE as f64
    }

    /// Raw internal value.
    #[inline]
    pub fn raw(self) -> i64 {
        self.0
    }

    /// Check if cash is negative.
    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl From<f64> for Cash {
    fn from(v: f64) -> Self {
        Cash::from_float(v)
    }
}

impl From<Cash> for f64 {
    fn from(c: Cash) -> Self {
        c.to_float()
    }
}

impl fmt::Debug for Cash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cash(Rs {:.4})", self.to_float())
    }
}

impl fmt::Display for Cash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rs {:.2}", self.to_float())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to_tenth() {
        assert_eq!(Price(143_333).round_to_tenth(), Price::from_float(14.3));
        assert_eq!(Price(168_333).round_to_tenth(), Price::from_float(16.8));
        assert_eq!(Price(155_500).round_to_tenth(), Price::from_float(15.6));
        assert_eq!(Price(-155_500).round_to_tenth(), Price::from_float(-15.6));
        assert_eq!(Price(-143_333).round_to_tenth(), Price::from_float(-14.3));
    }

    #[test]
    fn test_midpoint() {
        let seller = Price::from_float(14.3);
        let buyer = Price::from_float(16.8);
        assert_eq!(seller.midpoint(buyer), Price::from_float(15.6));
        assert_eq!(buyer.midpoint(seller), Price::from_float(15.6));
    }

    #[test]
    fn test_clamp_to_empty_interval_takes_lower_bound() {
        let lo = Price::from_float(12.0);
        let hi = Price::from_float(-19.0);
        assert_eq!(Price::from_float(1.7).clamp_to(lo, hi), lo);
        assert_eq!(Price::from_float(50.0).clamp_to(lo, hi), lo);
    }

    #[test]
    fn test_for_kwh_is_exact() {
        let tariff = Price::from_float(40.0);
        assert_eq!(tariff.for_kwh(0.6), Cash::from_float(24.0));
        assert_eq!(Price::from_float(15.6).for_kwh(1.5), Cash::from_float(23.4));
    }

    #[test]
    fn test_cash_arithmetic() {
        let mut wallet = Cash::from_float(100.0);
        wallet -= Cash::from_float(150.5);
        assert!(wallet.is_negative());
        assert_eq!(wallet, Cash::from_float(-50.5));

        let total: Cash = [Cash::from_float(1.0), Cash::from_float(2.5)]
            .into_iter()
            .sum();
        assert_eq!(total, Cash::from_float(3.5));
    }

    #[test]
    fn test_serde_as_decimal() {
        let json = serde_json::to_string(&Cash::from_float(5000.0)).unwrap();
        assert_eq!(json, "5000.0");
        let back: Price = serde_json::from_str("38").unwrap();
        assert_eq!(back, Price::from_float(38.0));
    }
}
