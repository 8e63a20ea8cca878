//! Engine configuration.
//!
//! Every constant the battery model, the negotiator and the settlement rules
//! depend on lives here and is handed to them at construction time.

use serde::{Deserialize, Serialize};
use types::Price;

use crate::error::{EngineConfigError, Result};

/// Configuration for battery dynamics, pricing and settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    // ─────────────────────────────────────────────────────────────────────────
    // Battery
    // ─────────────────────────────────────────────────────────────────────────
    /// Usable battery capacity per household in kWh.
    pub battery_capacity_kwh: f64,
    /// Simulated minutes per step.
    pub step_minutes: f64,

    // ─────────────────────────────────────────────────────────────────────────
    // Peer-to-peer trade sizing
    // ─────────────────────────────────────────────────────────────────────────
    /// Largest volume a single trade may move.
    pub max_trade_kwh: f64,
    /// Trades smaller than this fall through to the next rule.
    pub min_trade_kwh: f64,
    /// Producer battery must be strictly above this percentage to sell.
    pub trade_battery_floor: f64,
    /// Share of producer capacity that is never tradeable.
    pub battery_reserve_percent: f64,

    // ─────────────────────────────────────────────────────────────────────────
    // Pricing
    // ─────────────────────────────────────────────────────────────────────────
    /// Producer's generation cost per kWh (G).
    pub generation_cost: Price,
    /// Per-kWh wire-use surcharge paid by the buyer (T).
    pub transmission_rent: Price,
    /// Seller bid band inset from both ends.
    pub seller_margin: Price,
    /// Buyer bid band inset from both ends.
    pub buyer_margin: Price,
    /// Largest per-unit loss a seller may accept.
    pub seller_loss_tolerance: Price,
    /// Largest per-unit loss versus the grid a buyer may accept.
    pub buyer_loss_tolerance: Price,

    // ─────────────────────────────────────────────────────────────────────────
    // Donation
    // ─────────────────────────────────────────────────────────────────────────
    /// Producer surplus must exceed this (kW) for a donation to fire.
    pub donation_excess_threshold_kw: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            // Battery
            battery_capacity_kwh: 10.0,
            step_minutes: 30.0,

            // Trade sizing
            max_trade_kwh: 2.0,
            min_trade_kwh: 0.1,
            trade_battery_floor: 30.0,
            battery_reserve_percent: 20.0,

            // Pricing
            generation_cost: Price::from_float(11.0),
            transmission_rent: Price::from_float(18.0),
            seller_margin: Price::from_float(1.0),
            buyer_margin: Price::from_float(0.5),
            seller_loss_tolerance: Price::from_float(0.5),
            buyer_loss_tolerance: Price::from_float(2.0),

            // Donation
            donation_excess_threshold_kw: 0.5,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder-style setters for fluent configuration
    // ─────────────────────────────────────────────────────────────────────────

    /// Set battery capacity in kWh.
    pub fn capacity_kwh(mut self, kwh: f64) -> Self {
        self.battery_capacity_kwh = kwh;
        self
    }

    /// Set simulated minutes per step.
    pub fn step_minutes(mut self, minutes: f64) -> Self {
        self.step_minutes = minutes;
        self
    }

    /// Set the per-trade volume cap.
    pub fn max_trade(mut self, kwh: f64) -> Self {
        self.max_trade_kwh = kwh;
        self
    }

    /// Set the producer generation cost.
    pub fn generation_cost(mut self, cost: f64) -> Self {
        self.generation_cost = Price::from_float(cost);
        self
    }

    /// Set the transmission rent.
    pub fn transmission_rent(mut self, rent: f64) -> Self {
        self.transmission_rent = Price::from_float(rent);
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.battery_capacity_kwh.is_nan() || self.battery_capacity_kwh <= 0.0 {
            return Err(EngineConfigError::NonPositiveCapacity(
                self.battery_capacity_kwh,
            ));
        }
        if self.step_minutes.is_nan() || self.step_minutes <= 0.0 {
            return Err(EngineConfigError::NonPositiveStep(self.step_minutes));
        }
        if !(self.min_trade_kwh >= 0.0 && self.min_trade_kwh <= self.max_trade_kwh) {
            return Err(EngineConfigError::InvalidTradeLimits {
                min: self.min_trade_kwh,
                max: self.max_trade_kwh,
            });
        }
        for (name, value) in [
            ("trade_battery_floor", self.trade_battery_floor),
            ("battery_reserve_percent", self.battery_reserve_percent),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(EngineConfigError::PercentOutOfRange { name, value });
            }
        }
        for (name, value) in [
            ("seller_loss_tolerance", self.seller_loss_tolerance),
            ("buyer_loss_tolerance", self.buyer_loss_tolerance),
        ] {
            if value < Price::ZERO {
                return Err(EngineConfigError::NegativeTolerance { name });
            }
        }
        Ok(())
    }
}
