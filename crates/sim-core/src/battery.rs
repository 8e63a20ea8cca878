//! Battery dynamics.
//!
//! Converts a household's net power over one step into a state-of-charge
//! change. The resulting level is always clamped into `[0, 100]`.

use types::{Household, clamp_percent};

use crate::config::EngineConfig;

/// Battery model shared by both households.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryModel {
    capacity_kwh: f64,
    step_minutes: f64,
}

impl BatteryModel {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            capacity_kwh: config.battery_capacity_kwh,
            step_minutes: config.step_minutes,
        }
    }

    pub fn capacity_kwh(&self) -> f64 {
        self.capacity_kwh
    }

    /// Step duration in hours.
    pub fn step_hours(&self) -> f64 {
        self.step_minutes / 60.0
    }

    /// Percentage points that `kwh` represents for this capacity.
    #[inline]
    pub fn kwh_to_percent(&self, kwh: f64) -> f64 {
        kwh / self.capacity_kwh * 100.0
    }

    /// Unclamped SoC change for a net power held over one step.
    pub fn delta_percent(&self, net_kw: f64) -> f64 {
        self.kwh_to_percent(net_kw * self.step_hours())
    }

    /// New battery level for `household` after one step. Pure.
    pub fn apply(&self, household: &Household) -> f64 {
        clamp_percent(household.battery_level + self.delta_percent(household.net_kw()))
    }

    /// Apply one step to `household` in place and return the new level.
    pub fn step(&self, household: &mut Household) -> f64 {
        let level = self.apply(household);
        household.set_battery(level);
        level
    }

    /// Energy above the reserve that may leave the battery, in kWh.
    pub fn spare_energy_kwh(&self, level: f64, reserve_percent: f64) -> f64 {
        ((level - reserve_percent) / 100.0 * self.capacity_kwh).max(0.0)
    }
}
