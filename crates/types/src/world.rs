//! World-state entities shared by the engine, the store, and the driver.
//!
//! The tree mirrors the store layout: `grid`, `house_a`, `house_b`,
//! `market`, `community`, `simulation`, `controls`. Every entity is created
//! once at reset and afterwards only has fields mutated.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::action::{AgentAction, Role, SettlementAction};
use crate::money::{Cash, Price};

/// Nominal line voltage while the grid is up.
pub const GRID_VOLTAGE: u32 = 220;

// =============================================================================
// Grid
// =============================================================================

/// Availability of the central grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GridStatus {
    #[default]
    Online,
    Blackout,
}

impl GridStatus {
    pub fn is_online(self) -> bool {
        self == GridStatus::Online
    }
}

impl fmt::Display for GridStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridStatus::Online => f.write_str("ONLINE"),
            GridStatus::Blackout => f.write_str("BLACKOUT"),
        }
    }
}

/// Central grid state. Written by the input feed, read by pricing and settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    pub status: GridStatus,
    pub price_per_unit: Price,
    /// Informational only; kept in sync with `status`.
    #[serde(default)]
    pub voltage: u32,
}

impl Grid {
    pub fn new(status: GridStatus, price_per_unit: Price) -> Self {
        let mut grid = Self {
            status,
            price_per_unit,
            voltage: 0,
        };
        grid.sync_voltage();
        grid
    }

    /// Set the status and derive the voltage from it.
    pub fn set_status(&mut self, status: GridStatus) {
        self.status = status;
        self.sync_voltage();
    }

    fn sync_voltage(&mut self) {
        self.voltage = if self.status.is_online() {
            GRID_VOLTAGE
        } else {
            0
        };
    }
}

// =============================================================================
// Households
// =============================================================================

/// Which of the two households an entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HouseholdId {
    HouseA,
    HouseB,
}

impl HouseholdId {
    /// Store key of the household entity.
    pub fn key(self) -> &'static str {
        match self {
            HouseholdId::HouseA => "house_a",
            HouseholdId::HouseB => "house_b",
        }
    }

    /// The fixed role each household plays.
    pub fn role(self) -> Role {
        match self {
            HouseholdId::HouseA => Role::Producer,
            HouseholdId::HouseB => Role::Consumer,
        }
    }
}

impl fmt::Display for HouseholdId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One household: externally supplied inputs plus the two core-mutated fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Household {
    pub role: Role,
    /// Solar generation in kW.
    pub solar_output: f64,
    /// Demand in kW.
    pub current_load: f64,
    /// State of charge in percent, always within `[0, 100]`.
    pub battery_level: f64,
    /// Signed wallet balance, never clamped.
    pub wallet_balance: Cash,
    #[serde(default)]
    pub last_action: AgentAction,
    #[serde(default)]
    pub agent_log: String,
}

impl Household {
    /// Net power in kW: positive is surplus, negative is deficit.
    pub fn net_kw(&self) -> f64 {
        self.solar_output - self.current_load
    }

    /// Surplus power in kW, zero when in deficit.
    pub fn excess_kw(&self) -> f64 {
        self.net_kw().max(0.0)
    }

    /// Deficit power in kW as a positive number, zero when in surplus.
    pub fn deficit_kw(&self) -> f64 {
        (-self.net_kw()).max(0.0)
    }

    /// Set the battery level, clamped into `[0, 100]`.
    pub fn set_battery(&mut self, level: f64) {
        self.battery_level = clamp_percent(level);
    }
}

/// Clamp a state-of-charge value into `[0, 100]`.
#[inline]
pub fn clamp_percent(level: f64) -> f64 {
    level.clamp(0.0, 100.0)
}

// =============================================================================
// Market
// =============================================================================

/// Structured record of the last settled peer-to-peer trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetails {
    pub seller: HouseholdId,
    pub buyer: HouseholdId,
    pub kwh: f64,
    pub grid_price: Price,
    pub seller_bid: Price,
    pub buyer_bid: Price,
    pub agreed_price: Price,
    /// Agreed price plus transmission rent.
    pub buyer_cost_per_unit: Price,
    pub seller_revenue: Cash,
    pub buyer_payment: Cash,
    pub seller_profit_per_unit: Price,
    pub seller_profit_total: Cash,
    pub buyer_savings_per_unit: Price,
    pub buyer_savings_total: Cash,
}

/// Market record, overwritten by each settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// True only while a settled trade is being signalled.
    pub active_contract: bool,
    pub transaction_price: Price,
    pub latest_transaction: String,
    #[serde(default)]
    pub transaction_details: Option<TransactionDetails>,
}

impl Default for Market {
    fn default() -> Self {
        Self {
            active_contract: false,
            transaction_price: Price::ZERO,
            latest_transaction: "None".to_string(),
            transaction_details: None,
        }
    }
}

// =============================================================================
// Community / Simulation / Controls
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Community {
    /// Monotonic; only donation settlements increase it.
    pub total_donated_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationClock {
    /// Step timestamp label, e.g. `"13:30:00"`.
    pub clock: String,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self {
            clock: "00:00".to_string(),
        }
    }
}

impl SimulationClock {
    /// Hour component of the clock label, if it parses.
    pub fn hour(&self) -> Option<u32> {
        self.clock
            .split(':')
            .next()
            .and_then(|h| h.trim().parse::<u32>().ok())
            .filter(|h| *h < 24)
    }

    /// Daylight window used in decision prompts: `[06:00, 18:00)`.
    pub fn is_daytime(&self) -> bool {
        matches!(self.hour(), Some(h) if (6..18).contains(&h))
    }
}

/// Per-step settlement signal for an external actuator. Always overwritten.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Controls {
    pub action: u8,
    pub action_label: String,
    pub reason: String,
    pub timestamp: String,
}

impl Controls {
    pub fn signal(action: SettlementAction, reason: impl Into<String>, timestamp: &str) -> Self {
        Self {
            action: action.code(),
            action_label: action.label().to_string(),
            reason: reason.into(),
            timestamp: timestamp.to_string(),
        }
    }
}

// =============================================================================
// World State
// =============================================================================

/// Full snapshot of the shared world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub grid: Grid,
    pub house_a: Household,
    pub house_b: Household,
    #[serde(default)]
    pub market: Market,
    #[serde(default)]
    pub community: Community,
    pub simulation: SimulationClock,
    #[serde(default)]
    pub controls: Controls,
}

impl WorldState {
    /// Starting world written by a reset.
    pub fn initial() -> Self {
        Self {
            grid: Grid::new(GridStatus::Online, Price::from_float(22.0)),
            house_a: Household {
                role: Role::Producer,
                solar_output: 0.0,
                current_load: 0.2,
                battery_level: 85.0,
                wallet_balance: Cash::from_float(5000.0),
                last_action: AgentAction::Hold,
                agent_log: "System Active. Monitoring production.".to_string(),
            },
            house_b: Household {
                role: Role::Consumer,
                solar_output: 0.0,
                current_load: 1.5,
                battery_level: 15.0,
                wallet_balance: Cash::from_float(2000.0),
                last_action: AgentAction::Hold,
                agent_log: "System Active. Battery Critical.".to_string(),
            },
            market: Market::default(),
            community: Community::default(),
            simulation: SimulationClock::default(),
            controls: Controls::signal(SettlementAction::Idle, "World reset", "00:00"),
        }
    }

    pub fn household(&self, id: HouseholdId) -> &Household {
        match id {
            HouseholdId::HouseA => &self.house_a,
            HouseholdId::HouseB => &self.house_b,
        }
    }

    pub fn household_mut(&mut self, id: HouseholdId) -> &mut Household {
        match id {
            HouseholdId::HouseA => &mut self.house_a,
            HouseholdId::HouseB => &mut self.house_b,
        }
    }

    /// The producer household (fixed: `house_a`).
    pub fn producer(&self) -> &Household {
        &self.house_a
    }

    /// The consumer household (fixed: `house_b`).
    pub fn consumer(&self) -> &Household {
        &self.house_b
    }
}
