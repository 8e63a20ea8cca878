//! Household roles, agent action labels, and settlement action codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Role
// =============================================================================

/// Fixed market role of a household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Producer,
    Consumer,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Producer => "PRODUCER",
            Role::Consumer => "CONSUMER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Agent Action (intent)
// =============================================================================

/// Action intent produced by a household's decision maker for one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentAction {
    #[default]
    Hold,
    ChargeFromGrid,
    ChargeBattery,
    SellToGrid,
    #[serde(rename = "OFFER_P2P")]
    OfferP2p,
    #[serde(rename = "BUY_P2P")]
    BuyP2p,
    DonateMasjid,
}

impl AgentAction {
    /// Every label an oracle may answer with.
    pub const ALL: [AgentAction; 7] = [
        AgentAction::Hold,
        AgentAction::ChargeFromGrid,
        AgentAction::ChargeBattery,
        AgentAction::SellToGrid,
        AgentAction::OfferP2p,
        AgentAction::BuyP2p,
        AgentAction::DonateMasjid,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AgentAction::Hold => "HOLD",
            AgentAction::ChargeFromGrid => "CHARGE_FROM_GRID",
            AgentAction::ChargeBattery => "CHARGE_BATTERY",
            AgentAction::SellToGrid => "SELL_TO_GRID",
            AgentAction::OfferP2p => "OFFER_P2P",
            AgentAction::BuyP2p => "BUY_P2P",
            AgentAction::DonateMasjid => "DONATE_MASJID",
        }
    }

    /// Whether this intent lets the producer's battery back a P2P trade.
    pub fn offers_energy(self) -> bool {
        matches!(self, AgentAction::OfferP2p | AgentAction::SellToGrid)
    }
}

impl fmt::Display for AgentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a label is not one of the enumerated actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action label: {:?}", self.0)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for AgentAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentAction::ALL
            .into_iter()
            .find(|action| action.label() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

// =============================================================================
// Settlement Action (output code)
// =============================================================================

/// The single settlement signal surfaced per step.
///
/// The integer code drives an external actuator:
/// `0` idle, `1` producer to consumer, `2` producer to masjid,
/// `3` grid to producer, `4` grid to consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementAction {
    #[default]
    Idle,
    AToB,
    AToMasjid,
    GridToA,
    GridToB,
}

impl SettlementAction {
    /// Every signal, in code order.
    pub const ALL: [SettlementAction; 5] = [
        SettlementAction::Idle,
        SettlementAction::AToB,
        SettlementAction::AToMasjid,
        SettlementAction::GridToA,
        SettlementAction::GridToB,
    ];

    pub fn code(self) -> u8 {
        match self {
            SettlementAction::Idle => 0,
            SettlementAction::AToB => 1,
            SettlementAction::AToMasjid => 2,
            SettlementAction::GridToA => 3,
            SettlementAction::GridToB => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SettlementAction::Idle => "IDLE",
            SettlementAction::AToB => "A_TO_B",
            SettlementAction::AToMasjid => "A_TO_MASJID",
            SettlementAction::GridToA => "GRID_TO_A",
            SettlementAction::GridToB => "GRID_TO_B",
        }
    }
}

impl fmt::Display for SettlementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label(), self.code())
    }
}
