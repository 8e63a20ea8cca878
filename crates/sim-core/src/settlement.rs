//! The per-step settlement engine.
//!
//! Settlement is an explicit, ordered list of guarded rules. Each rule either
//! returns a complete `Resolution` or declines; the first rule that returns
//! one wins and later rules are never evaluated. When every rule declines the
//! step resolves to `IDLE` with no mutations.
//!
//! A `Resolution` only *describes* the change. `Resolution::apply` commits
//! it to a `WorldState` in one go, so the caller decides when and where the
//! mutations land.

use serde::{Deserialize, Serialize};
use tracing::debug;
use types::{AgentAction, Cash, Controls, HouseholdId, SettlementAction, TransactionDetails, WorldState};

use crate::battery::BatteryModel;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::pricing::{Negotiator, Refusal};
use crate::rules::default_rules;

// ─────────────────────────────────────────────────────────────────────────────
// Resolution
// ─────────────────────────────────────────────────────────────────────────────

/// A single change to the world produced by a settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Add to a household wallet.
    Credit { house: HouseholdId, amount: Cash },
    /// Subtract from a household wallet.
    Debit { house: HouseholdId, amount: Cash },
    /// Move `percent` points of charge from one battery to the other.
    ShiftBattery {
        from: HouseholdId,
        to: HouseholdId,
        percent: f64,
    },
    /// Increase the community donation counter.
    Donate { kwh: f64 },
    /// Record a settled peer-to-peer trade on the market.
    RecordTrade(TransactionDetails),
}

/// Which branch of the rule chain produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementKind {
    PeerTrade,
    Donation,
    GridPurchase,
    GridSale,
    Idle,
}

/// Non-fatal observations made while evaluating the rule chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettlementEvent {
    /// P2P was eligible but the tradeable volume was below the minimum.
    TradeTooSmall { volume_kwh: f64 },
    /// P2P was eligible but the negotiation did not close.
    NegotiationFailed(Refusal),
}

/// The outcome of one step's settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub action: SettlementAction,
    pub kind: SettlementKind,
    pub mutations: Vec<Mutation>,
    /// Human-readable transaction summary.
    pub summary: String,
    pub events: Vec<SettlementEvent>,
}

impl Resolution {
    pub fn new(
        action: SettlementAction,
        kind: SettlementKind,
        mutations: Vec<Mutation>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            action,
            kind,
            mutations,
            summary: summary.into(),
            events: Vec::new(),
        }
    }

    /// The no-op resolution.
    pub fn idle() -> Self {
        Self::new(
            SettlementAction::Idle,
            SettlementKind::Idle,
            Vec::new(),
            "No settlement this step",
        )
    }

    pub fn is_idle(&self) -> bool {
        self.kind == SettlementKind::Idle
    }

    /// Trade record, present only for peer-to-peer settlements.
    pub fn transaction(&self) -> Option<&TransactionDetails> {
        self.mutations.iter().find_map(|m| match m {
            Mutation::RecordTrade(details) => Some(details),
            _ => None,
        })
    }

    /// Net wallet change for `house` across all mutations.
    pub fn wallet_delta(&self, house: HouseholdId) -> Cash {
        self.mutations
            .iter()
            .map(|m| match m {
                Mutation::Credit { house: h, amount } if *h == house => *amount,
                Mutation::Debit { house: h, amount } if *h == house => -*amount,
                _ => Cash::ZERO,
            })
            .sum()
    }

    /// Commit every mutation to `world` and overwrite its controls.
    ///
    /// Battery levels are clamped into `[0, 100]`; wallets are not clamped.
    pub fn apply(&self, world: &mut WorldState) {
        for mutation in &self.mutations {
            match mutation {
                Mutation::Credit { house, amount } => {
                    world.household_mut(*house).wallet_balance += *amount;
                }
                Mutation::Debit { house, amount } => {
                    world.household_mut(*house).wallet_balance -= *amount;
                }
                Mutation::ShiftBattery { from, to, percent } => {
                    let seller = world.household_mut(*from);
                    seller.set_battery(seller.battery_level - percent);
                    let buyer = world.household_mut(*to);
                    buyer.set_battery(buyer.battery_level + percent);
                }
                Mutation::Donate { kwh } => {
                    world.community.total_donated_kwh += kwh;
                }
                Mutation::RecordTrade(details) => {
                    world.market.active_contract = true;
                    world.market.transaction_price = details.agreed_price;
                    world.market.transaction_details = Some(details.clone());
                }
            }
        }

        if !self.is_idle() {
            world.market.latest_transaction = self.summary.clone();
        }
        world.controls = Controls::signal(self.action, &self.summary, &world.simulation.clock);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rule chain
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only inputs for one evaluation of the rule chain.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub world: &'a WorldState,
    pub producer_intent: AgentAction,
    pub consumer_intent: AgentAction,
    pub config: &'a EngineConfig,
    pub battery: &'a BatteryModel,
    pub negotiator: &'a Negotiator,
}

impl StepContext<'_> {
    /// Producer net power in kW.
    pub fn net_producer(&self) -> f64 {
        self.world.producer().net_kw()
    }

    /// Consumer net power in kW.
    pub fn net_consumer(&self) -> f64 {
        self.world.consumer().net_kw()
    }
}

/// A guarded settlement rule.
///
/// Rules must be deterministic: the same context always yields the same
/// answer. Observations that do not settle anything go into `events`.
pub trait SettlementRule: Send + Sync {
    /// Stable name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Return a resolution if this rule applies, `None` to fall through.
    fn evaluate(
        &self,
        ctx: &StepContext<'_>,
        events: &mut Vec<SettlementEvent>,
    ) -> Option<Resolution>;
}

/// Resolves a step's two intents into at most one settlement.
pub struct SettlementEngine {
    config: EngineConfig,
    battery: BatteryModel,
    negotiator: Negotiator,
    rules: Vec<Box<dyn SettlementRule>>,
}

impl SettlementEngine {
    /// Build the engine with the standard rule order:
    /// peer trade, donation, grid.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_rules(config, default_rules())
    }

    /// Build the engine with an explicit rule order.
    pub fn with_rules(config: EngineConfig, rules: Vec<Box<dyn SettlementRule>>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            battery: BatteryModel::new(&config),
            negotiator: Negotiator::new(&config),
            config,
            rules,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn battery(&self) -> &BatteryModel {
        &self.battery
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Pick this step's settlement. Pure: does not touch `world`.
    pub fn resolve_step(
        &self,
        world: &WorldState,
        producer_intent: AgentAction,
        consumer_intent: AgentAction,
    ) -> Resolution {
        let ctx = StepContext {
            world,
            producer_intent,
            consumer_intent,
            config: &self.config,
            battery: &self.battery,
            negotiator: &self.negotiator,
        };
        let mut events = Vec::new();

        for rule in &self.rules {
            if let Some(mut resolution) = rule.evaluate(&ctx, &mut events) {
                debug!(rule = rule.name(), action = %resolution.action, "settlement rule fired");
                resolution.events = events;
                return resolution;
            }
        }

        let mut idle = Resolution::idle();
        idle.events = events;
        idle
    }
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("config", &self.config)
            .field("rules", &self.rule_names())
            .finish()
    }
}
