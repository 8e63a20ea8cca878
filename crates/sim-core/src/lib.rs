//! Sim-core: settlement mechanics for the Echo-Grid micro-market.
//!
//! This crate provides the deterministic core of each simulation step:
//! - Battery dynamics (net power over a step into a bounded SoC change)
//! - Pricing negotiation between the producer and the consumer
//! - The settlement engine: an ordered chain of guarded rules that picks at
//!   most one settlement per step and describes it as a set of mutations
//!
//! Nothing in here performs I/O. Given the same world snapshot and the same
//! two action intents, `SettlementEngine::resolve_step` always returns the
//! same `Resolution`.
//!
//! # Step flow
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  BatteryModel::apply (both households)       │
//! │              ▼                               │
//! │  (decisions are obtained by the driver)      │
//! │              ▼                               │
//! │  SettlementEngine::resolve_step              │
//! │    1. PeerTradeRule  ── Negotiator           │
//! │    2. DonationRule                           │
//! │    3. GridRule                               │
//! │    4. idle                                   │
//! │              ▼                               │
//! │  Resolution::apply(&mut WorldState)          │
//! └──────────────────────────────────────────────┘
//! ```

mod battery;
mod config;
mod error;
mod pricing;
mod rules;
mod settlement;

pub use battery::BatteryModel;
pub use config::EngineConfig;
pub use error::{EngineConfigError, Result};
pub use pricing::{Bid, BidBounds, Deal, Negotiator, Refusal};
pub use rules::{DonationRule, GridRule, PeerTradeRule, default_rules};
pub use settlement::{
    Mutation, Resolution, SettlementEngine, SettlementEvent, SettlementKind, SettlementRule,
    StepContext,
};
