//! Core types for the Echo-Grid energy micro-market.
//!
//! This crate provides the shared world-state tree (grid, households, market,
//! community, clock, controls), the action vocabulary exchanged between
//! decision makers and the settlement engine, and fixed-point money values.

mod action;
mod money;
mod world;

pub use action::{AgentAction, Role, SettlementAction, UnknownAction};
pub use money::{Cash, MONEY_SCALE, Price};
pub use world::{
    Community, Controls, GRID_VOLTAGE, Grid, GridStatus, Household, HouseholdId, Market,
    SimulationClock, TransactionDetails, WorldState, clamp_percent,
};
