//! Simulation crate: the step driver for the Echo-Grid micro-market.
//!
//! This crate coordinates:
//! - Input feeding (live store polling or dataset replay)
//! - Battery dynamics, decisions and settlement, in that order
//! - Persisting every change back to the world-state store
//! - Best-effort log records and hook-based observation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Simulation.step()              │
//! │                                             │
//! │  1. Load world (reset + pause if unusable)  │
//! │  2. Replay: apply next dataset row          │
//! │  3. Hook: on_step_start                     │
//! │  4. BatteryModel::step for both households  │
//! │  5. Both decisions, concurrently            │
//! │  6. Hook: on_decisions                      │
//! │  7. SettlementEngine::resolve_step + apply  │
//! │  8. Persist households/market/controls      │
//! │  9. Hook: on_settlement                     │
//! │ 10. A_TO_B: hold contract flag, then clear  │
//! └─────────────────────────────────────────────┘
//!                      │
//!                      ▼ wait step_delay (interruptible)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use agents::MockDecisionMaker;
//! use simulation::{MetricsHook, Simulation, SimulationConfig};
//! use storage::{FallbackLogSink, MemoryLogSink, MemoryStore};
//!
//! let mut sim = Simulation::new(
//!     SimulationConfig::instant().with_max_steps(10),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MockDecisionMaker),
//!     FallbackLogSink::new(MemoryLogSink::default()),
//! )?;
//! let metrics = Arc::new(MetricsHook::new());
//! sim.add_hook(metrics.clone());
//!
//! let (_tx, rx) = tokio::sync::watch::channel(false);
//! sim.run(rx).await?;
//! println!("P2P kWh: {:.2}", metrics.snapshot().p2p_kwh);
//! ```

pub mod config;
pub mod dataset;
pub mod hooks;
pub mod metrics;

mod error;
mod runner;

pub use config::{RunMode, SimulationConfig};
pub use dataset::{DatasetFeed, DatasetRow, FeedGridStatus};
pub use error::{DatasetError, SimulationError};
pub use hooks::{HookContext, HookRunner, StepHook};
pub use metrics::{MetricsHook, MetricsSnapshot};
pub use runner::{Simulation, SimulationStats, StepOutcome, StepReport};
