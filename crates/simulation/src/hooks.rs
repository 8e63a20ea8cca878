//! Step hooks for observing the driver's lifecycle.
//!
//! Hooks are **observers** that receive owned snapshots at key points of a
//! step. They cannot modify the world.
//!
//! # Lifecycle
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Simulation.step()                                       │
//! │                                                          │
//! │  on_step_start()   ← inputs applied, before batteries     │
//! │        ▼                                                 │
//! │  on_decisions()    ← both intents, before settlement      │
//! │        ▼                                                 │
//! │  on_settlement()   ← resolution applied and persisted     │
//! └──────────────────────────────────────────────────────────┘
//!          │
//!          ▼ (loop exits)
//!  on_simulation_end()
//! ```

use std::sync::Arc;

use agents::Decision;
use sim_core::Resolution;
use types::WorldState;

use crate::runner::SimulationStats;

// ─────────────────────────────────────────────────────────────────────────────
// Hook Context
// ─────────────────────────────────────────────────────────────────────────────

/// Owned snapshot passed to hooks.
#[derive(Debug, Clone)]
pub struct HookContext {
    /// 1-based step number.
    pub step: u64,
    /// World as of the hook point.
    pub world: WorldState,
}

impl HookContext {
    pub fn new(step: u64, world: WorldState) -> Self {
        Self { step, world }
    }

    pub fn clock(&self) -> &str {
        &self.world.simulation.clock
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StepHook Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for driver observers.
///
/// Use interior mutability (`Mutex`, atomics) for hook-owned state.
pub trait StepHook: Send + Sync {
    /// Human-readable name for logging and debugging.
    fn name(&self) -> &str;

    #[allow(unused_variables)]
    fn on_step_start(&self, ctx: &HookContext) {}

    #[allow(unused_variables)]
    fn on_decisions(&self, producer: Decision, consumer: Decision, ctx: &HookContext) {}

    #[allow(unused_variables)]
    fn on_settlement(&self, resolution: Resolution, ctx: &HookContext) {}

    #[allow(unused_variables)]
    fn on_simulation_end(&self, stats: &SimulationStats) {}
}

// ─────────────────────────────────────────────────────────────────────────────
// HookRunner
// ─────────────────────────────────────────────────────────────────────────────

/// Calls registered hooks in registration order.
#[derive(Default)]
pub struct HookRunner {
    hooks: Vec<Arc<dyn StepHook>>,
}

impl HookRunner {
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    pub fn add(&mut self, hook: Arc<dyn StepHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub fn hook_names(&self) -> Vec<&str> {
        self.hooks.iter().map(|h| h.name()).collect()
    }

    pub fn on_step_start(&self, ctx: &HookContext) {
        for hook in &self.hooks {
            hook.on_step_start(ctx);
        }
    }

    /// Clones both decisions for each hook to keep the owned-data contract.
    pub fn on_decisions(&self, producer: &Decision, consumer: &Decision, ctx: &HookContext) {
        for hook in &self.hooks {
            hook.on_decisions(producer.clone(), consumer.clone(), ctx);
        }
    }

    pub fn on_settlement(&self, resolution: &Resolution, ctx: &HookContext) {
        for hook in &self.hooks {
            hook.on_settlement(resolution.clone(), ctx);
        }
    }

    pub fn on_simulation_end(&self, stats: &SimulationStats) {
        for hook in &self.hooks {
            hook.on_simulation_end(stats);
        }
    }
}

impl std::fmt::Debug for HookRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRunner")
            .field("hooks", &self.hook_names())
            .finish()
    }
}
