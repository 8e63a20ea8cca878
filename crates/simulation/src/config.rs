//! Simulation driver configuration options.

use std::time::Duration;

use sim_core::EngineConfig;

/// Where step inputs come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Inputs are whatever external writers last put in the store.
    #[default]
    Live,
    /// Inputs come from a dataset row per step.
    Replay,
}

/// Configuration for the simulation driver.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub mode: RunMode,

    /// Wait between steps.
    pub step_delay: Duration,

    /// How long a settled P2P contract stays flagged active.
    pub settlement_pause: Duration,

    /// Wait after resetting a missing or corrupt world.
    pub reset_pause: Duration,

    /// Stop after this many completed steps.
    pub max_steps: Option<u64>,

    /// Battery, pricing and settlement constants.
    pub engine: EngineConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Live,
            step_delay: Duration::from_secs(15),
            settlement_pause: Duration::from_secs(3),
            reset_pause: Duration::from_secs(1),
            max_steps: None,
            engine: EngineConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero waits everywhere; for tests.
    pub fn instant() -> Self {
        Self {
            step_delay: Duration::ZERO,
            settlement_pause: Duration::ZERO,
            reset_pause: Duration::ZERO,
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn with_settlement_pause(mut self, pause: Duration) -> Self {
        self.settlement_pause = pause;
        self
    }

    pub fn with_reset_pause(mut self, pause: Duration) -> Self {
        self.reset_pause = pause;
        self
    }

    pub fn with_max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }
}
