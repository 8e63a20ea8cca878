//! Central configuration for the Echo-Grid binary.
//!
//! Aggregates the driver configuration with oracle selection and the
//! locations of the world-state file, log database and replay dataset.

use std::path::PathBuf;
use std::time::Duration;

use agents::{DEFAULT_GEMINI_MODEL, DecisionMakerKind};
use simulation::{RunMode, SimulationConfig};

/// Master configuration for a run.
#[derive(Debug, Clone)]
pub struct GridConfig {
    // ─────────────────────────────────────────────────────────────────────────
    // Driver
    // ─────────────────────────────────────────────────────────────────────────
    /// Mode, timings, step bound and engine constants.
    pub simulation: SimulationConfig,

    // ─────────────────────────────────────────────────────────────────────────
    // Decision Oracle
    // ─────────────────────────────────────────────────────────────────────────
    /// Use scripted decisions instead of the hosted model.
    pub use_mock_agents: bool,
    /// Gemini model name.
    pub gemini_model: String,

    // ─────────────────────────────────────────────────────────────────────────
    // Paths
    // ─────────────────────────────────────────────────────────────────────────
    /// JSON file backing the world-state store.
    pub world_state_path: PathBuf,
    /// SQLite database for the log stream.
    pub log_db_path: PathBuf,
    /// CSV dataset read in replay mode.
    pub dataset_path: PathBuf,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            use_mock_agents: false,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            world_state_path: PathBuf::from("world_state.json"),
            log_db_path: PathBuf::from("echo_grid_logs.db"),
            dataset_path: PathBuf::from("data/simulation_data.csv"),
        }
    }
}

impl GridConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder-style setters
    // ─────────────────────────────────────────────────────────────────────────

    pub fn mock_agents(mut self, mock: bool) -> Self {
        self.use_mock_agents = mock;
        self
    }

    pub fn gemini_model(mut self, model: impl Into<String>) -> Self {
        self.gemini_model = model.into();
        self
    }

    /// Seconds to wait between steps. Negative clamps to zero; non-finite
    /// or out-of-range values leave the delay unchanged.
    pub fn step_delay_secs(mut self, secs: f64) -> Self {
        if let Some(delay) = secs_to_duration(secs) {
            self.simulation.step_delay = delay;
        }
        self
    }

    /// Seconds a settled contract stays flagged active. Same clamping as
    /// [`Self::step_delay_secs`].
    pub fn settlement_pause_secs(mut self, secs: f64) -> Self {
        if let Some(pause) = secs_to_duration(secs) {
            self.simulation.settlement_pause = pause;
        }
        self
    }

    pub fn max_steps(mut self, steps: u64) -> Self {
        self.simulation.max_steps = Some(steps);
        self
    }

    /// Switch to replay mode reading `path`.
    pub fn replay(mut self, path: impl Into<PathBuf>) -> Self {
        self.simulation.mode = RunMode::Replay;
        self.dataset_path = path.into();
        self
    }

    pub fn world_state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.world_state_path = path.into();
        self
    }

    pub fn log_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_db_path = path.into();
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Computed Properties
    // ─────────────────────────────────────────────────────────────────────────

    pub fn is_replay(&self) -> bool {
        self.simulation.mode == RunMode::Replay
    }

    /// Which decision maker both households use.
    pub fn decision_maker_kind(&self) -> DecisionMakerKind {
        if self.use_mock_agents {
            DecisionMakerKind::Mock
        } else {
            DecisionMakerKind::Gemini {
                model: self.gemini_model.clone(),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Preset Configurations
// ─────────────────────────────────────────────────────────────────────────────

impl GridConfig {
    /// Quick demo: replay the bundled day with mock agents and short waits.
    pub fn demo() -> Self {
        let dataset = Self::default().dataset_path;
        Self::default()
            .mock_agents(true)
            .replay(dataset)
            .step_delay_secs(0.5)
            .settlement_pause_secs(0.25)
    }
}

/// `None` for NaN, infinities and values too large for a `Duration`.
pub fn secs_to_duration(secs: f64) -> Option<Duration> {
    if !secs.is_finite() {
        return None;
    }
    Duration::try_from_secs_f64(secs.max(0.0)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GridConfig::default();
        assert!(!config.use_mock_agents);
        assert!(!config.is_replay());
        assert_eq!(config.gemini_model, "gemini-2.5-flash");
        assert_eq!(config.simulation.step_delay, Duration::from_secs(15));
        assert_eq!(config.simulation.max_steps, None);
    }

    #[test]
    fn test_builder_pattern() {
        let config = GridConfig::new()
            .mock_agents(true)
            .step_delay_secs(2.5)
            .max_steps(12)
            .replay("day.csv");

        assert!(config.is_replay());
        assert_eq!(config.dataset_path, PathBuf::from("day.csv"));
        assert_eq!(config.simulation.step_delay, Duration::from_millis(2500));
        assert_eq!(config.simulation.max_steps, Some(12));
        assert!(matches!(
            config.decision_maker_kind(),
            DecisionMakerKind::Mock
        ));
    }

    #[test]
    fn test_negative_delay_is_zero() {
        let config = GridConfig::new().step_delay_secs(-3.0);
        assert_eq!(config.simulation.step_delay, Duration::ZERO);
    }

    #[test]
    fn test_non_finite_delay_is_ignored() {
        let config = GridConfig::new()
            .step_delay_secs(f64::INFINITY)
            .settlement_pause_secs(f64::NAN);
        assert_eq!(config.simulation.step_delay, Duration::from_secs(15));
        assert_eq!(
            config.simulation.settlement_pause,
            GridConfig::default().simulation.settlement_pause
        );
        assert_eq!(secs_to_duration(1e300), None);
        assert_eq!(secs_to_duration(-1.0), Some(Duration::ZERO));
    }

    #[test]
    fn test_gemini_kind_carries_model() {
        let config = GridConfig::new().gemini_model("gemini-2.0-pro");
        match config.decision_maker_kind() {
            DecisionMakerKind::Gemini { model } => assert_eq!(model, "gemini-2.0-pro"),
            DecisionMakerKind::Mock => panic!("expected gemini"),
        }
    }

    #[test]
    fn test_demo_preset_differs_from_default() {
        let default = GridConfig::default();
        let demo = GridConfig::demo();
        assert!(demo.use_mock_agents);
        assert!(demo.is_replay());
        assert_ne!(demo.simulation.step_delay, default.simulation.step_delay);
    }
}
