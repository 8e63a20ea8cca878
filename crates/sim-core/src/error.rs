//! Error types for sim-core operations.

/// Result type for sim-core operations.
pub type Result<T> = std::result::Result<T, EngineConfigError>;

/// Invalid engine configuration, reported before any step runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineConfigError {
    #[error("battery capacity must be positive, got {0} kWh")]
    NonPositiveCapacity(f64),

    #[error("step duration must be positive, got {0} minutes")]
    NonPositiveStep(f64),

    #[error("trade limits must satisfy 0 <= min ({min}) <= max ({max})")]
    InvalidTradeLimits { min: f64, max: f64 },

    #[error("{name} must be within [0, 100] percent, got {value}")]
    PercentOutOfRange { name: &'static str, value: f64 },

    #[error("{name} must not be negative")]
    NegativeTolerance { name: &'static str },
}
