use thiserror::Error;

/// Failures reported by a decision oracle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("oracle quota exhausted: {0}")]
    QuotaExhausted(String),

    #[error("GEMINI_API_KEY is not set")]
    MissingApiKey,

    #[error("oracle request failed: {0}")]
    Provider(String),
}

impl OracleError {
    /// Classify a provider error message.
    ///
    /// Rate-limit signals (`429` or `RESOURCE_EXHAUSTED`) are kept apart from
    /// every other failure.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains("429") || message.contains("RESOURCE_EXHAUSTED") {
            OracleError::QuotaExhausted(message)
        } else {
            OracleError::Provider(message)
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, OracleError::QuotaExhausted(_))
    }
}
