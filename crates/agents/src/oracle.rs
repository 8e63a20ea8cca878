//! The external decision oracle.
//!
//! An oracle turns a natural-language prompt into free text. It knows
//! nothing about actions or fallbacks; that is the adapter's job.

use async_trait::async_trait;
use rig::client::ProviderClient;
use rig::providers::gemini;

use crate::error::OracleError;

/// Default hosted model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Text-in, text-out decision source.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn generate_decision(&self, prompt: &str) -> Result<String, OracleError>;
}

/// Gemini-backed oracle.
pub struct GeminiOracle {
    client: gemini::Client,
    model: String,
}

impl GeminiOracle {
    /// Create client from GEMINI_API_KEY env var
    pub fn from_env(model: impl Into<String>) -> Result<Self, OracleError> {
        if !matches!(std::env::var("GEMINI_API_KEY"), Ok(key) if !key.trim().is_empty()) {
            return Err(OracleError::MissingApiKey);
        }
        Ok(Self {
            client: gemini::Client::from_env(),
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl DecisionOracle for GeminiOracle {
    async fn generate_decision(&self, prompt: &str) -> Result<String, OracleError> {
        use rig::client::CompletionClient;
        use rig::completion::Prompt;

        let agent = self.client.agent(&self.model).build();

        agent
            .prompt(prompt)
            .await
            .map(|text| text.trim().to_string())
            .map_err(|e| OracleError::classify(e.to_string()))
    }
}

impl std::fmt::Debug for GeminiOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiOracle")
            .field("model", &self.model)
            .finish()
    }
}
