//! Decision makers: the capability the driver calls once per household per step.
//!
//! Two variants sit behind `DecisionMaker`:
//! - `OracleDecisionMaker` wraps any `DecisionOracle`, parses its answer and
//!   turns oracle errors into deterministic per-role fallbacks
//! - `MockDecisionMaker` answers by role without any I/O
//!
//! Which one runs is picked once, from configuration, by `build_decision_maker`.

use async_trait::async_trait;
use tracing::{error, warn};
use types::{AgentAction, Role};

use crate::error::OracleError;
use crate::oracle::{DecisionOracle, GeminiOracle};
use crate::parse::parse_response;
use crate::prompt::HouseholdSnapshot;

/// Where a decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionSource {
    /// Well-formed oracle answer.
    Oracle,
    /// Oracle answered but the text did not parse.
    Malformed,
    /// Oracle quota exhausted; role default used.
    QuotaFallback,
    /// Any other oracle failure; `HOLD` used.
    ErrorFallback,
    /// Deterministic mock.
    Mock,
}

/// One household's intent for a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: AgentAction,
    pub rationale: String,
    pub source: DecisionSource,
}

impl Decision {
    pub fn new(action: AgentAction, rationale: impl Into<String>, source: DecisionSource) -> Self {
        Self {
            action,
            rationale: rationale.into(),
            source,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(
            self.source,
            DecisionSource::QuotaFallback | DecisionSource::ErrorFallback
        )
    }
}

/// Action used when the oracle is out of quota.
pub fn quota_fallback_action(role: Role) -> AgentAction {
    match role {
        Role::Producer => AgentAction::OfferP2p,
        Role::Consumer => AgentAction::BuyP2p,
    }
}

/// Produces a household's action intent from a status snapshot.
///
/// Implementations never fail: errors are recovered into a decision.
#[async_trait]
pub trait DecisionMaker: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn produce(&self, snapshot: &HouseholdSnapshot) -> Decision;
}

// ─────────────────────────────────────────────────────────────────────────────
// Oracle-backed
// ─────────────────────────────────────────────────────────────────────────────

pub struct OracleDecisionMaker {
    name: String,
    oracle: Box<dyn DecisionOracle>,
}

impl OracleDecisionMaker {
    pub fn new(name: impl Into<String>, oracle: Box<dyn DecisionOracle>) -> Self {
        Self {
            name: name.into(),
            oracle,
        }
    }

    fn recover(&self, snapshot: &HouseholdSnapshot, err: OracleError) -> Decision {
        if err.is_quota() {
            let action = quota_fallback_action(snapshot.role);
            warn!(house = %snapshot.house, %action, "oracle quota exhausted, using fallback");
            Decision::new(
                action,
                format!("Quota exhausted, fallback to {action}"),
                DecisionSource::QuotaFallback,
            )
        } else {
            error!(house = %snapshot.house, error = %err, "oracle call failed, holding");
            Decision::new(
                AgentAction::Hold,
                format!("Oracle error: {err}"),
                DecisionSource::ErrorFallback,
            )
        }
    }
}

#[async_trait]
impl DecisionMaker for OracleDecisionMaker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn produce(&self, snapshot: &HouseholdSnapshot) -> Decision {
        let prompt = snapshot.prompt();
        match self.oracle.generate_decision(&prompt).await {
            Ok(text) => {
                let parsed = parse_response(&text);
                let source = if parsed.well_formed {
                    DecisionSource::Oracle
                } else {
                    warn!(house = %snapshot.house, "malformed oracle response, holding");
                    DecisionSource::Malformed
                };
                Decision::new(parsed.action, parsed.rationale, source)
            }
            Err(err) => self.recover(snapshot, err),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock
// ─────────────────────────────────────────────────────────────────────────────

/// Role-scripted decisions, no network.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockDecisionMaker;

#[async_trait]
impl DecisionMaker for MockDecisionMaker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn produce(&self, snapshot: &HouseholdSnapshot) -> Decision {
        let rationale = match snapshot.role {
            Role::Producer => "Battery high, offering P2P trade",
            Role::Consumer => "Battery low, seeking P2P purchase",
        };
        Decision::new(
            quota_fallback_action(snapshot.role),
            rationale,
            DecisionSource::Mock,
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Selection
// ─────────────────────────────────────────────────────────────────────────────

/// Which decision maker to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionMakerKind {
    Mock,
    Gemini { model: String },
}

pub fn build_decision_maker(kind: &DecisionMakerKind) -> Result<Box<dyn DecisionMaker>, OracleError> {
    match kind {
        DecisionMakerKind::Mock => Ok(Box::new(MockDecisionMaker)),
        DecisionMakerKind::Gemini { model } => {
            let oracle = GeminiOracle::from_env(model.clone())?;
            Ok(Box::new(OracleDecisionMaker::new(
                format!("gemini:{model}"),
                Box::new(oracle),
            )))
        }
    }
}
