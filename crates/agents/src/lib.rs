//! Household decision makers for the Echo-Grid micro-market.
//!
//! Each step the driver asks one decision maker per household for an action
//! intent. The oracle-backed variant builds a status prompt, submits it to a
//! hosted model and normalizes the `ACTION | REASONING` reply; it never
//! returns an error, falling back per role instead:
//!
//! ```text
//! quota exhausted (429 / RESOURCE_EXHAUSTED) → PRODUCER: OFFER_P2P, CONSUMER: BUY_P2P
//! any other failure                          → HOLD
//! malformed or unknown label                 → HOLD, whole reply kept as rationale
//! ```

mod decision;
mod error;
mod oracle;
mod parse;
mod prompt;

pub use decision::{
    Decision, DecisionMaker, DecisionMakerKind, DecisionSource, MockDecisionMaker,
    OracleDecisionMaker, build_decision_maker, quota_fallback_action,
};
pub use error::OracleError;
pub use oracle::{DEFAULT_GEMINI_MODEL, DecisionOracle, GeminiOracle};
pub use parse::{ParsedResponse, parse_response};
pub use prompt::HouseholdSnapshot;
