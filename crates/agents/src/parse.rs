//! Oracle response parsing.
//!
//! Expected shape: `ACTION | REASONING`. Anything else becomes `HOLD` with
//! the full response kept as the rationale.

use types::AgentAction;

/// Outcome of parsing one oracle response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub action: AgentAction,
    pub rationale: String,
    /// False when the response had no delimiter or an unknown label.
    pub well_formed: bool,
}

/// Trim and strip decoration models like to wrap labels in.
fn normalize_label(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '`') || c.is_whitespace())
        .to_uppercase()
}

pub fn parse_response(text: &str) -> ParsedResponse {
    let text = text.trim();
    let malformed = || ParsedResponse {
        action: AgentAction::Hold,
        rationale: text.to_string(),
        well_formed: false,
    };

    let Some((label, reasoning)) = text.split_once('|') else {
        return malformed();
    };

    match normalize_label(label).parse::<AgentAction>() {
        Ok(action) => ParsedResponse {
            action,
            rationale: reasoning.trim().to_string(),
            well_formed: true,
        },
        Err(_) => malformed(),
    }
}
