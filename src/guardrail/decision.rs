//! Tool-specific decision rules.
//!
//! Each rule set collects every breached condition into one combined
//! [`GuardrailViolation`] — the caller sees all failures together rather
//! than one at a time. Rules never panic; they return a tagged error the
//! coordinator consumes internally.

use crate::limits::LimitValidator;
use crate::types::CurrentState;

/// Risk headroom below this fraction forces a HALT decision.
pub const MIN_RISK_HEADROOM: f64 = 0.10;

/// Edge-vs-cost ratio below this forces a HALT decision.
pub const MIN_EDGE_COST_RATIO: f64 = 1.0;

/// One or more guardrail rules breached in a single validation pass.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Guardrail violation: {}", violations.join("; "))]
pub struct GuardrailViolation {
    pub violations: Vec<String>,
}

impl GuardrailViolation {
    fn check(violations: Vec<String>) -> Result<(), Self> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self { violations })
        }
    }
}

/// Pre-trade checklist rule: when risk headroom is exhausted or the edge
/// no longer covers costs, the only acceptable decision is HALT.
pub fn validate_pretrade(
    decision: &str,
    risk_headroom: f64,
    edge_cost_ratio: f64,
) -> Result<(), GuardrailViolation> {
    let mut violations = Vec::new();

    if risk_headroom < MIN_RISK_HEADROOM && decision != "HALT" {
        violations.push(format!(
            "risk headroom {:.1}% below {:.0}% requires HALT, got {decision}",
            risk_headroom * 100.0,
            MIN_RISK_HEADROOM * 100.0,
        ));
    }

    if edge_cost_ratio < MIN_EDGE_COST_RATIO && decision != "HALT" {
        violations.push(format!(
            "edge/cost ratio {edge_cost_ratio:.2} below {MIN_EDGE_COST_RATIO:.1} requires HALT, got {decision}",
        ));
    }

    GuardrailViolation::check(violations)
}

/// Execution-plan rule: an EXECUTE action must have every constraint
/// check green, and the plan must clear the hard limits for position
/// size, daily loss, and the prospective position count.
pub fn validate_execution(
    limits: &mut LimitValidator,
    action: &str,
    constraint_checks: &[(String, bool)],
    position_size: f64,
    current_state: &CurrentState,
) -> Result<(), GuardrailViolation> {
    let mut violations = Vec::new();

    if action == "EXECUTE" {
        for (name, passed) in constraint_checks {
            if !passed {
                violations.push(format!("constraint check failed: {name}"));
            }
        }
    }

    if !limits.check_position_size("execution_plan", position_size) {
        violations.push(format!(
            "position size {position_size:.2} exceeds limit {:.2}",
            limits.policy().max_position_size,
        ));
    }

    if !limits.check_daily_loss(current_state.daily_loss) {
        violations.push(format!(
            "daily loss {:.2} at or above limit {:.2}",
            current_state.daily_loss,
            limits.policy().max_daily_loss,
        ));
    }

    // Prospective count: would opening one more position breach the cap.
    if action == "EXECUTE" && !limits.check_concurrent_positions(current_state.num_positions + 1) {
        violations.push(format!(
            "opening position {} would reach cap {}",
            current_state.num_positions + 1,
            limits.policy().max_concurrent_positions,
        ));
    }

    GuardrailViolation::check(violations)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
