//! Guardrail coordinator — the single public entry point of the
//! admission-control layer.
//!
//! `validate_and_log` never fails outward: rule breaches, malformed tool
//! output, and timeouts all collapse to `validation_passed = false` with
//! the rejection reasons captured in the audit trail. A rejected decision
//! simply never reaches the broker.

use serde_json::Value;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use super::audit::{AuditLogger, ViolationSummary};
use super::decision::{self, GuardrailViolation};
use super::latency::{LatencyMonitor, LatencyStats};
use crate::limits::{LimitValidator, ViolationStats};
use crate::types::{CurrentState, ToolName};

/// Action recorded when every gate rejects or a tool branch fails.
const ACTION_REJECTED: &str = "REJECTED";

/// Action recorded for tools with no specific validation rules.
const ACTION_LOGGED: &str = "LOGGED";

/// How a tool-specific validation branch failed.
enum ToolCheckFailure {
    /// A guardrail rule was breached — treated as an attempted override
    /// of policy.
    Violation(GuardrailViolation),
    /// The tool output was malformed (missing or ill-typed key). Never
    /// propagated; degraded to a generic violation string.
    Malformed(String),
}

/// Wires the limit validator, latency monitor, and audit logger together
/// behind one fail-safe call.
pub struct GuardrailCoordinator {
    limits: LimitValidator,
    latency: LatencyMonitor,
    audit: AuditLogger,
}

impl GuardrailCoordinator {
    pub fn new(limits: LimitValidator, latency: LatencyMonitor, audit: AuditLogger) -> Self {
        Self { limits, latency, audit }
    }

    /// Validate one gated tool interaction and record it.
    ///
    /// `latency_ms` is the caller's measured latency for producing the
    /// candidate decision; this call does not bound its own execution.
    /// Returns the final `validation_passed` verdict.
    pub fn validate_and_log(
        &mut self,
        tool_name: &str,
        inputs: &Value,
        output: &Value,
        current_state: &CurrentState,
        latency_ms: f64,
    ) -> bool {
        let mut validation_passed = true;
        let mut violations: Vec<String> = Vec::new();
        let mut action_taken = ACTION_REJECTED.to_string();
        let mut override_attempted = false;

        if self.latency.record(latency_ms) {
            violations.push(format!("latency {latency_ms:.1}ms exceeded timeout"));
            validation_passed = false;
        }

        match self.run_tool_validation(tool_name, output, current_state) {
            Ok(action) => {
                action_taken = action;
            }
            Err(ToolCheckFailure::Violation(v)) => {
                validation_passed = false;
                override_attempted = true;
                violations.push(v.to_string());
                warn!(tool = tool_name, %v, "Guardrail violation — decision rejected");
            }
            Err(ToolCheckFailure::Malformed(detail)) => {
                validation_passed = false;
                violations.push(format!("guardrail internal error: {detail}"));
                warn!(tool = tool_name, detail = %detail, "Malformed tool output — decision rejected");
            }
        }

        self.audit.log_interaction(
            tool_name,
            inputs,
            output,
            validation_passed,
            &action_taken,
            override_attempted,
            violations,
            latency_ms,
        );

        info!(
            tool = tool_name,
            passed = validation_passed,
            action = %action_taken,
            latency_ms,
            "Decision gated"
        );

        validation_passed
    }

    fn run_tool_validation(
        &mut self,
        tool_name: &str,
        output: &Value,
        current_state: &CurrentState,
    ) -> Result<String, ToolCheckFailure> {
        match ToolName::classify(tool_name) {
            ToolName::PretradeChecklist => {
                let decision = require_str(output, "decision")?;
                let risk_headroom = require_f64(output, "risk_headroom_pct")?;
                let edge_cost_ratio = require_f64(output, "edge_vs_cost_ratio")?;
                decision::validate_pretrade(&decision, risk_headroom, edge_cost_ratio)
                    .map_err(ToolCheckFailure::Violation)?;
                Ok(decision)
            }
            ToolName::ExecutionPlanner => {
                let action = require_str(output, "action")?;
                let constraint_checks = require_checks(output, "constraint_checks")?;
                let size = output
                    .pointer("/execution_plan/size")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| {
                        ToolCheckFailure::Malformed("missing numeric key execution_plan.size".into())
                    })?;
                decision::validate_execution(
                    &mut self.limits,
                    &action,
                    &constraint_checks,
                    size,
                    current_state,
                )
                .map_err(ToolCheckFailure::Violation)?;
                Ok(action)
            }
            ToolName::Other => Ok(ACTION_LOGGED.to_string()),
        }
    }

    /// Accumulated hard-limit violation counters.
    pub fn violation_stats(&self) -> ViolationStats {
        self.limits.violation_stats()
    }

    /// Latency SLA statistics.
    pub fn latency_stats(&self) -> LatencyStats {
        self.latency.stats()
    }

    /// Aggregate audit-trail view.
    pub fn violation_summary(&self) -> ViolationSummary {
        self.audit.violation_summary()
    }

    /// Read access to the audit trail.
    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Serialized handle for concurrent callers: counter updates, latency
/// samples, and audit appends happen atomically per call when candidate
/// decisions are evaluated in parallel across instruments.
#[derive(Clone)]
pub struct SharedCoordinator {
    inner: Arc<Mutex<GuardrailCoordinator>>,
}

impl SharedCoordinator {
    pub fn new(coordinator: GuardrailCoordinator) -> Self {
        Self { inner: Arc::new(Mutex::new(coordinator)) }
    }

    /// See [`GuardrailCoordinator::validate_and_log`]. A poisoned lock
    /// means another gating call panicked mid-update; fail safe and
    /// reject.
    pub fn validate_and_log(
        &self,
        tool_name: &str,
        inputs: &Value,
        output: &Value,
        current_state: &CurrentState,
        latency_ms: f64,
    ) -> bool {
        match self.inner.lock() {
            Ok(mut guard) => {
                guard.validate_and_log(tool_name, inputs, output, current_state, latency_ms)
            }
            Err(poisoned) => {
                warn!(tool = tool_name, "Coordinator lock poisoned — rejecting");
                drop(poisoned);
                false
            }
        }
    }

    /// Run a closure against the locked coordinator (stats, audit reads).
    pub fn with<R>(&self, f: impl FnOnce(&GuardrailCoordinator) -> R) -> Option<R> {
        self.inner.lock().ok().map(|guard| f(&guard))
    }
}

// ---------------------------------------------------------------------------
// Extraction helpers
// ---------------------------------------------------------------------------

fn require_str(output: &Value, key: &str) -> Result<String, ToolCheckFailure> {
    output
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ToolCheckFailure::Malformed(format!("missing string key {key}")))
}

fn require_f64(output: &Value, key: &str) -> Result<f64, ToolCheckFailure> {
    output
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolCheckFailure::Malformed(format!("missing numeric key {key}")))
}

fn require_checks(output: &Value, key: &str) -> Result<Vec<(String, bool)>, ToolCheckFailure> {
    let object = output
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| ToolCheckFailure::Malformed(format!("missing object key {key}")))?;
    object
        .iter()
        .map(|(name, v)| {
            v.as_bool()
                .map(|b| (name.clone(), b))
                .ok_or_else(|| {
                    ToolCheckFailure::Malformed(format!("non-boolean constraint check {name}"))
                })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::{LimitPolicy, ViolationKind};
    use serde_json::json;

    fn coordinator() -> GuardrailCoordinator {
        GuardrailCoordinator::new(
            LimitValidator::new(LimitPolicy::default()),
            LatencyMonitor::new(1000.0, 500.0),
            AuditLogger::in_memory(),
        )
    }

    fn state() -> CurrentState {
        CurrentState { daily_loss: 0.0, num_positions: 0 }
    }

    fn pretrade_output(decision: &str, headroom: f64, ratio: f64) -> Value {
        json!({
            "decision": decision,
            "risk_headroom_pct": headroom,
            "edge_vs_cost_ratio": ratio,
        })
    }

    #[test]
    fn test_pretrade_pass_records_decision_as_action() {
        let mut c = coordinator();
        let passed = c.validate_and_log(
            "pretrade_checklist",
            &json!({"symbol": "BTCUSDT"}),
            &pretrade_output("PROCEED", 0.40, 2.0),
            &state(),
            12.0,
        );
        assert!(passed);
        let entry = &c.audit().entries()[0];
        assert!(entry.validation_passed);
        assert_eq!(entry.action_taken, "PROCEED");
        assert!(!entry.override_attempted);
        assert!(entry.violations.is_empty());
    }

    #[test]
    fn test_pretrade_violation_rejects_and_flags_override() {
        let mut c = coordinator();
        let passed = c.validate_and_log(
            "pretrade_checklist",
            &json!({}),
            &pretrade_output("PROCEED", 0.05, 1.5),
            &state(),
            12.0,
        );
        assert!(!passed);
        let entry = &c.audit().entries()[0];
        assert_eq!(entry.action_taken, "REJECTED");
        assert!(entry.override_attempted);
        assert!(entry.violations[0].contains("risk headroom"));
    }

    #[test]
    fn test_malformed_output_rejects_without_override_flag() {
        let mut c = coordinator();
        let passed = c.validate_and_log(
            "pretrade_checklist",
            &json!({}),
            &json!({"decision": "PROCEED"}), // headroom and ratio missing
            &state(),
            12.0,
        );
        assert!(!passed);
        let entry = &c.audit().entries()[0];
        assert!(!entry.override_attempted);
        assert!(entry.violations[0].contains("internal error"));
        assert_eq!(entry.action_taken, "REJECTED");
    }

    #[test]
    fn test_unknown_tool_logged_only() {
        let mut c = coordinator();
        let passed =
            c.validate_and_log("market_scanner", &json!({}), &json!({"whatever": 1}), &state(), 5.0);
        assert!(passed);
        assert_eq!(c.audit().entries()[0].action_taken, "LOGGED");
    }

    #[test]
    fn test_timeout_rejects_even_valid_decision() {
        let mut c = coordinator();
        let passed = c.validate_and_log(
            "pretrade_checklist",
            &json!({}),
            &pretrade_output("PROCEED", 0.40, 2.0),
            &state(),
            1500.0,
        );
        assert!(!passed);
        let entry = &c.audit().entries()[0];
        assert!(entry.violations[0].contains("timeout"));
        // The tool branch itself succeeded, so the decision is still the
        // recorded action; only the verdict flips.
        assert_eq!(entry.action_taken, "PROCEED");
        assert!(!entry.override_attempted); // no rule breach, just slow
    }

    #[test]
    fn test_execution_planner_pass() {
        let mut c = coordinator();
        let output = json!({
            "action": "EXECUTE",
            "constraint_checks": {"margin_ok": true, "spread_ok": true},
            "execution_plan": {"size": 1000.0},
        });
        assert!(c.validate_and_log("execution_planner", &json!({}), &output, &state(), 8.0));
        assert_eq!(c.audit().entries()[0].action_taken, "EXECUTE");
    }

    #[test]
    fn test_execution_planner_oversize_rejected_and_counted() {
        let mut c = coordinator();
        let output = json!({
            "action": "EXECUTE",
            "constraint_checks": {},
            "execution_plan": {"size": 9000.0},
        });
        assert!(!c.validate_and_log("execution_planner", &json!({}), &output, &state(), 8.0));
        assert_eq!(c.violation_stats().count(ViolationKind::PositionSize), 1);
        assert!(c.audit().entries()[0].override_attempted);
    }

    #[test]
    fn test_execution_planner_missing_plan_size() {
        let mut c = coordinator();
        let output = json!({
            "action": "EXECUTE",
            "constraint_checks": {},
        });
        assert!(!c.validate_and_log("execution_planner", &json!({}), &output, &state(), 8.0));
        assert!(c.audit().entries()[0].violations[0].contains("execution_plan.size"));
    }

    #[test]
    fn test_every_call_is_audited() {
        let mut c = coordinator();
        c.validate_and_log("a", &json!({}), &json!({}), &state(), 1.0);
        c.validate_and_log("pretrade_checklist", &json!({}), &json!({}), &state(), 1.0);
        c.validate_and_log(
            "pretrade_checklist",
            &json!({}),
            &pretrade_output("HALT", 0.0, 0.0),
            &state(),
            1.0,
        );
        assert_eq!(c.audit().len(), 3);
        let summary = c.violation_summary();
        assert_eq!(summary.total_interactions, 3);
        assert_eq!(summary.validation_failures, 1); // the malformed call
    }

    #[test]
    fn test_latency_stats_track_calls() {
        let mut c = coordinator();
        c.validate_and_log("x", &json!({}), &json!({}), &state(), 100.0);
        c.validate_and_log("x", &json!({}), &json!({}), &state(), 700.0);
        c.validate_and_log("x", &json!({}), &json!({}), &state(), 1200.0);
        let stats = c.latency_stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.alerts, 1);
    }

    #[test]
    fn test_shared_coordinator_serializes_calls() {
        let shared = SharedCoordinator::new(coordinator());
        let mut handles = Vec::new();
        for i in 0..8 {
            let s = shared.clone();
            handles.push(std::thread::spawn(move || {
                s.validate_and_log(
                    "pretrade_checklist",
                    &json!({"call": i}),
                    &json!({
                        "decision": "PROCEED",
                        "risk_headroom_pct": 0.5,
                        "edge_vs_cost_ratio": 2.0,
                    }),
                    &CurrentState::default(),
                    5.0,
                )
            }));
        }
        for h in handles {
            assert!(h.join().unwrap());
        }
        let total = shared.with(|c| c.audit().len()).unwrap();
        assert_eq!(total, 8);
    }
}
